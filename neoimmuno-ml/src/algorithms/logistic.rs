//! L2-regularized logistic regression fitted with Newton iterations (IRLS).

use super::{Classifier, balanced_weights, check_rows, check_training_data, sigmoid};
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength.
    #[serde(default = "default_c")]
    pub c: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Convergence threshold on the largest coefficient update.
    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default = "default_true")]
    pub balanced: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: default_c(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            balanced: true,
        }
    }
}

fn default_c() -> f64 {
    1.0
}

fn default_max_iter() -> usize {
    1000
}

fn default_tol() -> f64 {
    1e-8
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    params: LogisticParams,
    intercept: f64,
    coef: Vec<f64>,
    fitted: bool,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            intercept: 0.0,
            coef: Vec::new(),
            fitted: false,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn linear(&self, row: &[f64]) -> f64 {
        self.intercept + row.iter().zip(&self.coef).map(|(x, b)| x * b).sum::<f64>()
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "LR"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[bool]) -> Result<(), MlError> {
        let p = check_training_data(x, y)?;
        if self.params.c <= 0.0 {
            return Err(MlError::model("logistic regression needs C > 0"));
        }
        let lambda = 1.0 / self.params.c;
        let weights = if self.params.balanced {
            balanced_weights(y)
        } else {
            vec![1.0; y.len()]
        };

        // beta[0] is the unpenalized intercept.
        let dim = p + 1;
        let mut beta = vec![0.0; dim];
        let mut converged = false;

        for iteration in 0..self.params.max_iter {
            let mut grad = vec![0.0; dim];
            let mut hess = vec![vec![0.0; dim]; dim];

            for ((row, &label), &w) in x.iter().zip(y).zip(&weights) {
                let z = beta[0] + row.iter().zip(&beta[1..]).map(|(a, b)| a * b).sum::<f64>();
                let prob = sigmoid(z);
                let err = w * (prob - if label { 1.0 } else { 0.0 });
                let curv = w * prob * (1.0 - prob);

                grad[0] += err;
                hess[0][0] += curv;
                for j in 0..p {
                    grad[j + 1] += err * row[j];
                    hess[0][j + 1] += curv * row[j];
                    for k in j..p {
                        hess[j + 1][k + 1] += curv * row[j] * row[k];
                    }
                }
            }
            for j in 0..dim {
                for k in 0..j {
                    hess[j][k] = hess[k][j];
                }
            }
            for j in 1..dim {
                grad[j] += lambda * beta[j];
                hess[j][j] += lambda;
            }
            // Keeps the intercept row invertible under perfect separation.
            hess[0][0] += 1e-10;

            let step = solve(hess, grad)
                .ok_or_else(|| MlError::training("singular Hessian in logistic regression"))?;
            let max_step = step.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            for (b, s) in beta.iter_mut().zip(&step) {
                *b -= s;
            }
            if max_step < self.params.tol {
                debug!(iterations = iteration + 1, "Logistic regression converged");
                converged = true;
                break;
            }
        }
        if !converged {
            debug!(max_iter = self.params.max_iter, "Logistic regression hit max_iter");
        }

        self.intercept = beta[0];
        self.coef = beta[1..].to_vec();
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, MlError> {
        if !self.fitted {
            return Err(MlError::model("logistic regression is not fitted"));
        }
        check_rows(x, self.coef.len())?;
        Ok(x.iter().map(|row| sigmoid(self.linear(row))).collect())
    }
}

/// Solve `a · s = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut s = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * s[k]).sum();
        s[row] = (b[row] - tail) / a[row][row];
    }
    Some(s)
}
