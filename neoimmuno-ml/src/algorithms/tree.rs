//! Weighted CART regression tree.
//!
//! One builder serves both ensembles. For 0/1 targets the weighted squared
//! error reduction is proportional to the Gini decrease, so random-forest
//! trees fit labels directly and their leaf mean is the positive-class
//! probability. Boosting fits residuals and supplies its own leaf values.

use rand::Rng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Minimum impurity reduction that counts as a split.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Training view handed to the builder.
pub struct TreeData<'a> {
    pub x: &'a [Vec<f64>],
    pub targets: &'a [f64],
    pub weights: &'a [f64],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Builder<'a, 'b, R: Rng> {
    data: &'a TreeData<'b>,
    params: &'a TreeParams,
    rng: &'a mut R,
    leaf_value: &'a dyn Fn(&[usize]) -> f64,
    importances: Vec<f64>,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on `rows`. Returns the tree and the unnormalized impurity
    /// decrease per feature.
    pub fn fit<R: Rng>(
        data: &TreeData<'_>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut R,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> (Self, Vec<f64>) {
        let n_features = data.x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            data,
            params,
            rng,
            leaf_value,
            importances: vec![0.0; n_features],
            nodes: Vec::new(),
        };
        let mut rows = rows.to_vec();
        builder.grow(&mut rows, 0);
        (
            Self {
                nodes: builder.nodes,
            },
            builder.importances,
        )
    }

    /// Weighted-mean leaf values, as used for classification trees.
    pub fn mean_leaf(data: &TreeData<'_>) -> impl Fn(&[usize]) -> f64 {
        let targets = data.targets.to_vec();
        let weights = data.weights.to_vec();
        move |rows: &[usize]| {
            let (s, w) = rows
                .iter()
                .fold((0.0, 0.0), |(s, w), &i| (s + weights[i] * targets[i], w + weights[i]));
            if w > 0.0 { s / w } else { 0.0 }
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf(_))).count()
    }
}

impl<R: Rng> Builder<'_, '_, R> {
    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf(0.0));

        let split = if depth < self.params.max_depth
            && rows.len() >= 2 * self.params.min_samples_leaf.max(1)
        {
            self.best_split(rows)
        } else {
            None
        };

        match split {
            Some(best) => {
                self.importances[best.feature] += best.gain;
                let (mut left, mut right): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .copied()
                    .partition(|&i| self.data.x[i][best.feature] <= best.threshold);
                let left_idx = self.grow(&mut left, depth + 1);
                let right_idx = self.grow(&mut right, depth + 1);
                self.nodes[idx] = Node::Split {
                    feature: best.feature,
                    threshold: best.threshold,
                    left: left_idx,
                    right: right_idx,
                };
            }
            None => {
                self.nodes[idx] = Node::Leaf((self.leaf_value)(&*rows));
            }
        }
        idx
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.importances.len();
        match self.params.max_features {
            Some(k) if k < n_features => sample(&mut *self.rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&mut self, rows: &mut [usize]) -> Option<BestSplit> {
        let data = self.data;
        let (total_s, total_w) = rows.iter().fold((0.0, 0.0), |(s, w), &i| {
            (s + data.weights[i] * data.targets[i], w + data.weights[i])
        });
        if total_w <= 0.0 {
            return None;
        }
        let parent = total_s * total_s / total_w;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<BestSplit> = None;
        for feature in self.candidate_features() {
            rows.sort_by(|&a, &b| data.x[a][feature].total_cmp(&data.x[b][feature]));

            let (mut left_s, mut left_w) = (0.0, 0.0);
            for split_at in 1..rows.len() {
                let prev = rows[split_at - 1];
                left_s += data.weights[prev] * data.targets[prev];
                left_w += data.weights[prev];

                if split_at < min_leaf || rows.len() - split_at < min_leaf {
                    continue;
                }
                let lo = data.x[prev][feature];
                let hi = data.x[rows[split_at]][feature];
                if lo == hi {
                    continue;
                }
                let right_s = total_s - left_s;
                let right_w = total_w - left_w;
                if left_w <= 0.0 || right_w <= 0.0 {
                    continue;
                }

                let gain = left_s * left_s / left_w + right_s * right_s / right_w - parent;
                if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(max_depth: usize, min_samples_leaf: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_leaf,
            max_features: None,
        }
    }

    #[test]
    fn test_single_split_separates_classes() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| if i >= 5 { 1.0 } else { 0.0 }).collect();
        let weights = vec![1.0; 10];
        let data = TreeData {
            x: &x,
            targets: &targets,
            weights: &weights,
        };
        let rows: Vec<usize> = (0..10).collect();
        let leaf = RegressionTree::mean_leaf(&data);
        let mut rng = StdRng::seed_from_u64(0);
        let (tree, importances) = RegressionTree::fit(&data, &rows, &params(3, 1), &mut rng, &leaf);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_row(&[2.0]), 0.0);
        assert_eq!(tree.predict_row(&[7.0]), 1.0);
        assert_eq!(tree.predict_row(&[4.5]), 0.0);
        assert!(importances[0] > 0.0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_splits() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let targets = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let weights = vec![1.0; 6];
        let data = TreeData {
            x: &x,
            targets: &targets,
            weights: &weights,
        };
        let rows: Vec<usize> = (0..6).collect();
        let leaf = RegressionTree::mean_leaf(&data);
        let mut rng = StdRng::seed_from_u64(0);
        let (tree, _) = RegressionTree::fit(&data, &rows, &params(5, 3), &mut rng, &leaf);
        // The only split allowed is 3|3.
        assert_eq!(tree.n_leaves(), 2);
        assert!((tree.predict_row(&[0.0]) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_zero_is_single_leaf() {
        let x = vec![vec![0.0], vec![1.0]];
        let targets = vec![0.0, 1.0];
        let weights = vec![1.0, 3.0];
        let data = TreeData {
            x: &x,
            targets: &targets,
            weights: &weights,
        };
        let leaf = RegressionTree::mean_leaf(&data);
        let mut rng = StdRng::seed_from_u64(0);
        let (tree, _) = RegressionTree::fit(&data, &[0, 1], &params(0, 1), &mut rng, &leaf);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(&[0.0]), 0.75);
    }

    #[test]
    fn test_constant_feature_never_splits() {
        let x = vec![vec![1.0]; 8];
        let targets = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let weights = vec![1.0; 8];
        let data = TreeData {
            x: &x,
            targets: &targets,
            weights: &weights,
        };
        let leaf = RegressionTree::mean_leaf(&data);
        let mut rng = StdRng::seed_from_u64(0);
        let rows: Vec<usize> = (0..8).collect();
        let (tree, _) = RegressionTree::fit(&data, &rows, &params(4, 1), &mut rng, &leaf);
        assert_eq!(tree.n_leaves(), 1);
    }
}
