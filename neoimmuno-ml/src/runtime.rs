//! Python subprocess runner for external predictors.
//!
//! Scripts receive one JSON document on stdin and answer with one JSON
//! document on stdout. Every call runs under a timeout and the child is
//! killed if the future is dropped.

use crate::config::ScorerConfig;
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Which interpreter a runtime resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonInfo {
    pub path: PathBuf,
    pub version: String,
    pub venv_path: Option<PathBuf>,
}

/// Managed Python subprocess runner.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python_path: PathBuf,
    venv_path: Option<PathBuf>,
    workspace: PathBuf,
    timeout: Duration,
}

impl PythonRuntime {
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            python_path: PathBuf::from("python3"),
            venv_path: None,
            workspace,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &ScorerConfig, workspace: PathBuf) -> Self {
        Self {
            python_path: config
                .python_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("python3")),
            venv_path: config.venv_path.clone(),
            workspace,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The interpreter actually invoked, preferring the venv's.
    fn python_cmd(&self) -> PathBuf {
        if let Some(venv) = &self.venv_path {
            let bin_dir = if cfg!(windows) { "Scripts" } else { "bin" };
            venv.join(bin_dir).join("python")
        } else {
            self.python_path.clone()
        }
    }

    /// Interpreter path and `--version` output.
    pub async fn info(&self) -> Result<PythonInfo, MlError> {
        let output = Command::new(self.python_cmd())
            .arg("--version")
            .output()
            .await
            .map_err(|e| MlError::Python(format!("Failed to spawn Python: {e}")))?;
        if !output.status.success() {
            return Err(MlError::Python(format!(
                "{} --version exited with {}",
                self.python_cmd().display(),
                output.status
            )));
        }
        // Python 2 printed its version on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let version = if stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        } else {
            stdout
        };
        Ok(PythonInfo {
            path: self.python_cmd(),
            version,
            venv_path: self.venv_path.clone(),
        })
    }

    /// Run `script` with `input` as JSON on stdin and parse stdout as JSON.
    pub async fn run_script(
        &self,
        script: &str,
        input: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value, MlError> {
        let timeout = timeout.unwrap_or(self.timeout);
        let input_json = serde_json::to_vec(input)?;

        debug!(
            script_len = script.len(),
            input_bytes = input_json.len(),
            python = %self.python_cmd().display(),
            "Running Python script"
        );

        let result = tokio::time::timeout(timeout, async {
            let mut child = Command::new(self.python_cmd())
                .args(["-c", script])
                .current_dir(&self.workspace)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| MlError::Python(format!("Failed to spawn Python: {e}")))?;

            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(&input_json)
                    .await
                    .map_err(|e| MlError::Python(format!("Failed to write stdin: {e}")))?;
                // Dropping stdin closes the pipe so the script sees EOF.
            }

            let output = child
                .wait_with_output()
                .await
                .map_err(|e| MlError::Python(format!("Failed to wait for Python: {e}")))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(MlError::Python(format!(
                    "Python script failed (exit {}): {}",
                    output.status,
                    stderr.trim()
                )));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.trim().is_empty() {
                Ok(serde_json::Value::Null)
            } else {
                serde_json::from_str(stdout.trim())
                    .map_err(|e| MlError::Python(format!("Invalid JSON output: {e}")))
            }
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(MlError::Timeout(format!(
                "Python script timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Which of `packages` import cleanly.
    pub async fn check_packages(&self, packages: &[&str]) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for pkg in packages {
            let script = format!("import importlib; importlib.import_module('{pkg}')");
            let available = Command::new(self.python_cmd())
                .args(["-c", &script])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .is_ok_and(|s| s.success());
            results.insert((*pkg).to_string(), available);
        }
        results
    }
}
