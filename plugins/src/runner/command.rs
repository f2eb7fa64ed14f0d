use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use planrun_core::error::StepError;
use planrun_core::executor::{StepInput, StepRunner};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs each task description as a shell command.
///
/// Dependency results (only present for aggregate tasks) are written to the
/// child's stdin as a JSON array. Stdout becomes the task result; a non-zero
/// exit status fails the task with stderr as the message. The child is
/// killed when the run is cancelled.
pub struct CommandStepRunner {
    shell: String,
    shell_flag: String,
    workdir: Option<PathBuf>,
    envs: HashMap<String, String>,
}

impl CommandStepRunner {
    pub fn new() -> Self {
        let (shell, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        Self {
            shell: shell.to_string(),
            shell_flag: flag.to_string(),
            workdir: None,
            envs: HashMap::new(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>, flag: impl Into<String>) -> Self {
        self.shell = shell.into();
        self.shell_flag = flag.into();
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }
}

impl Default for CommandStepRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepRunner for CommandStepRunner {
    async fn run(&self, input: StepInput) -> Result<String, StepError> {
        let payload = serde_json::to_vec(&input.dependency_results)
            .map_err(|e| StepError::Failed(format!("encode dependency results: {e}")))?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.shell_flag)
            .arg(&input.description)
            .envs(&self.envs)
            .env("PLANRUN_TASK_ID", &input.task_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| StepError::Failed(format!("spawn '{}' failed: {e}", self.shell)))?;
        debug!(task_id = %input.task_id, pid = ?child.id(), "spawned command");

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The child may exit without reading stdin; a broken pipe is fine.
                let _ = stdin.write_all(&payload).await;
                let _ = stdin.shutdown().await;
            }
        };

        let output = tokio::select! {
            (_, output) = async { tokio::join!(feed, child.wait_with_output()) } => {
                output.map_err(|e| StepError::Failed(format!("wait failed: {e}")))?
            }
            _ = input.cancel.cancelled() => {
                debug!(task_id = %input.task_id, "cancelled, killing command");
                return Err(StepError::Cancelled);
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StepError::Failed(format!(
                "exit code {code}: {}",
                stderr.trim()
            )))
        }
    }
}
