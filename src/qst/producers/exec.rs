use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::qst::truncate_bytes;
use crate::qst::types::Producer;

/// Runs a command line through the platform shell and sends its stdout.
pub struct ExecProducer {
    command: String,
    size_limit: usize,
}

impl ExecProducer {
    pub fn new(command: &str, size_limit: usize) -> Self {
        Self {
            command: command.to_string(),
            size_limit,
        }
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[async_trait]
impl Producer for ExecProducer {
    async fn produce(&self) -> Result<Option<String>> {
        let output = shell_command(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .with_context(|| format!("running `{}`", self.command))?;

        // A failing command still gets its output sent.
        if !output.status.success() {
            tracing::warn!(
                command = %self.command,
                status = ?output.status.code(),
                "Command failed"
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Some(truncate_bytes(&stdout, self.size_limit)))
    }

    fn name(&self) -> &'static str {
        "Exec"
    }
}
