//! Remote command execution over ssh.
//!
//! BatchMode keeps a missing key from hanging on a password prompt; a
//! connect timeout bounds the call so a dead host reads as a failure, not a
//! stall.

use tokio::process::Command;

use crate::error::{Result, ShepherdError};

pub struct SshChannel {
    target: String,
    connect_timeout_secs: u64,
}

impl SshChannel {
    pub fn new(target: impl Into<String>, connect_timeout_secs: u64) -> Self {
        Self {
            target: target.into(),
            connect_timeout_secs,
        }
    }

    /// Run a command on the remote host and return its stdout
    pub async fn output(&self, command: &str) -> Result<String> {
        let output = Command::new("ssh")
            .args([
                "-o",
                "BatchMode=yes",
                "-o",
                &format!("ConnectTimeout={}", self.connect_timeout_secs),
                &self.target,
                command,
            ])
            .output()
            .await
            .map_err(|e| ShepherdError::Remote {
                host: self.target.clone(),
                reason: format!("failed to spawn ssh: {e}"),
            })?;

        if !output.status.success() {
            return Err(ShepherdError::Remote {
                host: self.target.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
