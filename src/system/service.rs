//! systemd unit queries and lifecycle commands.
//!
//! Only three operations exist: is-active, start, restart. Start/restart are
//! fire-and-forget; a non-zero exit from systemctl is logged by the caller's
//! policy layer, not retried here.

use tokio::process::Command;
use tracing::warn;

use crate::error::{Result, ShepherdError};

/// Whether the unit is reported active by the service manager
pub async fn unit_active(unit: &str) -> Result<bool> {
    let output = Command::new("systemctl")
        .args(["is-active", unit])
        .output()
        .await
        .map_err(|e| ShepherdError::ServiceManager(format!("systemctl is-active: {e}")))?;

    // `systemctl is-active` exits non-zero for every state but "active",
    // so the exit status alone is the answer.
    Ok(output.status.success()
        && String::from_utf8_lossy(&output.stdout).trim() == "active")
}

pub async fn start_unit(unit: &str) -> Result<()> {
    run_lifecycle("start", unit).await
}

pub async fn restart_unit(unit: &str) -> Result<()> {
    run_lifecycle("restart", unit).await
}

async fn run_lifecycle(verb: &str, unit: &str) -> Result<()> {
    let output = Command::new("systemctl")
        .args([verb, unit])
        .output()
        .await
        .map_err(|e| ShepherdError::ServiceManager(format!("systemctl {verb}: {e}")))?;

    if !output.status.success() {
        warn!(
            unit,
            "systemctl {} exited with {}: {}",
            verb,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}
