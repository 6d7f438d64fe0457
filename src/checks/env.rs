//! Probe seam between the check definitions and the operating system.
//!
//! Everything the checks observe or act on goes through [`ProbeEnv`], so the
//! evaluation policies can be tested without a relay, an appliance, or root.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::system::{process, remote::SshChannel, service};

/// One row from the process table, filtered by executable name
#[derive(Debug, Clone, Copy)]
pub struct ProcessSample {
    pub pid: u32,
    pub cpu_percent: f32,
    pub rss_mb: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProbeEnv: Send + Sync {
    /// Is the named unit active according to the service manager?
    async fn service_active(&self, unit: &str) -> Result<bool>;

    /// Ask the service manager to start the unit (fire-and-forget)
    async fn start_service(&self, unit: &str) -> Result<()>;

    /// Ask the service manager to restart the unit (fire-and-forget)
    async fn restart_service(&self, unit: &str) -> Result<()>;

    /// All processes whose executable name matches
    async fn processes_named(&self, name: &str) -> Result<Vec<ProcessSample>>;

    /// Single HTTP reachability probe; a timeout is a negative result
    async fn http_alive(&self, url: &str, timeout: Duration) -> bool;

    /// Fetch an HTTP body for substring inspection
    async fn http_body(&self, url: &str, timeout: Duration) -> Result<String>;

    /// ICMP reachability of a host
    async fn ping(&self, host: &str) -> bool;

    /// Run a command on the remote host, returning stdout
    async fn remote_output(&self, target: &str, command: &str) -> Result<String>;

    /// RTSP DESCRIBE against a named stream; true when the response carries
    /// a stream description
    async fn describe_stream(&self, host: &str, port: u16, stream: &str) -> Result<bool>;
}

/// Production environment backed by systemctl, the process table, ssh and HTTP
pub struct SystemEnv {
    http: reqwest::Client,
    ssh_connect_timeout_secs: u64,
}

impl SystemEnv {
    pub fn new(ssh_connect_timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("shepherd/0.1")
            .build()?;
        Ok(Self {
            http,
            ssh_connect_timeout_secs,
        })
    }
}

#[async_trait]
impl ProbeEnv for SystemEnv {
    async fn service_active(&self, unit: &str) -> Result<bool> {
        service::unit_active(unit).await
    }

    async fn start_service(&self, unit: &str) -> Result<()> {
        service::start_unit(unit).await
    }

    async fn restart_service(&self, unit: &str) -> Result<()> {
        service::restart_unit(unit).await
    }

    async fn processes_named(&self, name: &str) -> Result<Vec<ProcessSample>> {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || process::sample_by_name(&name))
            .await
            .map_err(|e| crate::error::ShepherdError::ProcessTable(e.to_string()))?
    }

    async fn http_alive(&self, url: &str, timeout: Duration) -> bool {
        match self.http.get(url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn http_body(&self, url: &str, timeout: Duration) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.text().await?)
    }

    async fn ping(&self, host: &str) -> bool {
        let status = tokio::process::Command::new("ping")
            .args(["-c", "1", "-W", "2", host])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;
        matches!(status, Ok(s) if s.success())
    }

    async fn remote_output(&self, target: &str, command: &str) -> Result<String> {
        let channel = SshChannel::new(target, self.ssh_connect_timeout_secs);
        channel.output(command).await
    }

    async fn describe_stream(&self, host: &str, port: u16, stream: &str) -> Result<bool> {
        crate::adapters::relay::describe_stream(host, port, stream, Duration::from_secs(5)).await
    }
}
