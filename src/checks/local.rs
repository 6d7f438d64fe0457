//! The fixed, ordered sequence of local checks on the capture host.
//!
//! Both evaluators iterate this table. Evaluation never takes corrective
//! action; that belongs to the watchdog's policy layer.

use std::time::Duration;
use tracing::debug;

use super::env::ProbeEnv;
use super::{CheckResult, Metric, ServiceSignal};
use crate::config::WatchdogConfig;
use crate::error::Result;

/// One local check definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCheck {
    /// The relay unit is active
    ServiceActive,
    /// Every capture process stays under the CPU ceiling
    CaptureCpu,
    /// The relay process stays under the RSS ceiling
    RelayMemory,
    /// The relay status endpoint answers (with retries)
    HttpLiveness,
    /// Exactly the expected number of capture processes exist
    CaptureCount,
}

impl LocalCheck {
    /// Watchdog evaluation order. First failure wins.
    pub const SEQUENCE: [LocalCheck; 5] = [
        LocalCheck::ServiceActive,
        LocalCheck::CaptureCpu,
        LocalCheck::RelayMemory,
        LocalCheck::HttpLiveness,
        LocalCheck::CaptureCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LocalCheck::ServiceActive => "service-active",
            LocalCheck::CaptureCpu => "capture-cpu",
            LocalCheck::RelayMemory => "relay-memory",
            LocalCheck::HttpLiveness => "http-liveness",
            LocalCheck::CaptureCount => "capture-count",
        }
    }

    /// Evaluate this check against the environment. Read-only.
    pub async fn evaluate(&self, cfg: &WatchdogConfig, env: &dyn ProbeEnv) -> Result<CheckResult> {
        match self {
            LocalCheck::ServiceActive => self.check_service_active(cfg, env).await,
            LocalCheck::CaptureCpu => self.check_capture_cpu(cfg, env).await,
            LocalCheck::RelayMemory => self.check_relay_memory(cfg, env).await,
            LocalCheck::HttpLiveness => self.check_http_liveness(cfg, env).await,
            LocalCheck::CaptureCount => self.check_capture_count(cfg, env).await,
        }
    }

    async fn check_service_active(
        &self,
        cfg: &WatchdogConfig,
        env: &dyn ProbeEnv,
    ) -> Result<CheckResult> {
        if env.service_active(&cfg.relay_unit).await? {
            Ok(CheckResult::pass(self.name()))
        } else {
            Ok(CheckResult::fail(
                self.name(),
                format!("unit {} is not active", cfg.relay_unit),
            ))
        }
    }

    async fn check_capture_cpu(
        &self,
        cfg: &WatchdogConfig,
        env: &dyn ProbeEnv,
    ) -> Result<CheckResult> {
        let procs = env.processes_named(&cfg.capture_process).await?;

        // A hot capture process is a symptom of relay-level malfunction,
        // so any single breach fails the whole check.
        for proc in &procs {
            let signal = ServiceSignal::ceiling(
                Metric::CpuPercent,
                f64::from(proc.cpu_percent),
                cfg.cpu_ceiling_percent,
            );
            if signal.breached() {
                return Ok(CheckResult::fail(
                    self.name(),
                    format!("pid {}: {}", proc.pid, signal.describe()),
                ));
            }
        }

        Ok(CheckResult::pass(self.name()))
    }

    async fn check_relay_memory(
        &self,
        cfg: &WatchdogConfig,
        env: &dyn ProbeEnv,
    ) -> Result<CheckResult> {
        let procs = env.processes_named(&cfg.relay_process).await?;

        let Some(heaviest) = procs
            .iter()
            .max_by(|a, b| a.rss_mb.total_cmp(&b.rss_mb))
        else {
            // Absence of the relay process is caught by the service-active
            // and liveness checks; here it is only worth a warning.
            return Ok(CheckResult::warn(
                self.name(),
                format!("no process named {} found", cfg.relay_process),
            ));
        };

        let signal =
            ServiceSignal::ceiling(Metric::MemoryMb, heaviest.rss_mb, cfg.memory_ceiling_mb);
        if signal.breached() {
            Ok(CheckResult::fail(
                self.name(),
                format!("pid {}: {}", heaviest.pid, signal.describe()),
            ))
        } else {
            Ok(CheckResult::pass(self.name()))
        }
    }

    async fn check_http_liveness(
        &self,
        cfg: &WatchdogConfig,
        env: &dyn ProbeEnv,
    ) -> Result<CheckResult> {
        let timeout = Duration::from_millis(cfg.liveness_timeout_ms);
        let delay = Duration::from_millis(cfg.liveness_retry_delay_ms);

        // Explicitly failing until proven otherwise.
        let mut api_ok = false;

        for attempt in 1..=cfg.liveness_retries {
            if env.http_alive(&cfg.liveness_url, timeout).await {
                api_ok = true;
                break;
            }
            debug!(
                "liveness attempt {}/{} against {} failed",
                attempt, cfg.liveness_retries, cfg.liveness_url
            );
            if attempt < cfg.liveness_retries {
                tokio::time::sleep(delay).await;
            }
        }

        if api_ok {
            Ok(CheckResult::pass(self.name()))
        } else {
            let signal = ServiceSignal::floor(Metric::HttpReachable, 0.0, 1.0);
            Ok(CheckResult::fail(
                self.name(),
                format!(
                    "{} unreachable after {} attempts ({})",
                    cfg.liveness_url,
                    cfg.liveness_retries,
                    signal.describe()
                ),
            ))
        }
    }

    async fn check_capture_count(
        &self,
        cfg: &WatchdogConfig,
        env: &dyn ProbeEnv,
    ) -> Result<CheckResult> {
        let count = env.processes_named(&cfg.capture_process).await?.len();
        let expected = cfg.expected_capture_processes;

        let signal = ServiceSignal::floor(Metric::ProcessCount, count as f64, expected as f64);
        if signal.breached() {
            Ok(CheckResult::fail(
                self.name(),
                format!("{} capture processes, expected {}", count, expected),
            ))
        } else if count > expected {
            Ok(CheckResult::warn(
                self.name(),
                format!("{} capture processes, expected {}", count, expected),
            ))
        } else {
            Ok(CheckResult::pass(self.name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::env::{MockProbeEnv, ProcessSample};

    fn test_cfg() -> WatchdogConfig {
        WatchdogConfig {
            relay_unit: "relay.service".to_string(),
            capture_process: "ffmpeg".to_string(),
            relay_process: "mediamtx".to_string(),
            cpu_ceiling_percent: 80.0,
            memory_ceiling_mb: 512.0,
            expected_capture_processes: 2,
            liveness_url: "http://127.0.0.1:9997/v3/paths/list".to_string(),
            liveness_retries: 3,
            liveness_retry_delay_ms: 0,
            liveness_timeout_ms: 100,
        }
    }

    fn sample(pid: u32, cpu: f32, rss_mb: f64) -> ProcessSample {
        ProcessSample {
            pid,
            cpu_percent: cpu,
            rss_mb,
        }
    }

    #[tokio::test]
    async fn test_cpu_below_ceiling_passes() {
        let mut env = MockProbeEnv::new();
        env.expect_processes_named()
            .returning(|_| Ok(vec![sample(100, 79.9, 50.0), sample(101, 10.0, 50.0)]));

        let result = LocalCheck::CaptureCpu
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert_eq!(result.status, crate::checks::CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_cpu_at_ceiling_fails() {
        let mut env = MockProbeEnv::new();
        env.expect_processes_named()
            .returning(|_| Ok(vec![sample(100, 80.0, 50.0)]));

        let result = LocalCheck::CaptureCpu
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert!(result.failed());
        assert!(result.detail.unwrap().contains("pid 100"));
    }

    #[tokio::test]
    async fn test_memory_at_ceiling_fails() {
        let mut env = MockProbeEnv::new();
        env.expect_processes_named()
            .returning(|_| Ok(vec![sample(200, 5.0, 512.0)]));

        let result = LocalCheck::RelayMemory
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert!(result.failed());
    }

    #[tokio::test]
    async fn test_missing_relay_process_warns() {
        let mut env = MockProbeEnv::new();
        env.expect_processes_named().returning(|_| Ok(vec![]));

        let result = LocalCheck::RelayMemory
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert_eq!(result.status, crate::checks::CheckStatus::Warn);
    }

    #[tokio::test]
    async fn test_liveness_exhausts_all_retries() {
        let mut env = MockProbeEnv::new();
        env.expect_http_alive().times(3).returning(|_, _| false);

        let result = LocalCheck::HttpLiveness
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert!(result.failed());
    }

    #[tokio::test]
    async fn test_liveness_stops_retrying_on_success() {
        let mut env = MockProbeEnv::new();
        let mut calls = 0;
        env.expect_http_alive().times(2).returning(move |_, _| {
            calls += 1;
            calls == 2
        });

        let result = LocalCheck::HttpLiveness
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert_eq!(result.status, crate::checks::CheckStatus::Pass);
    }

    #[tokio::test]
    async fn test_capture_deficit_fails_surplus_warns() {
        let mut env = MockProbeEnv::new();
        env.expect_processes_named()
            .returning(|_| Ok(vec![sample(1, 0.0, 1.0)]));
        let result = LocalCheck::CaptureCount
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert!(result.failed());

        let mut env = MockProbeEnv::new();
        env.expect_processes_named().returning(|_| {
            Ok(vec![
                sample(1, 0.0, 1.0),
                sample(2, 0.0, 1.0),
                sample(3, 0.0, 1.0),
            ])
        });
        let result = LocalCheck::CaptureCount
            .evaluate(&test_cfg(), &env)
            .await
            .unwrap();
        assert_eq!(result.status, crate::checks::CheckStatus::Warn);
    }
}
