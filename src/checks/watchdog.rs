//! One-shot recovery watchdog for the capture host.
//!
//! Each invocation walks the local check sequence in order and stops at the
//! first failure, issuing exactly one corrective action. Restarts are
//! fire-and-forget; whether they worked is the next invocation's problem.

use tracing::{error, info, warn};

use super::env::ProbeEnv;
use super::local::LocalCheck;
use super::{CheckResult, CheckStatus};
use crate::config::WatchdogConfig;
use crate::error::Result;

/// The one corrective action a run may take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectiveAction {
    StartService,
    RestartService,
}

/// What one watchdog invocation observed and did
#[derive(Debug)]
pub struct WatchdogRun {
    /// Results of the checks that were evaluated, in order. Checks after a
    /// failure are absent because they were never run.
    pub results: Vec<CheckResult>,
    /// The corrective action taken, if any, with the failing check's name
    pub action: Option<(&'static str, CorrectiveAction)>,
}

impl WatchdogRun {
    pub fn healthy(&self) -> bool {
        self.action.is_none()
    }
}

pub struct Watchdog<'a> {
    cfg: &'a WatchdogConfig,
    env: &'a dyn ProbeEnv,
}

impl<'a> Watchdog<'a> {
    pub fn new(cfg: &'a WatchdogConfig, env: &'a dyn ProbeEnv) -> Self {
        Self { cfg, env }
    }

    /// Run one pass. Exactly one corrective action per run, then stop.
    pub async fn run(&self) -> Result<WatchdogRun> {
        let mut results = Vec::with_capacity(LocalCheck::SEQUENCE.len());
        let mut action = None;

        for check in LocalCheck::SEQUENCE {
            let result = check.evaluate(self.cfg, self.env).await?;

            match result.status {
                CheckStatus::Pass => {}
                CheckStatus::Warn => {
                    warn!(
                        check = check.name(),
                        "{}",
                        result.detail.as_deref().unwrap_or("anomaly")
                    );
                }
                CheckStatus::Fail => {
                    // One anomaly line per failure, then the single
                    // corrective action.
                    error!(
                        check = check.name(),
                        "{}",
                        result.detail.as_deref().unwrap_or("check failed")
                    );

                    let taken = self.correct(check).await;
                    action = Some((check.name(), taken));
                    results.push(result);
                    break;
                }
            }

            results.push(result);
        }

        if action.is_none() {
            info!("all watchdog checks passed, no action taken");
        }

        Ok(WatchdogRun { results, action })
    }

    fn corrective_action(check: LocalCheck) -> CorrectiveAction {
        match check {
            LocalCheck::ServiceActive => CorrectiveAction::StartService,
            LocalCheck::CaptureCpu
            | LocalCheck::RelayMemory
            | LocalCheck::HttpLiveness
            | LocalCheck::CaptureCount => CorrectiveAction::RestartService,
        }
    }

    async fn correct(&self, check: LocalCheck) -> CorrectiveAction {
        let action = Self::corrective_action(check);
        let unit = &self.cfg.relay_unit;

        // Fire-and-forget: a refused command is logged, never retried here.
        let outcome = match action {
            CorrectiveAction::StartService => {
                info!(unit = %unit, "starting relay unit");
                self.env.start_service(unit).await
            }
            CorrectiveAction::RestartService => {
                info!(unit = %unit, "restarting relay unit");
                self.env.restart_service(unit).await
            }
        };

        if let Err(e) = outcome {
            error!(unit = %unit, "corrective action failed to issue: {e}");
        }

        action
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

    fn healthy_processes(name: &str) -> Vec<ProcessSample> {
        if name == "mediamtx" {
            vec![sample(50, 5.0, 100.0)]
        } else {
            vec![sample(100, 20.0, 60.0), sample(101, 25.0, 62.0)]
        }
    }

    #[tokio::test]
    async fn test_healthy_run_takes_no_action() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(true));
        env.expect_processes_named()
            .returning(|name| Ok(healthy_processes(name)));
        env.expect_http_alive().returning(|_, _| true);
        env.expect_start_service().times(0);
        env.expect_restart_service().times(0);

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();

        assert!(run.healthy());
        assert_eq!(run.results.len(), LocalCheck::SEQUENCE.len());
    }

    #[tokio::test]
    async fn test_inactive_service_starts_and_short_circuits() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(false));
        env.expect_start_service().times(1).returning(|_| Ok(()));
        // No further checks may run after the first failure.
        env.expect_processes_named().times(0);
        env.expect_http_alive().times(0);
        env.expect_restart_service().times(0);

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();

        assert_eq!(
            run.action,
            Some(("service-active", CorrectiveAction::StartService))
        );
        assert_eq!(run.results.len(), 1);
    }

    #[tokio::test]
    async fn test_hot_capture_process_restarts_whole_service() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(true));
        env.expect_processes_named()
            .returning(|_| Ok(vec![sample(100, 95.0, 60.0), sample(101, 10.0, 60.0)]));
        env.expect_restart_service().times(1).returning(|_| Ok(()));
        env.expect_http_alive().times(0);

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();

        assert_eq!(
            run.action,
            Some(("capture-cpu", CorrectiveAction::RestartService))
        );
    }

    #[tokio::test]
    async fn test_dead_endpoint_restarts_after_retries() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(true));
        env.expect_processes_named()
            .returning(|name| Ok(healthy_processes(name)));
        env.expect_http_alive().times(3).returning(|_, _| false);
        env.expect_restart_service().times(1).returning(|_| Ok(()));

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();

        assert_eq!(
            run.action,
            Some(("http-liveness", CorrectiveAction::RestartService))
        );
        // Capture-count was never evaluated.
        assert_eq!(run.results.last().unwrap().name, "http-liveness");
    }

    #[tokio::test]
    async fn test_capture_deficit_restarts() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(true));
        let mut call = 0u32;
        env.expect_processes_named().returning(move |name| {
            if name == "mediamtx" {
                return Ok(vec![sample(50, 5.0, 100.0)]);
            }
            call += 1;
            if call == 1 {
                // cpu check sees two cool processes
                Ok(vec![sample(100, 20.0, 60.0), sample(101, 25.0, 62.0)])
            } else {
                // one capture process died before the count check
                Ok(vec![sample(100, 20.0, 60.0)])
            }
        });
        env.expect_http_alive().returning(|_, _| true);
        env.expect_restart_service().times(1).returning(|_| Ok(()));

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();

        assert_eq!(
            run.action,
            Some(("capture-count", CorrectiveAction::RestartService))
        );
    }

    #[tokio::test]
    async fn test_failed_restart_command_is_not_fatal() {
        let mut env = MockProbeEnv::new();
        env.expect_service_active().returning(|_| Ok(false));
        env.expect_start_service().times(1).returning(|_| {
            Err(crate::error::ShepherdError::ServiceManager(
                "permission denied".to_string(),
            ))
        });

        let cfg = test_cfg();
        let run = Watchdog::new(&cfg, &env).run().await.unwrap();
        assert!(!run.healthy());
    }
}
