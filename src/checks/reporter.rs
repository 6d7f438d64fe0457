//! Read-only fleet health reporter across the capture and processing hosts.
//!
//! Unlike the watchdog, every check runs regardless of earlier outcomes, and
//! no corrective action is ever taken. Results land in ordered pass/warn/fail
//! buckets; the exit code is 0 iff the fail bucket stays empty.

use std::time::Duration;
use tracing::debug;

use super::env::ProbeEnv;
use super::local::LocalCheck;
use super::{CheckResult, CheckStatus};
use crate::config::{AppConfig, FleetConfig, WatchdogConfig};
use crate::error::Result;

const REMOTE_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// One reporter check definition. Local threshold checks reuse the watchdog's
/// table; the rest are fleet-level probes.
#[derive(Debug, Clone)]
enum ReporterCheck {
    HostPing { label: &'static str, host: String },
    Local(LocalCheck),
    ApplianceContainer,
    ProcessingLoad,
    StreamDescribe { stream: String },
    HardwareAccel,
}

impl ReporterCheck {
    fn name(&self) -> String {
        match self {
            ReporterCheck::HostPing { label, .. } => format!("ping-{label}"),
            ReporterCheck::Local(check) => check.name().to_string(),
            ReporterCheck::ApplianceContainer => "appliance-container".to_string(),
            ReporterCheck::ProcessingLoad => "processing-load".to_string(),
            ReporterCheck::StreamDescribe { stream } => format!("stream-{stream}"),
            ReporterCheck::HardwareAccel => "hardware-accel".to_string(),
        }
    }
}

/// Bucketed outcome of one reporter invocation, in execution order
#[derive(Debug, Default)]
pub struct FleetReport {
    pub passed: Vec<CheckResult>,
    pub warned: Vec<CheckResult>,
    pub failed: Vec<CheckResult>,
}

impl FleetReport {
    fn record(&mut self, result: CheckResult) {
        match result.status {
            CheckStatus::Pass => self.passed.push(result),
            CheckStatus::Warn => self.warned.push(result),
            CheckStatus::Fail => self.failed.push(result),
        }
    }

    /// 0 when nothing failed; warnings alone never fail the run
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        for (header, bucket) in [
            ("PASS", &self.passed),
            ("WARN", &self.warned),
            ("FAIL", &self.failed),
        ] {
            for result in bucket {
                out.push_str(header);
                out.push_str("  ");
                out.push_str(&result.name);
                if let Some(detail) = &result.detail {
                    out.push_str(": ");
                    out.push_str(detail);
                }
                out.push('\n');
            }
        }

        out.push_str(&format!(
            "{} passed, {} warnings, {} failures\n",
            self.passed.len(),
            self.warned.len(),
            self.failed.len()
        ));
        out
    }
}

pub struct Reporter<'a> {
    watchdog_cfg: &'a WatchdogConfig,
    fleet: &'a FleetConfig,
    streams: Vec<String>,
    recorder_stats_url: String,
    env: &'a dyn ProbeEnv,
}

impl<'a> Reporter<'a> {
    pub fn new(cfg: &'a AppConfig, env: &'a dyn ProbeEnv) -> Self {
        // Stream names follow camera ids; sort for a deterministic order.
        let mut streams: Vec<String> = cfg.cameras.values().cloned().collect();
        streams.sort();

        Self {
            watchdog_cfg: &cfg.watchdog,
            fleet: &cfg.fleet,
            streams,
            recorder_stats_url: format!("{}/api/stats", cfg.recorder.url.trim_end_matches('/')),
            env,
        }
    }

    fn sequence(&self) -> Vec<ReporterCheck> {
        let mut checks = vec![
            ReporterCheck::HostPing {
                label: "capture",
                host: self.fleet.capture_host.clone(),
            },
            ReporterCheck::HostPing {
                label: "processing",
                host: self.fleet.processing_host.clone(),
            },
            ReporterCheck::Local(LocalCheck::ServiceActive),
            ReporterCheck::ApplianceContainer,
            ReporterCheck::Local(LocalCheck::CaptureCpu),
            ReporterCheck::Local(LocalCheck::RelayMemory),
            ReporterCheck::Local(LocalCheck::CaptureCount),
            ReporterCheck::ProcessingLoad,
        ];

        checks.extend(self.streams.iter().map(|s| ReporterCheck::StreamDescribe {
            stream: s.clone(),
        }));
        checks.push(ReporterCheck::HardwareAccel);
        checks
    }

    /// Evaluate every check. One check erroring never aborts the rest.
    pub async fn run(&self) -> FleetReport {
        let mut report = FleetReport::default();

        for check in self.sequence() {
            let name = check.name();
            let result = match self.evaluate(&check).await {
                Ok(result) => result,
                // Probe errors are "unreachable" territory: a failure for
                // everything except the warn-only acceleration check.
                Err(e) if matches!(check, ReporterCheck::HardwareAccel) => {
                    CheckResult::warn(name, format!("not confirmed: {e}"))
                }
                Err(e) => CheckResult::fail(name, e.to_string()),
            };
            debug!(check = %result.name, status = %result.status, "reporter check done");
            report.record(result);
        }

        report
    }

    async fn evaluate(&self, check: &ReporterCheck) -> Result<CheckResult> {
        match check {
            ReporterCheck::HostPing { host, .. } => {
                if self.env.ping(host).await {
                    Ok(CheckResult::pass(check.name()))
                } else {
                    Ok(CheckResult::fail(
                        check.name(),
                        format!("{host} unreachable"),
                    ))
                }
            }

            ReporterCheck::Local(local) => local.evaluate(self.watchdog_cfg, self.env).await,

            ReporterCheck::ApplianceContainer => {
                let command = format!(
                    "docker inspect -f '{{{{.State.Running}}}}' {}",
                    self.fleet.appliance_container
                );
                let output = self
                    .env
                    .remote_output(&self.fleet.processing_ssh, &command)
                    .await?;
                if output.trim() == "true" {
                    Ok(CheckResult::pass(check.name()))
                } else {
                    Ok(CheckResult::fail(
                        check.name(),
                        format!(
                            "container {} not running",
                            self.fleet.appliance_container
                        ),
                    ))
                }
            }

            ReporterCheck::ProcessingLoad => {
                let output = self
                    .env
                    .remote_output(&self.fleet.processing_ssh, "cat /proc/loadavg")
                    .await?;
                let load: f64 = output
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| {
                        crate::error::ShepherdError::Internal(format!(
                            "unparseable loadavg: {output:?}"
                        ))
                    })?;

                if load >= self.fleet.load_ceiling {
                    Ok(CheckResult::warn(
                        check.name(),
                        format!("1m load {} at or above {}", load, self.fleet.load_ceiling),
                    ))
                } else {
                    Ok(CheckResult::pass(check.name()))
                }
            }

            ReporterCheck::StreamDescribe { stream } => {
                let described = self
                    .env
                    .describe_stream(&self.fleet.capture_host, self.fleet.rtsp_port, stream)
                    .await?;
                if described {
                    Ok(CheckResult::pass(check.name()))
                } else {
                    Ok(CheckResult::fail(
                        check.name(),
                        format!("no stream description for {stream}"),
                    ))
                }
            }

            // Hardware acceleration is an optimization, not correctness:
            // its absence can only ever warn.
            ReporterCheck::HardwareAccel => {
                let body = self
                    .env
                    .http_body(&self.recorder_stats_url, REMOTE_HTTP_TIMEOUT)
                    .await?;
                if body
                    .to_lowercase()
                    .contains(&self.fleet.accel_indicator.to_lowercase())
                {
                    Ok(CheckResult::pass(check.name()))
                } else {
                    Ok(CheckResult::warn(
                        check.name(),
                        format!(
                            "indicator '{}' not present in appliance stats",
                            self.fleet.accel_indicator
                        ),
                    ))
                }
            }
        }
    }
}
