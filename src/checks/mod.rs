//! Health check model shared by the recovery watchdog and the fleet reporter.
//!
//! A single ordered table of check definitions (`local::LocalCheck`) backs
//! both evaluators; they differ only in policy: the watchdog stops at the
//! first failure and takes one corrective action, the reporter evaluates
//! everything and buckets the results.

pub mod env;
pub mod local;
pub mod reporter;
pub mod watchdog;

pub use env::{ProbeEnv, ProcessSample, SystemEnv};
pub use local::LocalCheck;
pub use reporter::{FleetReport, Reporter};
pub use watchdog::{CorrectiveAction, Watchdog, WatchdogRun};

use std::fmt;

/// Outcome of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Pass => write!(f, "PASS"),
            CheckStatus::Warn => write!(f, "WARN"),
            CheckStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result of one check within one invocation. Nothing outlives the run.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Pass,
            detail: None,
        }
    }

    pub fn warn(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Warn,
            detail: Some(detail.into()),
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Fail,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(&self) -> bool {
        self.status == CheckStatus::Fail
    }
}

/// Metric sampled from the local system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CpuPercent,
    MemoryMb,
    ProcessCount,
    HttpReachable,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::CpuPercent => write!(f, "cpu%"),
            Metric::MemoryMb => write!(f, "rss_mb"),
            Metric::ProcessCount => write!(f, "process_count"),
            Metric::HttpReachable => write!(f, "http_reachable"),
        }
    }
}

/// Direction of a threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Triggers when observed >= threshold (ceiling, inclusive)
    AtOrAbove,
    /// Triggers when observed < threshold (deficit)
    Below,
}

/// One observation against one fixed threshold, computed fresh each run.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSignal {
    pub metric: Metric,
    pub observed: f64,
    pub threshold: f64,
    pub comparison: Comparison,
}

impl ServiceSignal {
    pub fn ceiling(metric: Metric, observed: f64, threshold: f64) -> Self {
        Self {
            metric,
            observed,
            threshold,
            comparison: Comparison::AtOrAbove,
        }
    }

    pub fn floor(metric: Metric, observed: f64, threshold: f64) -> Self {
        Self {
            metric,
            observed,
            threshold,
            comparison: Comparison::Below,
        }
    }

    /// Inclusive on the trigger side: a ceiling breach is observed >= threshold.
    pub fn breached(&self) -> bool {
        match self.comparison {
            Comparison::AtOrAbove => self.observed >= self.threshold,
            Comparison::Below => self.observed < self.threshold,
        }
    }

    pub fn describe(&self) -> String {
        let op = match self.comparison {
            Comparison::AtOrAbove => ">=",
            Comparison::Below => "<",
        };
        format!("{} {} {} {}", self.metric, self.observed, op, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_is_inclusive_on_trigger_side() {
        let below = ServiceSignal::ceiling(Metric::CpuPercent, 79.9, 80.0);
        let at = ServiceSignal::ceiling(Metric::CpuPercent, 80.0, 80.0);
        let above = ServiceSignal::ceiling(Metric::CpuPercent, 80.1, 80.0);

        assert!(!below.breached());
        assert!(at.breached());
        assert!(above.breached());
    }

    #[test]
    fn test_floor_triggers_on_deficit_only() {
        let deficit = ServiceSignal::floor(Metric::ProcessCount, 1.0, 2.0);
        let exact = ServiceSignal::floor(Metric::ProcessCount, 2.0, 2.0);
        let surplus = ServiceSignal::floor(Metric::ProcessCount, 3.0, 2.0);

        assert!(deficit.breached());
        assert!(!exact.breached());
        assert!(!surplus.breached());
    }

    #[test]
    fn test_describe_names_metric() {
        let signal = ServiceSignal::ceiling(Metric::MemoryMb, 600.0, 512.0);
        assert!(signal.describe().contains("rss_mb"));
        assert!(signal.describe().contains(">="));
    }
}
