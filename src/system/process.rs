//! Process table sampling by executable name.
//!
//! CPU utilization needs two snapshots separated by sysinfo's minimum
//! update interval, so sampling blocks briefly; callers run it on the
//! blocking pool.

use sysinfo::{ProcessRefreshKind, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL};

use crate::checks::env::ProcessSample;
use crate::error::Result;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// All processes whose executable name contains `name`, with CPU% and RSS.
///
/// Matching is substring-based because the kernel truncates names to 15
/// characters.
pub fn sample_by_name(name: &str) -> Result<Vec<ProcessSample>> {
    let refresh = ProcessRefreshKind::new().with_cpu().with_memory();
    let mut sys =
        System::new_with_specifics(RefreshKind::new().with_processes(refresh));

    // First pass primes the CPU counters; the second produces usable deltas.
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes_specifics(refresh);

    let samples = sys
        .processes()
        .values()
        .filter(|p| p.name().contains(name))
        .map(|p| ProcessSample {
            pid: p.pid().as_u32(),
            cpu_percent: p.cpu_usage(),
            rss_mb: p.memory() as f64 / BYTES_PER_MB,
        })
        .collect();

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlikely_name_matches_nothing() {
        let samples = sample_by_name("no-such-process-zz9").unwrap();
        assert!(samples.is_empty());
    }
}
