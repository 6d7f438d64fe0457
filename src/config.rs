use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub watchdog: WatchdogConfig,
    pub fleet: FleetConfig,
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub recorder: RecorderConfig,
    /// Chamber number (as string key) -> appliance camera id
    pub cameras: HashMap<String, String>,
    /// Operators allowed to be named in session metadata (warn-only)
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds and targets for the one-shot recovery watchdog
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    /// systemd unit running the streaming relay
    pub relay_unit: String,
    /// Executable name of the per-camera capture processes
    pub capture_process: String,
    /// Executable name of the relay process
    pub relay_process: String,
    /// CPU% ceiling per capture process; at or above restarts the relay
    #[serde(default = "default_cpu_ceiling")]
    pub cpu_ceiling_percent: f64,
    /// Relay RSS ceiling in MB; at or above restarts the relay
    #[serde(default = "default_memory_ceiling")]
    pub memory_ceiling_mb: f64,
    /// Exact number of capture processes expected (deficit restarts)
    #[serde(default = "default_expected_captures")]
    pub expected_capture_processes: usize,
    /// Relay local status endpoint for the liveness check
    pub liveness_url: String,
    /// Liveness attempts before the endpoint is treated as down
    #[serde(default = "default_liveness_retries")]
    pub liveness_retries: u32,
    /// Delay between liveness attempts in milliseconds
    #[serde(default = "default_liveness_retry_delay")]
    pub liveness_retry_delay_ms: u64,
    /// Per-attempt liveness timeout in milliseconds
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,
}

fn default_cpu_ceiling() -> f64 {
    80.0
}

fn default_memory_ceiling() -> f64 {
    512.0
}

fn default_expected_captures() -> usize {
    2
}

fn default_liveness_retries() -> u32 {
    3
}

fn default_liveness_retry_delay() -> u64 {
    2000
}

fn default_liveness_timeout() -> u64 {
    5000
}

/// Two-host fleet layout for the read-only health reporter
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Capture host address (relay + cameras)
    pub capture_host: String,
    /// Processing host address (appliance + acquisition)
    pub processing_host: String,
    /// ssh target for the processing host (e.g. "rig@10.0.0.20")
    pub processing_ssh: String,
    /// Docker container name of the video appliance
    pub appliance_container: String,
    /// RTSP port served by the relay
    #[serde(default = "default_rtsp_port")]
    pub rtsp_port: u16,
    /// 1-minute load average ceiling on the processing host (warn threshold)
    #[serde(default = "default_load_ceiling")]
    pub load_ceiling: f64,
    /// Substring in the appliance stats body that confirms hardware decode
    #[serde(default = "default_accel_indicator")]
    pub accel_indicator: String,
    /// ssh connect timeout in seconds
    #[serde(default = "default_ssh_timeout")]
    pub ssh_connect_timeout_secs: u64,
}

fn default_rtsp_port() -> u16 {
    8554
}

fn default_load_ceiling() -> f64 {
    8.0
}

fn default_accel_indicator() -> String {
    "qsv".to_string()
}

fn default_ssh_timeout() -> u64 {
    5
}

/// Session daemon settings
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Acquisition status endpoint polled for recording-state transitions
    pub acquisition_url: String,
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Directory for session sidecar JSON files
    pub sessions_dir: String,
    /// Directory the appliance exports finished clips into
    pub export_dir: String,
}

fn default_poll_interval() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8585
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// Appliance HTTP API base URL (e.g. http://10.0.0.20:5000)
    pub url: String,
    /// Maximum wait for an export to complete, in seconds
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,
    /// Delay between export status polls, in seconds
    #[serde(default = "default_export_poll_interval")]
    pub export_poll_interval_secs: u64,
}

fn default_export_timeout() -> u64 {
    300
}

fn default_export_poll_interval() -> u64 {
    2
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the rolling anomaly log
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("daemon.poll_interval_ms", 1000)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SHEPHERD_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SHEPHERD_WATCHDOG__RELAY_UNIT, etc.)
            .add_source(
                Environment::with_prefix("SHEPHERD")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Resolve the camera id for a chamber number
    pub fn camera_for_chamber(&self, chamber: u32) -> Option<&str> {
        self.cameras.get(&chamber.to_string()).map(String::as_str)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.watchdog.cpu_ceiling_percent <= 0.0 {
            errors.push("watchdog.cpu_ceiling_percent must be positive".to_string());
        }

        if self.watchdog.memory_ceiling_mb <= 0.0 {
            errors.push("watchdog.memory_ceiling_mb must be positive".to_string());
        }

        if self.watchdog.expected_capture_processes == 0 {
            errors.push("watchdog.expected_capture_processes must be at least 1".to_string());
        }

        if self.watchdog.liveness_retries == 0 {
            errors.push("watchdog.liveness_retries must be at least 1".to_string());
        }

        if self.cameras.is_empty() {
            errors.push("at least one chamber -> camera mapping is required".to_string());
        }

        for key in self.cameras.keys() {
            if key.parse::<u32>().is_err() {
                errors.push(format!(
                    "camera key '{key}' is not a chamber number"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Ready-made configuration for unit tests across the crate
#[cfg(test)]
pub mod tests_support {
    use super::*;

    pub fn test_app_config() -> AppConfig {
        AppConfig {
            watchdog: WatchdogConfig {
                relay_unit: "relay.service".to_string(),
                capture_process: "ffmpeg".to_string(),
                relay_process: "mediamtx".to_string(),
                cpu_ceiling_percent: default_cpu_ceiling(),
                memory_ceiling_mb: default_memory_ceiling(),
                expected_capture_processes: default_expected_captures(),
                liveness_url: "http://127.0.0.1:9997/v3/paths/list".to_string(),
                liveness_retries: default_liveness_retries(),
                liveness_retry_delay_ms: default_liveness_retry_delay(),
                liveness_timeout_ms: default_liveness_timeout(),
            },
            fleet: FleetConfig {
                capture_host: "10.0.0.10".to_string(),
                processing_host: "10.0.0.20".to_string(),
                processing_ssh: "rig@10.0.0.20".to_string(),
                appliance_container: "frigate".to_string(),
                rtsp_port: default_rtsp_port(),
                load_ceiling: default_load_ceiling(),
                accel_indicator: default_accel_indicator(),
                ssh_connect_timeout_secs: default_ssh_timeout(),
            },
            daemon: DaemonConfig {
                acquisition_url: "http://127.0.0.1:8350/status".to_string(),
                poll_interval_ms: default_poll_interval(),
                sessions_dir: "/tmp/sessions".to_string(),
                export_dir: "/tmp/exports".to_string(),
            },
            api: ApiConfig {
                host: default_api_host(),
                port: default_api_port(),
            },
            recorder: RecorderConfig {
                url: "http://10.0.0.20:5000".to_string(),
                export_timeout_secs: default_export_timeout(),
                export_poll_interval_secs: default_export_poll_interval(),
            },
            cameras: HashMap::from([
                ("0".to_string(), "pi_cam_0".to_string()),
                ("1".to_string(), "pi_cam_1".to_string()),
            ]),
            operators: vec![],
            logging: LoggingConfig::default(),
        }
    }
}
