use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum ShepherdError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Local system errors
    #[error("Service manager error: {0}")]
    ServiceManager(String),

    #[error("Process table error: {0}")]
    ProcessTable(String),

    // Remote command channel errors
    #[error("Remote command failed on {host}: {reason}")]
    Remote { host: String, reason: String },

    // Appliance / recorder errors
    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Export timed out after {elapsed_secs}s")]
    ExportTimeout { elapsed_secs: u64 },

    // Acquisition errors
    #[error("Acquisition unreachable: {0}")]
    Acquisition(String),

    // Session errors
    #[error("Session error: {0}")]
    Session(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ShepherdError
pub type Result<T> = std::result::Result<T, ShepherdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShepherdError::Recorder("export rejected".to_string());
        assert_eq!(err.to_string(), "Recorder error: export rejected");
    }

    #[test]
    fn test_remote_error_display() {
        let err = ShepherdError::Remote {
            host: "processing".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("processing"));
    }
}
