//! Acquisition software status client.
//!
//! The daemon only ever observes acquisition state; it never starts or
//! stops a recording there. The trait seam exists so the poller's
//! transition logic can be tested without the instrument stack.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::error::{Result, ShepherdError};

const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Recording state reported by the acquisition software
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    On,
    Off,
    #[default]
    Unknown,
}

impl RecordingState {
    /// Wire values as emitted by the acquisition status endpoint
    pub fn from_wire(value: &str) -> Self {
        match value {
            "R_ON" => RecordingState::On,
            "R_OFF" => RecordingState::Off,
            other => {
                warn!("unexpected recording state: {other}");
                RecordingState::Unknown
            }
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::On => write!(f, "R_ON"),
            RecordingState::Off => write!(f, "R_OFF"),
            RecordingState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Snapshot of acquisition state from a single poll
#[derive(Debug, Clone, Default)]
pub struct AcquisitionStatus {
    pub recording: RecordingState,
    pub stream: String,
    pub base_name: String,
    pub file_path: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcquisitionClient: Send + Sync {
    /// One status poll. An error means the acquisition software was
    /// unreachable; it must not be interpreted as a state change.
    async fn status(&self) -> Result<AcquisitionStatus>;
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    recording: String,
    #[serde(default)]
    stream: String,
    #[serde(default)]
    base_name: String,
    #[serde(default)]
    path: String,
}

/// HTTP implementation against the acquisition software's status endpoint
pub struct HttpAcquisitionClient {
    http: reqwest::Client,
    url: String,
}

impl HttpAcquisitionClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("shepherd/0.1")
            .timeout(STATUS_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AcquisitionClient for HttpAcquisitionClient {
    async fn status(&self) -> Result<AcquisitionStatus> {
        let payload: StatusPayload = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ShepherdError::Acquisition(e.to_string()))?
            .error_for_status()
            .map_err(|e| ShepherdError::Acquisition(e.to_string()))?
            .json()
            .await
            .map_err(|e| ShepherdError::Acquisition(format!("bad status payload: {e}")))?;

        Ok(AcquisitionStatus {
            recording: RecordingState::from_wire(&payload.recording),
            stream: payload.stream,
            base_name: payload.base_name,
            file_path: payload.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_states_parse() {
        assert_eq!(RecordingState::from_wire("R_ON"), RecordingState::On);
        assert_eq!(RecordingState::from_wire("R_OFF"), RecordingState::Off);
        assert_eq!(
            RecordingState::from_wire("R_PAUSED"),
            RecordingState::Unknown
        );
    }

    #[test]
    fn test_display_round_trips_known_states() {
        assert_eq!(
            RecordingState::from_wire(&RecordingState::On.to_string()),
            RecordingState::On
        );
    }
}
