//! Acquisition polling and recording-state transition detection.
//!
//! The poller only observes. A poll error never mutates the last known
//! state, so a flaky acquisition link cannot fabricate a session start or
//! end.

use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::acquisition::{AcquisitionClient, AcquisitionStatus, RecordingState};

/// Log the first consecutive error, then every Nth, to keep a dead
/// acquisition link from flooding the log.
const LOG_EVERY_N_ERRORS: u32 = 5;

/// A detected recording-state transition
#[derive(Debug, Clone)]
pub enum SessionTransition {
    Started(AcquisitionStatus),
    Ended(AcquisitionStatus),
}

pub struct AcquisitionPoller {
    client: Arc<dyn AcquisitionClient>,
    previous: RecordingState,
    connected: bool,
    consecutive_errors: u32,
}

impl AcquisitionPoller {
    pub fn new(client: Arc<dyn AcquisitionClient>) -> Self {
        Self {
            client,
            previous: RecordingState::Unknown,
            connected: false,
            consecutive_errors: 0,
        }
    }

    /// Poll once. Returns a transition when one was detected.
    pub async fn poll(&mut self) -> Option<SessionTransition> {
        let status = match self.client.status().await {
            Ok(status) => status,
            Err(e) => {
                self.connected = false;
                self.consecutive_errors += 1;
                if self.consecutive_errors == 1
                    || self.consecutive_errors % LOG_EVERY_N_ERRORS == 0
                {
                    warn!(
                        consecutive = self.consecutive_errors,
                        "acquisition poll failed: {e}"
                    );
                }
                return None;
            }
        };

        self.connected = true;
        self.consecutive_errors = 0;

        let current = status.recording;
        let transition = match (self.previous, current) {
            (RecordingState::Off, RecordingState::On) => {
                info!(base_name = %status.base_name, "recording started (R_OFF -> R_ON)");
                Some(SessionTransition::Started(status))
            }
            (RecordingState::On, RecordingState::Off) => {
                info!("recording stopped (R_ON -> R_OFF)");
                Some(SessionTransition::Ended(status))
            }
            (RecordingState::Unknown, state) => {
                // First successful poll: adopt the state without firing a
                // transition, since there is no known previous state.
                info!("initial acquisition state: {state}");
                None
            }
            _ => None,
        };

        self.previous = current;
        transition
    }

    /// Whether the last poll succeeded
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// The last known recording state
    pub fn last_state(&self) -> RecordingState {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::acquisition::MockAcquisitionClient;
    use crate::error::ShepherdError;

    fn status(recording: RecordingState) -> AcquisitionStatus {
        AcquisitionStatus {
            recording,
            stream: String::new(),
            base_name: "base_001".to_string(),
            file_path: "/data/base_001.xdat".to_string(),
        }
    }

    fn poller_with_sequence(
        states: Vec<Result<RecordingState, ()>>,
    ) -> AcquisitionPoller {
        let mut client = MockAcquisitionClient::new();
        let mut sequence = states.into_iter();
        client.expect_status().returning(move || {
            match sequence.next().expect("poll past scripted sequence") {
                Ok(state) => Ok(status(state)),
                Err(()) => Err(ShepherdError::Acquisition("link down".to_string())),
            }
        });
        AcquisitionPoller::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_off_to_on_fires_session_start() {
        let mut poller = poller_with_sequence(vec![
            Ok(RecordingState::Off),
            Ok(RecordingState::On),
        ]);

        assert!(poller.poll().await.is_none());
        let transition = poller.poll().await;
        assert!(matches!(transition, Some(SessionTransition::Started(_))));
    }

    #[tokio::test]
    async fn test_on_to_off_fires_session_end() {
        let mut poller = poller_with_sequence(vec![
            Ok(RecordingState::On),
            Ok(RecordingState::Off),
        ]);

        // Initial poll adopts R_ON without a transition.
        assert!(poller.poll().await.is_none());
        let transition = poller.poll().await;
        assert!(matches!(transition, Some(SessionTransition::Ended(_))));
    }

    #[tokio::test]
    async fn test_errors_do_not_mask_transitions() {
        let mut poller = poller_with_sequence(vec![
            Ok(RecordingState::Off),
            Err(()),
            Err(()),
            Ok(RecordingState::On),
        ]);

        assert!(poller.poll().await.is_none());
        assert!(poller.poll().await.is_none());
        assert!(!poller.connected());
        assert!(poller.poll().await.is_none());

        // State survived the outage; the transition still fires.
        let transition = poller.poll().await;
        assert!(matches!(transition, Some(SessionTransition::Started(_))));
        assert!(poller.connected());
    }

    #[tokio::test]
    async fn test_steady_state_fires_nothing() {
        let mut poller = poller_with_sequence(vec![
            Ok(RecordingState::On),
            Ok(RecordingState::On),
            Ok(RecordingState::On),
        ]);

        for _ in 0..3 {
            assert!(poller.poll().await.is_none());
        }
        assert_eq!(poller.last_state(), RecordingState::On);
    }
}
