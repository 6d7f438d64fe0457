//! Session daemon orchestrator.
//!
//! Wires the acquisition poller, the recorder client, the session manager,
//! and the REST API together, then polls at 1 Hz until SIGTERM/SIGINT.
//! Session start/end is driven entirely by acquisition state transitions;
//! the daemon itself never starts or stops an acquisition recording.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::adapters::acquisition::HttpAcquisitionClient;
use crate::adapters::recorder::RecorderClient;
use crate::api::{self, ApiState};
use crate::config::AppConfig;
use crate::error::Result;
use crate::session::poller::{AcquisitionPoller, SessionTransition};
use crate::session::{SessionManager, SessionRecord};

/// Widen the export window so segment boundaries never clip a session
const EXPORT_PADDING_SECS: i64 = 2;

pub struct SessionDaemon {
    cfg: AppConfig,
    state: Arc<ApiState>,
    recorder: RecorderClient,
    poller: AcquisitionPoller,
}

impl SessionDaemon {
    pub fn new(cfg: AppConfig) -> Result<Self> {
        let manager = SessionManager::new(
            &cfg.daemon.sessions_dir,
            &cfg.daemon.export_dir,
            cfg.cameras.clone(),
        )?;

        let recorder = RecorderClient::new(
            &cfg.recorder.url,
            cfg.recorder.export_timeout_secs,
            cfg.recorder.export_poll_interval_secs,
        )?;

        let acquisition = HttpAcquisitionClient::new(&cfg.daemon.acquisition_url)?;
        let poller = AcquisitionPoller::new(Arc::new(acquisition));

        let state = Arc::new(ApiState::new(manager, cfg.operators.clone()));

        Ok(Self {
            cfg,
            state,
            recorder,
            poller,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        info!("session daemon starting");

        // 1. Appliance reachability, then a clean slate: no camera records
        //    until a session says so.
        let recorder_up = self.recorder.reachable().await;
        self.state
            .recorder_reachable
            .store(recorder_up, Ordering::SeqCst);
        if !recorder_up {
            warn!(
                url = %self.cfg.recorder.url,
                "appliance unreachable at startup; recording control will retry per session"
            );
        }
        info!("resetting all camera recordings to off");
        self.recorder
            .stop_all_recording(self.cfg.cameras.values().map(String::as_str))
            .await;

        // 2. First acquisition poll. Failure is tolerated: acquisition may
        //    start after the daemon.
        if self.poll_once().await {
            info!("acquisition reachable");
        } else {
            warn!("acquisition unreachable at startup; will keep retrying in the main loop");
        }

        // 3. API server in the background
        let api_state = Arc::clone(&self.state);
        let api_host = self.cfg.api.host.clone();
        let api_port = self.cfg.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_state, &api_host, api_port).await {
                error!("API server exited: {e}");
            }
        });

        // 4. Main polling loop
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.cfg.daemon.poll_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut sigterm = signal(SignalKind::terminate())?;
        info!(
            interval_ms = self.cfg.daemon.poll_interval_ms,
            "entering main loop"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// One poll of the acquisition state; true when the poll succeeded
    async fn poll_once(&mut self) -> bool {
        let transition = self.poller.poll().await;

        self.state
            .acquisition_connected
            .store(self.poller.connected(), Ordering::SeqCst);
        *self.state.recording_state.write().await = self.poller.last_state();

        if let Some(transition) = transition {
            self.handle_transition(transition).await;
        }

        self.poller.connected()
    }

    async fn handle_transition(&self, transition: SessionTransition) {
        match transition {
            SessionTransition::Started(status) => {
                let record = self
                    .state
                    .manager
                    .write()
                    .await
                    .start_session(&status.base_name, &status.file_path);

                match self.recorder.set_recording(&record.camera, true).await {
                    Ok(()) => self.state.recorder_reachable.store(true, Ordering::SeqCst),
                    Err(e) => {
                        self.state.recorder_reachable.store(false, Ordering::SeqCst);
                        error!(
                            camera = %record.camera,
                            "failed to enable recording; video may not be captured: {e}"
                        );
                    }
                }
            }
            SessionTransition::Ended(_) => {
                let record = match self.state.manager.write().await.end_session() {
                    Some(record) => record,
                    None => {
                        warn!("session end detected but no active session to close");
                        return;
                    }
                };

                if let Err(e) = self.recorder.set_recording(&record.camera, false).await {
                    warn!(camera = %record.camera, "failed to disable recording: {e}");
                }

                // Export runs off the poll loop so a slow appliance can't
                // delay transition detection.
                self.spawn_export(record);
            }
        }
    }

    fn spawn_export(&self, record: SessionRecord) {
        let recorder = self.recorder.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let outcome = export_session(&recorder, &record).await;
            state
                .manager
                .write()
                .await
                .update_export_status(&outcome);
        });
    }

    async fn shutdown(&self) {
        let aborted = self
            .state
            .manager
            .write()
            .await
            .abort_session("daemon shutdown");

        if let Some(record) = aborted {
            if let Err(e) = self.recorder.set_recording(&record.camera, false).await {
                warn!(camera = %record.camera, "failed to stop recording for aborted session: {e}");
            }
        }

        info!("stopping all camera recordings");
        self.recorder
            .stop_all_recording(self.cfg.cameras.values().map(String::as_str))
            .await;

        info!("session daemon stopped");
    }
}

/// Run the export for a finished session and describe the outcome
async fn export_session(recorder: &RecorderClient, record: &SessionRecord) -> String {
    let start_ts = record.start_time_utc.timestamp() - EXPORT_PADDING_SECS;
    let end_ts = record
        .end_time_utc
        .unwrap_or(record.start_time_utc)
        .timestamp()
        + EXPORT_PADDING_SECS;

    info!(session = %record.session_id, "starting export");

    let export_id = match recorder
        .export_recording(&record.camera, start_ts, end_ts)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!(session = %record.session_id, "export request failed: {e}");
            return "failed: export request rejected".to_string();
        }
    };

    match recorder.wait_for_export(&export_id).await {
        Ok(_) => {
            info!(
                session = %record.session_id,
                filename = %record.video_filename,
                "export completed"
            );
            "completed".to_string()
        }
        Err(e) => {
            error!(session = %record.session_id, "export did not complete: {e}");
            "failed: export timed out".to_string()
        }
    }
}
