//! Session lifecycle, metadata, filenames, and sidecar JSON records.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Result, ShepherdError};

const UNSET: &str = "unknown";

/// Operator-provided metadata for the next recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub subject_id: String,
    pub recording_type: String,
    pub operator: String,
    pub chamber: u32,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            subject_id: UNSET.to_string(),
            recording_type: UNSET.to_string(),
            operator: UNSET.to_string(),
            chamber: 0,
        }
    }
}

impl SessionMetadata {
    /// True if no field was explicitly set
    pub fn is_default(&self) -> bool {
        self.subject_id == UNSET && self.recording_type == UNSET && self.operator == UNSET
    }
}

/// Complete record of a session, written as a sidecar JSON next to the clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub start_time_utc: DateTime<Utc>,
    pub end_time_utc: Option<DateTime<Utc>>,
    pub start_time_local: String,
    pub end_time_local: String,
    pub duration_seconds: f64,
    pub subject_id: String,
    pub recording_type: String,
    pub operator: String,
    pub chamber: u32,
    pub camera: String,
    pub acquisition_base_name: String,
    pub acquisition_file_path: String,
    pub video_filename: String,
    pub export_status: String,
}

/// Manages session lifecycle, metadata, and sidecar persistence.
///
/// Not internally synchronized; the daemon shares it behind a lock.
pub struct SessionManager {
    sessions_dir: PathBuf,
    cameras: HashMap<String, String>,
    pending: SessionMetadata,
    active: Option<SessionRecord>,
    history: Vec<SessionRecord>,
}

impl SessionManager {
    pub fn new(
        sessions_dir: impl Into<PathBuf>,
        export_dir: impl Into<PathBuf>,
        cameras: HashMap<String, String>,
    ) -> Result<Self> {
        let sessions_dir = sessions_dir.into();
        let export_dir = export_dir.into();
        std::fs::create_dir_all(&sessions_dir)?;
        std::fs::create_dir_all(&export_dir)?;

        let mut manager = Self {
            sessions_dir,
            cameras,
            pending: SessionMetadata::default(),
            active: None,
            history: Vec::new(),
        };
        manager.load_history();
        Ok(manager)
    }

    /// Set metadata for the next session. Partial updates allowed.
    pub fn set_metadata(
        &mut self,
        subject_id: Option<String>,
        recording_type: Option<String>,
        operator: Option<String>,
        chamber: Option<u32>,
    ) -> &SessionMetadata {
        if let Some(subject_id) = subject_id {
            self.pending.subject_id = subject_id;
        }
        if let Some(recording_type) = recording_type {
            self.pending.recording_type = recording_type;
        }
        if let Some(operator) = operator {
            self.pending.operator = operator;
        }
        if let Some(chamber) = chamber {
            self.pending.chamber = chamber;
        }

        info!(
            subject = %self.pending.subject_id,
            recording_type = %self.pending.recording_type,
            operator = %self.pending.operator,
            chamber = self.pending.chamber,
            "session metadata updated"
        );
        &self.pending
    }

    /// Reset metadata to defaults for the next session
    pub fn clear_metadata(&mut self) {
        self.pending = SessionMetadata::default();
        info!("session metadata cleared");
    }

    /// Start a new session when an off -> on transition is detected
    pub fn start_session(
        &mut self,
        acquisition_base_name: &str,
        acquisition_file_path: &str,
    ) -> SessionRecord {
        let now = Utc::now();
        let meta = &self.pending;
        let camera = self
            .cameras
            .get(&meta.chamber.to_string())
            .cloned()
            .unwrap_or_else(|| format!("camera_{}", meta.chamber));

        if meta.is_default() {
            warn!(
                "session started without metadata; files will carry '{UNSET}' placeholders"
            );
        }

        let record = SessionRecord {
            session_id: Uuid::new_v4(),
            start_time_utc: now,
            end_time_utc: None,
            start_time_local: now.with_timezone(&Local).to_rfc3339(),
            end_time_local: String::new(),
            duration_seconds: 0.0,
            subject_id: meta.subject_id.clone(),
            recording_type: meta.recording_type.clone(),
            operator: meta.operator.clone(),
            chamber: meta.chamber,
            camera,
            acquisition_base_name: acquisition_base_name.to_string(),
            acquisition_file_path: acquisition_file_path.to_string(),
            video_filename: String::new(),
            export_status: "pending".to_string(),
        };

        info!(
            session = %record.session_id,
            camera = %record.camera,
            subject = %record.subject_id,
            "session started"
        );

        self.active = Some(record.clone());
        record
    }

    /// End the active session: record end time, generate the clip filename,
    /// write the sidecar, and clear pending metadata for the next run.
    pub fn end_session(&mut self) -> Option<SessionRecord> {
        let mut record = match self.active.take() {
            Some(record) => record,
            None => {
                warn!("session end requested but no session is active");
                return None;
            }
        };

        self.finish(&mut record, Utc::now());

        info!(
            session = %record.session_id,
            duration = record.duration_seconds,
            filename = %record.video_filename,
            "session ended"
        );

        self.write_sidecar(&record);
        self.history.push(record.clone());
        self.clear_metadata();
        Some(record)
    }

    /// Abort the active session (daemon shutdown), writing a partial record
    pub fn abort_session(&mut self, reason: &str) -> Option<SessionRecord> {
        let mut record = self.active.take()?;

        self.finish(&mut record, Utc::now());
        record.export_status = format!("aborted: {reason}");

        warn!(
            session = %record.session_id,
            reason,
            duration = record.duration_seconds,
            "session aborted"
        );

        self.write_sidecar(&record);
        self.history.push(record.clone());
        self.clear_metadata();
        Some(record)
    }

    /// Update the export status of the most recent session and re-write its
    /// sidecar
    pub fn update_export_status(&mut self, status: &str) {
        if let Some(last) = self.history.last_mut() {
            last.export_status = status.to_string();
            let record = last.clone();
            self.write_sidecar(&record);
        }
    }

    fn finish(&self, record: &mut SessionRecord, now: DateTime<Utc>) {
        record.end_time_utc = Some(now);
        record.end_time_local = now.with_timezone(&Local).to_rfc3339();
        record.duration_seconds =
            (now - record.start_time_utc).num_milliseconds() as f64 / 1000.0;
        record.video_filename = generate_filename(record);
    }

    fn write_sidecar(&self, record: &SessionRecord) {
        let path = self.sidecar_path(record);
        match serde_json::to_string_pretty(record) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    error!("failed to write session sidecar {}: {e}", path.display());
                } else {
                    info!("session sidecar written: {}", path.display());
                }
            }
            Err(e) => error!("failed to serialize session record: {e}"),
        }
    }

    fn sidecar_path(&self, record: &SessionRecord) -> PathBuf {
        let base = record
            .video_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| record.session_id.to_string());
        self.sessions_dir.join(format!("{base}_session.json"))
    }

    fn load_history(&mut self) {
        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to scan session directory: {e}");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !is_sidecar(&path) {
                continue;
            }
            match read_sidecar(&path) {
                Ok(record) => self.history.push(record),
                Err(e) => warn!("failed to load session file {}: {e}", path.display()),
            }
        }

        self.history.sort_by_key(|r| r.start_time_utc);
        if !self.history.is_empty() {
            info!("loaded {} session records from disk", self.history.len());
        }
    }

    pub fn active_session(&self) -> Option<&SessionRecord> {
        self.active.as_ref()
    }

    pub fn has_active_session(&self) -> bool {
        self.active.is_some()
    }

    pub fn pending_metadata(&self) -> &SessionMetadata {
        &self.pending
    }

    pub fn history(&self) -> &[SessionRecord] {
        &self.history
    }

    pub fn camera_for_chamber(&self, chamber: u32) -> Option<&str> {
        self.cameras.get(&chamber.to_string()).map(String::as_str)
    }
}

/// Clip filename: YYMMDDHHMM_<subject>_<type>.mp4, local time
fn generate_filename(record: &SessionRecord) -> String {
    let stamp = record
        .start_time_utc
        .with_timezone(&Local)
        .format("%y%m%d%H%M");
    let subject = record.subject_id.replace(' ', "_");
    let recording_type = record.recording_type.replace(' ', "_");
    format!("{stamp}_{subject}_{recording_type}.mp4")
}

fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_session.json"))
}

fn read_sidecar(path: &Path) -> Result<SessionRecord> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| ShepherdError::Session(e.to_string()))
}
