//! Video appliance client: per-camera recording toggle, clip export, and
//! the stats endpoint.
//!
//! The appliance records continuously into segments; exports stitch a named
//! MP4 clip out of them, which is why export completion is polled rather
//! than awaited inline.

use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::error::{Result, ShepherdError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const STATS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RecorderClient {
    http: reqwest::Client,
    base_url: String,
    export_timeout: Duration,
    export_poll_interval: Duration,
}

impl RecorderClient {
    pub fn new(
        base_url: &str,
        export_timeout_secs: u64,
        export_poll_interval_secs: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("shepherd/0.1")
            .timeout(HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            export_timeout: Duration::from_secs(export_timeout_secs),
            export_poll_interval: Duration::from_secs(export_poll_interval_secs),
        })
    }

    /// Toggle recording for one camera
    pub async fn set_recording(&self, camera: &str, enabled: bool) -> Result<()> {
        let url = format!("{}/api/{}/recordings/set", self.base_url, camera);
        let payload = if enabled { "ON" } else { "OFF" };

        self.http
            .post(&url)
            .body(payload)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ShepherdError::Recorder(format!("recording toggle rejected: {e}")))?;

        info!(camera, "recording set to {payload}");
        Ok(())
    }

    /// Stop recording on every camera. Used at startup and shutdown for a
    /// clean slate. Returns false if any camera could not be toggled.
    pub async fn stop_all_recording<'a, I>(&self, cameras: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut success = true;
        for camera in cameras {
            if let Err(e) = self.set_recording(camera, false).await {
                warn!(camera, "failed to stop recording: {e}");
                success = false;
            }
        }
        success
    }

    /// Request an export clip for [start_ts, end_ts] (Unix seconds, UTC).
    /// Returns the appliance's export id.
    pub async fn export_recording(
        &self,
        camera: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<String> {
        let url = format!(
            "{}/api/export/{}/start/{}/end/{}",
            self.base_url, camera, start_ts, end_ts
        );

        info!(
            camera,
            start_ts,
            end_ts,
            duration = end_ts - start_ts,
            "requesting export"
        );

        let body: Value = self
            .http
            .post(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ShepherdError::Recorder(format!("export request rejected: {e}")))?
            .json()
            .await?;

        body.get("id")
            .or_else(|| body.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ShepherdError::Recorder(format!("export response carried no id: {body}"))
            })
    }

    /// Poll the export list until the export shows up or the deadline passes
    pub async fn wait_for_export(&self, export_id: &str) -> Result<Value> {
        let url = format!("{}/api/exports", self.base_url);
        let deadline = Instant::now() + self.export_timeout;
        info!(export_id, "waiting for export to complete");

        while Instant::now() < deadline {
            match self.list_exports(&url).await {
                Ok(exports) => {
                    if let Some(found) = exports.into_iter().find(|e| {
                        e.get("id")
                            .or_else(|| e.get("name"))
                            .and_then(Value::as_str)
                            == Some(export_id)
                    }) {
                        info!(export_id, "export completed");
                        return Ok(found);
                    }
                }
                Err(e) => warn!(export_id, "error checking export status: {e}"),
            }
            sleep(self.export_poll_interval).await;
        }

        Err(ShepherdError::ExportTimeout {
            elapsed_secs: self.export_timeout.as_secs(),
        })
    }

    async fn list_exports(&self, url: &str) -> Result<Vec<Value>> {
        let body: Value = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match body {
            Value::Array(items) => Ok(items),
            other => Err(ShepherdError::Recorder(format!(
                "unexpected exports payload: {other}"
            ))),
        }
    }

    /// Is the stats endpoint answering?
    pub async fn reachable(&self) -> bool {
        let url = format!("{}/api/stats", self.base_url);
        match self.http.get(&url).timeout(STATS_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
