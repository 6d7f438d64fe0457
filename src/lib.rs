pub mod adapters;
pub mod api;
pub mod checks;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod session;
pub mod system;

pub use adapters::{AcquisitionClient, AcquisitionStatus, RecorderClient, RecordingState};
pub use checks::{
    CheckResult, CheckStatus, FleetReport, LocalCheck, ProbeEnv, Reporter, ServiceSignal,
    SystemEnv, Watchdog, WatchdogRun,
};
pub use config::AppConfig;
pub use daemon::SessionDaemon;
pub use error::{Result, ShepherdError};
pub use session::{AcquisitionPoller, SessionManager, SessionMetadata, SessionRecord};
