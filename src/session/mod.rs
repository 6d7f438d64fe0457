//! Recording session lifecycle: metadata staged over the API, transition
//! detection against the acquisition software, and per-session sidecar
//! records.

pub mod manager;
pub mod poller;

pub use manager::{SessionManager, SessionMetadata, SessionRecord};
pub use poller::{AcquisitionPoller, SessionTransition};
