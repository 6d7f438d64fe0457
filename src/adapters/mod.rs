//! HTTP and protocol clients for the third-party components the agent
//! supervises: the streaming relay, the video appliance, and the
//! acquisition software.

pub mod acquisition;
pub mod recorder;
pub mod relay;

pub use acquisition::{AcquisitionClient, AcquisitionStatus, HttpAcquisitionClient, RecordingState};
pub use recorder::RecorderClient;
