pub mod activation;
pub mod capability;
pub mod error;
pub mod flightplan;
pub mod guided;
pub mod link;
pub mod look_at;
pub mod manual;
pub mod pcmd;
pub mod policy;
pub mod session;
pub mod setting;
pub mod store;
pub mod upload;

use serde::Deserialize;

pub use activation::ActivationState;
pub use error::EventError;
pub use link::{Link, RecordingTransport, Transport};
pub use session::{DroneSession, SessionInput, UserAction};
pub use store::{MemoryStore, PresetStore};
pub use upload::{PlanUploader, UploadResult, UploadToken};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Piloting command period. The device expects one every 50ms.
    pub pcmd_period_ms: u64,

    /// When false, no preset or device value is read or written: every
    /// session starts from built-in defaults.
    pub offline_settings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { pcmd_period_ms: 50, offline_settings: true }
    }
}
