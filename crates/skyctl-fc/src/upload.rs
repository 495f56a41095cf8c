use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Identifies one upload request; completions carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Success,
    Failed,
    Canceled,
}

/// Completion of a flight-plan transfer, delivered back into the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub token: UploadToken,
    pub status: TransferStatus,
    pub http_code: Option<u16>,
    /// Identifier the device assigned to the uploaded plan.
    pub plan_id: Option<String>,
}

impl UploadResult {
    pub fn success(token: UploadToken, plan_id: &str) -> Self {
        Self { token, status: TransferStatus::Success, http_code: Some(200), plan_id: Some(plan_id.to_string()) }
    }

    pub fn failure(token: UploadToken, http_code: Option<u16>) -> Self {
        Self { token, status: TransferStatus::Failed, http_code, plan_id: None }
    }
}

/// HTTP side of flight-plan upload. Implementations must not block; the
/// result comes back later as a session input.
pub trait PlanUploader: Send {
    fn upload(&mut self, file: &Path, token: UploadToken);
    fn cancel(&mut self, token: UploadToken);
}

/// Uploader that only records what it was asked to do. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedUploader {
    log: Arc<Mutex<UploadLog>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadLog {
    pub requests: Vec<(PathBuf, UploadToken)>,
    pub canceled: Vec<UploadToken>,
}

impl ScriptedUploader {
    pub fn log(&self) -> UploadLog {
        self.lock().clone()
    }

    pub fn last_token(&self) -> Option<UploadToken> {
        self.lock().requests.last().map(|(_, t)| *t)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, UploadLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlanUploader for ScriptedUploader {
    fn upload(&mut self, file: &Path, token: UploadToken) {
        self.lock().requests.push((file.to_path_buf(), token));
    }

    fn cancel(&mut self, token: UploadToken) {
        self.lock().canceled.push(token);
    }
}
