use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use skyctl_fc::upload::{PlanUploader, UploadResult, UploadToken};
use skyctl_fc::SessionInput;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stand-in for the device's HTTP upload endpoint. The plan id is derived
/// from the file content, like the device does.
pub struct SimUploader {
    tx: mpsc::Sender<SessionInput>,
    delay: Duration,
    fail: bool,
    transfers: HashMap<UploadToken, JoinHandle<()>>,
}

impl SimUploader {
    pub fn new(tx: mpsc::Sender<SessionInput>, delay: Duration, fail: bool) -> Self {
        Self { tx, delay, fail, transfers: HashMap::new() }
    }
}

pub fn plan_id(content: &[u8]) -> String {
    hex::encode(&blake3::hash(content).as_bytes()[..8])
}

impl PlanUploader for SimUploader {
    fn upload(&mut self, file: &Path, token: UploadToken) {
        self.transfers.retain(|_, t| !t.is_finished());
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            warn!("upload {:?} dropped: no runtime", token);
            return;
        };
        info!("uploading {} as {:?}", file.display(), token);
        let task = rt.spawn(transfer(file.to_path_buf(), token, self.delay, self.fail, self.tx.clone()));
        self.transfers.insert(token, task);
    }

    fn cancel(&mut self, token: UploadToken) {
        if let Some(task) = self.transfers.remove(&token) {
            debug!("upload {:?} canceled", token);
            task.abort();
        }
    }
}

impl Drop for SimUploader {
    fn drop(&mut self) {
        for (_, task) in self.transfers.drain() {
            task.abort();
        }
    }
}

async fn transfer(file: PathBuf, token: UploadToken, delay: Duration, fail: bool, tx: mpsc::Sender<SessionInput>) {
    tokio::time::sleep(delay).await;
    let result = if fail {
        UploadResult::failure(token, Some(500))
    } else {
        match tokio::fs::read(&file).await {
            Ok(content) => UploadResult::success(token, &plan_id(&content)),
            Err(e) => {
                warn!("upload {:?}: {}: {}", token, file.display(), e);
                UploadResult::failure(token, None)
            }
        }
    };
    if tx.send(SessionInput::UploadComplete(result)).await.is_err() {
        debug!("upload {:?} finished after session end", token);
    }
}
