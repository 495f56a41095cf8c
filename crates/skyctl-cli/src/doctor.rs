use std::path::Path;

use anyhow::Result;
use skyctl_fc::SessionConfig;
use tracing::{info, warn};

use crate::store::JsonFileStore;

pub fn check_session(session: &SessionConfig) -> Result<()> {
    anyhow::ensure!(
        (10..=1000).contains(&session.pcmd_period_ms),
        "session.pcmd_period_ms must be within 10..=1000, got {}",
        session.pcmd_period_ms
    );
    if !session.offline_settings {
        info!("offline settings disabled: presets are neither read nor written");
    }
    Ok(())
}

pub fn check_upload(simulated_delay_ms: u64, fail: bool) -> Result<()> {
    anyhow::ensure!(simulated_delay_ms <= 60_000, "upload.simulated_delay_ms above 60s");
    if fail {
        warn!("upload.fail=true: every flight plan upload will fail");
    }
    Ok(())
}

pub fn check_store(path: &str) -> Result<()> {
    anyhow::ensure!(!path.is_empty(), "store.path missing");
    let store = JsonFileStore::open(Path::new(path))?;
    info!(
        "doctor: store {} holds {} presets, {} device values",
        path,
        store.doc().presets.len(),
        store.doc().device.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_period_bounds() {
        assert!(check_session(&SessionConfig::default()).is_ok());
        assert!(check_session(&SessionConfig { pcmd_period_ms: 5, ..SessionConfig::default() }).is_err());
        assert!(check_session(&SessionConfig { pcmd_period_ms: 1000, ..SessionConfig::default() }).is_ok());
    }

    #[test]
    fn test_upload_delay_cap() {
        assert!(check_upload(0, true).is_ok());
        assert!(check_upload(120_000, false).is_err());
    }

    #[test]
    fn test_store_path_required() {
        assert!(check_store("").is_err());
        let path = std::env::temp_dir().join(format!("skyctl-doctor-{}", std::process::id())).join("none.json");
        assert!(check_store(&path.to_string_lossy()).is_ok());
    }
}
