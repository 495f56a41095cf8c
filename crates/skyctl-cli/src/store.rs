use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skyctl_fc::PresetStore;
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDoc {
    #[serde(default)]
    pub presets: BTreeMap<String, Value>,
    #[serde(default)]
    pub device: BTreeMap<String, Value>,
}

/// Preset store backed by one JSON document, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    doc: StoreDoc,
}

impl JsonFileStore {
    /// Opens `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).with_context(|| format!("parse store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDoc::default(),
            Err(e) => return Err(e).with_context(|| format!("read store {}", path.display())),
        };
        Ok(Self { path: path.to_path_buf(), doc })
    }

    pub fn doc(&self) -> &StoreDoc {
        &self.doc
    }

    pub fn clear_presets(&mut self) {
        self.doc.presets.clear();
        self.flush();
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let s = serde_json::to_string_pretty(&self.doc).context("encode store")?;
        std::fs::write(&self.path, s).with_context(|| format!("write store {}", self.path.display()))?;
        Ok(())
    }

    fn flush(&self) {
        if let Err(e) = self.save() {
            warn!("preset store not saved: {:#}", e);
        }
    }
}

impl PresetStore for JsonFileStore {
    fn load_preset(&self, key: &str) -> Option<Value> {
        self.doc.presets.get(key).cloned()
    }

    fn save_preset(&mut self, key: &str, value: Value) {
        if self.doc.presets.get(key) != Some(&value) {
            self.doc.presets.insert(key.to_string(), value);
            self.flush();
        }
    }

    fn load_device_setting(&self, key: &str) -> Option<Value> {
        self.doc.device.get(key).cloned()
    }

    fn save_device_setting(&mut self, key: &str, value: Value) {
        if self.doc.device.get(key) != Some(&value) {
            self.doc.device.insert(key.to_string(), value);
            self.flush();
        }
    }

    fn clear_device_settings(&mut self) {
        self.doc.device.clear();
        self.flush();
    }

    fn has_device_settings(&self, namespace: &str) -> bool {
        let prefix = format!("{namespace}.");
        self.doc.device.keys().any(|k| k.starts_with(&prefix))
    }
}
