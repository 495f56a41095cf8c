use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Persistence seam for user presets and device-reported values.
///
/// Presets are the user's choices and survive across devices. Device settings
/// describe one particular device (bounds, supported flags) and can be
/// cleared independently.
pub trait PresetStore: Send {
    fn load_preset(&self, key: &str) -> Option<Value>;
    fn save_preset(&mut self, key: &str, value: Value);
    fn load_device_setting(&self, key: &str) -> Option<Value>;
    fn save_device_setting(&mut self, key: &str, value: Value);
    fn clear_device_settings(&mut self);

    /// True if any device setting lives under `namespace.`.
    fn has_device_settings(&self, namespace: &str) -> bool;
}

/// In-memory store. Also the reference for what the file-backed store keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    pub presets: BTreeMap<String, Value>,
    pub device: BTreeMap<String, Value>,
}

impl PresetStore for MemoryStore {
    fn load_preset(&self, key: &str) -> Option<Value> {
        self.presets.get(key).cloned()
    }

    fn save_preset(&mut self, key: &str, value: Value) {
        self.presets.insert(key.to_string(), value);
    }

    fn load_device_setting(&self, key: &str) -> Option<Value> {
        self.device.get(key).cloned()
    }

    fn save_device_setting(&mut self, key: &str, value: Value) {
        self.device.insert(key.to_string(), value);
    }

    fn clear_device_settings(&mut self) {
        self.device.clear();
    }

    fn has_device_settings(&self, namespace: &str) -> bool {
        let prefix = format!("{namespace}.");
        self.device.keys().any(|k| k.starts_with(&prefix))
    }
}

/// Store used when offline settings are disabled: remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl PresetStore for NullStore {
    fn load_preset(&self, _key: &str) -> Option<Value> {
        None
    }
    fn save_preset(&mut self, _key: &str, _value: Value) {}
    fn load_device_setting(&self, _key: &str) -> Option<Value> {
        None
    }
    fn save_device_setting(&mut self, _key: &str, _value: Value) {}
    fn clear_device_settings(&mut self) {}
    fn has_device_settings(&self, _namespace: &str) -> bool {
        false
    }
}

/// Typed view of one store key.
#[derive(Debug, Clone)]
pub struct StorageEntry<T> {
    key: String,
    _ty: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> StorageEntry<T> {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self { key: format!("{namespace}.{name}"), _ty: PhantomData }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load_preset(&self, store: &dyn PresetStore) -> Option<T> {
        store.load_preset(&self.key).and_then(|v| self.decode(v))
    }

    pub fn save_preset(&self, store: &mut dyn PresetStore, value: &T) {
        if let Some(v) = self.encode(value) {
            store.save_preset(&self.key, v);
        }
    }

    pub fn load_device(&self, store: &dyn PresetStore) -> Option<T> {
        store.load_device_setting(&self.key).and_then(|v| self.decode(v))
    }

    pub fn save_device(&self, store: &mut dyn PresetStore, value: &T) {
        if let Some(v) = self.encode(value) {
            store.save_device_setting(&self.key, v);
        }
    }

    fn decode(&self, v: Value) -> Option<T> {
        match serde_json::from_value(v) {
            Ok(t) => Some(t),
            Err(e) => {
                // stale layout from an older build; treat as absent
                debug!("store key {} unreadable: {}", self.key, e);
                None
            }
        }
    }

    fn encode(&self, value: &T) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("store key {} not saved: {}", self.key, e);
                None
            }
        }
    }
}
