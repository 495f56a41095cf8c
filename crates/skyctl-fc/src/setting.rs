use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use skyctl_proto::Command;
use tracing::{debug, info, warn};

use crate::error::EventError;
use crate::link::Link;
use crate::store::{PresetStore, StorageEntry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingStatus {
    UpToDate,
    Updating,
}

/// What a local `set` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Unchanged,
    /// Sent to the device; waiting for its confirmation.
    Sent,
    /// Committed locally; no confirmation will come.
    Committed,
}

/// Snapshot handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingView<T> {
    pub value: T,
    pub bounds: Option<Bounds<T>>,
    pub status: SettingStatus,
}

/// Reconciles the user's choice, the device's report and an in-flight request.
pub struct Setting<T> {
    name: &'static str,
    encode: fn(&T) -> Command,
    default: T,
    confirmed: T,
    requested: Option<T>,
    bounds: Option<Bounds<T>>,
    preset: Option<StorageEntry<T>>,
    device_bounds: Option<StorageEntry<Bounds<T>>>,
    reported: bool,
}

impl<T> Setting<T>
where
    T: Clone + PartialEq + PartialOrd + Debug + Serialize + DeserializeOwned,
{
    pub fn new(name: &'static str, default: T, encode: fn(&T) -> Command) -> Self {
        Self {
            name,
            encode,
            confirmed: default.clone(),
            default,
            requested: None,
            bounds: None,
            preset: None,
            device_bounds: None,
            reported: false,
        }
    }

    /// Persists the preset and device bounds under `namespace.name`.
    pub fn stored(mut self, namespace: &str) -> Self {
        self.preset = Some(StorageEntry::new(namespace, self.name));
        self.device_bounds = Some(StorageEntry::new(namespace, &format!("{}.bounds", self.name)));
        self
    }

    /// Loads the preset (or falls back to the default) and the last known bounds.
    pub fn load(&mut self, store: &dyn PresetStore) {
        self.confirmed = self
            .preset
            .as_ref()
            .and_then(|p| p.load_preset(store))
            .unwrap_or_else(|| self.default.clone());
        self.bounds = self.device_bounds.as_ref().and_then(|b| b.load_device(store));
        self.requested = None;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value shown to observers: the request while one is in flight.
    pub fn value(&self) -> &T {
        self.requested.as_ref().unwrap_or(&self.confirmed)
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn bounds(&self) -> Option<&Bounds<T>> {
        self.bounds.as_ref()
    }

    pub fn status(&self) -> SettingStatus {
        if self.requested.is_some() {
            SettingStatus::Updating
        } else {
            SettingStatus::UpToDate
        }
    }

    pub fn view(&self) -> SettingView<T> {
        SettingView { value: self.value().clone(), bounds: self.bounds.clone(), status: self.status() }
    }

    pub fn set(&mut self, value: T, link: &Link, store: &mut dyn PresetStore) -> SetOutcome {
        let value = self.clamp(value);
        if &value == self.value() {
            return SetOutcome::Unchanged;
        }
        if let Some(p) = &self.preset {
            p.save_preset(store, &value);
        }
        if link.send_command(&(self.encode)(&value)) {
            debug!("{}: requesting {:?}", self.name, value);
            self.requested = Some(value);
            SetOutcome::Sent
        } else {
            debug!("{}: committed {:?} offline", self.name, value);
            self.confirmed = value;
            self.requested = None;
            SetOutcome::Committed
        }
    }

    /// Applies a device report. The device is the source of truth: whatever
    /// it reports becomes the confirmed value and ends any pending request.
    ///
    /// The first report after connecting is compared with the stored preset;
    /// a mismatch re-sends the preset.
    pub fn on_device_value(
        &mut self,
        value: T,
        bounds: Option<Bounds<T>>,
        link: &Link,
        store: &mut dyn PresetStore,
    ) -> Result<(), EventError> {
        if let Some(b) = bounds {
            if b.min > b.max {
                return Err(EventError::InvalidBounds {
                    setting: self.name,
                    min: format!("{:?}", b.min),
                    max: format!("{:?}", b.max),
                });
            }
            if let Some(entry) = &self.device_bounds {
                entry.save_device(store, &b);
            }
            self.bounds = Some(b);
        }

        match self.requested.take() {
            Some(r) if r == value => debug!("{}: {:?} confirmed", self.name, value),
            Some(r) => info!("{}: device reports {:?}, dropping request {:?}", self.name, value, r),
            None => {}
        }
        self.confirmed = value;

        if !self.reported {
            self.reported = true;
            let preset = self.preset.as_ref().and_then(|p| p.load_preset(store));
            if let Some(preset) = preset.map(|p| self.clamp(p)).filter(|p| *p != self.confirmed) {
                if link.send_command(&(self.encode)(&preset)) {
                    info!("{}: restoring preset {:?} over {:?}", self.name, preset, self.confirmed);
                    self.requested = Some(preset);
                } else {
                    // preset stays stored; the next report tries again
                    warn!("{}: preset {:?} not restored", self.name, preset);
                    self.reported = false;
                }
            }
        }
        Ok(())
    }

    pub fn on_connected(&mut self) {
        self.reported = false;
    }

    /// Commits any in-flight request: no confirmation can arrive anymore.
    pub fn on_disconnected(&mut self) {
        if let Some(r) = self.requested.take() {
            debug!("{}: committing {:?} on disconnect", self.name, r);
            self.confirmed = r;
        }
        self.reported = false;
    }

    fn clamp(&self, value: T) -> T {
        match &self.bounds {
            Some(b) if value < b.min => b.min.clone(),
            Some(b) if value > b.max => b.max.clone(),
            _ => value,
        }
    }
}
