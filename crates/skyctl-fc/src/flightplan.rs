use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skyctl_proto::event::{FlightPlanComponent, PlayingState};
use skyctl_proto::{Command, MavlinkKind};
use tracing::{debug, info, warn};

use crate::activation::{Activation, ActivationState};
use crate::error::EventError;
use crate::link::Link;
use crate::setting::{Setting, SettingView};
use crate::store::{PresetStore, StorageEntry};
use crate::upload::{PlanUploader, TransferStatus, UploadResult, UploadToken};

pub const NAMESPACE: &str = "flightPlan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPlanReason {
    DroneGpsInfoInaccurate,
    DroneNotCalibrated,
    CannotTakeOff,
    MissingFlightPlanFile,
    CameraUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationError {
    None,
    IncorrectFlightPlanFile,
    WaypointBeyondGeofence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    None,
    Uploading,
    Uploaded(String),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing(String),
    Paused(String),
}

/// Work queued behind a stop request.
#[derive(Debug, Clone, PartialEq)]
enum PendingIntent {
    None,
    RestartAfterStop(String),
    UploadAfterStop(PathBuf),
}

/// Snapshot handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightPlanView {
    pub state: ActivationState,
    pub reasons: BTreeSet<FlightPlanReason>,
    pub upload_state: UploadState,
    pub activation_error: ActivationError,
    pub file_known: bool,
    pub is_paused: bool,
    pub mission_item_executed: Option<u32>,
    pub return_home_on_disconnect: SettingView<bool>,
    pub return_home_on_disconnect_mutable: bool,
}

impl FlightPlanView {
    pub fn update_state(&mut self, state: ActivationState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn update_reasons(&mut self, reasons: &BTreeSet<FlightPlanReason>) -> &mut Self {
        self.reasons.clone_from(reasons);
        self
    }

    pub fn update_upload_state(&mut self, upload_state: &UploadState) -> &mut Self {
        self.upload_state.clone_from(upload_state);
        self
    }

    pub fn update_activation_error(&mut self, error: ActivationError) -> &mut Self {
        self.activation_error = error;
        self
    }

    pub fn update_file_known(&mut self, known: bool) -> &mut Self {
        self.file_known = known;
        self
    }

    pub fn update_paused(&mut self, paused: bool) -> &mut Self {
        self.is_paused = paused;
        self
    }

    pub fn update_mission_item(&mut self, item: Option<u32>) -> &mut Self {
        self.mission_item_executed = item;
        self
    }

    pub fn update_return_home_on_disconnect(&mut self, view: SettingView<bool>, mutable: bool) -> &mut Self {
        self.return_home_on_disconnect = view;
        self.return_home_on_disconnect_mutable = mutable;
        self
    }
}

/// Upload, playback and activation of mavlink flight plans.
///
/// Three sources feed it: user calls, upload completions and device
/// playback events. Anything that needs the plan stopped first (restart,
/// upload while playing) is parked as a [`PendingIntent`] and resumed when
/// the device reports `Stopped`.
pub struct FlightPlanOrchestrator {
    activation: Activation<FlightPlanReason>,
    upload: UploadState,
    playback: PlaybackState,
    intent: PendingIntent,
    known: bool,
    plan_id: Option<String>,
    component_reasons: BTreeSet<FlightPlanReason>,
    activation_error: ActivationError,
    mission_item: Option<u32>,
    token: Option<UploadToken>,
    next_token: u64,
    return_home: Setting<bool>,
    return_home_mutable: bool,
    return_home_mutable_entry: StorageEntry<bool>,
}

impl Default for FlightPlanOrchestrator {
    fn default() -> Self {
        Self {
            activation: Activation::new("flight plan", true),
            upload: UploadState::None,
            playback: PlaybackState::Stopped,
            intent: PendingIntent::None,
            known: false,
            plan_id: None,
            component_reasons: BTreeSet::new(),
            activation_error: ActivationError::None,
            mission_item: None,
            token: None,
            next_token: 1,
            return_home: Setting::new("returnHomeOnDisconnect", false, |v| Command::SetReturnHomeOnDisconnect {
                enabled: *v,
            })
            .stored(NAMESPACE),
            return_home_mutable: true,
            return_home_mutable_entry: StorageEntry::new(NAMESPACE, "returnHomeOnDisconnect.mutable"),
        }
    }
}

impl FlightPlanOrchestrator {
    pub fn load(&mut self, store: &dyn PresetStore) {
        self.return_home.load(store);
        self.return_home_mutable = self.return_home_mutable_entry.load_device(store).unwrap_or(true);
    }

    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    pub fn reasons(&self) -> &BTreeSet<FlightPlanReason> {
        self.activation.reasons()
    }

    pub fn upload_state(&self) -> &UploadState {
        &self.upload
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn is_file_known(&self) -> bool {
        self.known
    }

    /// Paused only counts for a plan we know.
    pub fn is_paused(&self) -> bool {
        self.known && matches!(self.playback, PlaybackState::Paused(_))
    }

    pub fn activation_error(&self) -> ActivationError {
        self.activation_error
    }

    pub fn mission_item_executed(&self) -> Option<u32> {
        self.mission_item
    }

    pub fn return_home_on_disconnect(&self) -> &Setting<bool> {
        &self.return_home
    }

    pub fn sync_into(&self, view: &mut FlightPlanView) {
        view.update_state(self.state())
            .update_reasons(self.reasons())
            .update_upload_state(&self.upload)
            .update_activation_error(self.activation_error)
            .update_file_known(self.known)
            .update_paused(self.is_paused())
            .update_mission_item(self.mission_item)
            .update_return_home_on_disconnect(self.return_home.view(), self.return_home_mutable);
    }

    pub fn view(&self) -> FlightPlanView {
        FlightPlanView {
            state: self.state(),
            reasons: self.reasons().clone(),
            upload_state: self.upload.clone(),
            activation_error: self.activation_error,
            file_known: self.known,
            is_paused: self.is_paused(),
            mission_item_executed: self.mission_item,
            return_home_on_disconnect: self.return_home.view(),
            return_home_on_disconnect_mutable: self.return_home_mutable,
        }
    }

    pub fn on_connected(&mut self) {
        self.reset_live();
        self.return_home.on_connected();
        self.activation.set_connected(true);
        self.recompute();
    }

    pub fn on_disconnected(&mut self, uploader: &mut dyn PlanUploader) {
        if let Some(t) = self.token.take() {
            uploader.cancel(t);
        }
        self.reset_live();
        self.return_home.on_disconnected();
        self.activation.set_connected(false);
    }

    fn reset_live(&mut self) {
        self.upload = UploadState::None;
        self.playback = PlaybackState::Stopped;
        self.intent = PendingIntent::None;
        self.known = false;
        self.plan_id = None;
        self.component_reasons.clear();
        self.activation_error = ActivationError::None;
        self.mission_item = None;
        self.token = None;
    }

    /// Uploads `file`, stopping the current plan first if one is loaded.
    pub fn upload(&mut self, file: &Path, link: &Link, uploader: &mut dyn PlanUploader) -> bool {
        if !self.activation.is_connected() {
            debug!("flight plan upload declined: offline");
            return false;
        }
        if let Some(prev) = self.token.take() {
            info!("flight plan upload {:?} superseded", prev);
            uploader.cancel(prev);
        }
        let token = UploadToken(self.next_token);
        self.next_token += 1;
        self.token = Some(token);
        self.upload = UploadState::Uploading;

        if self.playback == PlaybackState::Stopped {
            self.intent = PendingIntent::None;
            info!("flight plan upload {:?}: {}", token, file.display());
            uploader.upload(file, token);
        } else {
            // a stop is already on its way for a pending intent
            if self.intent == PendingIntent::None {
                link.send_command(&Command::MavlinkStop);
            }
            info!("flight plan upload {:?} waits for stop", token);
            self.intent = PendingIntent::UploadAfterStop(file.to_path_buf());
        }
        true
    }

    pub fn on_upload_complete(&mut self, result: &UploadResult) {
        if self.token != Some(result.token) {
            debug!("stale upload completion {:?} ignored", result.token);
            return;
        }
        self.token = None;
        match (&result.status, &result.plan_id) {
            (TransferStatus::Success, Some(id)) => {
                info!("flight plan uploaded as {}", id);
                self.upload = UploadState::Uploaded(id.clone());
                self.plan_id = Some(id.clone());
                self.known = true;
                if matches!(self.intent, PendingIntent::UploadAfterStop(_)) {
                    self.intent = PendingIntent::None;
                }
            }
            (status, _) => {
                warn!("flight plan upload failed: {:?} http={:?}", status, result.http_code);
                self.upload = UploadState::Failed;
                self.plan_id = None;
                self.known = false;
            }
        }
        self.recompute();
    }

    /// Starts or resumes the uploaded plan; `restart` stops it first so it
    /// plays from the beginning.
    pub fn activate(&mut self, restart: bool, link: &Link) -> bool {
        let state = self.state();
        if !(state == ActivationState::Idle || (restart && state == ActivationState::Active)) {
            debug!("flight plan activate declined in {:?}", state);
            return false;
        }
        let UploadState::Uploaded(id) = &self.upload else {
            debug!("flight plan activate declined: nothing uploaded");
            return false;
        };
        if !self.known {
            debug!("flight plan activate declined: plan unknown to the device");
            return false;
        }
        let id = id.clone();
        self.activation_error = ActivationError::None;

        match (&self.playback, restart) {
            (PlaybackState::Stopped, _) | (PlaybackState::Paused(_), false) => start(&id, link),
            (PlaybackState::Playing(_) | PlaybackState::Paused(_), true) => {
                let sent = link.send_command(&Command::MavlinkStop);
                if sent {
                    self.intent = PendingIntent::RestartAfterStop(id);
                }
                sent
            }
            (PlaybackState::Playing(_), false) => false,
        }
    }

    pub fn deactivate(&mut self, link: &Link) -> bool {
        self.activation.can_deactivate() && link.send_command(&Command::MavlinkPause)
    }

    pub fn on_playing_state(
        &mut self,
        state: Option<PlayingState>,
        filepath: &str,
        link: &Link,
        uploader: &mut dyn PlanUploader,
    ) -> Result<(), EventError> {
        let state = state.ok_or(EventError::MissingValue { event: "MavlinkFilePlayingStateChanged", field: "state" })?;
        let matches = self.plan_id.as_deref() == Some(filepath);
        match state {
            PlayingState::Playing => {
                if self.playback == PlaybackState::Stopped {
                    self.mission_item = None;
                }
                self.known = matches;
                self.playback = PlaybackState::Playing(filepath.to_string());
            }
            PlayingState::Paused => {
                self.known = matches;
                self.playback = PlaybackState::Paused(filepath.to_string());
            }
            PlayingState::Stopped | PlayingState::Loaded => {
                if !filepath.is_empty() && !matches {
                    self.known = false;
                }
                self.playback = PlaybackState::Stopped;
                self.resume_intent(link, uploader);
            }
        }
        self.recompute();
        Ok(())
    }

    fn resume_intent(&mut self, link: &Link, uploader: &mut dyn PlanUploader) {
        match std::mem::replace(&mut self.intent, PendingIntent::None) {
            PendingIntent::None => {}
            PendingIntent::RestartAfterStop(id) => {
                if self.known && self.plan_id.as_deref() == Some(id.as_str()) {
                    info!("flight plan {} restarting", id);
                    start(&id, link);
                } else {
                    info!("flight plan {} restart dropped: plan changed", id);
                }
            }
            PendingIntent::UploadAfterStop(file) => match self.token {
                Some(token) => {
                    info!("flight plan upload {:?}: {}", token, file.display());
                    uploader.upload(&file, token);
                }
                None => debug!("deferred upload already resolved"),
            },
        }
    }

    pub fn on_availability(&mut self, available: bool) {
        if available {
            self.component_reasons.clear();
        }
        self.activation.set_available(available);
        self.recompute();
    }

    pub fn on_component(&mut self, component: Option<FlightPlanComponent>, ok: bool) -> Result<(), EventError> {
        let component =
            component.ok_or(EventError::MissingValue { event: "ComponentStateListChanged", field: "component" })?;
        let reason = match component {
            FlightPlanComponent::Gps => Some(FlightPlanReason::DroneGpsInfoInaccurate),
            FlightPlanComponent::Calibration => Some(FlightPlanReason::DroneNotCalibrated),
            FlightPlanComponent::Takeoff => Some(FlightPlanReason::CannotTakeOff),
            FlightPlanComponent::CameraAvailable => Some(FlightPlanReason::CameraUnavailable),
            FlightPlanComponent::MavlinkFile => {
                self.flag_error(ActivationError::IncorrectFlightPlanFile, ok);
                None
            }
            FlightPlanComponent::WaypointsBeyondGeofence => {
                self.flag_error(ActivationError::WaypointBeyondGeofence, ok);
                None
            }
        };
        if let Some(reason) = reason {
            if ok {
                self.component_reasons.remove(&reason);
            } else {
                self.component_reasons.insert(reason);
            }
        }
        self.recompute();
        Ok(())
    }

    /// Plan-file problems surface as an activation error only; the
    /// interface keeps its state.
    fn flag_error(&mut self, error: ActivationError, ok: bool) {
        if !ok {
            self.activation_error = error;
        } else if self.activation_error == error {
            self.activation_error = ActivationError::None;
        }
    }

    pub fn on_mission_item_executed(&mut self, idx: u32) {
        self.mission_item = Some(idx);
    }

    pub fn set_return_home_on_disconnect(&mut self, enabled: bool, link: &Link, store: &mut dyn PresetStore) -> bool {
        if !self.return_home_mutable {
            debug!("return home on disconnect is read-only on this device");
            return false;
        }
        self.return_home.set(enabled, link, store) != crate::setting::SetOutcome::Unchanged
    }

    pub fn on_return_home_on_disconnect(
        &mut self,
        enabled: bool,
        read_only: bool,
        link: &Link,
        store: &mut dyn PresetStore,
    ) -> Result<(), EventError> {
        self.return_home_mutable = !read_only;
        self.return_home_mutable_entry.save_device(store, &self.return_home_mutable);
        self.return_home.on_device_value(enabled, None, link, store)
    }

    fn recompute(&mut self) {
        let playing = matches!(self.playback, PlaybackState::Playing(_));
        let mut reasons = BTreeSet::new();
        if !playing {
            reasons.extend(self.component_reasons.iter().copied());
            if !self.known {
                reasons.insert(FlightPlanReason::MissingFlightPlanFile);
            }
        }
        self.activation.replace_reasons(reasons);
        self.activation.set_engaged(playing);
    }
}

fn start(id: &str, link: &Link) -> bool {
    link.send_command(&Command::MavlinkStart { file: id.to_string(), kind: MavlinkKind::FlightPlan })
}
