use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyctl_proto::{Codec, Event, MavlinkKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::activation::ActivationState;
use crate::capability::Component;
use crate::error::EventError;
use crate::flightplan::{self, FlightPlanOrchestrator, FlightPlanView};
use crate::guided::{Directive, GuidedTracker, GuidedView};
use crate::link::{Link, Transport};
use crate::look_at::{LookAt, LookAtView};
use crate::manual::{self, Limit, ManualCopter, ManualView};
use crate::pcmd::{clamp_axis, PcmdScheduler, Sticks};
use crate::policy::{ActivationPolicy, Admission, ItfKind, PendingActivation};
use crate::store::{NullStore, PresetStore};
use crate::upload::{PlanUploader, UploadResult};
use crate::SessionConfig;

/// Everything that can happen to a session, in the order it happened.
#[derive(Debug, Clone)]
pub enum SessionInput {
    Connected,
    Disconnected,
    Event(Event),
    UploadComplete(UploadResult),
    User(UserAction),
}

/// Calls client code can make on the capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    SetPitch { value: i32 },
    SetRoll { value: i32 },
    SetYawRotationSpeed { value: i32 },
    SetVerticalSpeed { value: i32 },
    SetLimit { limit: Limit, value: f32 },
    SetBankedTurn { enabled: bool },
    TakeOff,
    Land,
    EmergencyCutOut,
    ActivateManual,
    MoveTo { directive: Directive },
    StopGuided,
    UploadFlightPlan { file: PathBuf },
    ActivateFlightPlan {
        #[serde(default)]
        restart: bool,
    },
    DeactivateFlightPlan,
    SetReturnHomeOnDisconnect { enabled: bool },
    ActivateLookAt,
    DeactivateLookAt,
}

/// One device session: the sequential timeline every input goes through.
///
/// Inputs are applied one at a time by [`DroneSession::apply`]. After each
/// input the activation policy is settled, the piloting loop is armed or
/// disarmed, and every published capability gets at most one notification.
pub struct DroneSession {
    link: Link,
    store: Box<dyn PresetStore>,
    uploader: Box<dyn PlanUploader>,
    manual: ManualCopter,
    guided: GuidedTracker,
    flight_plan: FlightPlanOrchestrator,
    look_at: LookAt,
    policy: ActivationPolicy,
    pcmd: PcmdScheduler,
    manual_cap: Component<ManualView>,
    guided_cap: Component<GuidedView>,
    flight_plan_cap: Component<FlightPlanView>,
    look_at_cap: Component<LookAtView>,
}

impl DroneSession {
    pub fn new(
        config: &SessionConfig,
        codec: Arc<dyn Codec>,
        transport: Arc<dyn Transport>,
        store: Box<dyn PresetStore>,
        uploader: Box<dyn PlanUploader>,
    ) -> Self {
        let store: Box<dyn PresetStore> = if config.offline_settings { store } else { Box::new(NullStore) };

        let mut manual = ManualCopter::default();
        manual.load(store.as_ref());
        let mut flight_plan = FlightPlanOrchestrator::default();
        flight_plan.load(store.as_ref());
        let guided = GuidedTracker::default();
        let look_at = LookAt::default();

        let mut session = Self {
            link: Link::new(codec, transport),
            manual_cap: Component::new("manual copter", manual.view()),
            guided_cap: Component::new("guided", guided.view()),
            flight_plan_cap: Component::new("flight plan", flight_plan.view()),
            look_at_cap: Component::new("look-at", look_at.view()),
            store,
            uploader,
            manual,
            guided,
            flight_plan,
            look_at,
            policy: ActivationPolicy::default(),
            pcmd: PcmdScheduler::new(Duration::from_millis(config.pcmd_period_ms)),
        };
        // capabilities remembered from an earlier session are visible offline
        if session.store.has_device_settings(manual::NAMESPACE) {
            session.manual_cap.publish();
        }
        if session.store.has_device_settings(flightplan::NAMESPACE) {
            session.flight_plan_cap.publish();
        }
        session
    }

    /// Drains `inputs` until every sender is gone. A session still connected
    /// at that point is torn down so no piloting task outlives it.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> Self {
        while let Some(input) = inputs.recv().await {
            self.apply(input);
        }
        if self.link.is_connected() {
            self.apply(SessionInput::Disconnected);
        }
        info!("session inputs closed");
        self
    }

    pub fn apply(&mut self, input: SessionInput) {
        match input {
            SessionInput::Connected => self.on_connected(),
            SessionInput::Disconnected => self.on_disconnected(),
            SessionInput::Event(event) => {
                if !self.link.is_connected() {
                    debug!("{} dropped: offline", event.name());
                } else if let Err(e) = self.on_event(event) {
                    warn!("event dropped: {}", e);
                }
            }
            SessionInput::UploadComplete(result) => self.flight_plan.on_upload_complete(&result),
            SessionInput::User(action) => {
                self.run_action(action);
            }
        }
        self.settle();
    }

    /// Applies one user call and returns whether it was accepted: false when
    /// it was declined or changed nothing. A declined call has no effect.
    pub fn perform(&mut self, action: UserAction) -> bool {
        let accepted = self.run_action(action);
        self.settle();
        accepted
    }

    fn run_action(&mut self, action: UserAction) -> bool {
        let name = format!("{:?}", action);
        let accepted = self.dispatch_action(action);
        if !accepted {
            debug!("declined: {}", name);
        }
        accepted
    }

    fn dispatch_action(&mut self, action: UserAction) -> bool {
        match action {
            UserAction::SetPitch { value } => {
                self.stick(&[ItfKind::Manual, ItfKind::LookAt], |s| s.pitch = clamp_axis(value))
            }
            UserAction::SetRoll { value } => {
                self.stick(&[ItfKind::Manual, ItfKind::LookAt], |s| s.roll = clamp_axis(value))
            }
            UserAction::SetYawRotationSpeed { value } => self.stick(&[ItfKind::Manual], |s| s.yaw = clamp_axis(value)),
            UserAction::SetVerticalSpeed { value } => {
                self.stick(&[ItfKind::Manual, ItfKind::LookAt], |s| s.gaz = clamp_axis(value))
            }
            UserAction::SetLimit { limit, value } => {
                self.manual.set_limit(limit, value, &self.link, self.store.as_mut())
            }
            UserAction::SetBankedTurn { enabled } => {
                self.manual.set_banked_turn(enabled, &self.link, self.store.as_mut())
            }
            UserAction::TakeOff => self.manual.take_off(&self.link),
            UserAction::Land => self.manual.land(&self.link),
            UserAction::EmergencyCutOut => self.manual.emergency_cut_out(&self.link),
            UserAction::ActivateManual => self.activate(PendingActivation::Manual),
            UserAction::MoveTo { directive } => self.activate(PendingActivation::Guided(directive)),
            UserAction::StopGuided => self.guided.stop(&self.link),
            UserAction::UploadFlightPlan { file } => {
                self.flight_plan.upload(&file, &self.link, self.uploader.as_mut())
            }
            UserAction::ActivateFlightPlan { restart } => self.activate(PendingActivation::FlightPlan { restart }),
            UserAction::DeactivateFlightPlan => self.flight_plan.deactivate(&self.link),
            UserAction::SetReturnHomeOnDisconnect { enabled } => {
                self.flight_plan.set_return_home_on_disconnect(enabled, &self.link, self.store.as_mut())
            }
            UserAction::ActivateLookAt => self.activate(PendingActivation::LookAt),
            UserAction::DeactivateLookAt => self.look_at.deactivate(&self.link),
        }
    }

    /// Clears what is known about the device and hides every capability.
    pub fn forget(&mut self) {
        info!("forgetting device settings");
        self.store.clear_device_settings();
        self.manual_cap.unpublish();
        self.guided_cap.unpublish();
        self.flight_plan_cap.unpublish();
        self.look_at_cap.unpublish();
        self.settle();
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn current_interface(&self) -> ItfKind {
        self.policy.current()
    }

    pub fn manual(&self) -> &ManualCopter {
        &self.manual
    }

    pub fn guided(&self) -> &GuidedTracker {
        &self.guided
    }

    pub fn flight_plan(&self) -> &FlightPlanOrchestrator {
        &self.flight_plan
    }

    pub fn look_at(&self) -> &LookAt {
        &self.look_at
    }

    pub fn sticks(&self) -> Sticks {
        self.pcmd.sticks()
    }

    pub fn is_piloting_armed(&self) -> bool {
        self.pcmd.is_armed()
    }

    pub fn store(&self) -> &dyn PresetStore {
        self.store.as_ref()
    }

    pub fn manual_capability(&self) -> &Component<ManualView> {
        &self.manual_cap
    }

    pub fn guided_capability(&self) -> &Component<GuidedView> {
        &self.guided_cap
    }

    pub fn flight_plan_capability(&self) -> &Component<FlightPlanView> {
        &self.flight_plan_cap
    }

    pub fn look_at_capability(&self) -> &Component<LookAtView> {
        &self.look_at_cap
    }

    pub fn subscribe_manual(&self) -> watch::Receiver<Option<ManualView>> {
        self.manual_cap.subscribe()
    }

    pub fn subscribe_guided(&self) -> watch::Receiver<Option<GuidedView>> {
        self.guided_cap.subscribe()
    }

    pub fn subscribe_flight_plan(&self) -> watch::Receiver<Option<FlightPlanView>> {
        self.flight_plan_cap.subscribe()
    }

    pub fn subscribe_look_at(&self) -> watch::Receiver<Option<LookAtView>> {
        self.look_at_cap.subscribe()
    }

    fn on_connected(&mut self) {
        if self.link.is_connected() {
            return;
        }
        info!("device connected");
        self.link.set_connected(true);
        self.policy.reset();
        self.manual.on_connected();
        self.guided.on_connected();
        self.flight_plan.on_connected();
        self.look_at.on_connected();
        self.manual_cap.publish();
        self.guided_cap.publish();
        self.flight_plan_cap.publish();
        self.look_at_cap.publish();
    }

    fn on_disconnected(&mut self) {
        if !self.link.is_connected() {
            return;
        }
        info!("device disconnected");
        self.link.set_connected(false);
        self.pcmd.disarm();
        self.policy.reset();
        self.manual.on_disconnected();
        self.guided.on_disconnected();
        self.flight_plan.on_disconnected(self.uploader.as_mut());
        self.look_at.on_disconnected();

        if !self.store.has_device_settings(manual::NAMESPACE) {
            self.manual_cap.unpublish();
        }
        if !self.store.has_device_settings(flightplan::NAMESPACE) {
            self.flight_plan_cap.unpublish();
        }
        self.guided_cap.unpublish();
        self.look_at_cap.unpublish();
    }

    fn on_event(&mut self, event: Event) -> Result<(), EventError> {
        let name = event.name();
        match event {
            Event::FlyingStateChanged { state } => {
                let state = state.ok_or(EventError::MissingValue { event: name, field: "state" })?;
                self.manual.on_flying_state(state);
                self.guided.on_flying_state(state);
                self.look_at.on_flying_state(state);
            }
            Event::MoveToChanged { latitude, longitude, altitude, orientation, heading, status } => {
                self.guided.on_move_to_changed(latitude, longitude, altitude, orientation, heading, status);
            }
            Event::MoveByChanged { dx, dy, dz, dpsi, status } => {
                let status = status.ok_or(EventError::MissingValue { event: name, field: "status" })?;
                self.guided.on_move_by_changed(dx, dy, dz, dpsi, status);
            }
            Event::MoveByEnd { dx, dy, dz, dpsi, error } => {
                let error = error.ok_or(EventError::MissingValue { event: name, field: "error" })?;
                self.guided.on_move_by_end(dx, dy, dz, dpsi, error);
            }
            Event::MaxTiltChanged { current, min, max } => {
                self.manual.on_limit(Limit::MaxPitchRoll, current, min, max, &self.link, self.store.as_mut())?
            }
            Event::MaxPitchRollRotationSpeedChanged { current, min, max } => self.manual.on_limit(
                Limit::MaxPitchRollVelocity,
                current,
                min,
                max,
                &self.link,
                self.store.as_mut(),
            )?,
            Event::MaxVerticalSpeedChanged { current, min, max } => {
                self.manual.on_limit(Limit::MaxVerticalSpeed, current, min, max, &self.link, self.store.as_mut())?
            }
            Event::MaxRotationSpeedChanged { current, min, max } => {
                self.manual.on_limit(Limit::MaxYawRotationSpeed, current, min, max, &self.link, self.store.as_mut())?
            }
            Event::BankedTurnChanged { state } => {
                self.manual.on_banked_turn(state != 0, &self.link, self.store.as_mut())?
            }
            Event::ReturnHomeOnDisconnectChanged { state, is_read_only } => self.flight_plan.on_return_home_on_disconnect(
                state != 0,
                is_read_only != 0,
                &self.link,
                self.store.as_mut(),
            )?,
            Event::FlightPlanAvailability { available } => self.flight_plan.on_availability(available != 0),
            Event::FlightPlanComponentState { component, state } => {
                self.flight_plan.on_component(component, state != 0)?
            }
            Event::MavlinkFilePlayingStateChanged { state, filepath, kind } => {
                if kind == Some(MavlinkKind::MapMyHouse) {
                    debug!("playing state for {:?} ignored", kind);
                } else {
                    self.flight_plan.on_playing_state(state, &filepath, &self.link, self.uploader.as_mut())?;
                }
            }
            Event::MissionItemExecuted { idx } => self.flight_plan.on_mission_item_executed(idx),
            Event::FollowMeState { mode, behavior } => {
                let mode = mode.ok_or(EventError::MissingValue { event: name, field: "mode" })?;
                self.look_at.on_state(mode, behavior);
            }
            Event::FollowMeModeInfo { mode, missing_requirements, improvements } => {
                let mode = mode.ok_or(EventError::MissingValue { event: name, field: "mode" })?;
                self.look_at.on_mode_info(mode, missing_requirements, improvements);
            }
        }
        Ok(())
    }

    fn stick(&self, accepted_from: &[ItfKind], f: impl FnOnce(&mut Sticks)) -> bool {
        let current = self.policy.current();
        if !accepted_from.contains(&current) || !self.pcmd.is_armed() {
            debug!("stick input ignored while {:?} is current", current);
            return false;
        }
        self.pcmd.update_sticks(f);
        true
    }

    fn can_request(&self, request: &PendingActivation) -> bool {
        match request {
            PendingActivation::Manual => self.link.is_connected() && self.policy.current() != ItfKind::Manual,
            PendingActivation::Guided(_) => self.guided.can_start(),
            PendingActivation::FlightPlan { restart } => match self.flight_plan.state() {
                ActivationState::Idle => true,
                ActivationState::Active => *restart,
                ActivationState::Unavailable => false,
            },
            PendingActivation::LookAt => self.look_at.state() == ActivationState::Idle,
        }
    }

    fn activate(&mut self, request: PendingActivation) -> bool {
        if !self.can_request(&request) {
            return false;
        }
        match self.policy.request(request.clone()) {
            Admission::Proceed => self.dispatch(request),
            Admission::Deferred { deactivate } => {
                let sent = self.deactivate(deactivate);
                if !sent {
                    self.policy.cancel();
                }
                sent
            }
        }
    }

    fn dispatch(&mut self, request: PendingActivation) -> bool {
        match request {
            PendingActivation::Manual => false,
            PendingActivation::Guided(directive) => self.guided.start(directive, &self.link),
            PendingActivation::FlightPlan { restart } => self.flight_plan.activate(restart, &self.link),
            PendingActivation::LookAt => self.look_at.activate(&self.link),
        }
    }

    fn deactivate(&mut self, kind: ItfKind) -> bool {
        match kind {
            ItfKind::Manual => false,
            ItfKind::Guided => self.guided.stop(&self.link),
            ItfKind::FlightPlan => self.flight_plan.deactivate(&self.link),
            ItfKind::LookAt => self.look_at.deactivate(&self.link),
        }
    }

    fn settle(&mut self) {
        let before = self.policy.current();
        let states = [
            (ItfKind::Guided, self.guided.state()),
            (ItfKind::FlightPlan, self.flight_plan.state()),
            (ItfKind::LookAt, self.look_at.state()),
        ];
        let mut replay = None;
        for (kind, state) in states {
            if let Some(pending) = self.policy.on_state(kind, state) {
                replay = Some(pending);
            }
        }
        if let Some(pending) = replay {
            info!("replaying {:?} activation", pending.kind());
            if !self.dispatch(pending) {
                debug!("replayed activation declined");
            }
        }

        let current = self.policy.current();
        self.manual.set_current(current == ItfKind::Manual);
        if current != before {
            self.pcmd.set_sticks(Sticks::default());
        }

        let loop_wanted =
            self.link.is_connected() && (self.manual_cap.is_published() || self.look_at_cap.is_published());
        if loop_wanted {
            self.pcmd.arm(self.link.clone());
        } else {
            self.pcmd.disarm();
        }

        self.manual.sync_into(self.manual_cap.state_mut());
        self.manual_cap.notify_updated();
        self.guided.sync_into(self.guided_cap.state_mut());
        self.guided_cap.notify_updated();
        self.flight_plan.sync_into(self.flight_plan_cap.state_mut());
        self.flight_plan_cap.notify_updated();
        self.look_at.sync_into(self.look_at_cap.state_mut());
        self.look_at_cap.notify_updated();
    }
}
