use serde::{Deserialize, Serialize};
use skyctl_proto::event::FlyingState;
use skyctl_proto::Command;
use tracing::debug;

use crate::activation::ActivationState;
use crate::error::EventError;
use crate::link::Link;
use crate::setting::{Bounds, SetOutcome, Setting, SettingView};
use crate::store::{PresetStore, StorageEntry};

pub const NAMESPACE: &str = "manualCopter";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualView {
    pub state: ActivationState,
    pub max_pitch_roll: SettingView<f32>,
    pub max_pitch_roll_velocity: SettingView<f32>,
    pub max_vertical_speed: SettingView<f32>,
    pub max_yaw_rotation_speed: SettingView<f32>,
    /// `None` until the device says it supports banked turns.
    pub banked_turn_mode: Option<SettingView<bool>>,
    pub can_take_off: bool,
    pub can_land: bool,
}

impl ManualView {
    pub fn update_state(&mut self, state: ActivationState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn update_flying(&mut self, can_take_off: bool, can_land: bool) -> &mut Self {
        self.can_take_off = can_take_off;
        self.can_land = can_land;
        self
    }

    pub fn update_limit(&mut self, limit: Limit, view: SettingView<f32>) -> &mut Self {
        match limit {
            Limit::MaxPitchRoll => self.max_pitch_roll = view,
            Limit::MaxPitchRollVelocity => self.max_pitch_roll_velocity = view,
            Limit::MaxVerticalSpeed => self.max_vertical_speed = view,
            Limit::MaxYawRotationSpeed => self.max_yaw_rotation_speed = view,
        }
        self
    }

    pub fn update_banked_turn(&mut self, view: Option<SettingView<bool>>) -> &mut Self {
        self.banked_turn_mode = view;
        self
    }
}

/// Default piloting interface: sticks, take-off/landing and the limits the
/// drone applies to manual flight.
pub struct ManualCopter {
    connected: bool,
    current: bool,
    flying: Option<FlyingState>,
    max_pitch_roll: Setting<f32>,
    max_pitch_roll_velocity: Setting<f32>,
    max_vertical_speed: Setting<f32>,
    max_yaw_rotation_speed: Setting<f32>,
    banked_turn: Setting<bool>,
    banked_turn_supported: bool,
    banked_turn_supported_entry: StorageEntry<bool>,
}

impl Default for ManualCopter {
    fn default() -> Self {
        Self {
            connected: false,
            current: false,
            flying: None,
            max_pitch_roll: Setting::new("maxPitchRoll", 20.0, |v| Command::SetMaxTilt { value: *v }).stored(NAMESPACE),
            max_pitch_roll_velocity: Setting::new("maxPitchRollVelocity", 200.0, |v| {
                Command::SetMaxPitchRollRotationSpeed { value: *v }
            })
            .stored(NAMESPACE),
            max_vertical_speed: Setting::new("maxVerticalSpeed", 1.0, |v| Command::SetMaxVerticalSpeed { value: *v })
                .stored(NAMESPACE),
            max_yaw_rotation_speed: Setting::new("maxYawRotationSpeed", 60.0, |v| {
                Command::SetMaxRotationSpeed { value: *v }
            })
            .stored(NAMESPACE),
            banked_turn: Setting::new("bankedTurn", false, |v| Command::SetBankedTurn { enabled: *v }).stored(NAMESPACE),
            banked_turn_supported: false,
            banked_turn_supported_entry: StorageEntry::new(NAMESPACE, "bankedTurn.supported"),
        }
    }
}

/// Which speed/tilt limit a device report or user call refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    MaxPitchRoll,
    MaxPitchRollVelocity,
    MaxVerticalSpeed,
    MaxYawRotationSpeed,
}

const LIMITS: [Limit; 4] =
    [Limit::MaxPitchRoll, Limit::MaxPitchRollVelocity, Limit::MaxVerticalSpeed, Limit::MaxYawRotationSpeed];

impl ManualCopter {
    pub fn load(&mut self, store: &dyn PresetStore) {
        for limit in LIMITS {
            self.limit_mut(limit).load(store);
        }
        self.banked_turn.load(store);
        self.banked_turn_supported = self.banked_turn_supported_entry.load_device(store).unwrap_or(false);
    }

    pub fn state(&self) -> ActivationState {
        match (self.connected, self.current) {
            (false, _) => ActivationState::Unavailable,
            (true, true) => ActivationState::Active,
            (true, false) => ActivationState::Idle,
        }
    }

    /// Set by the activation policy.
    pub fn set_current(&mut self, current: bool) {
        self.current = current;
    }

    pub fn limit(&self, limit: Limit) -> &Setting<f32> {
        match limit {
            Limit::MaxPitchRoll => &self.max_pitch_roll,
            Limit::MaxPitchRollVelocity => &self.max_pitch_roll_velocity,
            Limit::MaxVerticalSpeed => &self.max_vertical_speed,
            Limit::MaxYawRotationSpeed => &self.max_yaw_rotation_speed,
        }
    }

    fn limit_mut(&mut self, limit: Limit) -> &mut Setting<f32> {
        match limit {
            Limit::MaxPitchRoll => &mut self.max_pitch_roll,
            Limit::MaxPitchRollVelocity => &mut self.max_pitch_roll_velocity,
            Limit::MaxVerticalSpeed => &mut self.max_vertical_speed,
            Limit::MaxYawRotationSpeed => &mut self.max_yaw_rotation_speed,
        }
    }

    pub fn banked_turn(&self) -> Option<&Setting<bool>> {
        self.banked_turn_supported.then_some(&self.banked_turn)
    }

    pub fn can_take_off(&self) -> bool {
        self.flying == Some(FlyingState::Landed)
    }

    pub fn can_land(&self) -> bool {
        matches!(self.flying, Some(FlyingState::TakingOff | FlyingState::Hovering | FlyingState::Flying))
    }

    /// Pushes the current values into an observer snapshot.
    pub fn sync_into(&self, view: &mut ManualView) {
        view.update_state(self.state())
            .update_flying(self.can_take_off(), self.can_land())
            .update_banked_turn(self.banked_turn().map(Setting::view));
        for limit in LIMITS {
            view.update_limit(limit, self.limit(limit).view());
        }
    }

    pub fn view(&self) -> ManualView {
        ManualView {
            state: self.state(),
            max_pitch_roll: self.max_pitch_roll.view(),
            max_pitch_roll_velocity: self.max_pitch_roll_velocity.view(),
            max_vertical_speed: self.max_vertical_speed.view(),
            max_yaw_rotation_speed: self.max_yaw_rotation_speed.view(),
            banked_turn_mode: self.banked_turn().map(Setting::view),
            can_take_off: self.can_take_off(),
            can_land: self.can_land(),
        }
    }

    pub fn on_connected(&mut self) {
        self.connected = true;
        for limit in LIMITS {
            self.limit_mut(limit).on_connected();
        }
        self.banked_turn.on_connected();
    }

    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.current = false;
        self.flying = None;
        for limit in LIMITS {
            self.limit_mut(limit).on_disconnected();
        }
        self.banked_turn.on_disconnected();
    }

    pub fn on_flying_state(&mut self, state: FlyingState) {
        self.flying = Some(state);
    }

    pub fn set_limit(&mut self, limit: Limit, value: f32, link: &Link, store: &mut dyn PresetStore) -> bool {
        self.limit_mut(limit).set(value, link, store) != SetOutcome::Unchanged
    }

    pub fn on_limit(
        &mut self,
        limit: Limit,
        current: f32,
        min: f32,
        max: f32,
        link: &Link,
        store: &mut dyn PresetStore,
    ) -> Result<(), EventError> {
        self.limit_mut(limit).on_device_value(current, Some(Bounds { min, max }), link, store)
    }

    pub fn set_banked_turn(&mut self, enabled: bool, link: &Link, store: &mut dyn PresetStore) -> bool {
        if !self.banked_turn_supported {
            debug!("banked turn not supported");
            return false;
        }
        self.banked_turn.set(enabled, link, store) != SetOutcome::Unchanged
    }

    pub fn on_banked_turn(&mut self, enabled: bool, link: &Link, store: &mut dyn PresetStore) -> Result<(), EventError> {
        if !self.banked_turn_supported {
            self.banked_turn_supported = true;
            self.banked_turn_supported_entry.save_device(store, &true);
        }
        self.banked_turn.on_device_value(enabled, None, link, store)
    }

    pub fn take_off(&self, link: &Link) -> bool {
        self.state() == ActivationState::Active && self.can_take_off() && link.send_command(&Command::TakeOff)
    }

    pub fn land(&self, link: &Link) -> bool {
        self.state() == ActivationState::Active && self.can_land() && link.send_command(&Command::Land)
    }

    /// Cuts the motors whatever the interface state.
    pub fn emergency_cut_out(&self, link: &Link) -> bool {
        self.connected && link.send_command(&Command::Emergency)
    }
}
