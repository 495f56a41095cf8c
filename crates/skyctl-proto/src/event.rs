use serde::{Deserialize, Serialize};

use crate::codec::lenient;
use crate::{Feature, FollowMode, MavlinkKind, OrientationMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlyingState {
    Landed,
    TakingOff,
    Hovering,
    Flying,
    Landing,
    Emergency,
    UserTakeOff,
    MotorRamping,
    EmergencyLanding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveStatus {
    Running,
    Done,
    Canceled,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveByError {
    Ok,
    Unknown,
    Busy,
    NotAvailable,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayingState {
    Playing,
    Stopped,
    Paused,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPlanComponent {
    Gps,
    Calibration,
    MavlinkFile,
    Takeoff,
    WaypointsBeyondGeofence,
    CameraAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowBehavior {
    Idle,
    Follow,
    LookAt,
}

/// Decoded inbound message.
///
/// Enum-typed fields are `None` when the device sent a value this side does
/// not recognize; handlers skip the affected update instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    FlyingStateChanged {
        #[serde(default, deserialize_with = "lenient")]
        state: Option<FlyingState>,
    },
    MoveToChanged {
        latitude: f64,
        longitude: f64,
        altitude: f64,
        #[serde(default, deserialize_with = "lenient")]
        orientation: Option<OrientationMode>,
        heading: f32,
        #[serde(default, deserialize_with = "lenient")]
        status: Option<MoveStatus>,
    },
    /// Progress of a relative move; values are the requested displacement.
    MoveByChanged {
        dx: f32,
        dy: f32,
        dz: f32,
        dpsi: f32,
        #[serde(default, deserialize_with = "lenient")]
        status: Option<MoveStatus>,
    },
    /// End of a relative move; values are the displacement actually achieved.
    MoveByEnd {
        dx: f32,
        dy: f32,
        dz: f32,
        dpsi: f32,
        #[serde(default, deserialize_with = "lenient")]
        error: Option<MoveByError>,
    },
    MaxTiltChanged { current: f32, min: f32, max: f32 },
    MaxPitchRollRotationSpeedChanged { current: f32, min: f32, max: f32 },
    MaxVerticalSpeedChanged { current: f32, min: f32, max: f32 },
    MaxRotationSpeedChanged { current: f32, min: f32, max: f32 },
    BankedTurnChanged { state: u8 },
    ReturnHomeOnDisconnectChanged { state: u8, is_read_only: u8 },
    FlightPlanAvailability { available: u8 },
    FlightPlanComponentState {
        #[serde(default, deserialize_with = "lenient")]
        component: Option<FlightPlanComponent>,
        state: u8,
    },
    MavlinkFilePlayingStateChanged {
        #[serde(default, deserialize_with = "lenient")]
        state: Option<PlayingState>,
        filepath: String,
        #[serde(default, deserialize_with = "lenient")]
        kind: Option<MavlinkKind>,
    },
    MissionItemExecuted { idx: u32 },
    FollowMeState {
        #[serde(default, deserialize_with = "lenient")]
        mode: Option<FollowMode>,
        #[serde(default, deserialize_with = "lenient")]
        behavior: Option<FollowBehavior>,
    },
    FollowMeModeInfo {
        #[serde(default, deserialize_with = "lenient")]
        mode: Option<FollowMode>,
        missing_requirements: u32,
        improvements: u32,
    },
}

impl Event {
    pub fn feature(&self) -> Feature {
        match self {
            Event::FlyingStateChanged { .. } | Event::MoveToChanged { .. } | Event::MoveByChanged { .. } => {
                Feature::PilotingState
            }
            Event::MoveByEnd { .. } => Feature::PilotingEvent,
            Event::MaxTiltChanged { .. } | Event::BankedTurnChanged { .. } => Feature::PilotingSettingsState,
            Event::MaxPitchRollRotationSpeedChanged { .. }
            | Event::MaxVerticalSpeedChanged { .. }
            | Event::MaxRotationSpeedChanged { .. } => Feature::SpeedSettingsState,
            Event::ReturnHomeOnDisconnectChanged { .. } => Feature::FlightPlanSettingsState,
            Event::FlightPlanAvailability { .. } | Event::FlightPlanComponentState { .. } => Feature::FlightPlanState,
            Event::MavlinkFilePlayingStateChanged { .. } | Event::MissionItemExecuted { .. } => Feature::MavlinkState,
            Event::FollowMeState { .. } | Event::FollowMeModeInfo { .. } => Feature::FollowMe,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::FlyingStateChanged { .. } => "FlyingStateChanged",
            Event::MoveToChanged { .. } => "moveToChanged",
            Event::MoveByChanged { .. } => "moveByChanged",
            Event::MoveByEnd { .. } => "moveByEnd",
            Event::MaxTiltChanged { .. } => "MaxTiltChanged",
            Event::MaxPitchRollRotationSpeedChanged { .. } => "MaxPitchRollRotationSpeedChanged",
            Event::MaxVerticalSpeedChanged { .. } => "MaxVerticalSpeedChanged",
            Event::MaxRotationSpeedChanged { .. } => "MaxRotationSpeedChanged",
            Event::BankedTurnChanged { .. } => "BankedTurnChanged",
            Event::ReturnHomeOnDisconnectChanged { .. } => "ReturnHomeOnDisconnectChanged",
            Event::FlightPlanAvailability { .. } => "AvailabilityStateChanged",
            Event::FlightPlanComponentState { .. } => "ComponentStateListChanged",
            Event::MavlinkFilePlayingStateChanged { .. } => "MavlinkFilePlayingStateChanged",
            Event::MissionItemExecuted { .. } => "MissionItemExecuted",
            Event::FollowMeState { .. } => "state",
            Event::FollowMeModeInfo { .. } => "mode_info",
        }
    }
}
