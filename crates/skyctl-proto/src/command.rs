use serde::{Deserialize, Serialize};

use crate::{Feature, FollowMode, MavlinkKind, MoveSpeed, OrientationMode};

/// Outbound request to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Periodic stick snapshot. Sent without acknowledgement.
    Pcmd {
        flag: u8,
        roll: i8,
        pitch: i8,
        yaw: i8,
        gaz: i8,
        seq: u32,
    },
    TakeOff,
    Land,
    Emergency,
    MoveTo {
        latitude: f64,
        longitude: f64,
        altitude: f64,
        orientation: OrientationMode,
        heading: f32,
        speed: Option<MoveSpeed>,
    },
    CancelMoveTo,
    /// Relative move; `dpsi` is in radians.
    MoveBy {
        dx: f32,
        dy: f32,
        dz: f32,
        dpsi: f32,
        speed: Option<MoveSpeed>,
    },
    SetMaxTilt { value: f32 },
    SetMaxPitchRollRotationSpeed { value: f32 },
    SetMaxVerticalSpeed { value: f32 },
    SetMaxRotationSpeed { value: f32 },
    SetBankedTurn { enabled: bool },
    SetReturnHomeOnDisconnect { enabled: bool },
    MavlinkStart { file: String, kind: MavlinkKind },
    MavlinkPause,
    MavlinkStop,
    FollowMeStart { mode: FollowMode },
    FollowMeStop,
}

impl Command {
    pub fn feature(&self) -> Feature {
        match self {
            Command::Pcmd { .. }
            | Command::TakeOff
            | Command::Land
            | Command::Emergency
            | Command::MoveTo { .. }
            | Command::CancelMoveTo
            | Command::MoveBy { .. } => Feature::Piloting,
            Command::SetMaxTilt { .. } | Command::SetBankedTurn { .. } => Feature::PilotingSettings,
            Command::SetMaxPitchRollRotationSpeed { .. }
            | Command::SetMaxVerticalSpeed { .. }
            | Command::SetMaxRotationSpeed { .. } => Feature::SpeedSettings,
            Command::SetReturnHomeOnDisconnect { .. } => Feature::FlightPlanSettings,
            Command::MavlinkStart { .. } | Command::MavlinkPause | Command::MavlinkStop => Feature::Mavlink,
            Command::FollowMeStart { .. } | Command::FollowMeStop => Feature::FollowMe,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Pcmd { .. } => "PCMD",
            Command::TakeOff => "TakeOff",
            Command::Land => "Landing",
            Command::Emergency => "Emergency",
            Command::MoveTo { .. } => "moveTo",
            Command::CancelMoveTo => "CancelMoveTo",
            Command::MoveBy { .. } => "moveBy",
            Command::SetMaxTilt { .. } => "MaxTilt",
            Command::SetMaxPitchRollRotationSpeed { .. } => "MaxPitchRollRotationSpeed",
            Command::SetMaxVerticalSpeed { .. } => "MaxVerticalSpeed",
            Command::SetMaxRotationSpeed { .. } => "MaxRotationSpeed",
            Command::SetBankedTurn { .. } => "BankedTurn",
            Command::SetReturnHomeOnDisconnect { .. } => "ReturnHomeOnDisconnect",
            Command::MavlinkStart { .. } => "Start",
            Command::MavlinkPause => "Pause",
            Command::MavlinkStop => "Stop",
            Command::FollowMeStart { .. } => "start",
            Command::FollowMeStop => "stop",
        }
    }

    /// Piloting commands are fire-and-forget, everything else is acknowledged.
    pub fn ack_required(&self) -> bool {
        !matches!(self, Command::Pcmd { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcmd_is_unacknowledged() {
        let pcmd = Command::Pcmd { flag: 0, roll: 0, pitch: 0, yaw: 0, gaz: 0, seq: 1 };
        assert!(!pcmd.ack_required());
        assert!(Command::MavlinkStop.ack_required());
        assert!(Command::TakeOff.ack_required());
    }

    #[test]
    fn test_feature_routing() {
        assert_eq!(Command::MavlinkStart { file: "p1".into(), kind: MavlinkKind::FlightPlan }.feature(), Feature::Mavlink);
        assert_eq!(Command::SetMaxVerticalSpeed { value: 1.0 }.feature(), Feature::SpeedSettings);
        assert_eq!(Command::SetMaxTilt { value: 10.0 }.feature(), Feature::PilotingSettings);
        assert_eq!(Command::FollowMeStop.feature(), Feature::FollowMe);
    }
}
