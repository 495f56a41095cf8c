//! Wire-level vocabulary shared between the control plane and the codec.
//!
//! Inbound messages are decoded into [`Event`]s, outbound requests are built
//! as [`Command`]s. Both are keyed by a [`Feature`] and a message name; the
//! byte layout behind them belongs to whatever [`Codec`] the link uses.

pub mod codec;
pub mod command;
pub mod event;

pub use codec::{Codec, CodecError, JsonCodec};
pub use command::Command;
pub use event::Event;

use serde::{Deserialize, Serialize};

/// Latitude/longitude/altitude value the device sends when a coordinate is unknown.
pub const UNKNOWN_COORDINATE: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Piloting,
    PilotingState,
    PilotingEvent,
    PilotingSettings,
    PilotingSettingsState,
    SpeedSettings,
    SpeedSettingsState,
    Mavlink,
    MavlinkState,
    FlightPlanState,
    FlightPlanSettings,
    FlightPlanSettingsState,
    FollowMe,
}

impl Feature {
    /// Numeric feature id as carried in the frame header.
    pub fn id(self) -> u16 {
        match self {
            Feature::Piloting => 0x0100,
            Feature::PilotingState => 0x0104,
            Feature::PilotingEvent => 0x0122,
            Feature::PilotingSettings => 0x0102,
            Feature::PilotingSettingsState => 0x0106,
            Feature::SpeedSettings => 0x010b,
            Feature::SpeedSettingsState => 0x010c,
            Feature::Mavlink => 0x000b,
            Feature::MavlinkState => 0x000c,
            Feature::FlightPlanState => 0x0011,
            Feature::FlightPlanSettings => 0x0020,
            Feature::FlightPlanSettingsState => 0x0021,
            Feature::FollowMe => 0x2f00,
        }
    }
}

// ----- Enumerations shared by commands and events -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationMode {
    None,
    ToTarget,
    HeadingStart,
    HeadingDuring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MavlinkKind {
    FlightPlan,
    MapMyHouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowMode {
    None,
    LookAt,
    Geographic,
    Relative,
}

/// Speed limits attached to a guided move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSpeed {
    pub horizontal: f32,
    pub vertical: f32,
    pub yaw_rotation: f32,
}
