use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Command, Event};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame header says feature {header:#06x} but body belongs to {body:#06x}")]
    FeatureMismatch { header: u16, body: u16 },
}

/// Turns commands into wire frames.
pub trait Codec: Send + Sync {
    fn encode(&self, command: &Command) -> Bytes;
}

#[derive(Serialize, Deserialize)]
struct Frame<T> {
    feature: u16,
    name: String,
    body: T,
}

/// Self-describing JSON framing, one object per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn decode_command(&self, frame: &[u8]) -> Result<Command, CodecError> {
        let f: Frame<Command> = serde_json::from_slice(frame)?;
        check_feature(f.feature, f.body.feature().id())?;
        Ok(f.body)
    }

    pub fn decode_event(&self, frame: &[u8]) -> Result<Event, CodecError> {
        let f: Frame<Event> = serde_json::from_slice(frame)?;
        check_feature(f.feature, f.body.feature().id())?;
        Ok(f.body)
    }

    pub fn encode_event(&self, event: &Event) -> Bytes {
        to_frame(event.feature().id(), event.name(), event)
    }
}

impl Codec for JsonCodec {
    fn encode(&self, command: &Command) -> Bytes {
        to_frame(command.feature().id(), command.name(), command)
    }
}

fn to_frame<T: Serialize>(feature: u16, name: &str, body: &T) -> Bytes {
    let frame = Frame { feature, name: name.to_string(), body };
    // serializing plain data enums into a Vec cannot fail
    Bytes::from(serde_json::to_vec(&frame).unwrap_or_default())
}

fn check_feature(header: u16, body: u16) -> Result<(), CodecError> {
    if header != body {
        return Err(CodecError::FeatureMismatch { header, body });
    }
    Ok(())
}

/// Deserializes an optional field, mapping unrecognized values to `None`.
pub(crate) fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(serde_json::from_value(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{FlyingState, PlayingState};

    #[test]
    fn test_unknown_enum_value_decodes_as_none() {
        let raw = br#"{"feature":260,"name":"FlyingStateChanged","body":{"event":"flying_state_changed","state":"warp_speed"}}"#;
        let ev = JsonCodec.decode_event(raw).unwrap();
        assert_eq!(ev, Event::FlyingStateChanged { state: None });
    }

    #[test]
    fn test_known_enum_value_decodes() {
        let ev = Event::FlyingStateChanged { state: Some(FlyingState::Hovering) };
        let frame = JsonCodec.encode_event(&ev);
        assert_eq!(JsonCodec.decode_event(&frame).unwrap(), ev);
    }

    #[test]
    fn test_feature_mismatch_rejected() {
        let raw = br#"{"feature":1,"name":"x","body":{"cmd":"mavlink_stop"}}"#;
        let err = JsonCodec.decode_command(raw).unwrap_err();
        assert!(matches!(err, CodecError::FeatureMismatch { header: 1, .. }));
    }

    #[test]
    fn test_missing_mandatory_field_is_malformed() {
        let raw = br#"{"feature":12,"name":"MavlinkFilePlayingStateChanged","body":{"event":"mavlink_file_playing_state_changed","state":"playing"}}"#;
        assert!(matches!(JsonCodec.decode_event(raw), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_frame_header_carries_feature_and_name() {
        let frame = JsonCodec.encode(&Command::MavlinkStop);
        let v: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(v["feature"], crate::Feature::Mavlink.id());
        assert_eq!(v["name"], "Stop");
        let ev = Event::MavlinkFilePlayingStateChanged {
            state: Some(PlayingState::Stopped),
            filepath: String::new(),
            kind: None,
        };
        assert_eq!(JsonCodec.decode_event(&JsonCodec.encode_event(&ev)).unwrap(), ev);
    }
}
