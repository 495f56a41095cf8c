/// Why an inbound event was dropped without touching session state.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EventError {
    #[error("{setting}: bounds rejected, min {min} > max {max}")]
    InvalidBounds { setting: &'static str, min: String, max: String },

    #[error("{event}: mandatory field `{field}` missing or unrecognized")]
    MissingValue { event: &'static str, field: &'static str },
}
