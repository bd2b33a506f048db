use thiserror::Error;

/// Error returned when parsing a typed tag (title type, episode category) from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseTagError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
