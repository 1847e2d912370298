/// Errors that can occur during deck operations
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// No matching device was enumerated, or opening it failed
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Any failure reported by the underlying transport
    #[error("transport error: {0}")]
    Transport(String),

    /// Key index, brightness or image outside of the accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not valid in the current lifecycle state
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

impl From<hidapi::HidError> for DeckError {
    fn from(e: hidapi::HidError) -> Self {
        DeckError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
