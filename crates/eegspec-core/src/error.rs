//! Error types for recordings and the recording store.

use thiserror::Error;

use crate::store::RecordingId;

/// Errors raised while building or reading recordings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The recording failed structural validation at construction.
    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// A channel label or index does not exist in the recording.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// The store holds no recording under this id (never loaded or evicted).
    #[error("recording not found: {0}")]
    MissingRecording(RecordingId),

    /// A filter could not be designed for the requested edges.
    #[error("invalid filter design: {0}")]
    InvalidFilter(String),

    /// A sample read started past the end of the channel.
    #[error("read offset {offset} is past the end of a {len}-sample channel")]
    OutOfBounds {
        /// Requested offset (relative to the view).
        offset: usize,
        /// Number of samples available in the view.
        len: usize,
    },
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = CoreError::ChannelNotFound("Oz".into());
        assert_eq!(err.to_string(), "channel not found: Oz");

        let err = CoreError::MissingRecording(RecordingId::from_raw(7));
        assert_eq!(err.to_string(), "recording not found: rec-7");

        let err = CoreError::OutOfBounds { offset: 12, len: 10 };
        assert!(err.to_string().contains("offset 12"));
    }
}
