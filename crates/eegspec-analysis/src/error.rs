//! Error type for analysis operations.

use eegspec_core::{CoreError, RecordingId};
use thiserror::Error;

/// Errors raised by analysis primitives and the comparison engine.
///
/// Degenerate numeric outcomes (zero noise power, zero total power) are not
/// errors; they surface as `None` in the result types.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A parameter is out of range or inconsistent with the input.
    #[error("invalid parameter `{param}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        param: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A referenced recording is not loaded.
    #[error("recording not found: {0}")]
    MissingRecording(RecordingId),

    /// A selected channel does not exist.
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// The primitive received no samples.
    #[error("signal is empty")]
    EmptySignal,

    /// The caller cancelled a multi-step computation.
    #[error("analysis cancelled")]
    Cancelled,

    /// Any other core failure.
    #[error(transparent)]
    Core(CoreError),
}

impl AnalysisError {
    /// Build an [`AnalysisError::InvalidParameter`].
    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for AnalysisError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingRecording(id) => Self::MissingRecording(id),
            CoreError::ChannelNotFound(name) => Self::ChannelNotFound(name),
            CoreError::InvalidFilter(reason) => Self::invalid("filter", reason),
            other => Self::Core(other),
        }
    }
}

/// Result alias for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
