//! Analysis results and structured errors.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use eegspec_analysis::AnalysisError;
use eegspec_core::AppliedWindow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::render::RenderError;
use crate::request::AnalysisKind;

/// Error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A parameter, channel or window was rejected
    InvalidParameter,
    /// A referenced recording is not loaded
    MissingRecording,
    /// A value could not be computed (zero noise, zero total power)
    ComputationDegenerate,
    /// A primitive received no samples
    EmptySignal,
    /// The caller cancelled the call
    Cancelled,
    /// The numbers were computed but the image was not
    Render,
}

/// A failure or a non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    /// Category
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl ResultError {
    /// Build an error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A degenerate-value note.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ComputationDegenerate, message)
    }
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<AnalysisError> for ResultError {
    fn from(err: AnalysisError) -> Self {
        let kind = match &err {
            AnalysisError::InvalidParameter { .. } | AnalysisError::ChannelNotFound(_) => {
                ErrorKind::InvalidParameter
            }
            AnalysisError::MissingRecording(_) => ErrorKind::MissingRecording,
            AnalysisError::EmptySignal => ErrorKind::EmptySignal,
            AnalysisError::Cancelled => ErrorKind::Cancelled,
            AnalysisError::Core(_) => ErrorKind::InvalidParameter,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<RenderError> for ResultError {
    fn from(err: RenderError) -> Self {
        Self::new(ErrorKind::Render, err.to_string())
    }
}

/// Outcome of one engine call
///
/// Owned by the caller; the engine keeps nothing. `success == false` always
/// comes with `error`. Non-fatal findings (skipped traces, undefined values,
/// clamped windows, render failures) are listed in `notes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// What was computed
    pub kind: AnalysisKind,
    /// True when `payload` holds a result
    pub success: bool,
    /// Kind-specific numbers; `null` on failure
    pub payload: Value,
    /// PNG bytes, base64 in serialized form
    #[serde(
        default,
        serialize_with = "png_to_base64",
        deserialize_with = "png_from_base64"
    )]
    pub image: Option<Vec<u8>>,
    /// The parameters the call ran with
    pub parameters: Value,
    /// Window actually analysed, after clamping
    #[serde(default)]
    pub window: Option<AppliedWindow>,
    /// Non-fatal findings
    #[serde(default)]
    pub notes: Vec<ResultError>,
    /// Why the call failed
    #[serde(default)]
    pub error: Option<ResultError>,
}

impl AnalysisResult {
    /// A successful result without image.
    pub fn success(kind: AnalysisKind, payload: Value, parameters: Value) -> Self {
        Self {
            kind,
            success: true,
            payload,
            image: None,
            parameters,
            window: None,
            notes: Vec::new(),
            error: None,
        }
    }

    /// A failed result.
    pub fn failure(kind: AnalysisKind, parameters: Value, error: ResultError) -> Self {
        Self {
            kind,
            success: false,
            payload: Value::Null,
            image: None,
            parameters,
            window: None,
            notes: Vec::new(),
            error: Some(error),
        }
    }

    /// Image as base64 text.
    pub fn image_base64(&self) -> Option<String> {
        self.image.as_deref().map(|png| STANDARD.encode(png))
    }

    /// Notes of one category.
    pub fn notes_of(&self, kind: ErrorKind) -> impl Iterator<Item = &ResultError> {
        self.notes.iter().filter(move |n| n.kind == kind)
    }
}

fn png_to_base64<S: Serializer>(image: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match image {
        Some(png) => serializer.serialize_some(&STANDARD.encode(png)),
        None => serializer.serialize_none(),
    }
}

fn png_from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::RecordingId;

    #[test]
    fn analysis_errors_map_to_kinds() {
        let cases = [
            (AnalysisError::invalid("frequency_max", "too low"), ErrorKind::InvalidParameter),
            (AnalysisError::ChannelNotFound("X".into()), ErrorKind::InvalidParameter),
            (
                AnalysisError::MissingRecording(RecordingId::from_raw(9)),
                ErrorKind::MissingRecording,
            ),
            (AnalysisError::EmptySignal, ErrorKind::EmptySignal),
            (AnalysisError::Cancelled, ErrorKind::Cancelled),
        ];
        for (err, kind) in cases {
            assert_eq!(ResultError::from(err).kind, kind);
        }
    }

    #[test]
    fn image_serializes_as_base64() {
        let mut result = AnalysisResult::success(AnalysisKind::Psd, Value::Null, Value::Null);
        result.image = Some(vec![1, 2, 3, 250]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["image"], "AQID+g==");
        assert_eq!(result.image_base64().as_deref(), Some("AQID+g=="));

        let back: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.image, result.image);
    }

    #[test]
    fn failure_shape() {
        let err = ResultError::new(ErrorKind::InvalidParameter, "bad");
        let result = AnalysisResult::failure(AnalysisKind::Snr, Value::Null, err.clone());
        assert!(!result.success);
        assert_eq!(result.error, Some(err));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["kind"], "invalid_parameter");
        assert!(json["payload"].is_null());
        assert!(json["image"].is_null());
    }
}
