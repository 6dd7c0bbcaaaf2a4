//! Profile validation.
//!
//! Every section of a [`Profile`] checks itself; [`validate_profile`] runs all
//! of them and reports every failure at once, each prefixed with its section
//! name so the offending TOML key can be found.
//!
//! # Example
//!
//! ```rust
//! use eegspec_config::{Profile, ValidationError, validate_profile};
//!
//! let mut profile = Profile::default();
//! profile.psd.frequency_max = 0.1;
//! profile.render.width = 10;
//!
//! let err = validate_profile(&profile).unwrap_err();
//! assert!(matches!(err, ValidationError::Multiple(ref all) if all.len() == 2));
//! ```

use eegspec_analysis::AnalysisError;
use eegspec_engine::{MAX_SIDE, MIN_SIDE, RenderOptions};
use thiserror::Error;

use crate::Profile;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric value out of range.
    #[error("'{param}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Dotted key of the value.
        param: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Value rejected for another reason.
    #[error("invalid value for '{param}': {reason}")]
    InvalidFormat {
        /// Dotted key of the value.
        param: String,
        /// Description of the problem.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl ValidationError {
    /// Map a parameter check failure into `section.param` form.
    pub fn from_analysis(section: &str, err: &AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidParameter { param, reason } => ValidationError::InvalidFormat {
                param: format!("{section}.{param}"),
                reason: reason.clone(),
            },
            other => ValidationError::InvalidFormat {
                param: section.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Number of individual failures.
    pub fn count(&self) -> usize {
        match self {
            ValidationError::Multiple(all) => all.len(),
            _ => 1,
        }
    }
}

/// Check the image size of a render section.
pub fn validate_render(render: &RenderOptions) -> ValidationResult<()> {
    let mut errors = Vec::new();
    for (key, side) in [("render.width", render.width), ("render.height", render.height)] {
        if !(MIN_SIDE..=MAX_SIDE).contains(&side) {
            errors.push(ValidationError::OutOfRange {
                param: key.to_string(),
                value: f64::from(side),
                min: f64::from(MIN_SIDE),
                max: f64::from(MAX_SIDE),
            });
        }
    }
    collect(errors)
}

/// Validate every section of a profile.
///
/// # Errors
///
/// A single failure is returned as is; several are wrapped in
/// [`ValidationError::Multiple`] in section order.
pub fn validate_profile(profile: &Profile) -> ValidationResult<()> {
    let checks: [(&str, eegspec_analysis::Result<()>); 9] = [
        ("psd", profile.psd.validate()),
        ("snr", profile.snr.validate()),
        ("bands", profile.bands.validate()),
        ("pca", profile.pca.validate()),
        ("ssvep", profile.ssvep.validate()),
        ("spectrogram", profile.spectrogram.validate()),
        ("fooof", profile.fooof.validate()),
        ("raw", profile.raw.validate()),
        ("epochs", profile.epochs.validate()),
    ];

    let mut errors: Vec<ValidationError> = checks
        .iter()
        .filter_map(|(section, result)| {
            result
                .as_ref()
                .err()
                .map(|e| ValidationError::from_analysis(section, e))
        })
        .collect();
    if let Err(err) = validate_render(&profile.render) {
        match err {
            ValidationError::Multiple(all) => errors.extend(all),
            single => errors.push(single),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(profile = %profile.name, failures = errors.len(), "profile rejected");
    }
    collect(errors)
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_profile(&Profile::default()), Ok(()));
    }

    #[test]
    fn single_failure_names_its_section() {
        let mut profile = Profile::default();
        profile.spectrogram.time_points = 1;
        let err = validate_profile(&profile).unwrap_err();
        match err {
            ValidationError::InvalidFormat { param, .. } => {
                assert_eq!(param, "spectrogram.time_points");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failures_are_aggregated_in_order() {
        let mut profile = Profile::default();
        profile.psd.overlap_fraction = 1.5;
        profile.raw.max_points = 0;
        profile.render.height = 9000;
        let err = validate_profile(&profile).unwrap_err();
        assert_eq!(err.count(), 3);
        let ValidationError::Multiple(all) = err else {
            panic!("expected several errors");
        };
        assert!(matches!(&all[0], ValidationError::InvalidFormat { param, .. } if param.starts_with("psd.")));
        assert!(matches!(&all[1], ValidationError::InvalidFormat { param, .. } if param.starts_with("raw.")));
        assert!(matches!(
            &all[2],
            ValidationError::OutOfRange { param, value, .. } if param == "render.height" && *value == 9000.0
        ));
    }

    #[test]
    fn render_sides_are_checked() {
        let both = RenderOptions::default().with_size(10, 10);
        assert_eq!(validate_render(&both).unwrap_err().count(), 2);
        assert!(validate_render(&RenderOptions::default()).is_ok());
    }

    #[test]
    fn multiple_display_joins_messages() {
        let err = ValidationError::Multiple(vec![
            ValidationError::InvalidFormat {
                param: "a".into(),
                reason: "x".into(),
            },
            ValidationError::InvalidFormat {
                param: "b".into(),
                reason: "y".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "multiple validation errors: invalid value for 'a': x; invalid value for 'b': y"
        );
    }
}
