//! Error types for profile operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, writing or resolving profiles.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A profile file could not be read
    #[error("cannot read profile '{path}': {source}")]
    ReadProfile {
        /// Profile file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A profile file could not be written
    #[error("cannot write profile '{path}': {source}")]
    WriteProfile {
        /// Profile file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The directory that should hold a profile could not be created
    #[error("cannot create profile directory '{path}': {source}")]
    ProfileDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Profile text is not valid TOML or does not match the profile schema
    #[error("invalid profile TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A profile could not be turned into TOML
    #[error("cannot serialize profile: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// No user or factory profile has this name
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// Parameter values out of range
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),
}

impl ConfigError {
    pub(crate) fn read_profile(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadProfile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write_profile(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteProfile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn profile_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ProfileDir {
            path: path.into(),
            source,
        }
    }
}
