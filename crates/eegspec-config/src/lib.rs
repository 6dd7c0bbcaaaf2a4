//! Analysis profiles for eegspec.
//!
//! A [`Profile`] bundles the typed parameters of every analysis kind plus
//! default render options, stored as TOML. Profiles are resolved by name from
//! the user profiles directory first and the compiled-in factory profiles
//! second, and validated section by section before use.
//!
//! # Features
//!
//! - **Profiles**: Load and save parameter sets as TOML
//! - **Factory Profiles**: `default`, `ssvep-40hz`, `resting-state`, `high-resolution`
//! - **Validation**: Every section's range checks, aggregated
//! - **Paths**: Platform-specific user profile directory
//!
//! # Example
//!
//! ```rust
//! use eegspec_config::{Profile, get_factory_profile, validate_profile};
//! use eegspec_engine::AnalysisKind;
//!
//! let profile = get_factory_profile("ssvep-40hz").unwrap();
//! validate_profile(&profile).unwrap();
//!
//! let params = profile.params_for(AnalysisKind::Ssvep).unwrap();
//! assert_eq!(params.kind(), AnalysisKind::Ssvep);
//!
//! let text = profile.to_toml().unwrap();
//! assert_eq!(Profile::from_toml(&text).unwrap(), profile);
//! ```

mod error;
mod profile;

/// Platform-specific paths and profile lookup.
pub mod paths;

/// Profile validation.
pub mod validation;

/// Factory profiles bundled with the library.
pub mod factory_profiles;

pub use error::ConfigError;
pub use factory_profiles::{
    FACTORY_PROFILE_NAMES, factory_profile_names, factory_profiles, get_factory_profile,
    is_factory_profile,
};
pub use paths::{
    ProfileSource, ensure_user_profiles_dir, find_profile, list_all_profile_names,
    list_user_profiles, profile_name_from_path, resolve_profile, resolve_profile_with_source,
    user_config_dir, user_profiles_dir,
};
pub use profile::Profile;
pub use validation::{ValidationError, ValidationResult, validate_profile, validate_render};
