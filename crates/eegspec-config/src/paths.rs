//! Platform-specific paths for user profiles.
//!
//! # Directory Structure
//!
//! - **User profiles**: `~/.config/eegspec/profiles/` (Linux), `~/Library/Application Support/eegspec/profiles/` (macOS), `%APPDATA%\eegspec\profiles\` (Windows)
//!
//! Factory profiles are compiled in and need no directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use eegspec_config::paths;
//!
//! println!("User profiles: {:?}", paths::user_profiles_dir());
//!
//! // User file first, then the factory profile of the same name
//! let profile = paths::resolve_profile("ssvep-40hz").unwrap();
//! assert_eq!(profile.name, "ssvep-40hz");
//! ```

use std::path::{Path, PathBuf};

use crate::factory_profiles::{FACTORY_PROFILE_NAMES, get_factory_profile};
use crate::{ConfigError, Profile};

/// Application name used for directory paths.
const APP_NAME: &str = "eegspec";

/// Subdirectory name for profiles.
const PROFILES_SUBDIR: &str = "profiles";

/// Returns the user-specific profiles directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_profiles_dir() -> PathBuf {
    user_config_dir().join(PROFILES_SUBDIR)
}

/// Returns the user-specific configuration directory.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Where a resolved profile came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    /// A TOML file on disk
    File(PathBuf),
    /// Compiled into the library
    Factory,
}

/// Find a profile file by name or path.
///
/// The name can be a path to a TOML file, or a profile name (with or without
/// `.toml`) looked up in the user profiles directory. Factory profiles are
/// not files; see [`resolve_profile`].
pub fn find_profile(name: &str) -> Option<PathBuf> {
    find_profile_in(name, &user_profiles_dir())
}

fn find_profile_in(name: &str, dir: &Path) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    let user_path = dir.join(filename);
    user_path.is_file().then_some(user_path)
}

/// Load a profile by name or path: user file first, then factory.
///
/// # Errors
///
/// [`ConfigError::ProfileNotFound`] when neither exists; read and parse
/// errors of a user file are returned as they are, without falling back.
pub fn resolve_profile(name: &str) -> Result<Profile, ConfigError> {
    resolve_profile_in(name, &user_profiles_dir()).map(|(profile, _)| profile)
}

/// Like [`resolve_profile`], also reporting where the profile came from.
pub fn resolve_profile_with_source(name: &str) -> Result<(Profile, ProfileSource), ConfigError> {
    resolve_profile_in(name, &user_profiles_dir())
}

fn resolve_profile_in(name: &str, dir: &Path) -> Result<(Profile, ProfileSource), ConfigError> {
    if let Some(path) = find_profile_in(name, dir) {
        let profile = Profile::load(&path)?;
        tracing::info!(profile = %profile.name, path = %path.display(), "using user profile");
        return Ok((profile, ProfileSource::File(path)));
    }
    if let Some(profile) = get_factory_profile(name) {
        tracing::info!(profile = %profile.name, "using factory profile");
        return Ok((profile, ProfileSource::Factory));
    }
    Err(ConfigError::ProfileNotFound(name.to_string()))
}

/// Ensure the user profiles directory exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_profiles_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_profiles_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| ConfigError::profile_dir(&dir, e))?;
    }
    Ok(dir)
}

/// List profile files in the user profiles directory.
///
/// Returns an empty vector if the directory doesn't exist or can't be read.
pub fn list_user_profiles() -> Vec<PathBuf> {
    list_profiles_in_dir(&user_profiles_dir())
}

/// Names of every available profile: user profiles, then factory profiles
/// not shadowed by a user file.
pub fn list_all_profile_names() -> Vec<String> {
    all_profile_names_in(&user_profiles_dir())
}

fn all_profile_names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = list_profiles_in_dir(dir)
        .iter()
        .filter_map(|p| profile_name_from_path(p))
        .collect();
    for factory in FACTORY_PROFILE_NAMES {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(factory)) {
            names.push((*factory).to_string());
        }
    }
    names
}

fn list_profiles_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    paths
}

/// Get the profile name from a file path (the file stem).
///
/// # Example
///
/// ```rust
/// use eegspec_config::paths::profile_name_from_path;
/// use std::path::Path;
///
/// let name = profile_name_from_path(Path::new("/path/to/lab-a.toml"));
/// assert_eq!(name, Some("lab-a".to_string()));
/// ```
pub fn profile_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToString::to_string)
}
