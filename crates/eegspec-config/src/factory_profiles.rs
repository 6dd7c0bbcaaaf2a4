//! Factory profiles bundled with eegspec.
//!
//! These are embedded at compile time and always available, so a fresh
//! install can run `--profile ssvep-40hz` without any files on disk. User
//! profiles with the same name take precedence (see [`crate::paths::find_profile`]).

use crate::Profile;

/// Names of the factory profiles, in listing order.
pub static FACTORY_PROFILE_NAMES: &[&str] =
    &["default", "ssvep-40hz", "resting-state", "high-resolution"];

static FACTORY_PROFILES_TOML: &[(&str, &str)] = &[
    ("default", DEFAULT_PROFILE),
    ("ssvep-40hz", SSVEP_40HZ_PROFILE),
    ("resting-state", RESTING_STATE_PROFILE),
    ("high-resolution", HIGH_RESOLUTION_PROFILE),
];

const DEFAULT_PROFILE: &str = r#"
name = "default"
description = "Library defaults for every analysis"
"#;

const SSVEP_40HZ_PROFILE: &str = r#"
name = "ssvep-40hz"
description = "40 Hz flicker sessions: narrow SSVEP band, gamma-range plots"

[psd]
method = "welch"
window_seconds = 4.0
frequency_min = 1.0
frequency_max = 60.0
use_decibel = true

[snr]
neighbor_bandwidth_hz = 1.0

[snr.psd]
window_seconds = 4.0
frequency_min = 30.0
frequency_max = 50.0

[ssvep]
target_frequency = 40.0
filter_half_width_hz = 2.0
segment_samples = 2048
high_threshold_db = 6.0
medium_threshold_db = 3.0

[spectrogram]
time_points = 200
frequency_min = 30.0
frequency_max = 50.0

[epochs]
target_frequencies = [40.0]
snr_bandwidth_hz = 1.0
peak_search_hz = 0.25

[epochs.psd]
window_seconds = 2.0
frequency_min = 1.0
frequency_max = 50.0
"#;

const RESTING_STATE_PROFILE: &str = r#"
name = "resting-state"
description = "Eyes-closed baselines: alpha and theta/beta focus"

[psd]
window_seconds = 4.0
frequency_min = 1.0
frequency_max = 40.0

[bands.psd]
window_seconds = 4.0

[spectrogram]
frequency_min = 1.0
frequency_max = 30.0

[fooof]
frequency_range = [2.0, 40.0]
max_n_peaks = 4
aperiodic_mode = "fixed"
alpha_range = [7.0, 13.0]
"#;

const HIGH_RESOLUTION_PROFILE: &str = r#"
name = "high-resolution"
description = "Long windows and dense grids for offline review"

[psd]
method = "periodogram"
window = "blackman-harris"
frequency_min = 0.5
frequency_max = 100.0

[spectrogram]
time_points = 400
freq_points = 1024
frequency_max = 100.0

[raw]
max_points = 20000

[render]
width = 2400
height = 1400
"#;

/// All factory profiles, parsed.
///
/// A profile that fails to parse is logged and left out.
pub fn factory_profiles() -> Vec<Profile> {
    FACTORY_PROFILES_TOML
        .iter()
        .filter_map(|(name, toml)| parse(name, toml))
        .collect()
}

/// A factory profile by name (case-insensitive).
pub fn get_factory_profile(name: &str) -> Option<Profile> {
    FACTORY_PROFILES_TOML
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .and_then(|(n, toml)| parse(n, toml))
}

/// Names of the factory profiles.
pub fn factory_profile_names() -> &'static [&'static str] {
    FACTORY_PROFILE_NAMES
}

/// True if `name` is a factory profile.
pub fn is_factory_profile(name: &str) -> bool {
    FACTORY_PROFILE_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(name))
}

fn parse(name: &str, toml: &str) -> Option<Profile> {
    match Profile::from_toml(toml) {
        Ok(profile) => Some(profile),
        Err(err) => {
            tracing::error!(profile = name, %err, "factory profile does not parse");
            None
        }
    }
}
