//! Profile file format and operations.

use std::path::Path;

use eegspec_analysis::{
    BandPowerParams, EpochParams, FooofParams, PcaParams, PsdParams, RawTraceParams, SnrParams,
    SpectrogramParams, SsvepParams,
};
use eegspec_engine::{AnalysisKind, AnalysisParams, EpochSpec, RenderOptions};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters for every analysis kind, stored together.
///
/// Profiles are TOML documents with one table per analysis kind. Every table
/// and every field is optional; missing values take the library defaults.
///
/// # TOML Format
///
/// ```toml
/// name = "ssvep-40hz"
/// description = "40 Hz flicker sessions"
///
/// [psd]
/// method = "welch"
/// window_seconds = 4.0
/// frequency_max = 60.0
///
/// [ssvep]
/// target_frequency = 40.0
/// high_threshold_db = 6.0
///
/// [render]
/// width = 1600
/// house_style = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// PSD estimator settings.
    #[serde(default)]
    pub psd: PsdParams,
    /// SNR spectrum settings.
    #[serde(default)]
    pub snr: SnrParams,
    /// Band power settings.
    #[serde(default)]
    pub bands: BandPowerParams,
    /// PCA settings.
    #[serde(default)]
    pub pca: PcaParams,
    /// SSVEP detector settings.
    #[serde(default)]
    pub ssvep: SsvepParams,
    /// Spectrogram settings.
    #[serde(default)]
    pub spectrogram: SpectrogramParams,
    /// Spectral parameterization settings.
    #[serde(default)]
    pub fooof: FooofParams,
    /// Raw trace decimation.
    #[serde(default)]
    pub raw: RawTraceParams,
    /// Stimulation-period settings.
    #[serde(default)]
    pub epochs: EpochParams,
    /// Plot settings used when the caller gives none.
    #[serde(default)]
    pub render: RenderOptions,
}

impl Profile {
    /// A profile holding every default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            psd: PsdParams::default(),
            snr: SnrParams::default(),
            bands: BandPowerParams::default(),
            pca: PcaParams::default(),
            ssvep: SsvepParams::default(),
            spectrogram: SpectrogramParams::default(),
            fooof: FooofParams::default(),
            raw: RawTraceParams::default(),
            epochs: EpochParams::default(),
            render: RenderOptions::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parameters for a single-recording analysis of `kind`.
    ///
    /// Returns `None` for kinds that need more than a profile: epoch analysis
    /// needs stimulation periods, and comparisons are built from traces. See
    /// [`Profile::epoch_spec`].
    pub fn params_for(&self, kind: AnalysisKind) -> Option<AnalysisParams> {
        let params = match kind {
            AnalysisKind::Psd => AnalysisParams::Psd(self.psd.clone()),
            AnalysisKind::Snr => AnalysisParams::Snr(self.snr.clone()),
            AnalysisKind::BandPower => AnalysisParams::BandPower(self.bands.clone()),
            AnalysisKind::Pca => AnalysisParams::Pca(self.pca.clone()),
            AnalysisKind::Ssvep => AnalysisParams::Ssvep(self.ssvep.clone()),
            AnalysisKind::Spectrogram => AnalysisParams::Spectrogram(self.spectrogram.clone()),
            AnalysisKind::Fooof => AnalysisParams::Fooof(self.fooof.clone()),
            AnalysisKind::RawTraces => AnalysisParams::RawTraces(self.raw.clone()),
            AnalysisKind::Epochs | AnalysisKind::Comparison => return None,
        };
        Some(params)
    }

    /// Epoch parameters bound to an experiment and its periods.
    pub fn epoch_spec(
        &self,
        experiment: impl Into<String>,
        periods: Vec<eegspec_analysis::StimulationPeriod>,
    ) -> EpochSpec {
        EpochSpec {
            experiment: experiment.into(),
            periods,
            params: self.epochs.clone(),
        }
    }

    /// Load a profile from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_profile(path, e))?;
        let profile: Profile = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), name = %profile.name, "loaded profile");
        Ok(profile)
    }

    /// Parse a profile from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the profile to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::profile_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_profile(path, e))?;
        tracing::debug!(path = %path.display(), name = %self.name, "saved profile");
        Ok(())
    }

    /// Serialize the profile to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_analysis::{PsdMethod, StimulationPeriod};
    use tempfile::TempDir;

    #[test]
    fn missing_sections_take_defaults() {
        let profile = Profile::from_toml("name = \"bare\"").unwrap();
        assert_eq!(profile.name, "bare");
        assert_eq!(profile.psd, PsdParams::default());
        assert_eq!(profile.ssvep, SsvepParams::default());
        assert_eq!(profile.render, RenderOptions::default());
    }

    #[test]
    fn partial_section_keeps_other_fields() {
        let profile = Profile::from_toml(
            r#"
name = "partial"

[psd]
method = "periodogram"
frequency_max = 45.0
"#,
        )
        .unwrap();
        assert_eq!(profile.psd.method, PsdMethod::Periodogram);
        assert_eq!(profile.psd.frequency_max, 45.0);
        assert_eq!(profile.psd.window_seconds, PsdParams::default().window_seconds);
    }

    #[test]
    fn toml_round_trip() {
        let mut profile = Profile::new("round").with_description("trip");
        profile.ssvep = SsvepParams::default().with_target(12.0);
        profile.pca.n_components = Some(3);
        profile.render = RenderOptions::default().with_house_style(true);

        let text = profile.to_toml().unwrap();
        let back = Profile::from_toml(&text).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lab.toml");
        Profile::new("lab").save(&path).unwrap();
        assert_eq!(Profile::load(&path).unwrap().name, "lab");
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let err = Profile::load("/nonexistent/eegspec/profile.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadProfile { .. }));
    }

    #[test]
    fn params_for_single_recording_kinds() {
        let profile = Profile::default();
        for kind in AnalysisKind::ALL {
            match profile.params_for(kind) {
                Some(params) => assert_eq!(params.kind(), kind),
                None => assert!(matches!(kind, AnalysisKind::Epochs | AnalysisKind::Comparison)),
            }
        }
    }

    #[test]
    fn epoch_spec_uses_profile_settings() {
        let mut profile = Profile::default();
        profile.epochs.target_frequencies = vec![10.0, 40.0];
        let spec = profile.epoch_spec("flicker", vec![StimulationPeriod::new(1.0, 2.0, "a")]);
        assert_eq!(spec.experiment, "flicker");
        assert_eq!(spec.params.target_frequencies, vec![10.0, 40.0]);
        assert_eq!(spec.periods.len(), 1);
    }
}
