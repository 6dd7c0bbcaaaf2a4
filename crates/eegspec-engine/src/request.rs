//! Analysis requests.
//!
//! A request carries everything an analysis reads: the recording id, the
//! channel selection, the optional time window, the typed parameters and the
//! render options. Nothing is taken from earlier calls.

use std::fmt;

use eegspec_analysis::{
    BandPowerParams, ChannelSelection, ComparisonTrace, EpochParams, FooofParams, PcaParams,
    PsdParams, RawTraceParams, SnrParams, SpectrogramParams, SsvepParams, StimulationPeriod,
};
use eegspec_core::{RecordingId, TimeWindow};
use serde::{Deserialize, Serialize};

use crate::render::RenderOptions;

/// Analysis kinds exposed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Power spectral density
    Psd,
    /// Per-bin SNR spectrum
    Snr,
    /// Frequency-band power table and theta/beta ratio
    BandPower,
    /// Cross-channel PCA
    Pca,
    /// SSVEP composite detector
    Ssvep,
    /// Short-time Fourier transform
    Spectrogram,
    /// Aperiodic/periodic parameterization
    Fooof,
    /// Decimated raw traces
    RawTraces,
    /// Stimulation-period analysis
    Epochs,
    /// Multi-trace PSD overlay
    Comparison,
}

impl AnalysisKind {
    /// Every kind, in display order.
    pub const ALL: [AnalysisKind; 10] = [
        AnalysisKind::Psd,
        AnalysisKind::Snr,
        AnalysisKind::BandPower,
        AnalysisKind::Pca,
        AnalysisKind::Ssvep,
        AnalysisKind::Spectrogram,
        AnalysisKind::Fooof,
        AnalysisKind::RawTraces,
        AnalysisKind::Epochs,
        AnalysisKind::Comparison,
    ];

    /// Snake-case identifier.
    pub fn name(self) -> &'static str {
        match self {
            AnalysisKind::Psd => "psd",
            AnalysisKind::Snr => "snr",
            AnalysisKind::BandPower => "band_power",
            AnalysisKind::Pca => "pca",
            AnalysisKind::Ssvep => "ssvep",
            AnalysisKind::Spectrogram => "spectrogram",
            AnalysisKind::Fooof => "fooof",
            AnalysisKind::RawTraces => "raw_traces",
            AnalysisKind::Epochs => "epochs",
            AnalysisKind::Comparison => "comparison",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Periods of one experiment to analyse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSpec {
    /// Experiment whose periods are used
    pub experiment: String,
    /// Stimulation periods, already shifted by any sync offset
    pub periods: Vec<StimulationPeriod>,
    /// Spectral settings
    #[serde(default)]
    pub params: EpochParams,
}

/// Parameters of a single-recording analysis, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "snake_case")]
pub enum AnalysisParams {
    /// See [`AnalysisKind::Psd`]
    Psd(PsdParams),
    /// See [`AnalysisKind::Snr`]
    Snr(SnrParams),
    /// See [`AnalysisKind::BandPower`]
    BandPower(BandPowerParams),
    /// See [`AnalysisKind::Pca`]
    Pca(PcaParams),
    /// See [`AnalysisKind::Ssvep`]
    Ssvep(SsvepParams),
    /// See [`AnalysisKind::Spectrogram`]
    Spectrogram(SpectrogramParams),
    /// See [`AnalysisKind::Fooof`]
    Fooof(FooofParams),
    /// See [`AnalysisKind::RawTraces`]
    RawTraces(RawTraceParams),
    /// See [`AnalysisKind::Epochs`]
    Epochs(EpochSpec),
}

impl AnalysisParams {
    /// The kind these parameters belong to.
    pub fn kind(&self) -> AnalysisKind {
        match self {
            AnalysisParams::Psd(_) => AnalysisKind::Psd,
            AnalysisParams::Snr(_) => AnalysisKind::Snr,
            AnalysisParams::BandPower(_) => AnalysisKind::BandPower,
            AnalysisParams::Pca(_) => AnalysisKind::Pca,
            AnalysisParams::Ssvep(_) => AnalysisKind::Ssvep,
            AnalysisParams::Spectrogram(_) => AnalysisKind::Spectrogram,
            AnalysisParams::Fooof(_) => AnalysisKind::Fooof,
            AnalysisParams::RawTraces(_) => AnalysisKind::RawTraces,
            AnalysisParams::Epochs(_) => AnalysisKind::Epochs,
        }
    }
}

/// One analysis against one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Recording to read
    pub recording: RecordingId,
    /// Channels to analyse
    #[serde(default)]
    pub channels: ChannelSelection,
    /// Optional window in seconds; ignored by epoch analysis
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Kind and parameters
    #[serde(flatten)]
    pub params: AnalysisParams,
    /// Plot settings for this call
    pub render: RenderOptions,
}

impl AnalysisRequest {
    /// A request over the default channel selection and the whole recording.
    pub fn new(recording: RecordingId, params: AnalysisParams, render: RenderOptions) -> Self {
        Self {
            recording,
            channels: ChannelSelection::Default,
            window: None,
            params,
            render,
        }
    }

    /// Select channels.
    pub fn with_channels(mut self, channels: ChannelSelection) -> Self {
        self.channels = channels;
        self
    }

    /// Restrict to a time window.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// The request's kind.
    pub fn kind(&self) -> AnalysisKind {
        self.params.kind()
    }
}

/// An overlay of PSDs from independent traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRequest {
    /// Ordered traces; order sets legend and plot order
    pub traces: Vec<ComparisonTrace>,
    /// Estimator settings shared by every trace
    #[serde(default)]
    pub psd: PsdParams,
    /// Plot settings for this call
    pub render: RenderOptions,
}

impl ComparisonRequest {
    /// A comparison with default PSD settings.
    pub fn new(traces: Vec<ComparisonTrace>, render: RenderOptions) -> Self {
        Self {
            traces,
            psd: PsdParams::default(),
            render,
        }
    }

    /// Use these estimator settings.
    pub fn with_psd(mut self, psd: PsdParams) -> Self {
        self.psd = psd;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_serde() {
        for kind in AnalysisKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn request_json_shape() {
        let req = AnalysisRequest::new(
            RecordingId::from_raw(3),
            AnalysisParams::Psd(PsdParams::default().with_range(1.0, 40.0)),
            RenderOptions::default(),
        )
        .with_channels(ChannelSelection::named(["O1", "O2"]))
        .with_window(TimeWindow::new(2.0, 7.0));

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["kind"], "psd");
        assert_eq!(value["recording"], 3);
        assert_eq!(value["parameters"]["frequency_max"], 40.0);
        assert_eq!(value["window"]["start"], 2.0);

        let back: AnalysisRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn params_report_their_kind() {
        assert_eq!(
            AnalysisParams::Ssvep(SsvepParams::default()).kind(),
            AnalysisKind::Ssvep
        );
        assert_eq!(
            AnalysisParams::RawTraces(RawTraceParams::default()).kind(),
            AnalysisKind::RawTraces
        );
    }
}
