//! Numeric payloads for kinds that have no single report type in
//! `eegspec-analysis`.

use eegspec_analysis::{
    ChannelBands, Comparison, PcaSummary, Psd, SnrSpectrum, SpectralPeak, Spectrogram,
};
use eegspec_core::RecordingId;
use serde::{Deserialize, Serialize};

/// Spectrum of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpectrum {
    /// Channel label
    pub channel: String,
    /// Restricted spectrum
    pub psd: Psd,
    /// Strongest local maxima, highest first
    pub peaks: Vec<SpectralPeak>,
}

/// PSD of every selected channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdPayload {
    /// Sample unit of the recording
    pub unit: String,
    /// One entry per channel, in selection order
    pub channels: Vec<ChannelSpectrum>,
}

/// SNR spectrum of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnr {
    /// Channel label
    pub channel: String,
    /// Per-bin SNR
    pub snr: SnrSpectrum,
}

/// SNR spectra of every selected channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnrPayload {
    /// One entry per channel
    pub channels: Vec<ChannelSnr>,
}

/// Band table with the derived theta/beta ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPayload {
    /// One row per channel
    pub channels: Vec<ChannelBands>,
    /// `mean(theta) / mean(beta)`; `null` when undefined
    pub theta_beta_ratio: Option<f64>,
}

/// PCA over the selected channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaPayload {
    /// Channel order of the loadings
    pub channels: Vec<String>,
    /// `null` when every channel is constant
    pub summary: Option<PcaSummary>,
}

/// Spectrogram of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpectrogram {
    /// Channel label
    pub channel: String,
    /// Time-frequency map in dB
    pub spectrogram: Spectrogram,
}

/// Spectrograms of every selected channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramPayload {
    /// One entry per channel
    pub channels: Vec<ChannelSpectrogram>,
}

/// Identity of one requested trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceIdentity {
    /// Position in the request
    pub index: usize,
    /// Legend label
    pub label: String,
    /// Source recording
    pub recording: RecordingId,
    /// Requested channel
    pub channel: String,
    /// True when the trace is part of the overlay
    pub computed: bool,
}

/// Comparison with the identity of every requested trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPayload {
    /// Every requested trace, in request order
    pub traces: Vec<TraceIdentity>,
    /// Computed series, skipped traces and shared settings
    #[serde(flatten)]
    pub comparison: Comparison,
}
