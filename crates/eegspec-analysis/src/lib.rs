//! eegspec Analysis - Spectral tools for multichannel EEG recordings
//!
//! Every analysis takes its samples and a typed parameter struct as explicit
//! arguments; nothing is read from shared state.
//!
//! - [`fft`] - FFT wrapper with windowing functions
//! - [`spectrum`] - PSD estimation (Welch and periodogram)
//! - [`snr`] - Per-bin SNR spectrum and noise-band SNR
//! - [`bands`] - Frequency bands, band power and theta/beta ratio
//! - [`pca`] - Cross-channel principal component analysis
//! - [`ssvep`] - Steady-state evoked potential detection
//! - [`spectrogram`] - STFT-based time-frequency analysis
//! - [`compare`] - Multi-trace PSD comparison
//! - [`fooof`] - Aperiodic/periodic spectral parameterization
//! - [`epochs`] - Stimulation-period analysis
//! - [`raw`] - Decimated raw traces for display
//! - [`selection`] - Channel selection
//! - [`signals`] - Synthetic EEG-like recordings
//! - [`export`] - CSV and JSON export
//!
//! ## Example
//!
//! ```rust
//! use eegspec_analysis::spectrum::{PsdParams, compute_psd};
//! use eegspec_analysis::signals::sum_of_sines;
//!
//! let x = sum_of_sines(250.0, 1000, &[(10.0, 1.0)], 0.1, 1);
//! let psd = compute_psd(&x, 250.0, &PsdParams::default()).unwrap();
//! assert_eq!(psd.frequencies.len(), psd.power.len());
//! ```
//!
//! ## SSVEP
//!
//! ```rust,ignore
//! use eegspec_analysis::{ChannelSelection, SsvepParams, detect_ssvep};
//!
//! let channels = ChannelSelection::Default.gather(recording.as_ref())?;
//! let report = detect_ssvep(&channels, recording.sample_rate(), &SsvepParams::default())?;
//! println!("best channel: {:?}", report.best_channel);
//! ```

pub mod bands;
pub mod compare;
pub mod epochs;
pub mod error;
pub mod export;
pub mod fft;
pub mod fooof;
pub mod pca;
pub mod raw;
pub mod selection;
pub mod signals;
pub mod snr;
pub mod spectrogram;
pub mod spectrum;
pub mod ssvep;

pub use bands::{
    BandPower, BandPowerParams, BandPowers, BandSet, FrequencyBand, band_powers,
    compute_band_powers, eeg_bands, theta_beta_ratio,
};
pub use compare::{
    CancelToken, Comparison, ComparisonTrace, DEFAULT_PALETTE, MIN_TRACES, SkipReason,
    SkippedTrace, TraceSeries, compare_traces, compare_traces_with_progress,
};
pub use epochs::{
    EpochChannel, EpochParams, EpochReport, StimulationPeriod, TargetSnr, analyze_epochs,
    apply_sync_offset, group_by_experiment,
};
pub use error::{AnalysisError, Result};
pub use fft::{Fft, Window};
pub use fooof::{
    AperiodicMode, AperiodicParams, ChannelFit, FitSettings, FooofParams, FooofReport,
    GaussianPeak, PeakFitter, SpectralFit, SpectralParameterizer, parameterize,
};
pub use pca::{PcaParams, PcaSummary, pca};
pub use raw::{RawTraceParams, RawTraces, TraceChannel, raw_traces};
pub use selection::{ChannelData, ChannelSelection};
pub use signals::{SyntheticEeg, sum_of_sines};
pub use snr::{NoiseBandSnr, SnrParams, SnrSpectrum, compute_snr_spectrum, noise_band_snr, snr_spectrum};
pub use spectrogram::{Spectrogram, SpectrogramParams, StftAnalyzer, compute_spectrogram};
pub use spectrum::{
    Psd, PsdMethod, PsdParams, SpectralPeak, compute_psd, estimate, find_peaks, periodogram, welch,
};
pub use ssvep::{
    ChannelBands, ChannelDetection, Confidence, SsvepParams, SsvepReport, TierCounts, detect_ssvep,
};
