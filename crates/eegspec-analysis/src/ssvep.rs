//! Steady-state visual evoked potential detection
//!
//! For each channel the detector:
//!
//! 1. band-passes `target ± filter_half_width_hz` with a Butterworth cascade,
//!    applied zero-phase (forward and backward over an odd-extended signal),
//! 2. estimates a Welch PSD with fixed-length Hann segments and 50% overlap,
//! 3. compares the bin nearest the target against the mean power of the ring
//!    `exclusion < |f − target| ≤ noise_half_width`.
//!
//! The SNR maps to a [`Confidence`] tier. With more than one channel the report
//! also carries a [`PcaSummary`] over the unfiltered channels, and every report
//! includes a band-power table per channel computed from the unfiltered signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use eegspec_core::Bandpass;

use crate::bands::{BandPowers, BandSet, band_powers};
use crate::error::{AnalysisError, Result};
use crate::fft::Window;
use crate::pca::{PcaParams, PcaSummary, pca};
use crate::selection::ChannelData;
use crate::snr::noise_band_snr;
use crate::spectrum::{Psd, welch};

/// Parameters for SSVEP detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsvepParams {
    /// Stimulation frequency in Hz (default: 40.0)
    pub target_frequency: f64,
    /// Half width of the band-pass in Hz (default: 2.0)
    pub filter_half_width_hz: f64,
    /// Butterworth order of the band-pass (default: 4)
    pub filter_order: usize,
    /// Welch segment length in samples (default: 2048)
    pub segment_samples: usize,
    /// Outer half width of the noise ring in Hz (default: 10.0)
    pub noise_half_width_hz: f64,
    /// Inner half width excluded from the noise ring in Hz (default: 3.0)
    pub exclusion_half_width_hz: f64,
    /// PCA components; `None` means `min(channels, 5)`
    pub n_components: Option<usize>,
    /// Bands for the per-channel relative power table
    pub bands: BandSet,
    /// SNR above which a detection is high confidence (default: 6.0 dB)
    pub high_threshold_db: f64,
    /// SNR above which a detection is medium confidence (default: 3.0 dB)
    pub medium_threshold_db: f64,
}

impl Default for SsvepParams {
    fn default() -> Self {
        Self {
            target_frequency: 40.0,
            filter_half_width_hz: 2.0,
            filter_order: 4,
            segment_samples: 2048,
            noise_half_width_hz: 10.0,
            exclusion_half_width_hz: 3.0,
            n_components: None,
            bands: BandSet::default(),
            high_threshold_db: 6.0,
            medium_threshold_db: 3.0,
        }
    }
}

impl SsvepParams {
    /// Set the stimulation frequency.
    pub fn with_target(mut self, frequency: f64) -> Self {
        self.target_frequency = frequency;
        self
    }

    /// Check ranges that do not depend on the sample rate.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_frequency.is_finite() && self.target_frequency > 0.0) {
            return Err(AnalysisError::invalid(
                "target_frequency",
                format!("must be positive, got {}", self.target_frequency),
            ));
        }
        if !(self.filter_half_width_hz > 0.0
            && self.target_frequency - self.filter_half_width_hz > 0.0)
        {
            return Err(AnalysisError::invalid(
                "filter_half_width_hz",
                format!(
                    "band {} ± {} must stay above 0 Hz",
                    self.target_frequency, self.filter_half_width_hz
                ),
            ));
        }
        if self.segment_samples < 8 {
            return Err(AnalysisError::invalid(
                "segment_samples",
                format!("must be at least 8, got {}", self.segment_samples),
            ));
        }
        if !(self.exclusion_half_width_hz >= 0.0
            && self.noise_half_width_hz > self.exclusion_half_width_hz)
        {
            return Err(AnalysisError::invalid(
                "noise_half_width_hz",
                format!(
                    "must exceed exclusion_half_width_hz ({} <= {})",
                    self.noise_half_width_hz, self.exclusion_half_width_hz
                ),
            ));
        }
        if self.medium_threshold_db.is_nan() || self.high_threshold_db < self.medium_threshold_db {
            return Err(AnalysisError::invalid(
                "high_threshold_db",
                "must not be below medium_threshold_db",
            ));
        }
        PcaParams {
            n_components: self.n_components,
        }
        .validate()?;
        self.bands.validate()
    }

    /// Check the band-pass against a sample rate.
    pub fn validate_for(&self, sample_rate: f64) -> Result<()> {
        self.validate()?;
        let nyquist = sample_rate / 2.0;
        if self.target_frequency + self.filter_half_width_hz >= nyquist {
            return Err(AnalysisError::invalid(
                "target_frequency",
                format!(
                    "band upper edge {} Hz must be below Nyquist ({nyquist} Hz)",
                    self.target_frequency + self.filter_half_width_hz
                ),
            ));
        }
        Ok(())
    }
}

/// Detection confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// SNR above the high threshold
    High,
    /// SNR above the medium threshold
    Medium,
    /// Anything else, including an undefined SNR
    Low,
}

impl Confidence {
    /// Tier for an SNR with the default 6 dB / 3 dB thresholds.
    pub fn from_snr(snr_db: Option<f64>) -> Self {
        Self::classify(snr_db, 6.0, 3.0)
    }

    /// Tier for an SNR: `high` iff `snr > high`, `medium` iff `medium < snr ≤ high`.
    pub fn classify(snr_db: Option<f64>, high: f64, medium: f64) -> Self {
        match snr_db {
            Some(s) if s > high => Confidence::High,
            Some(s) if s > medium => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        })
    }
}

/// Detection result for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDetection {
    /// Channel label
    pub channel: String,
    /// Frequency of the bin nearest the target
    pub peak_frequency: f64,
    /// Filtered PSD at that bin
    pub peak_power: f64,
    /// Mean filtered PSD over the noise ring; `None` without noise bins
    pub noise_power: Option<f64>,
    /// SNR in dB; `None` when not computable
    pub snr_db: Option<f64>,
    /// Tier derived from `snr_db`
    pub confidence: Confidence,
}

/// Number of channels in each confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    /// High-confidence channels
    pub high: usize,
    /// Medium-confidence channels
    pub medium: usize,
    /// Low-confidence channels
    pub low: usize,
}

impl TierCounts {
    fn add(&mut self, c: Confidence) {
        match c {
            Confidence::High => self.high += 1,
            Confidence::Medium => self.medium += 1,
            Confidence::Low => self.low += 1,
        }
    }
}

/// Band-power table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBands {
    /// Channel label
    pub channel: String,
    /// Powers of the unfiltered signal
    pub powers: BandPowers,
}

/// Full SSVEP report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsvepReport {
    /// Stimulation frequency in Hz
    pub target_frequency: f64,
    /// Sample rate of the analysed channels
    pub sample_rate: f64,
    /// One detection per channel, in selection order
    pub detections: Vec<ChannelDetection>,
    /// Channel with the highest defined SNR
    pub best_channel: Option<String>,
    /// Channel counts per tier
    pub tiers: TierCounts,
    /// Cross-channel PCA; present with two or more non-constant channels
    pub pca: Option<PcaSummary>,
    /// Band relative power per channel
    pub bands: Vec<ChannelBands>,
    /// Filtered spectra around the target, one per channel, for display
    pub spectra: Vec<Psd>,
}

impl SsvepReport {
    /// Detection for a channel label.
    pub fn detection(&self, channel: &str) -> Option<&ChannelDetection> {
        self.detections.iter().find(|d| d.channel == channel)
    }
}

/// Detect an SSVEP response on every given channel.
pub fn detect_ssvep(
    channels: &[ChannelData<'_>],
    sample_rate: f64,
    params: &SsvepParams,
) -> Result<SsvepReport> {
    params.validate_for(sample_rate)?;
    if channels.is_empty() {
        return Err(AnalysisError::invalid("channels", "selection is empty"));
    }
    if channels.iter().any(|c| c.samples.is_empty()) {
        return Err(AnalysisError::EmptySignal);
    }

    let target = params.target_frequency;
    let mut filter = Bandpass::new(
        target - params.filter_half_width_hz,
        target + params.filter_half_width_hz,
        params.filter_order,
        sample_rate,
    )?;
    let segment = params.segment_samples;
    let display_span = 2.0 * params.noise_half_width_hz;

    let mut detections = Vec::with_capacity(channels.len());
    let mut spectra = Vec::with_capacity(channels.len());
    let mut bands = Vec::with_capacity(channels.len());
    let mut tiers = TierCounts::default();

    for ch in channels {
        let filtered = filter.filtfilt(ch.samples);
        let psd = welch(&filtered, sample_rate, segment, segment / 2, Window::Hann);
        let measurement = noise_band_snr(
            &psd,
            target,
            params.noise_half_width_hz,
            params.exclusion_half_width_hz,
        )
        .ok_or(AnalysisError::EmptySignal)?;

        let confidence = Confidence::classify(
            measurement.snr_db,
            params.high_threshold_db,
            params.medium_threshold_db,
        );
        tiers.add(confidence);
        tracing::debug!(
            channel = ch.name,
            snr_db = ?measurement.snr_db,
            %confidence,
            "ssvep channel"
        );

        detections.push(ChannelDetection {
            channel: ch.name.to_string(),
            peak_frequency: measurement.peak_frequency,
            peak_power: measurement.peak_power,
            noise_power: measurement.noise_power,
            snr_db: measurement.snr_db,
            confidence,
        });
        spectra.push(psd.restrict((target - display_span).max(0.0), target + display_span));

        let raw = welch(ch.samples, sample_rate, segment, segment / 2, Window::Hann);
        bands.push(ChannelBands {
            channel: ch.name.to_string(),
            powers: band_powers(&raw, &params.bands),
        });
    }

    let best_channel = detections
        .iter()
        .filter_map(|d| d.snr_db.map(|s| (d, s)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(d, _)| d.channel.clone());

    let pca = if channels.len() > 1 {
        let data: Vec<&[f64]> = channels.iter().map(|c| c.samples).collect();
        pca(
            &data,
            &PcaParams {
                n_components: params.n_components,
            },
        )?
    } else {
        None
    };

    Ok(SsvepReport {
        target_frequency: target,
        sample_rate,
        detections,
        best_channel,
        tiers,
        pca,
        bands,
        spectra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, amp: f64, fs: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        (0..n)
            .map(|i| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let noise = (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
                amp * (2.0 * PI * freq * i as f64 / fs).sin() + noise
            })
            .collect()
    }

    #[test]
    fn confidence_boundaries() {
        assert_eq!(Confidence::from_snr(Some(6.0)), Confidence::Medium);
        assert_eq!(Confidence::from_snr(Some(6.0001)), Confidence::High);
        assert_eq!(Confidence::from_snr(Some(3.0)), Confidence::Low);
        assert_eq!(Confidence::from_snr(Some(3.0001)), Confidence::Medium);
        assert_eq!(Confidence::from_snr(None), Confidence::Low);
        assert_eq!(Confidence::from_snr(Some(-20.0)), Confidence::Low);
    }

    #[test]
    fn strong_tone_is_high_confidence() {
        let fs = 256.0;
        let a = tone(40.0, 5.0, fs, 8192, 1);
        let b = tone(40.0, 0.0, fs, 8192, 2);
        let chans = [
            ChannelData {
                name: "O1",
                samples: &a,
            },
            ChannelData {
                name: "O2",
                samples: &b,
            },
        ];
        let report = detect_ssvep(&chans, fs, &SsvepParams::default()).unwrap();
        let o1 = report.detection("O1").unwrap();
        assert_eq!(o1.confidence, Confidence::High);
        assert!((o1.peak_frequency - 40.0).abs() < 0.2);
        assert_eq!(report.best_channel.as_deref(), Some("O1"));
        assert_eq!(report.tiers.high + report.tiers.medium + report.tiers.low, 2);
        let pca = report.pca.unwrap();
        assert_eq!(pca.n_components, 2);
        assert_eq!(report.bands.len(), 2);
        assert_eq!(report.spectra.len(), 2);
    }

    #[test]
    fn neighbouring_interferer_does_not_move_snr() {
        let fs = 256.0;
        let clean = tone(40.0, 1.0, fs, 8192, 7);
        let interfered: Vec<f64> = clean
            .iter()
            .enumerate()
            .map(|(i, s)| s + 0.5 * (2.0 * PI * 45.0 * i as f64 / fs).sin())
            .collect();

        let snr = |samples: &[f64]| {
            let chans = [ChannelData { name: "Oz", samples }];
            let report = detect_ssvep(&chans, fs, &SsvepParams::default()).unwrap();
            report.detections[0].snr_db.unwrap()
        };
        let before = snr(&clean);
        let after = snr(&interfered);
        assert!(after > 60.0, "snr with 45 Hz interferer {after}");
        assert!((before - after).abs() < 3.0, "snr moved {before} -> {after}");
    }

    #[test]
    fn single_channel_has_no_pca() {
        let fs = 256.0;
        let a = tone(40.0, 1.0, fs, 4096, 3);
        let chans = [ChannelData {
            name: "Oz",
            samples: &a,
        }];
        let report = detect_ssvep(&chans, fs, &SsvepParams::default()).unwrap();
        assert!(report.pca.is_none());
        assert_eq!(report.detections.len(), 1);
    }

    #[test]
    fn band_above_nyquist_is_rejected() {
        let a = vec![0.0; 512];
        let chans = [ChannelData {
            name: "O1",
            samples: &a,
        }];
        let err = detect_ssvep(&chans, 80.0, &SsvepParams::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }

    #[test]
    fn silent_channel_is_low_not_error() {
        let fs = 256.0;
        let a = vec![0.0; 4096];
        let chans = [ChannelData {
            name: "O1",
            samples: &a,
        }];
        let report = detect_ssvep(&chans, fs, &SsvepParams::default()).unwrap();
        assert_eq!(report.detections[0].snr_db, None);
        assert_eq!(report.detections[0].confidence, Confidence::Low);
        assert_eq!(report.best_channel, None);
    }

    #[test]
    fn invalid_params() {
        let p = SsvepParams {
            noise_half_width_hz: 2.0,
            ..SsvepParams::default()
        };
        assert!(p.validate().is_err());
        let p = SsvepParams::default().with_target(1.0);
        assert!(p.validate().is_err());
    }
}
