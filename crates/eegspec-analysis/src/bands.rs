//! Frequency bands and band-power integration.
//!
//! A [`BandSet`] is an ordered list of contiguous, non-overlapping
//! [`FrequencyBand`]s. [`band_powers`] integrates a linear PSD over each band
//! with the trapezoidal rule and derives relative power. [`theta_beta_ratio`]
//! summarizes several channels into one scalar.
//!
//! # Example
//!
//! ```rust
//! use eegspec_analysis::bands::{BandSet, band_powers};
//! use eegspec_analysis::spectrum::Psd;
//!
//! let psd = Psd {
//!     frequencies: (0..=200).map(|i| i as f64 * 0.5).collect(),
//!     power: vec![1.0; 201],
//!     decibel: false,
//! };
//! let table = band_powers(&psd, &BandSet::default());
//! let sum: f64 = table.bands.iter().filter_map(|b| b.relative).sum();
//! assert!((sum - 1.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use eegspec_core::trapezoid;

use crate::error::{AnalysisError, Result};
use crate::spectrum::{Psd, PsdParams, estimate};

/// A frequency band specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Human-readable name for the band
    pub name: Cow<'static, str>,
    /// Lower edge in Hz
    pub low_hz: f64,
    /// Upper edge in Hz
    pub high_hz: f64,
}

impl FrequencyBand {
    /// Create a band with a static name.
    pub const fn new(name: &'static str, low_hz: f64, high_hz: f64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            low_hz,
            high_hz,
        }
    }

    /// Create a band with an owned name.
    pub fn named(name: impl Into<String>, low_hz: f64, high_hz: f64) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            low_hz,
            high_hz,
        }
    }

    /// Get the center frequency of the band.
    pub fn center_hz(&self) -> f64 {
        (self.low_hz * self.high_hz).sqrt()
    }

    /// Get the bandwidth in Hz.
    pub fn bandwidth(&self) -> f64 {
        self.high_hz - self.low_hz
    }

    /// True if `frequency` lies inside the closed band.
    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low_hz && frequency <= self.high_hz
    }
}

/// Standard EEG frequency bands.
pub mod eeg_bands {
    use super::FrequencyBand;

    /// Delta band (0.5-4 Hz) - Deep sleep, unconscious processes
    pub const DELTA: FrequencyBand = FrequencyBand::new("delta", 0.5, 4.0);

    /// Theta band (4-8 Hz) - Drowsiness, light sleep, memory
    pub const THETA: FrequencyBand = FrequencyBand::new("theta", 4.0, 8.0);

    /// Alpha band (8-13 Hz) - Relaxed wakefulness, closed eyes
    pub const ALPHA: FrequencyBand = FrequencyBand::new("alpha", 8.0, 13.0);

    /// Beta band (13-30 Hz) - Active thinking, focus, anxiety
    pub const BETA: FrequencyBand = FrequencyBand::new("beta", 13.0, 30.0);

    /// Gamma band (30-100 Hz) - Cognitive processing, 40 Hz entrainment
    pub const GAMMA: FrequencyBand = FrequencyBand::new("gamma", 30.0, 100.0);

    /// The default band set in order of increasing frequency.
    pub const ALL: [FrequencyBand; 5] = [DELTA, THETA, ALPHA, BETA, GAMMA];
}

/// An ordered set of contiguous bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandSet {
    bands: Vec<FrequencyBand>,
}

impl Default for BandSet {
    fn default() -> Self {
        Self {
            bands: eeg_bands::ALL.to_vec(),
        }
    }
}

impl BandSet {
    /// Build and validate a band set.
    pub fn new(bands: Vec<FrequencyBand>) -> Result<Self> {
        let set = Self { bands };
        set.validate()?;
        Ok(set)
    }

    /// Build from names and `n + 1` ascending edges.
    pub fn from_edges(names: &[&str], edges: &[f64]) -> Result<Self> {
        if edges.len() != names.len() + 1 {
            return Err(AnalysisError::invalid(
                "bands",
                format!("{} names need {} edges", names.len(), names.len() + 1),
            ));
        }
        Self::new(
            names
                .iter()
                .zip(edges.windows(2))
                .map(|(n, e)| FrequencyBand::named(*n, e[0], e[1]))
                .collect(),
        )
    }

    /// Bands in ascending order.
    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Find a band by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&FrequencyBand> {
        self.bands.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    /// Non-empty, each band well-formed, each upper edge equal to the next lower edge.
    pub fn validate(&self) -> Result<()> {
        if self.bands.is_empty() {
            return Err(AnalysisError::invalid("bands", "at least one band is required"));
        }
        for b in &self.bands {
            if !(b.low_hz.is_finite() && b.high_hz.is_finite() && b.low_hz >= 0.0 && b.low_hz < b.high_hz) {
                return Err(AnalysisError::invalid(
                    "bands",
                    format!("band '{}' has invalid edges {}..{}", b.name, b.low_hz, b.high_hz),
                ));
            }
        }
        for pair in self.bands.windows(2) {
            if (pair[0].high_hz - pair[1].low_hz).abs() > 1e-9 {
                return Err(AnalysisError::invalid(
                    "bands",
                    format!(
                        "band '{}' ends at {} Hz but '{}' starts at {} Hz",
                        pair[0].name, pair[0].high_hz, pair[1].name, pair[1].low_hz
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Parameters for a band-power table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandPowerParams {
    /// Spectrum estimator; frequency limits are ignored for integration
    pub psd: PsdParams,
    /// Bands to integrate (default: delta, theta, alpha, beta, gamma)
    pub bands: BandSet,
}

impl Default for BandPowerParams {
    fn default() -> Self {
        Self {
            psd: PsdParams::default(),
            bands: BandSet::default(),
        }
    }
}

impl BandPowerParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        self.psd.validate()?;
        self.bands.validate()
    }
}

/// Power in one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPower {
    /// Band name
    pub name: String,
    /// Lower edge in Hz
    pub low_hz: f64,
    /// Upper edge in Hz
    pub high_hz: f64,
    /// Integrated power (µV²)
    pub absolute: f64,
    /// Share of the summed band power; `None` when the total is zero
    pub relative: Option<f64>,
}

/// Band powers of one spectrum
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BandPowers {
    /// One entry per band, in band order
    pub bands: Vec<BandPower>,
    /// Sum of absolute band powers
    pub total: f64,
}

impl BandPowers {
    /// Look up a band by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&BandPower> {
        self.bands.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// Integrate a linear PSD over each band.
///
/// Bins with `low ≤ f ≤ high` are integrated with the trapezoidal rule.
/// Relative power is `absolute / total`, undefined when the total is not positive.
pub fn band_powers(psd: &Psd, bands: &BandSet) -> BandPowers {
    let power: Vec<f64> = if psd.decibel {
        psd.power.iter().map(|db| 10f64.powf(db / 10.0)).collect()
    } else {
        psd.power.clone()
    };

    let absolute: Vec<f64> = bands
        .bands()
        .iter()
        .map(|band| {
            let (f, p): (Vec<f64>, Vec<f64>) = psd
                .frequencies
                .iter()
                .zip(&power)
                .filter(|(f, _)| band.contains(**f))
                .map(|(f, p)| (*f, *p))
                .unzip();
            trapezoid(&f, &p)
        })
        .collect();

    let total: f64 = absolute.iter().sum();
    let defined = total > 0.0 && total.is_finite();

    BandPowers {
        bands: bands
            .bands()
            .iter()
            .zip(absolute)
            .map(|(band, abs)| BandPower {
                name: band.name.to_string(),
                low_hz: band.low_hz,
                high_hz: band.high_hz,
                absolute: abs,
                relative: defined.then(|| abs / total),
            })
            .collect(),
        total,
    }
}

/// Estimate a spectrum and integrate it over each band.
pub fn compute_band_powers(
    signal: &[f64],
    sample_rate: f64,
    params: &BandPowerParams,
) -> Result<BandPowers> {
    params.validate()?;
    let psd = estimate(signal, sample_rate, &params.psd)?;
    Ok(band_powers(&psd, &params.bands))
}

/// `mean(theta) / mean(beta)` absolute power across channels.
///
/// `None` when either band is missing, no channels are given, or mean beta
/// power is not positive.
pub fn theta_beta_ratio(channels: &[BandPowers]) -> Option<f64> {
    if channels.is_empty() {
        return None;
    }
    let mut theta = Vec::with_capacity(channels.len());
    let mut beta = Vec::with_capacity(channels.len());
    for ch in channels {
        theta.push(ch.get("theta")?.absolute);
        beta.push(ch.get("beta")?.absolute);
    }
    let theta = eegspec_core::mean(&theta)?;
    let beta = eegspec_core::mean(&beta)?;
    if beta > 0.0 && beta.is_finite() {
        Some(theta / beta)
    } else {
        None
    }
}
