//! Signal-to-noise ratios over power spectra
//!
//! - [`snr_spectrum`] - per-bin SNR against a symmetric neighbourhood
//! - [`noise_band_snr`] - peak at a target against a ring-shaped noise band
//! - [`target_band_snr`] - mean band power against the 1–50 Hz remainder
//!
//! Every ratio is `Option<f64>`: `None` means "not computable" (no neighbours,
//! zero noise, zero signal). Undefined values are never replaced with zero.

use serde::{Deserialize, Serialize};

use eegspec_core::ratio_db;

use crate::error::{AnalysisError, Result};
use crate::spectrum::{Psd, PsdParams, estimate};

/// Parameters for an SNR spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnrParams {
    /// Spectrum estimator; its frequency range restricts the output
    pub psd: PsdParams,
    /// Total neighbourhood width in Hz, split evenly around each bin (default: 1.0)
    pub neighbor_bandwidth_hz: f64,
}

impl Default for SnrParams {
    fn default() -> Self {
        Self {
            psd: PsdParams::default(),
            neighbor_bandwidth_hz: 1.0,
        }
    }
}

impl SnrParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        self.psd.validate()?;
        if !(self.neighbor_bandwidth_hz.is_finite() && self.neighbor_bandwidth_hz > 0.0) {
            return Err(AnalysisError::invalid(
                "neighbor_bandwidth_hz",
                format!("must be positive, got {}", self.neighbor_bandwidth_hz),
            ));
        }
        Ok(())
    }
}

/// Per-bin SNR in decibels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnrSpectrum {
    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,
    /// SNR per bin; `None` where not computable
    pub snr_db: Vec<Option<f64>>,
    /// Neighbourhood radius in bins on each side
    pub radius_bins: usize,
}

impl SnrSpectrum {
    /// Keep bins with `frequency_min ≤ f ≤ frequency_max`.
    pub fn restrict(&self, frequency_min: f64, frequency_max: f64) -> SnrSpectrum {
        let (frequencies, snr_db) = self
            .frequencies
            .iter()
            .zip(&self.snr_db)
            .filter(|(f, _)| **f >= frequency_min && **f <= frequency_max)
            .map(|(f, s)| (*f, *s))
            .unzip();
        SnrSpectrum {
            frequencies,
            snr_db,
            radius_bins: self.radius_bins,
        }
    }

    /// Highest defined SNR within `[low, high]` Hz, as `(frequency, snr_db)`.
    pub fn peak_in(&self, low: f64, high: f64) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(&self.snr_db)
            .filter(|(f, _)| **f >= low && **f <= high)
            .filter_map(|(f, s)| s.map(|s| (*f, s)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Element-wise mean of equally shaped SNR spectra.
    ///
    /// A bin is defined only when it is defined in every input.
    pub fn average(spectra: &[SnrSpectrum]) -> Option<SnrSpectrum> {
        let first = spectra.first()?;
        if spectra.iter().any(|s| s.snr_db.len() != first.snr_db.len()) {
            return None;
        }
        let snr_db = (0..first.snr_db.len())
            .map(|i| {
                let vals: Option<Vec<f64>> = spectra.iter().map(|s| s.snr_db[i]).collect();
                vals.map(|v| v.iter().sum::<f64>() / v.len() as f64)
            })
            .collect();
        Some(SnrSpectrum {
            frequencies: first.frequencies.clone(),
            snr_db,
            radius_bins: first.radius_bins,
        })
    }
}

fn linear_power(psd: &Psd) -> Vec<f64> {
    if psd.decibel {
        psd.power.iter().map(|db| 10f64.powf(db / 10.0)).collect()
    } else {
        psd.power.clone()
    }
}

/// SNR of every bin against the mean of its neighbours.
///
/// The neighbourhood radius is `round((bandwidth_hz / 2) / bin_spacing)` bins
/// on each side, clipped at the spectrum edges, excluding the bin itself.
pub fn snr_spectrum(psd: &Psd, bandwidth_hz: f64) -> SnrSpectrum {
    let Some(df) = psd.bin_spacing() else {
        return SnrSpectrum {
            frequencies: psd.frequencies.clone(),
            snr_db: vec![None; psd.len()],
            radius_bins: 0,
        };
    };
    let power = linear_power(psd);
    let n = power.len();
    let radius = (bandwidth_hz / 2.0 / df).round() as usize;

    let snr_db = (0..n)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius).min(n - 1);
            let count = hi - lo;
            if count == 0 {
                return None;
            }
            let neighbours = power[lo..=hi].iter().sum::<f64>() - power[i];
            ratio_db(power[i], neighbours / count as f64)
        })
        .collect();

    SnrSpectrum {
        frequencies: psd.frequencies.clone(),
        snr_db,
        radius_bins: radius,
    }
}

/// Estimate a spectrum and its SNR spectrum, restricted to the PSD range.
pub fn compute_snr_spectrum(
    signal: &[f64],
    sample_rate: f64,
    params: &SnrParams,
) -> Result<SnrSpectrum> {
    params.validate()?;
    let full = estimate(signal, sample_rate, &params.psd)?;
    Ok(snr_spectrum(&full, params.neighbor_bandwidth_hz)
        .restrict(params.psd.frequency_min, params.psd.frequency_max))
}

/// Peak-versus-noise-band measurement around a target frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseBandSnr {
    /// Frequency of the bin nearest the target
    pub peak_frequency: f64,
    /// Power at that bin
    pub peak_power: f64,
    /// Mean power of the noise bins; `None` when there are none
    pub noise_power: Option<f64>,
    /// Number of noise bins averaged
    pub noise_bins: usize,
    /// `10·log10(peak / noise)`; `None` when not computable
    pub snr_db: Option<f64>,
}

/// SNR of the bin nearest `target` against the mean power of bins with
/// `exclusion_half_width < |f − target| ≤ noise_half_width`.
///
/// Returns `None` only for an empty spectrum.
pub fn noise_band_snr(
    psd: &Psd,
    target: f64,
    noise_half_width: f64,
    exclusion_half_width: f64,
) -> Option<NoiseBandSnr> {
    let peak_bin = psd.nearest_bin(target)?;
    let power = linear_power(psd);
    let noise: Vec<f64> = psd
        .frequencies
        .iter()
        .zip(&power)
        .filter(|(f, _)| {
            let d = (**f - target).abs();
            d > exclusion_half_width && d <= noise_half_width
        })
        .map(|(_, p)| *p)
        .collect();

    let noise_power = eegspec_core::mean(&noise);
    let peak_power = power[peak_bin];
    Some(NoiseBandSnr {
        peak_frequency: psd.frequencies[peak_bin],
        peak_power,
        noise_power,
        noise_bins: noise.len(),
        snr_db: noise_power.and_then(|n| ratio_db(peak_power, n)),
    })
}

/// Mean power within `target ± bandwidth/2` against the mean power of the
/// remaining bins in 1–50 Hz.
pub fn target_band_snr(psd: &Psd, target: f64, bandwidth: f64) -> Option<f64> {
    let power = linear_power(psd);
    let in_signal = |f: f64| f >= target - bandwidth / 2.0 && f <= target + bandwidth / 2.0;

    let mut signal = Vec::new();
    let mut noise = Vec::new();
    for (&f, &p) in psd.frequencies.iter().zip(&power) {
        if in_signal(f) {
            signal.push(p);
        } else if (1.0..=50.0).contains(&f) {
            noise.push(p);
        }
    }
    ratio_db(eegspec_core::mean(&signal)?, eegspec_core::mean(&noise)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_with_peak(n: usize, df: f64, peak_at: usize, peak: f64) -> Psd {
        let frequencies: Vec<f64> = (0..n).map(|i| i as f64 * df).collect();
        let mut power = vec![1.0; n];
        power[peak_at] = peak;
        Psd {
            frequencies,
            power,
            decibel: false,
        }
    }

    #[test]
    fn peak_stands_out_of_flat_floor() {
        let psd = flat_with_peak(101, 0.25, 40, 10.0);
        let snr = snr_spectrum(&psd, 1.0);
        assert_eq!(snr.radius_bins, 2);
        assert!((snr.snr_db[40].unwrap() - 10.0).abs() < 1e-9);
        // Bins next to the peak see it as a neighbour and drop below 0 dB.
        assert!(snr.snr_db[41].unwrap() < 0.0);
        assert!((snr.snr_db[80].unwrap()).abs() < 1e-9);
    }

    #[test]
    fn zero_radius_is_undefined_everywhere() {
        let psd = flat_with_peak(11, 1.0, 5, 2.0);
        let snr = snr_spectrum(&psd, 0.5);
        assert_eq!(snr.radius_bins, 0);
        assert!(snr.snr_db.iter().all(Option::is_none));
    }

    #[test]
    fn zero_power_bins_are_undefined_not_zero() {
        let psd = Psd {
            frequencies: vec![0.0, 1.0, 2.0, 3.0],
            power: vec![0.0, 0.0, 0.0, 0.0],
            decibel: false,
        };
        let snr = snr_spectrum(&psd, 2.0);
        assert!(snr.snr_db.iter().all(Option::is_none));
    }

    #[test]
    fn edges_use_one_sided_neighbourhood() {
        let psd = flat_with_peak(20, 0.5, 0, 4.0);
        let snr = snr_spectrum(&psd, 2.0);
        assert!((snr.snr_db[0].unwrap() - 10.0 * 4f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn noise_band_excludes_inner_ring() {
        // 0.5 Hz bins from 0 to 60 Hz with a 10x peak at 40 Hz and a bump at 41 Hz
        // that must not count as noise.
        let mut psd = flat_with_peak(121, 0.5, 80, 10.0);
        psd.power[82] = 100.0;
        let m = noise_band_snr(&psd, 40.0, 10.0, 3.0).unwrap();
        assert_eq!(m.peak_frequency, 40.0);
        assert!((m.noise_power.unwrap() - 1.0).abs() < 1e-12);
        assert!((m.snr_db.unwrap() - 10.0).abs() < 1e-9);
        // 3 < |d| <= 10 → 14 bins per side
        assert_eq!(m.noise_bins, 28);
    }

    #[test]
    fn noise_band_without_bins_is_undefined() {
        let psd = flat_with_peak(10, 1.0, 5, 10.0);
        let m = noise_band_snr(&psd, 5.0, 3.0, 3.0).unwrap();
        assert_eq!(m.noise_bins, 0);
        assert_eq!(m.noise_power, None);
        assert_eq!(m.snr_db, None);
    }

    #[test]
    fn target_band_snr_against_remainder() {
        let psd = flat_with_peak(201, 0.25, 160, 9.0);
        let snr = target_band_snr(&psd, 40.0, 1.0).unwrap();
        // Signal band: 5 bins, one at 9 → mean 2.6; noise mean 1.
        assert!((snr - 10.0 * 2.6f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn average_keeps_undefined() {
        let a = SnrSpectrum {
            frequencies: vec![1.0, 2.0],
            snr_db: vec![Some(2.0), None],
            radius_bins: 1,
        };
        let b = SnrSpectrum {
            frequencies: vec![1.0, 2.0],
            snr_db: vec![Some(4.0), Some(1.0)],
            radius_bins: 1,
        };
        let avg = SnrSpectrum::average(&[a, b]).unwrap();
        assert_eq!(avg.snr_db, vec![Some(3.0), None]);
    }
}
