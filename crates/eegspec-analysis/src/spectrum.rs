//! Power spectral density estimation
//!
//! Two estimators are provided:
//!
//! - [`welch`] - averaged periodograms of overlapping windowed segments.
//!   Lower variance, coarser resolution; the default for noisy biosignals.
//! - [`periodogram`] - a single full-length FFT normalized by `fs · N`.
//!   Finest resolution, highest variance; used to separate close peaks
//!   (e.g. 40 Hz stimulation from 50/60 Hz mains).
//!
//! Both return one-sided density spectra: each segment is mean-detrended,
//! scaled by `1 / (fs · Σw²)`, and every bin except DC and (for even lengths)
//! Nyquist is doubled. [`compute_psd`] applies a [`PsdParams`] set: method
//! dispatch, frequency restriction and optional decibel conversion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use eegspec_core::power_to_db;

use crate::error::{AnalysisError, Result};
use crate::fft::{Fft, Window, rfft_frequencies};

/// PSD estimation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdMethod {
    /// Averaged overlapping segments
    #[default]
    Welch,
    /// Single full-length FFT
    Periodogram,
}

impl fmt::Display for PsdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PsdMethod::Welch => "welch",
            PsdMethod::Periodogram => "periodogram",
        })
    }
}

impl FromStr for PsdMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "welch" => Ok(PsdMethod::Welch),
            "periodogram" | "fft" => Ok(PsdMethod::Periodogram),
            other => Err(AnalysisError::invalid(
                "method",
                format!("unknown PSD method '{other}'"),
            )),
        }
    }
}

/// Parameters for a PSD estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsdParams {
    /// Estimator (default: Welch)
    pub method: PsdMethod,
    /// Welch segment length in seconds (default: 2.0)
    pub window_seconds: f64,
    /// Fraction of a segment shared with the next one (default: 0.5)
    pub overlap_fraction: f64,
    /// Taper applied to each Welch segment (default: Hann)
    pub window: Window,
    /// Lowest frequency reported in Hz (default: 0.5)
    pub frequency_min: f64,
    /// Highest frequency reported in Hz (default: 50.0)
    pub frequency_max: f64,
    /// Report `10·log10(power + ε)` instead of linear power (default: false)
    pub use_decibel: bool,
}

impl Default for PsdParams {
    fn default() -> Self {
        Self {
            method: PsdMethod::Welch,
            window_seconds: 2.0,
            overlap_fraction: 0.5,
            window: Window::Hann,
            frequency_min: 0.5,
            frequency_max: 50.0,
            use_decibel: false,
        }
    }
}

impl PsdParams {
    /// Set the method.
    pub fn with_method(mut self, method: PsdMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the reported frequency range.
    pub fn with_range(mut self, frequency_min: f64, frequency_max: f64) -> Self {
        self.frequency_min = frequency_min;
        self.frequency_max = frequency_max;
        self
    }

    /// Set the Welch segment length.
    pub fn with_window_seconds(mut self, seconds: f64) -> Self {
        self.window_seconds = seconds;
        self
    }

    /// Enable or disable decibel output.
    pub fn with_decibel(mut self, use_decibel: bool) -> Self {
        self.use_decibel = use_decibel;
        self
    }

    /// Check ranges; called before any computation.
    pub fn validate(&self) -> Result<()> {
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(AnalysisError::invalid(
                "window_seconds",
                format!("must be positive, got {}", self.window_seconds),
            ));
        }
        if !(0.0..1.0).contains(&self.overlap_fraction) {
            return Err(AnalysisError::invalid(
                "overlap_fraction",
                format!("must be in [0, 1), got {}", self.overlap_fraction),
            ));
        }
        if !(self.frequency_min.is_finite() && self.frequency_min >= 0.0) {
            return Err(AnalysisError::invalid(
                "frequency_min",
                format!("must be >= 0, got {}", self.frequency_min),
            ));
        }
        if self.frequency_max.is_nan() || self.frequency_min >= self.frequency_max {
            return Err(AnalysisError::invalid(
                "frequency_max",
                format!(
                    "must exceed frequency_min ({} >= {})",
                    self.frequency_min, self.frequency_max
                ),
            ));
        }
        Ok(())
    }

    /// Welch segment length and overlap in samples at a sample rate.
    pub fn segment_samples(&self, sample_rate: f64) -> (usize, usize) {
        let segment = ((self.window_seconds * sample_rate).round() as usize).max(1);
        let overlap = (self.overlap_fraction * segment as f64).round() as usize;
        (segment, overlap)
    }
}

/// A one-sided power spectrum
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Psd {
    /// Bin frequencies in Hz, ascending
    pub frequencies: Vec<f64>,
    /// Power per bin (µV²/Hz, or dB when `decibel` is set)
    pub power: Vec<f64>,
    /// True when `power` holds decibels
    pub decibel: bool,
}

/// A local maximum of a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Peak frequency in Hz
    pub frequency: f64,
    /// Power at the peak
    pub power: f64,
}

impl Psd {
    /// An empty spectrum.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// True when there are no bins.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Spacing between adjacent bins in Hz.
    pub fn bin_spacing(&self) -> Option<f64> {
        match self.frequencies.as_slice() {
            [a, b, ..] => Some(b - a),
            _ => None,
        }
    }

    /// Keep bins with `frequency_min ≤ f ≤ frequency_max`.
    pub fn restrict(&self, frequency_min: f64, frequency_max: f64) -> Psd {
        let (frequencies, power) = self
            .frequencies
            .iter()
            .zip(&self.power)
            .filter(|(f, _)| **f >= frequency_min && **f <= frequency_max)
            .map(|(f, p)| (*f, *p))
            .unzip();
        Psd {
            frequencies,
            power,
            decibel: self.decibel,
        }
    }

    /// Convert linear power to decibels (no-op if already dB).
    pub fn to_db(&self) -> Psd {
        if self.decibel {
            return self.clone();
        }
        Psd {
            frequencies: self.frequencies.clone(),
            power: self.power.iter().map(|&p| power_to_db(p)).collect(),
            decibel: true,
        }
    }

    /// Index of the bin closest to a frequency.
    pub fn nearest_bin(&self, frequency: f64) -> Option<usize> {
        self.frequencies
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - frequency).abs().total_cmp(&(b.1 - frequency).abs()))
            .map(|(i, _)| i)
    }

    /// Power at the bin closest to a frequency.
    pub fn power_near(&self, frequency: f64) -> Option<f64> {
        self.nearest_bin(frequency).map(|i| self.power[i])
    }

    /// Indices of strict local maxima (interior bins only).
    pub fn local_maxima(&self) -> Vec<usize> {
        let p = &self.power;
        (1..p.len().saturating_sub(1))
            .filter(|&i| p[i] > p[i - 1] && p[i] > p[i + 1])
            .collect()
    }

    /// Element-wise mean of equally shaped spectra.
    pub fn average(spectra: &[Psd]) -> Option<Psd> {
        let first = spectra.first()?;
        if spectra.iter().any(|s| s.len() != first.len()) {
            return None;
        }
        let mut power = vec![0.0; first.len()];
        for s in spectra {
            for (acc, p) in power.iter_mut().zip(&s.power) {
                *acc += p;
            }
        }
        let n = spectra.len() as f64;
        power.iter_mut().for_each(|p| *p /= n);
        Some(Psd {
            frequencies: first.frequencies.clone(),
            power,
            decibel: first.decibel,
        })
    }
}

/// Find the strongest local maxima
///
/// Returns up to `max_peaks` peaks sorted by power (descending), keeping only
/// peaks at least `min_distance_hz` away from every stronger peak.
pub fn find_peaks(psd: &Psd, min_distance_hz: f64, max_peaks: usize) -> Vec<SpectralPeak> {
    let mut candidates: Vec<SpectralPeak> = psd
        .local_maxima()
        .into_iter()
        .map(|i| SpectralPeak {
            frequency: psd.frequencies[i],
            power: psd.power[i],
        })
        .collect();
    candidates.sort_by(|a, b| b.power.total_cmp(&a.power));

    let mut peaks: Vec<SpectralPeak> = Vec::new();
    for c in candidates {
        if peaks.len() >= max_peaks {
            break;
        }
        let too_close = peaks
            .iter()
            .any(|p| (p.frequency - c.frequency).abs() < min_distance_hz);
        if !too_close {
            peaks.push(c);
        }
    }
    peaks
}

/// One-sided density spectrum of overlapping windowed segments.
///
/// The segment is shortened to the signal length if needed, and the overlap
/// is capped at `segment_len - 1`. An empty signal yields an empty spectrum.
pub fn welch(
    signal: &[f64],
    sample_rate: f64,
    segment_len: usize,
    overlap: usize,
    window: Window,
) -> Psd {
    let n = signal.len();
    if n == 0 || segment_len == 0 || sample_rate.is_nan() || sample_rate <= 0.0 {
        return Psd::empty();
    }
    let nperseg = segment_len.min(n);
    let noverlap = overlap.min(nperseg - 1);
    let step = nperseg - noverlap;

    let taper = window.coefficients(nperseg);
    let scale = 1.0 / (sample_rate * taper.iter().map(|w| w * w).sum::<f64>());
    let fft = Fft::new(nperseg);

    let mut acc = vec![0.0; fft.num_bins()];
    let mut segments = 0usize;
    let mut buf = vec![0.0; nperseg];
    let mut start = 0;
    while start + nperseg <= n {
        let seg = &signal[start..start + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        for ((b, &s), &w) in buf.iter_mut().zip(seg).zip(&taper) {
            *b = (s - mean) * w;
        }
        for (a, p) in acc.iter_mut().zip(fft.power(&buf)) {
            *a += p;
        }
        segments += 1;
        start += step;
    }

    let last = acc.len() - 1;
    let even = nperseg % 2 == 0;
    for (k, a) in acc.iter_mut().enumerate() {
        *a *= scale / segments as f64;
        if k != 0 && !(even && k == last) {
            *a *= 2.0;
        }
    }

    Psd {
        frequencies: rfft_frequencies(nperseg, sample_rate),
        power: acc,
        decibel: false,
    }
}

/// One-sided periodogram: `|FFT|² / (fs · N)` over the whole signal.
pub fn periodogram(signal: &[f64], sample_rate: f64) -> Psd {
    welch(signal, sample_rate, signal.len(), 0, Window::Rectangular)
}

/// Full-range linear spectrum for a parameter set (no restriction, no dB).
pub fn estimate(signal: &[f64], sample_rate: f64, params: &PsdParams) -> Result<Psd> {
    params.validate()?;
    Ok(match params.method {
        PsdMethod::Welch => {
            let (segment, overlap) = params.segment_samples(sample_rate);
            welch(signal, sample_rate, segment, overlap, params.window)
        }
        PsdMethod::Periodogram => periodogram(signal, sample_rate),
    })
}

/// PSD with the full parameter set applied.
///
/// Validates `params`, estimates, restricts to
/// `[frequency_min, frequency_max]` and converts to dB if requested.
pub fn compute_psd(signal: &[f64], sample_rate: f64, params: &PsdParams) -> Result<Psd> {
    let full = estimate(signal, sample_rate, params)?;
    let psd = full.restrict(params.frequency_min, params.frequency_max);
    Ok(if params.use_decibel { psd.to_db() } else { psd })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, fs: f64, n: usize, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn empty_signal_gives_empty_psd() {
        let psd = compute_psd(&[], 250.0, &PsdParams::default()).unwrap();
        assert!(psd.is_empty());
        assert_eq!(psd.frequencies.len(), psd.power.len());
    }

    #[test]
    fn welch_resolution_follows_segment() {
        let x = sine(10.0, 250.0, 1000, 1.0);
        let psd = welch(&x, 250.0, 500, 250, Window::Hann);
        assert!((psd.bin_spacing().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(psd.len(), 251);
    }

    #[test]
    fn periodogram_parseval() {
        // Integrated one-sided density equals the (mean-removed) signal variance.
        let fs = 256.0;
        let x = sine(16.0, fs, 1024, 2.0);
        let psd = periodogram(&x, fs);
        let df = psd.bin_spacing().unwrap();
        let total: f64 = psd.power.iter().sum::<f64>() * df;
        let var = x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64;
        assert!((total - var).abs() / var < 1e-9, "{total} vs {var}");
    }

    #[test]
    fn welch_sine_power_integrates_to_variance() {
        let fs = 256.0;
        let x = sine(32.0, fs, 4096, 1.0);
        let psd = welch(&x, fs, 512, 256, Window::Hann);
        let df = psd.bin_spacing().unwrap();
        let total: f64 = psd.power.iter().sum::<f64>() * df;
        assert!((total - 0.5).abs() < 0.02, "total {total}");
    }

    #[test]
    fn short_signal_shrinks_segment() {
        let x = sine(10.0, 100.0, 50, 1.0);
        let psd = welch(&x, 100.0, 200, 100, Window::Hann);
        assert_eq!(psd.len(), 26);
    }

    #[test]
    fn restrict_and_db() {
        let x = sine(10.0, 100.0, 400, 1.0);
        let params = PsdParams::default().with_range(5.0, 20.0).with_decibel(true);
        let psd = compute_psd(&x, 100.0, &params).unwrap();
        assert!(psd.decibel);
        assert!(psd.frequencies.iter().all(|f| (5.0..=20.0).contains(f)));
        assert_eq!(psd.frequencies.len(), psd.power.len());
    }

    #[test]
    fn validation_rejects_inverted_range() {
        let params = PsdParams::default().with_range(30.0, 10.0);
        assert!(matches!(
            compute_psd(&[0.0; 10], 100.0, &params),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        let params = PsdParams {
            overlap_fraction: 1.0,
            ..PsdParams::default()
        };
        assert!(params.validate().is_err());
        let params = PsdParams::default().with_window_seconds(0.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn find_peaks_orders_by_power() {
        let fs = 250.0;
        let x: Vec<f64> = sine(10.0, fs, 2500, 1.0)
            .iter()
            .zip(sine(40.0, fs, 2500, 0.5))
            .map(|(a, b)| a + b)
            .collect();
        let psd = compute_psd(&x, fs, &PsdParams::default()).unwrap();
        let peaks = find_peaks(&psd, 2.0, 2);
        assert_eq!(peaks.len(), 2);
        assert!((peaks[0].frequency - 10.0).abs() < 0.6);
        assert!((peaks[1].frequency - 40.0).abs() < 0.6);
    }

    #[test]
    fn method_names() {
        assert_eq!("Welch".parse::<PsdMethod>().unwrap(), PsdMethod::Welch);
        assert_eq!(
            "periodogram".parse::<PsdMethod>().unwrap(),
            PsdMethod::Periodogram
        );
        assert!("multitaper".parse::<PsdMethod>().is_err());
    }
}
