//! Spectral parameterization into aperiodic and periodic components
//!
//! A power spectrum is modelled in `log10` space as an aperiodic curve plus a
//! sum of Gaussian peaks:
//!
//! ```text
//! fixed: L(f) = b − χ·log10(f)
//! knee:  L(f) = b − log10(k + f^χ)
//! model: log10 P(f) ≈ L(f) + Σ h·exp(−(f − c)² / 2σ²)
//! ```
//!
//! The fitting algorithm sits behind [`SpectralParameterizer`]; the analysis
//! only prepares the spectrum, picks channels and forwards results.
//! [`PeakFitter`] is the built-in implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use eegspec_core::DB_EPSILON;

use crate::error::{AnalysisError, Result};
use crate::selection::ChannelData;
use crate::spectrum::{Psd, PsdParams, estimate};

/// Shape of the aperiodic component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AperiodicMode {
    /// Straight line in log-log space
    #[default]
    Fixed,
    /// Line with a bend at the knee frequency
    Knee,
}

impl fmt::Display for AperiodicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AperiodicMode::Fixed => "fixed",
            AperiodicMode::Knee => "knee",
        })
    }
}

impl FromStr for AperiodicMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(AperiodicMode::Fixed),
            "knee" => Ok(AperiodicMode::Knee),
            other => Err(AnalysisError::invalid(
                "aperiodic_mode",
                format!("unknown mode '{other}'"),
            )),
        }
    }
}

/// Settings forwarded to a [`SpectralParameterizer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Frequency range fitted, in Hz (default: 1–50)
    pub frequency_range: [f64; 2],
    /// Allowed peak bandwidth (2σ) in Hz (default: 0.5–12)
    pub peak_width_limits: [f64; 2],
    /// Maximum number of peaks (default: 6)
    pub max_n_peaks: usize,
    /// Minimum peak height above the aperiodic fit, in log10 power (default: 0.1)
    pub min_peak_height: f64,
    /// Peak threshold in standard deviations of the flattened spectrum (default: 2.0)
    pub peak_threshold: f64,
    /// Aperiodic shape (default: fixed)
    pub aperiodic_mode: AperiodicMode,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            frequency_range: [1.0, 50.0],
            peak_width_limits: [0.5, 12.0],
            max_n_peaks: 6,
            min_peak_height: 0.1,
            peak_threshold: 2.0,
            aperiodic_mode: AperiodicMode::Fixed,
        }
    }
}

impl FitSettings {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        let [lo, hi] = self.frequency_range;
        if !(lo > 0.0 && hi > lo) {
            return Err(AnalysisError::invalid(
                "frequency_range",
                format!("must satisfy 0 < low < high, got [{lo}, {hi}]"),
            ));
        }
        let [wlo, whi] = self.peak_width_limits;
        if !(wlo > 0.0 && whi >= wlo) {
            return Err(AnalysisError::invalid(
                "peak_width_limits",
                format!("must satisfy 0 < low <= high, got [{wlo}, {whi}]"),
            ));
        }
        if self.min_peak_height.is_nan() || self.min_peak_height < 0.0 {
            return Err(AnalysisError::invalid("min_peak_height", "must be >= 0"));
        }
        if self.peak_threshold.is_nan() || self.peak_threshold < 0.0 {
            return Err(AnalysisError::invalid("peak_threshold", "must be >= 0"));
        }
        Ok(())
    }
}

/// Parameters for a parameterization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FooofParams {
    /// Fitter settings
    #[serde(flatten)]
    pub fit: FitSettings,
    /// Spectrum estimator (default: Welch, 4 s segments, 50% overlap, Hann)
    pub psd: PsdParams,
    /// Channels fitted at most (default: 4)
    pub max_channels: usize,
    /// Range searched for the alpha peak in Hz (default: 8–12)
    pub alpha_range: [f64; 2],
}

impl Default for FooofParams {
    fn default() -> Self {
        Self {
            fit: FitSettings::default(),
            psd: PsdParams::default().with_window_seconds(4.0),
            max_channels: 4,
            alpha_range: [8.0, 12.0],
        }
    }
}

impl FooofParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        self.fit.validate()?;
        self.psd.validate()?;
        if self.max_channels == 0 {
            return Err(AnalysisError::invalid("max_channels", "must be at least 1"));
        }
        if self.alpha_range[0] >= self.alpha_range[1] {
            return Err(AnalysisError::invalid("alpha_range", "low must be below high"));
        }
        Ok(())
    }
}

/// Aperiodic component parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AperiodicParams {
    /// Offset `b` in log10 power
    pub offset: f64,
    /// Knee `k`; `None` in fixed mode
    pub knee: Option<f64>,
    /// Exponent `χ`
    pub exponent: f64,
}

impl AperiodicParams {
    /// Evaluate the aperiodic curve in log10 power.
    pub fn evaluate(&self, frequency: f64) -> f64 {
        match self.knee {
            Some(k) => self.offset - (k + frequency.powf(self.exponent)).log10(),
            None => self.offset - self.exponent * frequency.log10(),
        }
    }
}

/// A Gaussian peak over the aperiodic fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianPeak {
    /// Centre frequency in Hz
    pub center_hz: f64,
    /// Height above the aperiodic fit in log10 power
    pub height: f64,
    /// Bandwidth (2σ) in Hz
    pub bandwidth_hz: f64,
}

impl GaussianPeak {
    fn sigma(&self) -> f64 {
        self.bandwidth_hz / 2.0
    }

    /// Evaluate the peak in log10 power.
    pub fn evaluate(&self, frequency: f64) -> f64 {
        let s = self.sigma();
        self.height * (-(frequency - self.center_hz).powi(2) / (2.0 * s * s)).exp()
    }
}

/// Result of fitting one spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralFit {
    /// Aperiodic parameters
    pub aperiodic: AperiodicParams,
    /// Peaks ordered by centre frequency
    pub peaks: Vec<GaussianPeak>,
    /// Squared correlation between spectrum and model
    pub r_squared: f64,
    /// Mean absolute error of the model in log10 power
    pub error: f64,
    /// Fitted frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Input spectrum in log10 power
    pub log_power: Vec<f64>,
    /// Full model in log10 power
    pub model: Vec<f64>,
    /// Aperiodic component in log10 power
    pub aperiodic_fit: Vec<f64>,
}

/// Fits a power spectrum into aperiodic and periodic parts.
pub trait SpectralParameterizer: Send + Sync {
    /// Short identifier reported alongside results.
    fn name(&self) -> &str;

    /// Fit a linear-power spectrum.
    fn fit(&self, psd: &Psd, settings: &FitSettings) -> Result<SpectralFit>;
}

/// Built-in iterative Gaussian peak fitter
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakFitter;

/// Percentile of the flattened spectrum below which points drive the robust refit.
const AP_PERCENTILE: f64 = 2.5;
/// Peaks closer than this many σ to a range edge are dropped.
const EDGE_STD: f64 = 1.0;
/// Peaks overlapping within this many σ of a stronger peak are dropped.
const OVERLAP_STD: f64 = 0.75;

impl SpectralParameterizer for PeakFitter {
    fn name(&self) -> &str {
        "peak-fitter"
    }

    fn fit(&self, psd: &Psd, settings: &FitSettings) -> Result<SpectralFit> {
        settings.validate()?;
        let [lo, hi] = settings.frequency_range;
        let linear: Vec<f64> = if psd.decibel {
            psd.power.iter().map(|db| 10f64.powf(db / 10.0)).collect()
        } else {
            psd.power.clone()
        };
        let (freqs, log_power): (Vec<f64>, Vec<f64>) = psd
            .frequencies
            .iter()
            .zip(&linear)
            .filter(|(f, _)| **f > 0.0 && **f >= lo && **f <= hi)
            .map(|(f, p)| (*f, (p.max(0.0) + DB_EPSILON).log10()))
            .unzip();
        if freqs.len() < 3 {
            return Err(AnalysisError::invalid(
                "frequency_range",
                format!("only {} bins inside [{lo}, {hi}] Hz", freqs.len()),
            ));
        }
        let df = freqs[1] - freqs[0];

        // Initial then robust aperiodic fit.
        let initial = fit_aperiodic(&freqs, &log_power, settings.aperiodic_mode);
        let flat: Vec<f64> = freqs
            .iter()
            .zip(&log_power)
            .map(|(f, y)| (y - initial.evaluate(*f)).max(0.0))
            .collect();
        let threshold = percentile(&flat, AP_PERCENTILE);
        let (f_sel, y_sel): (Vec<f64>, Vec<f64>) = freqs
            .iter()
            .zip(&log_power)
            .zip(&flat)
            .filter(|(_, fl)| **fl <= threshold)
            .map(|((f, y), _)| (*f, *y))
            .unzip();
        let robust = if f_sel.len() >= 2 {
            fit_aperiodic(&f_sel, &y_sel, settings.aperiodic_mode)
        } else {
            initial
        };

        let flattened: Vec<f64> = freqs
            .iter()
            .zip(&log_power)
            .map(|(f, y)| y - robust.evaluate(*f))
            .collect();
        let peaks = find_gaussians(&freqs, flattened, df, settings);

        // Refit the aperiodic part with the peaks removed.
        let peak_fit: Vec<f64> = freqs
            .iter()
            .map(|&f| peaks.iter().map(|p| p.evaluate(f)).sum())
            .collect();
        let without_peaks: Vec<f64> = log_power.iter().zip(&peak_fit).map(|(y, p)| y - p).collect();
        let aperiodic = fit_aperiodic(&freqs, &without_peaks, settings.aperiodic_mode);

        let aperiodic_fit: Vec<f64> = freqs.iter().map(|&f| aperiodic.evaluate(f)).collect();
        let model: Vec<f64> = aperiodic_fit.iter().zip(&peak_fit).map(|(a, p)| a + p).collect();
        let error = log_power
            .iter()
            .zip(&model)
            .map(|(y, m)| (y - m).abs())
            .sum::<f64>()
            / freqs.len() as f64;

        Ok(SpectralFit {
            aperiodic,
            peaks,
            r_squared: correlation(&log_power, &model).map_or(0.0, |r| r * r),
            error,
            frequencies: freqs,
            log_power,
            model,
            aperiodic_fit,
        })
    }
}

fn fit_aperiodic(freqs: &[f64], log_power: &[f64], mode: AperiodicMode) -> AperiodicParams {
    match mode {
        AperiodicMode::Fixed => {
            let x: Vec<f64> = freqs.iter().map(|f| f.log10()).collect();
            let (intercept, slope) = linear_fit(&x, log_power);
            AperiodicParams {
                offset: intercept,
                knee: None,
                exponent: -slope,
            }
        }
        AperiodicMode::Knee => fit_knee(freqs, log_power),
    }
}

/// Least-squares `y = a + b·x`.
fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let sxx: f64 = x.iter().map(|a| (a - mx) * (a - mx)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (my - slope * mx, slope)
}

/// Offset and squared error for a fixed knee and exponent; the offset is
/// solved in closed form.
fn knee_sse(freqs: &[f64], log_power: &[f64], knee: f64, exponent: f64) -> (f64, f64) {
    let g: Vec<f64> = freqs.iter().map(|f| (knee + f.powf(exponent)).log10()).collect();
    let offset = log_power.iter().zip(&g).map(|(y, g)| y + g).sum::<f64>() / freqs.len() as f64;
    let sse = log_power
        .iter()
        .zip(&g)
        .map(|(y, g)| (y - (offset - g)).powi(2))
        .sum();
    (offset, sse)
}

/// Grid search over `log10(knee)` and exponent, refined three times around
/// the best cell.
fn fit_knee(freqs: &[f64], log_power: &[f64]) -> AperiodicParams {
    let mut best = (f64::INFINITY, 0.0, 0.0, 1.0); // (sse, offset, knee, exponent)
    let consider = |knee: f64, exponent: f64, best: &mut (f64, f64, f64, f64)| {
        let (offset, sse) = knee_sse(freqs, log_power, knee, exponent);
        if sse < best.0 {
            *best = (sse, offset, knee, exponent);
        }
    };

    for e in 0..=100 {
        let exponent = e as f64 * 0.05;
        consider(0.0, exponent, &mut best);
        for k in -10..=40 {
            consider(10f64.powf(k as f64 / 10.0), exponent, &mut best);
        }
    }

    let (mut log_step, mut exp_step) = (0.1, 0.05);
    for _ in 0..3 {
        let (_, _, knee0, exp0) = best;
        let log_k0 = if knee0 > 0.0 { knee0.log10() } else { -1.0 };
        for i in -10..=10 {
            let exponent = (exp0 + i as f64 * exp_step / 10.0).max(0.0);
            for j in -10..=10 {
                let knee = 10f64.powf(log_k0 + j as f64 * log_step / 10.0);
                consider(knee, exponent, &mut best);
            }
        }
        log_step /= 10.0;
        exp_step /= 10.0;
    }

    AperiodicParams {
        offset: best.1,
        knee: Some(best.2),
        exponent: best.3,
    }
}

fn find_gaussians(
    freqs: &[f64],
    mut flat: Vec<f64>,
    df: f64,
    settings: &FitSettings,
) -> Vec<GaussianPeak> {
    let [wlo, whi] = settings.peak_width_limits;
    let (std_lo, std_hi) = (wlo / 2.0, whi / 2.0);
    let mut guesses: Vec<GaussianPeak> = Vec::new();

    while guesses.len() < settings.max_n_peaks {
        let Some((idx, &height)) = flat
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            break;
        };
        let std = eegspec_core::std_dev(&flat).unwrap_or(0.0);
        if height <= settings.peak_threshold * std || height <= settings.min_peak_height {
            break;
        }

        let half = height / 2.0;
        let left = (0..idx).rev().find(|&i| flat[i] <= half).map(|i| idx - i);
        let right = (idx + 1..flat.len()).find(|&i| flat[i] <= half).map(|i| i - idx);
        let sigma = match left.into_iter().chain(right).min() {
            Some(side) => side as f64 * 2.0 * df / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt()),
            None => (std_lo + std_hi) / 2.0,
        }
        .clamp(std_lo, std_hi);

        let peak = GaussianPeak {
            center_hz: freqs[idx],
            height,
            bandwidth_hz: 2.0 * sigma,
        };
        for (v, &f) in flat.iter_mut().zip(freqs) {
            *v -= peak.evaluate(f);
        }
        guesses.push(peak);
    }

    let (lo, hi) = (freqs[0], freqs[freqs.len() - 1]);
    guesses.retain(|p| {
        let s = p.sigma();
        (p.center_hz - lo).abs() > EDGE_STD * s && (hi - p.center_hz).abs() > EDGE_STD * s
    });

    guesses.sort_by(|a, b| a.center_hz.total_cmp(&b.center_hz));
    let mut kept: Vec<GaussianPeak> = Vec::with_capacity(guesses.len());
    for p in guesses {
        match kept.last_mut() {
            Some(prev)
                if prev.center_hz + OVERLAP_STD * prev.sigma()
                    > p.center_hz - OVERLAP_STD * p.sigma() =>
            {
                if p.height > prev.height {
                    *prev = p;
                }
            }
            _ => kept.push(p),
        }
    }
    kept
}

fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let ma = eegspec_core::mean(a)?;
    let mb = eegspec_core::mean(b)?;
    let cov: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = a.iter().map(|x| (x - ma) * (x - ma)).sum();
    let vb: f64 = b.iter().map(|y| (y - mb) * (y - mb)).sum();
    let denom = (va * vb).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

/// Fit of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFit {
    /// Channel label
    pub channel: String,
    /// Fit result
    pub fit: SpectralFit,
    /// Strongest peak inside the alpha range
    pub alpha_peak: Option<GaussianPeak>,
}

/// Parameterization of a channel set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FooofReport {
    /// Name of the parameterizer used
    pub parameterizer: String,
    /// Aperiodic mode requested
    pub aperiodic_mode: AperiodicMode,
    /// One fit per channel
    pub channels: Vec<ChannelFit>,
    /// Channels beyond `max_channels` that were not fitted
    pub omitted_channels: Vec<String>,
}

/// Estimate each channel's spectrum and hand it to a parameterizer.
pub fn parameterize(
    channels: &[ChannelData<'_>],
    sample_rate: f64,
    params: &FooofParams,
    parameterizer: &dyn SpectralParameterizer,
) -> Result<FooofReport> {
    params.validate()?;
    if channels.is_empty() {
        return Err(AnalysisError::invalid("channels", "selection is empty"));
    }

    let (fitted, omitted) = channels.split_at(channels.len().min(params.max_channels));
    let mut fits = Vec::with_capacity(fitted.len());
    for ch in fitted {
        if ch.samples.is_empty() {
            return Err(AnalysisError::EmptySignal);
        }
        let psd = estimate(ch.samples, sample_rate, &params.psd)?;
        let fit = parameterizer.fit(&psd, &params.fit)?;
        let [alo, ahi] = params.alpha_range;
        let alpha_peak = fit
            .peaks
            .iter()
            .filter(|p| p.center_hz >= alo && p.center_hz <= ahi)
            .max_by(|a, b| a.height.total_cmp(&b.height))
            .copied();
        tracing::debug!(
            channel = ch.name,
            exponent = fit.aperiodic.exponent,
            peaks = fit.peaks.len(),
            r_squared = fit.r_squared,
            "spectrum parameterized"
        );
        fits.push(ChannelFit {
            channel: ch.name.to_string(),
            fit,
            alpha_peak,
        });
    }

    Ok(FooofReport {
        parameterizer: parameterizer.name().to_string(),
        aperiodic_mode: params.fit.aperiodic_mode,
        channels: fits,
        omitted_channels: omitted.iter().map(|c| c.name.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(offset: f64, exponent: f64, knee: Option<f64>, peaks: &[(f64, f64, f64)]) -> Psd {
        let frequencies: Vec<f64> = (0..=400).map(|i| i as f64 * 0.25).collect();
        let ap = AperiodicParams {
            offset,
            knee,
            exponent,
        };
        let power = frequencies
            .iter()
            .map(|&f| {
                if f == 0.0 {
                    return 1.0;
                }
                let g: f64 = peaks
                    .iter()
                    .map(|&(c, h, s)| h * (-(f - c).powi(2) / (2.0 * s * s)).exp())
                    .sum();
                10f64.powf(ap.evaluate(f) + g)
            })
            .collect();
        Psd {
            frequencies,
            power,
            decibel: false,
        }
    }

    #[test]
    fn pure_power_law_fixed() {
        let psd = synthetic(1.0, 1.5, None, &[]);
        let fit = PeakFitter.fit(&psd, &FitSettings::default()).unwrap();
        assert!((fit.aperiodic.exponent - 1.5).abs() < 1e-6);
        assert!((fit.aperiodic.offset - 1.0).abs() < 1e-6);
        assert!(fit.peaks.is_empty());
        assert!(fit.r_squared > 0.999);
        assert!(fit.error < 1e-6);
    }

    #[test]
    fn alpha_peak_is_recovered() {
        let psd = synthetic(1.0, 1.5, None, &[(10.0, 0.8, 1.0)]);
        let fit = PeakFitter.fit(&psd, &FitSettings::default()).unwrap();
        assert_eq!(fit.peaks.len(), 1, "{:?}", fit.peaks);
        let p = fit.peaks[0];
        assert!((p.center_hz - 10.0).abs() < 0.3);
        assert!((p.height - 0.8).abs() < 0.1);
        assert!((fit.aperiodic.exponent - 1.5).abs() < 0.1);
        assert!(fit.r_squared > 0.95);
    }

    #[test]
    fn knee_mode_fits_bent_spectrum() {
        let psd = synthetic(2.0, 2.0, Some(20.0), &[]);
        let settings = FitSettings {
            aperiodic_mode: AperiodicMode::Knee,
            ..FitSettings::default()
        };
        let fit = PeakFitter.fit(&psd, &settings).unwrap();
        let knee = fit.aperiodic.knee.unwrap();
        assert!((fit.aperiodic.exponent - 2.0).abs() < 0.2, "{:?}", fit.aperiodic);
        assert!(knee > 10.0 && knee < 40.0, "{knee}");
        assert!(fit.r_squared > 0.99);
    }

    #[test]
    fn too_few_bins_is_invalid() {
        let psd = synthetic(1.0, 1.0, None, &[]);
        let settings = FitSettings {
            frequency_range: [10.0, 10.3],
            ..FitSettings::default()
        };
        assert!(PeakFitter.fit(&psd, &settings).is_err());
    }

    #[test]
    fn mode_names() {
        assert_eq!("KNEE".parse::<AperiodicMode>().unwrap(), AperiodicMode::Knee);
        assert!("lorentzian".parse::<AperiodicMode>().is_err());
    }

    #[test]
    fn channels_beyond_limit_are_omitted() {
        let fs = 128.0;
        let x: Vec<f64> = (0..2048).map(|i| ((i * 7919) % 113) as f64 / 113.0 - 0.5).collect();
        let names = ["O1", "O2", "Oz"];
        let chans: Vec<ChannelData<'_>> = names
            .iter()
            .map(|n| ChannelData {
                name: n,
                samples: &x,
            })
            .collect();
        let params = FooofParams {
            max_channels: 2,
            ..FooofParams::default()
        };
        let report = parameterize(&chans, fs, &params, &PeakFitter).unwrap();
        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.omitted_channels, vec!["Oz".to_string()]);
        assert_eq!(report.parameterizer, "peak-fitter");
    }
}
