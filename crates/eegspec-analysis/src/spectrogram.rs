//! STFT-based spectrogram generation
//!
//! Provides time-frequency analysis through Short-Time Fourier Transform.
//! The segment length is derived from the requested number of time points,
//! so every call reads its layout from the [`SpectrogramParams`] it is given.

use serde::{Deserialize, Serialize};

use eegspec_core::power_to_db;

use crate::error::{AnalysisError, Result};
use crate::fft::{Fft, Window, rfft_frequencies};

/// Shortest STFT segment in samples.
pub const MIN_SEGMENT: usize = 64;

/// Parameters for a spectrogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParams {
    /// Approximate number of time frames (default: 100)
    pub time_points: usize,
    /// Minimum FFT size (default: 256)
    pub freq_points: usize,
    /// Lowest frequency kept in Hz (default: 0.5)
    pub frequency_min: f64,
    /// Highest frequency kept in Hz (default: 50.0)
    pub frequency_max: f64,
    /// Segment taper (default: Hann)
    pub window: Window,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self {
            time_points: 100,
            freq_points: 256,
            frequency_min: 0.5,
            frequency_max: 50.0,
            window: Window::Hann,
        }
    }
}

impl SpectrogramParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.time_points < 2 {
            return Err(AnalysisError::invalid(
                "time_points",
                format!("must be at least 2, got {}", self.time_points),
            ));
        }
        if self.freq_points < 2 {
            return Err(AnalysisError::invalid(
                "freq_points",
                format!("must be at least 2, got {}", self.freq_points),
            ));
        }
        if !(self.frequency_min >= 0.0 && self.frequency_max > self.frequency_min) {
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

    /// `(segment, hop, fft_size)` for a signal of `len` samples.
    pub fn layout(&self, len: usize) -> (usize, usize, usize) {
        let divisor = (self.time_points / 2).max(1);
        let segment = (len / divisor).max(MIN_SEGMENT).min(len).max(1);
        let hop = (segment / 2).max(1);
        let fft_size = segment.max(self.freq_points);
        (segment, hop, fft_size)
    }
}

/// Spectrogram data structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    /// Frame centres in seconds
    pub times: Vec<f64>,
    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Power `[time_frame][frequency_bin]` (density, or dB when `decibel`)
    pub power: Vec<Vec<f64>>,
    /// True when `power` holds decibels
    pub decibel: bool,
    /// Samples per segment
    pub segment_samples: usize,
    /// Samples between segment starts
    pub hop_samples: usize,
    /// FFT size used
    pub fft_size: usize,
    /// Sample rate
    pub sample_rate: f64,
}

impl Spectrogram {
    /// Number of time frames
    pub fn num_frames(&self) -> usize {
        self.times.len()
    }

    /// Number of frequency bins kept
    pub fn num_bins(&self) -> usize {
        self.frequencies.len()
    }

    /// Frequency resolution (Hz per bin)
    pub fn frequency_resolution(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }

    /// Time resolution (seconds per frame)
    pub fn time_resolution(&self) -> f64 {
        self.hop_samples as f64 / self.sample_rate
    }

    /// Power at a frame and bin.
    ///
    /// Returns None if out of bounds
    pub fn get(&self, frame: usize, bin: usize) -> Option<f64> {
        self.power.get(frame).and_then(|f| f.get(bin)).copied()
    }

    /// Spectrum of one frame
    pub fn frame(&self, frame: usize) -> Option<&[f64]> {
        self.power.get(frame).map(Vec::as_slice)
    }

    /// Power of one bin across time
    pub fn bin_over_time(&self, bin: usize) -> Vec<f64> {
        self.power
            .iter()
            .filter_map(|frame| frame.get(bin).copied())
            .collect()
    }

    /// Frequency of the strongest bin in a frame
    pub fn peak_frequency(&self, frame: usize) -> Option<f64> {
        let spectrum = self.frame(frame)?;
        let (peak_bin, _) = spectrum
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
        self.frequencies.get(peak_bin).copied()
    }

    /// Keep bins with `frequency_min ≤ f ≤ frequency_max`.
    pub fn restrict(&self, frequency_min: f64, frequency_max: f64) -> Spectrogram {
        let keep: Vec<usize> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|(_, f)| **f >= frequency_min && **f <= frequency_max)
            .map(|(i, _)| i)
            .collect();
        Spectrogram {
            times: self.times.clone(),
            frequencies: keep.iter().map(|&i| self.frequencies[i]).collect(),
            power: self
                .power
                .iter()
                .map(|frame| keep.iter().map(|&i| frame[i]).collect())
                .collect(),
            ..self.clone_layout()
        }
    }

    /// Convert density to dB with the epsilon floor (no-op if already dB).
    pub fn to_db(&self) -> Spectrogram {
        if self.decibel {
            return self.clone();
        }
        Spectrogram {
            times: self.times.clone(),
            frequencies: self.frequencies.clone(),
            power: self
                .power
                .iter()
                .map(|frame| frame.iter().map(|&p| power_to_db(p)).collect())
                .collect(),
            decibel: true,
            ..self.clone_layout()
        }
    }

    fn clone_layout(&self) -> Spectrogram {
        Spectrogram {
            times: Vec::new(),
            frequencies: Vec::new(),
            power: Vec::new(),
            decibel: self.decibel,
            segment_samples: self.segment_samples,
            hop_samples: self.hop_samples,
            fft_size: self.fft_size,
            sample_rate: self.sample_rate,
        }
    }
}

/// STFT (Short-Time Fourier Transform) analyzer
pub struct StftAnalyzer {
    segment: usize,
    hop: usize,
    sample_rate: f64,
    fft: Fft,
    window_coeffs: Vec<f64>,
}

impl StftAnalyzer {
    /// Create a new STFT analyzer
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `segment` - Samples per segment
    /// * `hop` - Samples between segment starts
    /// * `fft_size` - FFT size; segments are zero-padded up to it
    /// * `window` - Window function to use
    pub fn new(sample_rate: f64, segment: usize, hop: usize, fft_size: usize, window: Window) -> Self {
        Self {
            segment,
            hop: hop.max(1),
            sample_rate,
            fft: Fft::new(fft_size.max(segment)),
            window_coeffs: window.coefficients(segment),
        }
    }

    /// Analyzer for a parameter set and signal length
    pub fn from_params(sample_rate: f64, len: usize, params: &SpectrogramParams) -> Self {
        let (segment, hop, fft_size) = params.layout(len);
        Self::new(sample_rate, segment, hop, fft_size, params.window)
    }

    /// Samples per segment
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// FFT size
    pub fn fft_size(&self) -> usize {
        self.fft.size()
    }

    /// One-sided density spectrogram over the whole frequency axis.
    pub fn analyze(&self, signal: &[f64]) -> Spectrogram {
        let fft_size = self.fft.size();
        let num_frames = if signal.len() >= self.segment && self.segment > 0 {
            (signal.len() - self.segment) / self.hop + 1
        } else {
            0
        };

        let scale = 1.0 / (self.sample_rate * self.window_coeffs.iter().map(|w| w * w).sum::<f64>());
        let last = fft_size / 2;
        let even = fft_size % 2 == 0;

        let mut times = Vec::with_capacity(num_frames);
        let mut power = Vec::with_capacity(num_frames);
        let mut frame = vec![0.0; self.segment];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.hop;
            let seg = &signal[start..start + self.segment];
            let mean = seg.iter().sum::<f64>() / self.segment as f64;

            for ((out, &s), &w) in frame.iter_mut().zip(seg).zip(&self.window_coeffs) {
                *out = (s - mean) * w;
            }

            let mut bins = self.fft.power(&frame);
            for (k, p) in bins.iter_mut().enumerate() {
                *p *= scale;
                if k != 0 && !(even && k == last) {
                    *p *= 2.0;
                }
            }

            times.push((start as f64 + self.segment as f64 / 2.0) / self.sample_rate);
            power.push(bins);
        }

        Spectrogram {
            times,
            frequencies: rfft_frequencies(fft_size, self.sample_rate),
            power,
            decibel: false,
            segment_samples: self.segment,
            hop_samples: self.hop,
            fft_size,
            sample_rate: self.sample_rate,
        }
    }
}

/// Spectrogram in dB, restricted to the parameter frequency range.
pub fn compute_spectrogram(
    signal: &[f64],
    sample_rate: f64,
    params: &SpectrogramParams,
) -> Result<Spectrogram> {
    params.validate()?;
    if signal.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }
    let analyzer = StftAnalyzer::from_params(sample_rate, signal.len(), params);
    tracing::debug!(
        segment = analyzer.segment(),
        fft_size = analyzer.fft_size(),
        "spectrogram layout"
    );
    Ok(analyzer
        .analyze(signal)
        .restrict(params.frequency_min, params.frequency_max)
        .to_db())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn layout_follows_time_points() {
        let p = SpectrogramParams::default();
        assert_eq!(p.layout(2560), (64, 32, 256));
        let p = SpectrogramParams {
            time_points: 20,
            ..SpectrogramParams::default()
        };
        assert_eq!(p.layout(2560), (256, 128, 256));
        // Short signals cap the segment at their length.
        assert_eq!(SpectrogramParams::default().layout(40).0, 40);
    }

    #[test]
    fn sine_peak_tracks_frequency() {
        let fs = 256.0;
        let x = sine(20.0, fs, 2560);
        let spec = compute_spectrogram(&x, fs, &SpectrogramParams::default()).unwrap();
        assert!(spec.decibel);
        assert!(spec.num_frames() > 50);
        for frame in [0, spec.num_frames() / 2, spec.num_frames() - 1] {
            let f = spec.peak_frequency(frame).unwrap();
            assert!((f - 20.0).abs() <= 1.0, "frame {frame}: {f}");
        }
        assert!(spec.frequencies.iter().all(|f| (0.5..=50.0).contains(f)));
    }

    #[test]
    fn frame_times_are_centres() {
        let fs = 100.0;
        let analyzer = StftAnalyzer::new(fs, 100, 50, 128, Window::Hann);
        let spec = analyzer.analyze(&vec![0.0; 300]);
        assert_eq!(spec.num_frames(), 5);
        assert!((spec.times[0] - 0.5).abs() < 1e-12);
        assert!((spec.time_resolution() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_signal_is_an_error() {
        assert!(matches!(
            compute_spectrogram(&[], 100.0, &SpectrogramParams::default()),
            Err(AnalysisError::EmptySignal)
        ));
    }
}
