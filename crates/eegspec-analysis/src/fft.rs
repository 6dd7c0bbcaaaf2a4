//! FFT wrapper with windowing functions

use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::AnalysisError;

/// Window function types
///
/// All windows are periodic (DFT-even), the convention used for spectral
/// estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Window {
    /// Rectangular (no windowing)
    #[serde(alias = "boxcar")]
    Rectangular,
    /// Hann window (raised cosine)
    #[default]
    #[serde(alias = "hanning")]
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window
    Blackman,
    /// Blackman-Harris window (better sidelobe suppression)
    BlackmanHarris,
    /// Flat-top window (accurate peak amplitudes)
    FlatTop,
}

impl Window {
    /// All supported windows.
    pub const ALL: [Window; 6] = [
        Window::Rectangular,
        Window::Hann,
        Window::Hamming,
        Window::Blackman,
        Window::BlackmanHarris,
        Window::FlatTop,
    ];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Window::Rectangular => "rectangular",
            Window::Hann => "hann",
            Window::Hamming => "hamming",
            Window::Blackman => "blackman",
            Window::BlackmanHarris => "blackman-harris",
            Window::FlatTop => "flat-top",
        }
    }

    fn weight(&self, i: usize, n: usize) -> f64 {
        let x = 2.0 * PI * i as f64 / n as f64;
        match self {
            Window::Rectangular => 1.0,
            Window::Hann => 0.5 * (1.0 - x.cos()),
            Window::Hamming => 0.54 - 0.46 * x.cos(),
            Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            Window::BlackmanHarris => {
                0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                    - 0.01168 * (3.0 * x).cos()
            }
            Window::FlatTop => {
                0.21557895 - 0.41663158 * x.cos() + 0.277263158 * (2.0 * x).cos()
                    - 0.083578947 * (3.0 * x).cos()
                    + 0.006947368 * (4.0 * x).cos()
            }
        }
    }

    /// Apply window to a buffer
    pub fn apply(&self, buffer: &mut [f64]) {
        if *self == Window::Rectangular {
            return;
        }
        let n = buffer.len();
        for (i, sample) in buffer.iter_mut().enumerate() {
            *sample *= self.weight(i, n);
        }
    }

    /// Get window coefficients
    pub fn coefficients(&self, size: usize) -> Vec<f64> {
        (0..size).map(|i| self.weight(i, size)).collect()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Window {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "rectangular" | "boxcar" | "rect" => Ok(Window::Rectangular),
            "hann" | "hanning" => Ok(Window::Hann),
            "hamming" => Ok(Window::Hamming),
            "blackman" => Ok(Window::Blackman),
            "blackman-harris" | "blackmanharris" => Ok(Window::BlackmanHarris),
            "flat-top" | "flattop" => Ok(Window::FlatTop),
            other => Err(AnalysisError::invalid(
                "window",
                format!("unknown window function '{other}'"),
            )),
        }
    }
}

/// FFT processor with caching
pub struct Fft {
    planner: FftPlanner<f64>,
    fft: Arc<dyn rustfft::Fft<f64>>,
    size: usize,
}

impl fmt::Debug for Fft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft").field("size", &self.size).finish()
    }
}

impl Fft {
    /// Create a new FFT processor for the given size
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Self { planner, fft, size }
    }

    /// Get FFT size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of one-sided bins (`size/2 + 1`)
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Resize the FFT (creates new plan if needed)
    pub fn resize(&mut self, size: usize) {
        if size != self.size {
            self.fft = self.planner.plan_fft_forward(size);
            self.size = size;
        }
    }

    /// Perform forward FFT on real input
    ///
    /// Returns complex spectrum (size/2 + 1 bins for positive frequencies)
    pub fn forward(&self, input: &[f64]) -> Vec<Complex<f64>> {
        let mut buffer: Vec<Complex<f64>> = input.iter().map(|&x| Complex::new(x, 0.0)).collect();

        // Pad or truncate to FFT size
        buffer.resize(self.size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        // Return only positive frequencies (DC to Nyquist)
        buffer.truncate(self.num_bins());
        buffer
    }

    /// Squared magnitude of the one-sided spectrum
    pub fn power(&self, input: &[f64]) -> Vec<f64> {
        self.forward(input).iter().map(|c| c.norm_sqr()).collect()
    }
}

/// Bin center frequencies of a one-sided spectrum (`rfftfreq`)
pub fn rfft_frequencies(fft_size: usize, sample_rate: f64) -> Vec<f64> {
    let df = sample_rate / fft_size as f64;
    (0..fft_size / 2 + 1).map(|k| k as f64 * df).collect()
}
