//! Biquad (bi-quadratic) filter structure.
//!
//! Provides a generic second-order IIR section. The Butterworth band-pass in
//! [`crate::butterworth`] sets its sections directly from pole positions.
//!
//! Low-pass and high-pass coefficient calculation uses the RBJ Audio EQ
//! Cookbook formulas.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

/// Generic biquad filter coefficients and state.
///
/// Implements the Direct Form I biquad structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
///
/// This is a building block for creating specific filter types.
#[derive(Debug, Clone)]
pub struct Biquad {
    /// Feedforward coefficients
    b0: f64,
    b1: f64,
    b2: f64,

    /// Feedback coefficients (stored as negated for efficiency)
    a1: f64,
    a2: f64,

    /// Input delay line: x[n-1], x[n-2]
    x1: f64,
    x2: f64,

    /// Output delay line: y[n-1], y[n-2]
    y1: f64,
    y2: f64,
}

impl Biquad {
    /// Creates a new biquad with passthrough coefficients.
    ///
    /// Initial state: `y[n] = x[n]` (no filtering)
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Sets the biquad coefficients.
    ///
    /// # Arguments
    ///
    /// * `b0, b1, b2` - Feedforward coefficients
    /// * `a0, a1, a2` - Feedback coefficients (a0 is typically 1.0)
    ///
    /// Note: This function normalizes by a0 internally.
    pub fn set_coefficients(&mut self, b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) {
        // Normalize by a0
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.b2 = b2 * a0_inv;
        self.a1 = a1 * a0_inv;
        self.a2 = a2 * a0_inv;
    }

    /// Processes a single sample through the biquad filter.
    ///
    /// Uses Direct Form I structure for numerical stability.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        // Calculate output: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                                   - a1*y[n-1] - a2*y[n-2]
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
                                     - self.a1 * self.y1 - self.a2 * self.y2;

        // Update delay lines
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Processes a block in place.
    pub fn process_slice(&mut self, samples: &mut [f64]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    /// Magnitude response at `freq_hz` (linear gain).
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let z1 = Complex64::from_polar(1.0, -2.0 * PI * freq_hz / sample_rate);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num.norm() / den.norm()
    }

    /// Clears the filter state (delay lines).
    ///
    /// Useful for resetting the filter without changing coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculates low-pass filter coefficients using the RBJ cookbook formula.
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.707 for a single Butterworth section)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn lowpass_coefficients(frequency: f64, q: f64, sample_rate: f64) -> (f64, f64, f64, f64, f64, f64) {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let sin_omega = omega.sin();
    let alpha = sin_omega / (2.0 * q);

    let b0 = (1.0 - cos_omega) / 2.0;
    let b1 = 1.0 - cos_omega;
    let b2 = (1.0 - cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}

/// Calculates high-pass filter coefficients using the RBJ cookbook formula.
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.707 for a single Butterworth section)
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// (b0, b1, b2, a0, a1, a2) coefficients
pub fn highpass_coefficients(frequency: f64, q: f64, sample_rate: f64) -> (f64, f64, f64, f64, f64, f64) {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let sin_omega = omega.sin();
    let alpha = sin_omega / (2.0 * q);

    let b0 = (1.0 + cos_omega) / 2.0;
    let b1 = -(1.0 + cos_omega);
    let b2 = (1.0 + cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}
