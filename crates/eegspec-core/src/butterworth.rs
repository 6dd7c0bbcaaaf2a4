//! Butterworth band-pass filtering.
//!
//! The band-pass is designed from the analog low-pass prototype of order `n`,
//! whose poles sit on the unit circle at `exp(iπ(2k + n + 1) / 2n)`. The
//! low-pass to band-pass substitution `s → (s² + ω0²) / (s·B)` maps each
//! prototype pole to a pair of poles around the geometric centre
//! `ω0 = √(ω_lo·ω_hi)`, with `B = ω_hi − ω_lo`. The band edges are prewarped
//! so the bilinear transform lands them on `low_hz` and `high_hz` exactly.
//!
//! The result is `n` second-order sections, each with zeros at DC and Nyquist
//! and unit gain at the centre frequency. Both edges sit at −3 dB.
//!
//! [`Bandpass::filtfilt`] runs the cascade forward and then backward over an
//! odd-extended copy of the signal, so the output has zero phase shift and
//! squared magnitude response.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

use crate::biquad::Biquad;
use crate::error::{CoreError, Result};

/// Butterworth band-pass as a biquad cascade.
#[derive(Debug, Clone)]
pub struct Bandpass {
    sections: Vec<Biquad>,
    low_hz: f64,
    high_hz: f64,
    order: usize,
    sample_rate: f64,
}

impl Bandpass {
    /// Design a band-pass with edges `low_hz..high_hz`.
    ///
    /// `order` is the prototype order; it must be even and between 2 and 12,
    /// and the design has `order` second-order sections. Edges must satisfy
    /// `0 < low < high < sample_rate / 2`.
    pub fn new(low_hz: f64, high_hz: f64, order: usize, sample_rate: f64) -> Result<Self> {
        if order == 0 || order % 2 != 0 || order > 12 {
            return Err(CoreError::InvalidFilter(format!(
                "Butterworth order must be even and in 2..=12, got {order}"
            )));
        }
        let nyquist = sample_rate / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyquist) {
            return Err(CoreError::InvalidFilter(format!(
                "band edges {low_hz}..{high_hz} Hz must lie inside 0..{nyquist} Hz"
            )));
        }

        let fs2 = 2.0 * sample_rate;
        let w_lo = fs2 * (PI * low_hz / sample_rate).tan();
        let w_hi = fs2 * (PI * high_hz / sample_rate).tan();
        let w0_sq = w_lo * w_hi;
        let bandwidth = w_hi - w_lo;
        let centre = 2.0 * (w0_sq.sqrt() / fs2).atan();

        let n = order as f64;
        let mut sections = Vec::with_capacity(order);
        // Upper-half prototype poles; their conjugates give the conjugate sections.
        for k in 0..order / 2 {
            let p = Complex64::from_polar(1.0, PI * (2 * k + 1) as f64 / (2.0 * n) + PI / 2.0);
            let half = p * (bandwidth / 2.0);
            let disc = (half * half - w0_sq).sqrt();
            for s in [half + disc, half - disc] {
                let z = (fs2 + s) / (fs2 - s);
                sections.push(section(z, centre));
            }
        }

        Ok(Self {
            sections,
            low_hz,
            high_hz,
            order,
            sample_rate,
        })
    }

    /// Lower edge in Hz.
    pub fn low_hz(&self) -> f64 {
        self.low_hz
    }

    /// Upper edge in Hz.
    pub fn high_hz(&self) -> f64 {
        self.high_hz
    }

    /// Prototype order (also the number of second-order sections).
    pub fn order(&self) -> usize {
        self.order
    }

    /// Single-pass magnitude response at `freq_hz`, in dB.
    ///
    /// [`Self::filtfilt`] applies this twice.
    pub fn magnitude_db_at(&self, freq_hz: f64) -> f64 {
        let gain: f64 = self
            .sections
            .iter()
            .map(|s| s.magnitude_at(freq_hz, self.sample_rate))
            .product();
        20.0 * gain.log10()
    }

    fn reset(&mut self) {
        for s in &mut self.sections {
            s.clear();
        }
    }

    fn run(&mut self, samples: &mut [f64]) {
        self.reset();
        for s in &mut self.sections {
            s.process_slice(samples);
        }
    }

    /// Single forward pass (causal, phase-shifted).
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        let mut out = signal.to_vec();
        self.run(&mut out);
        out
    }

    /// Edge padding used by [`Self::filtfilt`] for a signal of `len` samples.
    pub fn pad_len(&self, len: usize) -> usize {
        (3 * (self.sections.len() + 1)).min(len.saturating_sub(1))
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// The signal is extended at both ends by odd reflection about its end
    /// samples before filtering, and the extension is removed afterwards.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = self.pad_len(n);

        let mut ext = Vec::with_capacity(n + 2 * pad);
        let first = signal[0];
        let last = signal[n - 1];
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.run(&mut ext);
        ext.reverse();
        self.run(&mut ext);
        ext.reverse();

        ext[pad..pad + n].to_vec()
    }
}

/// Second-order section with poles at `z` and its conjugate, zeros at ±1,
/// scaled to unit gain at `centre` (radians per sample).
fn section(z: Complex64, centre: f64) -> Biquad {
    let a1 = -2.0 * z.re;
    let a2 = z.norm_sqr();
    let e1 = Complex64::from_polar(1.0, -centre);
    let e2 = e1 * e1;
    let gain = (1.0 + e1 * a1 + e2 * a2).norm() / (1.0 - e2).norm();

    let mut biquad = Biquad::new();
    biquad.set_coefficients(gain, 0.0, -gain, 1.0, a1, a2);
    biquad
}
