//! Numeric helpers shared by the spectral estimators.
//!
//! # Level Conversions
//!
//! - [`power_to_db`] - Power to decibels with an epsilon floor
//! - [`ratio_db`] - Power ratio in decibels, `None` when undefined
//!
//! # Reductions
//!
//! - [`trapezoid`] - Trapezoidal integration against an abscissa
//! - [`mean`] - Arithmetic mean, `None` for empty input

/// Floor added to power values before taking a logarithm.
pub const DB_EPSILON: f64 = 1e-20;

/// Convert a power value to decibels: `10·log10(power + ε)`.
///
/// # Example
/// ```rust
/// use eegspec_core::power_to_db;
///
/// assert!((power_to_db(1.0)).abs() < 1e-9);
/// assert!((power_to_db(100.0) - 20.0).abs() < 1e-9);
/// assert!(power_to_db(0.0).is_finite());
/// ```
#[inline]
pub fn power_to_db(power: f64) -> f64 {
    10.0 * (power + DB_EPSILON).log10()
}

/// Power ratio `10·log10(signal / noise)`.
///
/// Returns `None` when the ratio is not computable: non-positive noise,
/// non-positive signal, or non-finite inputs.
#[inline]
pub fn ratio_db(signal: f64, noise: f64) -> Option<f64> {
    if !signal.is_finite() || !noise.is_finite() || noise <= 0.0 || signal <= 0.0 {
        return None;
    }
    Some(10.0 * (signal / noise).log10())
}

/// Integrate `y` over `x` using the trapezoidal rule.
///
/// Both slices must have equal length; extra elements of the longer one are ignored.
/// Fewer than two points integrate to zero.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    (1..n)
        .map(|i| 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]))
        .sum()
}

/// Arithmetic mean.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation (`ddof = 0`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}
