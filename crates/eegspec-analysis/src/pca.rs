//! Principal component analysis across channels.
//!
//! Channels are stacked into a samples × channels matrix, each column is
//! z-scored (population standard deviation; constant columns are only
//! centered), and the channel covariance matrix is eigendecomposed with
//! [`nalgebra::SymmetricEigen`]. Explained-variance ratios are taken against
//! the total variance over all channels, so the cumulative sum of the retained
//! components never exceeds 1.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Default cap on the number of components.
pub const DEFAULT_MAX_COMPONENTS: usize = 5;

/// Parameters for PCA
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaParams {
    /// Components to keep; `None` means `min(channels, 5)`
    pub n_components: Option<usize>,
}

impl PcaParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_components == Some(0) {
            return Err(AnalysisError::invalid("n_components", "must be at least 1"));
        }
        Ok(())
    }

    /// Components actually retained for a channel count.
    pub fn resolve(&self, channels: usize) -> usize {
        self.n_components
            .unwrap_or(DEFAULT_MAX_COMPONENTS)
            .min(channels)
    }
}

/// Variance decomposition of a channel set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaSummary {
    /// Number of retained components
    pub n_components: usize,
    /// Eigenvalues of the retained components (variance of z-scored data)
    pub explained_variance: Vec<f64>,
    /// Share of total variance per retained component
    pub explained_variance_ratio: Vec<f64>,
    /// Running sum of `explained_variance_ratio`
    pub cumulative_variance: Vec<f64>,
    /// Component loadings, one row per component, one column per channel
    pub loadings: Vec<Vec<f64>>,
}

/// Run PCA over equal-length channels.
///
/// Returns `Ok(None)` when every channel is constant (no variance to explain).
/// Fails when fewer than two channels or two samples are given, or when
/// channel lengths differ.
pub fn pca(channels: &[&[f64]], params: &PcaParams) -> Result<Option<PcaSummary>> {
    params.validate()?;
    let c = channels.len();
    if c < 2 {
        return Err(AnalysisError::invalid(
            "channels",
            format!("PCA needs at least 2 channels, got {c}"),
        ));
    }
    let n = channels[0].len();
    if channels.iter().any(|ch| ch.len() != n) {
        return Err(AnalysisError::invalid("channels", "channels differ in length"));
    }
    if n < 2 {
        return Err(AnalysisError::EmptySignal);
    }

    let z: Vec<Vec<f64>> = channels.iter().map(|ch| zscore(ch)).collect();
    let cov = DMatrix::from_fn(c, c, |i, j| {
        z[i].iter().zip(&z[j]).map(|(a, b)| a * b).sum::<f64>() / (n - 1) as f64
    });

    let eig = cov.symmetric_eigen();
    let mut order: Vec<usize> = (0..c).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let values: Vec<f64> = order.iter().map(|&i| eig.eigenvalues[i].max(0.0)).collect();
    let total: f64 = values.iter().sum();
    if total.is_nan() || total <= 0.0 {
        tracing::debug!(channels = c, "PCA skipped: zero total variance");
        return Ok(None);
    }

    let k = params.resolve(c);
    let explained_variance: Vec<f64> = values[..k].to_vec();
    let explained_variance_ratio: Vec<f64> =
        explained_variance.iter().map(|v| v / total).collect();
    let cumulative_variance = explained_variance_ratio
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(acc.min(1.0))
        })
        .collect();

    let loadings = order[..k]
        .iter()
        .map(|&i| {
            let mut v: Vec<f64> = eig.eigenvectors.column(i).iter().copied().collect();
            // Sign convention: largest-magnitude loading is positive.
            let dominant = v
                .iter()
                .copied()
                .fold(0.0f64, |m, x| if x.abs() > m.abs() { x } else { m });
            if dominant < 0.0 {
                v.iter_mut().for_each(|x| *x = -*x);
            }
            v
        })
        .collect();

    Ok(Some(PcaSummary {
        n_components: k,
        explained_variance,
        explained_variance_ratio,
        cumulative_variance,
        loadings,
    }))
}

fn zscore(x: &[f64]) -> Vec<f64> {
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    let sd = (x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / x.len() as f64).sqrt();
    let scale = if sd > 0.0 { 1.0 / sd } else { 1.0 };
    x.iter().map(|v| (v - mean) * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(seed: u64, n: usize) -> Vec<f64> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
            })
            .collect()
    }

    #[test]
    fn identical_channels_have_one_component() {
        let a = noise(1, 500);
        let b: Vec<f64> = a.iter().map(|x| 3.0 * x + 1.0).collect();
        let summary = pca(&[&a[..], &b[..]], &PcaParams::default()).unwrap().unwrap();
        assert_eq!(summary.n_components, 2);
        assert!((summary.explained_variance_ratio[0] - 1.0).abs() < 1e-9);
        assert!((summary.cumulative_variance[1] - 1.0).abs() < 1e-9);
        // Equal loadings after z-scoring
        let l = &summary.loadings[0];
        assert!((l[0] - l[1]).abs() < 1e-9 && l[0] > 0.0);
    }

    #[test]
    fn components_capped_by_request_and_channels() {
        let chans: Vec<Vec<f64>> = (0..4).map(|s| noise(s + 10, 300)).collect();
        let refs: Vec<&[f64]> = chans.iter().map(Vec::as_slice).collect();

        let s = pca(&refs, &PcaParams { n_components: Some(2) }).unwrap().unwrap();
        assert_eq!(s.n_components, 2);
        assert_eq!(s.loadings.len(), 2);
        assert!(s.cumulative_variance[1] < 1.0);

        let s = pca(&refs, &PcaParams { n_components: Some(10) }).unwrap().unwrap();
        assert_eq!(s.n_components, 4);
        assert!((s.cumulative_variance[3] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ratios_sorted_and_cumulative_monotone() {
        let chans: Vec<Vec<f64>> = (0..6).map(|s| noise(s + 3, 400)).collect();
        let refs: Vec<&[f64]> = chans.iter().map(Vec::as_slice).collect();
        let s = pca(&refs, &PcaParams::default()).unwrap().unwrap();
        assert_eq!(s.n_components, 5);
        assert!(s.explained_variance_ratio.windows(2).all(|w| w[0] >= w[1]));
        assert!(s.cumulative_variance.windows(2).all(|w| w[0] <= w[1]));
        assert!(*s.cumulative_variance.last().unwrap() <= 1.0 + 1e-6);
    }

    #[test]
    fn constant_channels_are_degenerate() {
        let a = vec![1.0; 100];
        let b = vec![-2.0; 100];
        assert_eq!(pca(&[&a[..], &b[..]], &PcaParams::default()).unwrap(), None);
    }

    #[test]
    fn invalid_inputs() {
        let a = noise(1, 10);
        assert!(pca(&[&a[..]], &PcaParams::default()).is_err());
        let b = noise(2, 9);
        assert!(pca(&[&a[..], &b[..]], &PcaParams::default()).is_err());
        assert!(pca(&[&a[..], &a[..]], &PcaParams { n_components: Some(0) }).is_err());
    }
}
