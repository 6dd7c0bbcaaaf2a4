//! Integration tests for eegspec-analysis.
//!
//! Tests exercise PSD estimation, band power, PCA, SSVEP detection,
//! spectrograms and trace comparison on synthetic signals with known content.

use std::f64::consts::PI;

use eegspec_analysis::bands::{BandSet, band_powers};
use eegspec_analysis::compare::{CancelToken, ComparisonTrace, compare_traces};
use eegspec_analysis::error::AnalysisError;
use eegspec_analysis::pca::{PcaParams, pca};
use eegspec_analysis::selection::ChannelSelection;
use eegspec_analysis::signals::{SyntheticEeg, sum_of_sines};
use eegspec_analysis::spectrogram::{SpectrogramParams, compute_spectrogram};
use eegspec_analysis::spectrum::{PsdMethod, PsdParams, compute_psd, find_peaks};
use eegspec_analysis::ssvep::{Confidence, SsvepParams, detect_ssvep};
use eegspec_core::{ChannelRead, Recording, RecordingStore, TimeWindow};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sine at a given frequency and amplitude.
fn sine(freq_hz: f64, sample_rate: f64, num_samples: usize, amplitude: f64) -> Vec<f64> {
    (0..num_samples)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
        .collect()
}

/// 4 s at 250 Hz: 10 Hz (amp 2), 40 Hz (amp 1) and 60 Hz (amp 0.5) plus noise.
fn three_tone() -> Vec<f64> {
    sum_of_sines(
        250.0,
        1000,
        &[(10.0, 2.0), (40.0, 1.0), (60.0, 0.5)],
        0.1,
        42,
    )
}

fn two_channel_recording(fs: f64, seconds: f64) -> Recording {
    let n = (fs * seconds) as usize;
    Recording::new(
        vec!["O1".into(), "O2".into()],
        fs,
        vec![sine(10.0, fs, n, 1.0), sine(20.0, fs, n, 1.0)],
    )
    .unwrap()
}

// ===========================================================================
// 1. PSD estimation
// ===========================================================================

#[test]
fn three_tone_peaks_are_found() {
    let x = three_tone();
    let psd = compute_psd(&x, 250.0, &PsdParams::default().with_range(0.5, 100.0)).unwrap();
    let peaks = find_peaks(&psd, 2.0, 3);
    assert_eq!(peaks.len(), 3);

    let mut freqs: Vec<f64> = peaks.iter().map(|p| p.frequency).collect();
    freqs.sort_by(f64::total_cmp);
    for (found, expected) in freqs.iter().zip([10.0, 40.0, 60.0]) {
        assert!(
            (found - expected).abs() <= 1.0,
            "peak at {found} Hz, expected near {expected} Hz"
        );
    }
}

#[test]
fn periodogram_resolution_is_finer_than_welch() {
    let x = three_tone();
    let welch = compute_psd(&x, 250.0, &PsdParams::default()).unwrap();
    let periodogram = compute_psd(
        &x,
        250.0,
        &PsdParams::default().with_method(PsdMethod::Periodogram),
    )
    .unwrap();

    let dw = welch.bin_spacing().unwrap();
    let dp = periodogram.bin_spacing().unwrap();
    assert!((dw - 0.5).abs() < 1e-9);
    assert!((dp - 0.25).abs() < 1e-9);
    assert!(dp < dw);
}

#[test]
fn decibel_output_matches_linear() {
    let x = three_tone();
    let linear = compute_psd(&x, 250.0, &PsdParams::default()).unwrap();
    let db = compute_psd(&x, 250.0, &PsdParams::default().with_decibel(true)).unwrap();
    assert!(db.decibel);
    for (p, d) in linear.power.iter().zip(&db.power) {
        assert!((10.0 * (p + 1e-20).log10() - d).abs() < 1e-9);
    }
}

#[test]
fn invalid_range_is_rejected_before_work() {
    let x = three_tone();
    let err = compute_psd(&x, 250.0, &PsdParams::default().with_range(40.0, 10.0)).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidParameter { ref param, .. } if param == "frequency_max"
    ));
}

// ===========================================================================
// 2. Band power
// ===========================================================================

#[test]
fn alpha_dominates_for_alpha_tone() {
    let x = sum_of_sines(256.0, 256 * 8, &[(10.0, 5.0)], 0.2, 3);
    let psd = compute_psd(&x, 256.0, &PsdParams::default().with_range(0.0, 128.0)).unwrap();
    let table = band_powers(&psd, &BandSet::default());
    let alpha = table.get("alpha").unwrap();
    assert!(alpha.relative.unwrap() > 0.8);
}

// ===========================================================================
// 3. PCA
// ===========================================================================

#[test]
fn correlated_channels_load_on_first_component() {
    let base = sine(7.0, 100.0, 1000, 1.0);
    let noisy = sum_of_sines(100.0, 1000, &[(7.0, 1.0)], 0.05, 9);
    let other = sum_of_sines(100.0, 1000, &[(23.0, 1.0)], 0.05, 10);
    let summary = pca(&[&base[..], &noisy[..], &other[..]], &PcaParams::default())
        .unwrap()
        .unwrap();

    assert_eq!(summary.n_components, 3);
    assert!(summary.explained_variance_ratio[0] > 0.6);
    for w in summary.cumulative_variance.windows(2) {
        assert!(w[1] >= w[0] - 1e-12);
    }
    assert!(*summary.cumulative_variance.last().unwrap() <= 1.0);
}

// ===========================================================================
// 4. SSVEP
// ===========================================================================

#[test]
fn confidence_boundaries_are_strict() {
    assert_eq!(Confidence::from_snr(Some(6.0)), Confidence::Medium);
    assert_eq!(Confidence::from_snr(Some(6.0001)), Confidence::High);
    assert_eq!(Confidence::from_snr(Some(3.0)), Confidence::Low);
    assert_eq!(Confidence::from_snr(Some(3.0001)), Confidence::Medium);
    assert_eq!(Confidence::from_snr(None), Confidence::Low);
}

#[test]
fn synthetic_ssvep_is_detected_on_occipital_channels() {
    let rec = SyntheticEeg {
        ssvep_uv: 8.0,
        ..SyntheticEeg::default()
    }
    .generate()
    .unwrap();
    let channels = ChannelSelection::Default.gather(&rec).unwrap();
    let names: Vec<&str> = channels.iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["O1", "Oz", "O2"]);

    let report = detect_ssvep(&channels, rec.sample_rate(), &SsvepParams::default()).unwrap();
    assert_eq!(report.detections.len(), 3);
    assert!(report.best_channel.is_some());
    let o1 = report.detection("O1").unwrap();
    assert!(o1.snr_db.unwrap() > 6.0);
    assert_eq!(o1.confidence, Confidence::High);
    assert!(report.pca.is_some());
}

// ===========================================================================
// 5. Spectrogram
// ===========================================================================

#[test]
fn fewer_time_points_give_fewer_frames() {
    let x = sum_of_sines(256.0, 256 * 10, &[(12.0, 1.0)], 0.1, 5);
    let dense = compute_spectrogram(&x, 256.0, &SpectrogramParams::default()).unwrap();
    let sparse = compute_spectrogram(
        &x,
        256.0,
        &SpectrogramParams {
            time_points: 20,
            ..SpectrogramParams::default()
        },
    )
    .unwrap();

    assert!(sparse.num_frames() < dense.num_frames());
    assert!(sparse.decibel);
    assert!(sparse.frequencies.iter().all(|&f| (0.5..=50.0).contains(&f)));
}

// ===========================================================================
// 6. Comparison
// ===========================================================================

#[test]
fn comparison_needs_two_traces() {
    let mut store = RecordingStore::new();
    let id = store.insert(two_channel_recording(100.0, 10.0));

    let one = [ComparisonTrace::new(id, "O1")];
    let err = compare_traces(&store, &one, &PsdParams::default(), None).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InvalidParameter { ref param, .. } if param == "traces"
    ));

    let two = [
        ComparisonTrace::new(id, "O1").with_window(TimeWindow::new(0.0, 5.0)),
        ComparisonTrace::new(id, "O2").with_label("right"),
    ];
    let result = compare_traces(&store, &two, &PsdParams::default(), None).unwrap();
    assert_eq!(result.series.len(), 2);
    assert!(result.skipped.is_empty());
    assert_eq!(result.series[1].label, "right");
    assert_ne!(result.series[0].color, result.series[1].color);
}

#[test]
fn cancelled_comparison_stops() {
    let mut store = RecordingStore::new();
    let id = store.insert(two_channel_recording(100.0, 10.0));
    let traces = [ComparisonTrace::new(id, "O1"), ComparisonTrace::new(id, "O2")];
    let token = CancelToken::new();
    token.cancel();
    let err = compare_traces(&store, &traces, &PsdParams::default(), Some(&token)).unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled));
}

// ===========================================================================
// 7. Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Frequencies and power have equal length and lie inside the range.
    #[test]
    fn psd_stays_in_range(
        fmin in 0.0f64..20.0,
        span in 1.0f64..60.0,
        seconds in 0.5f64..4.0,
        seed in 0u64..1000,
    ) {
        let x = sum_of_sines(200.0, 1000, &[(15.0, 1.0)], 0.5, seed);
        let params = PsdParams::default()
            .with_range(fmin, fmin + span)
            .with_window_seconds(seconds);
        let psd = compute_psd(&x, 200.0, &params).unwrap();
        prop_assert_eq!(psd.frequencies.len(), psd.power.len());
        for &f in &psd.frequencies {
            prop_assert!(f >= fmin && f <= fmin + span);
        }
    }

    /// Relative band powers sum to one when the bands cover the spectrum.
    #[test]
    fn relative_band_power_sums_to_one(seed in 0u64..1000, tone in 1.0f64..45.0) {
        let x = sum_of_sines(100.0, 800, &[(tone, 1.0)], 0.5, seed);
        let psd = compute_psd(&x, 100.0, &PsdParams::default().with_range(0.0, 50.0)).unwrap();
        let bands = BandSet::from_edges(
            &["low", "mid", "high"],
            &[0.0, 10.0, 25.0, 50.0],
        ).unwrap();
        let table = band_powers(&psd, &bands);
        let sum: f64 = table.bands.iter().filter_map(|b| b.relative).sum();
        prop_assert!((sum - 1.0).abs() < 1e-6, "sum = {}", sum);
    }

    /// Cumulative explained variance never decreases and ends at or below one;
    /// the component count is the request capped by the channel count.
    #[test]
    fn pca_cumulative_variance_is_bounded(
        channels in 2usize..8,
        samples in 16usize..600,
        requested in 1usize..10,
        shared in 0.0f64..2.0,
        seed in 0u64..1000,
    ) {
        let common = sine(6.0, 100.0, samples, shared);
        let data: Vec<Vec<f64>> = (0..channels)
            .map(|c| {
                let tone = [(9.0 + 4.0 * c as f64, 1.0)];
                let own = sum_of_sines(100.0, samples, &tone, 0.5, seed + c as u64);
                own.iter().zip(&common).map(|(a, b)| a + b).collect()
            })
            .collect();
        let slices: Vec<&[f64]> = data.iter().map(Vec::as_slice).collect();

        let summary = pca(&slices, &PcaParams { n_components: Some(requested) })
            .unwrap()
            .unwrap();
        prop_assert_eq!(summary.n_components, requested.min(channels));
        prop_assert_eq!(summary.cumulative_variance.len(), summary.n_components);
        for w in summary.cumulative_variance.windows(2) {
            prop_assert!(w[1] >= w[0] - 1e-12, "{:?}", summary.cumulative_variance);
        }
        let last = *summary.cumulative_variance.last().unwrap();
        prop_assert!(last <= 1.0 + 1e-6, "last = {}", last);
    }
}
