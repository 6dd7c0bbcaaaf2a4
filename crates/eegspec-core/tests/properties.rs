//! Property-based tests for eegspec-core.
//!
//! Tests crop clamping, filter stability and trapezoid linearity using
//! proptest for randomized input generation.

use eegspec_core::{Bandpass, ChannelRead, Recording, TimeWindow, crop, trapezoid};
use proptest::prelude::*;

fn recording(seconds: usize, fs: f64) -> Recording {
    let n = seconds * fs as usize;
    Recording::new(
        vec!["A".into(), "B".into()],
        fs,
        vec![vec![0.5; n], vec![-0.5; n]],
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any requested window, however wild, yields a non-empty view that lies
    /// inside the recording, and the reported range matches the view length.
    #[test]
    fn crop_always_lands_inside(
        start in -50.0f64..50.0,
        end in -50.0f64..50.0,
    ) {
        let rec = recording(10, 100.0);
        let view = crop(&rec, Some(TimeWindow::new(start, end)));
        let applied = view.applied();

        prop_assert!(view.sample_count() >= 1);
        prop_assert!(view.offset() + view.sample_count() <= rec.sample_count());
        prop_assert!(applied.start >= 0.0);
        prop_assert!(applied.end <= rec.duration() + 1e-9);
        prop_assert!((applied.length() - view.duration()).abs() < 1e-9);
    }

    /// Windows already inside the recording are not flagged as clamped.
    #[test]
    fn valid_windows_are_untouched(
        start in 0.0f64..9.0,
        len in 0.05f64..1.0,
    ) {
        let rec = recording(10, 100.0);
        let view = crop(&rec, Some(TimeWindow::new(start, start + len)));
        prop_assert!(!view.applied().clamped);
    }

    /// Zero-phase band-pass output stays finite for random bounded input.
    #[test]
    fn bandpass_stability(
        low in 1.0f64..40.0,
        width in 1.0f64..40.0,
        input in prop::collection::vec(-100.0f64..100.0, 16..512),
    ) {
        let mut bp = Bandpass::new(low, low + width, 4, 256.0).unwrap();
        let out = bp.filtfilt(&input);
        prop_assert_eq!(out.len(), input.len());
        prop_assert!(out.iter().all(|v| v.is_finite()));
    }

    /// Trapezoid integration is linear in y.
    #[test]
    fn trapezoid_is_linear(
        ys in prop::collection::vec(0.0f64..10.0, 2..64),
        k in 0.0f64..5.0,
    ) {
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64 * 0.25).collect();
        let scaled: Vec<f64> = ys.iter().map(|y| y * k).collect();
        let a = trapezoid(&xs, &ys) * k;
        let b = trapezoid(&xs, &scaled);
        prop_assert!((a - b).abs() < 1e-9 * (1.0 + a.abs()));
    }
}
