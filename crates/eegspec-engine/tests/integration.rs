//! Integration tests for eegspec-engine.
//!
//! Every test builds its own store and calls the engine with explicit
//! requests; results are checked through their JSON payloads the way a
//! caller on the other side of the boundary would read them.

use std::f64::consts::PI;

use eegspec_analysis::{
    CancelToken, ChannelSelection, ComparisonTrace, EpochParams, PcaParams, PsdParams,
    SnrParams, SpectrogramParams, SsvepParams, StimulationPeriod, SyntheticEeg,
};
use eegspec_core::{Recording, RecordingId, RecordingStore, TimeWindow};
use eegspec_engine::{
    AnalysisKind, AnalysisParams, AnalysisRequest, AnalysisResult, ComparisonRequest, Engine,
    EpochSpec, ErrorKind, RenderOptions,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sine(freq_hz: f64, sample_rate: f64, num_samples: usize, amplitude: f64) -> Vec<f64> {
    (0..num_samples)
        .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
        .collect()
}

/// 10 s at 100 Hz: O1 carries 10 Hz, O2 carries 20 Hz.
fn two_channel(store: &mut RecordingStore) -> RecordingId {
    let (fs, n) = (100.0, 1000);
    store.insert(
        Recording::new(
            vec!["O1".into(), "O2".into()],
            fs,
            vec![sine(10.0, fs, n, 1.0), sine(20.0, fs, n, 1.0)],
        )
        .unwrap(),
    )
}

fn synthetic(store: &mut RecordingStore) -> RecordingId {
    store.insert(
        SyntheticEeg {
            duration: 20.0,
            ssvep_uv: 8.0,
            ..SyntheticEeg::default()
        }
        .generate()
        .unwrap(),
    )
}

fn run(store: &RecordingStore, id: RecordingId, params: AnalysisParams) -> AnalysisResult {
    Engine::new().analyze(store, &AnalysisRequest::new(id, params, RenderOptions::disabled()))
}

// ===========================================================================
// 1. Single-recording analyses
// ===========================================================================

#[test]
fn psd_reports_every_channel() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);

    let result = run(&store, id, AnalysisParams::Psd(PsdParams::default().with_range(1.0, 40.0)));
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.kind, AnalysisKind::Psd);
    assert!(result.image.is_none());
    assert!(result.error.is_none());

    let channels = result.payload["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0]["channel"], "O1");
    let peak = channels[0]["peaks"][0]["frequency"].as_f64().unwrap();
    assert!((peak - 10.0).abs() < 1.0, "peak at {peak}");
    assert_eq!(result.parameters["frequency_max"], 40.0);
}

#[test]
fn missing_recording_fails_cleanly() {
    let store = RecordingStore::new();
    let result = run(&store, RecordingId::from_raw(42), AnalysisParams::Psd(PsdParams::default()));
    assert!(!result.success);
    assert!(result.payload.is_null());
    assert_eq!(result.error.unwrap().kind, ErrorKind::MissingRecording);
}

#[test]
fn inverted_range_is_an_invalid_parameter() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let result = run(&store, id, AnalysisParams::Psd(PsdParams::default().with_range(30.0, 5.0)));
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidParameter);
}

#[test]
fn unknown_channel_is_an_invalid_parameter() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = AnalysisRequest::new(
        id,
        AnalysisParams::Psd(PsdParams::default()),
        RenderOptions::disabled(),
    )
    .with_channels(ChannelSelection::named(["Cz"]));
    let result = Engine::new().analyze(&store, &request);
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidParameter);
}

#[test]
fn window_is_applied_and_reported() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = AnalysisRequest::new(
        id,
        AnalysisParams::Psd(PsdParams::default()),
        RenderOptions::disabled(),
    )
    .with_window(TimeWindow::new(2.0, 7.0));
    let result = Engine::new().analyze(&store, &request);
    assert!(result.success);
    let applied = result.window.unwrap();
    assert!((applied.length() - 5.0).abs() < 1e-9);
    assert!(!applied.clamped);
    assert_eq!(result.notes_of(ErrorKind::InvalidParameter).count(), 0);
}

#[test]
fn out_of_range_window_is_clamped_with_a_note() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = AnalysisRequest::new(
        id,
        AnalysisParams::Psd(PsdParams::default()),
        RenderOptions::disabled(),
    )
    .with_window(TimeWindow::new(5.0, 50.0));
    let result = Engine::new().analyze(&store, &request);
    assert!(result.success);
    assert!(result.window.unwrap().clamped);
    assert_eq!(result.notes_of(ErrorKind::InvalidParameter).count(), 1);
}

#[test]
fn reversed_window_is_swapped_with_a_note() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = AnalysisRequest::new(
        id,
        AnalysisParams::Psd(PsdParams::default()),
        RenderOptions::disabled(),
    )
    .with_window(TimeWindow::new(7.0, 2.0));
    let result = Engine::new().analyze(&store, &request);
    assert!(result.success, "{:?}", result.error);
    let applied = result.window.unwrap();
    assert!(applied.clamped);
    assert!((applied.start - 2.0).abs() < 1e-9);
    assert!((applied.length() - 5.0).abs() < 1e-9);
    assert_eq!(result.notes_of(ErrorKind::InvalidParameter).count(), 1);
}

#[test]
fn flat_signal_gives_degenerate_snr_notes() {
    let mut store = RecordingStore::new();
    let id = store.insert(Recording::new(vec!["Cz".into()], 100.0, vec![vec![0.0; 1000]]).unwrap());
    let result = run(&store, id, AnalysisParams::Snr(SnrParams::default()));
    assert!(result.success);
    assert!(result.notes_of(ErrorKind::ComputationDegenerate).count() >= 1);
}

#[test]
fn constant_channels_give_no_pca_summary() {
    let mut store = RecordingStore::new();
    let id = store.insert(
        Recording::new(
            vec!["A".into(), "B".into()],
            100.0,
            vec![vec![1.0; 500], vec![2.0; 500]],
        )
        .unwrap(),
    );
    let result = run(&store, id, AnalysisParams::Pca(PcaParams::default()));
    assert!(result.success);
    assert!(result.payload["summary"].is_null());
    assert_eq!(result.notes_of(ErrorKind::ComputationDegenerate).count(), 1);
}

#[test]
fn ssvep_prefers_occipital_channels() {
    let mut store = RecordingStore::new();
    let id = synthetic(&mut store);
    let result = run(&store, id, AnalysisParams::Ssvep(SsvepParams::default()));
    assert!(result.success, "{:?}", result.error);
    let best = result.payload["best_channel"].as_str().unwrap();
    assert!(["O1", "Oz", "O2"].contains(&best), "best channel {best}");
    assert_eq!(result.payload["target_frequency"], 40.0);
}

#[test]
fn spectrogram_follows_time_points() {
    let mut store = RecordingStore::new();
    let id = synthetic(&mut store);
    let frames = |time_points| {
        let result = run(
            &store,
            id,
            AnalysisParams::Spectrogram(SpectrogramParams {
                time_points,
                ..SpectrogramParams::default()
            }),
        );
        assert!(result.success);
        result.payload["channels"][0]["spectrogram"]["times"]
            .as_array()
            .unwrap()
            .len()
    };
    assert!(frames(20) < frames(200));
}

#[test]
fn epochs_average_periods_and_skip_outside_ones() {
    let mut store = RecordingStore::new();
    let id = synthetic(&mut store);
    let periods = vec![
        StimulationPeriod::new(1.0, 4.0, "a").in_experiment("flicker"),
        StimulationPeriod::new(8.0, 4.0, "b").in_experiment("flicker"),
        StimulationPeriod::new(18.0, 5.0, "late").in_experiment("flicker"),
    ];
    let spec = EpochSpec {
        experiment: "flicker".into(),
        periods,
        params: EpochParams::default(),
    };
    let request = AnalysisRequest::new(id, AnalysisParams::Epochs(spec), RenderOptions::disabled())
        .with_window(TimeWindow::new(0.0, 2.0));
    let result = Engine::new().analyze(&store, &request);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.payload["periods"].as_array().unwrap().len(), 2);
    assert_eq!(result.payload["skipped"].as_array().unwrap().len(), 1);
    // One note for the skipped period, one for the ignored window.
    assert_eq!(result.notes_of(ErrorKind::InvalidParameter).count(), 2);
    assert!(result.window.is_none());
}

#[test]
fn render_yields_png_or_a_render_note() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = AnalysisRequest::new(
        id,
        AnalysisParams::Psd(PsdParams::default()),
        RenderOptions::default().with_size(320, 240),
    );
    let result = Engine::new().analyze(&store, &request);
    assert!(result.success);
    match &result.image {
        Some(png) => assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n"),
        None => assert_eq!(result.notes_of(ErrorKind::Render).count(), 1),
    }
}

#[test]
fn result_serializes_to_json() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let result = run(&store, id, AnalysisParams::Psd(PsdParams::default()));
    let json = serde_json::to_string(&result).unwrap();
    let back: AnalysisResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back.kind, AnalysisKind::Psd);
    assert!(back.success);
    assert_eq!(back.payload, result.payload);
}

// ===========================================================================
// 2. Comparison
// ===========================================================================

#[test]
fn comparison_needs_two_traces() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = ComparisonRequest::new(vec![ComparisonTrace::new(id, "O1")], RenderOptions::disabled());
    let result = Engine::new().compare(&store, &request, None);
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidParameter);
}

#[test]
fn comparison_across_recordings() {
    let mut store = RecordingStore::new();
    let a = two_channel(&mut store);
    let b = two_channel(&mut store);
    let request = ComparisonRequest::new(
        vec![
            ComparisonTrace::new(a, "O1").with_label("before"),
            ComparisonTrace::new(b, "O1").with_label("after"),
        ],
        RenderOptions::disabled(),
    );
    let result = Engine::new().compare(&store, &request, None);
    assert!(result.success, "{:?}", result.error);
    let series = result.payload["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["label"], "before");
    assert_eq!(series[1]["label"], "after");
    assert!(result.notes.is_empty());
}

#[test]
fn removed_recording_is_skipped_with_a_note() {
    let mut store = RecordingStore::new();
    let a = two_channel(&mut store);
    let b = two_channel(&mut store);
    let c = two_channel(&mut store);
    store.remove(b);
    let request = ComparisonRequest::new(
        vec![
            ComparisonTrace::new(a, "O1"),
            ComparisonTrace::new(b, "O1"),
            ComparisonTrace::new(c, "O2"),
        ],
        RenderOptions::disabled(),
    );
    let result = Engine::new().compare(&store, &request, None);
    assert!(result.success);
    assert_eq!(result.notes_of(ErrorKind::MissingRecording).count(), 1);
    let traces = result.payload["traces"].as_array().unwrap();
    assert_eq!(traces.len(), 3);
    assert_eq!(traces[1]["computed"], false);
    assert_eq!(traces[2]["computed"], true);
}

#[test]
fn cancelled_comparison_reports_cancelled() {
    let mut store = RecordingStore::new();
    let id = two_channel(&mut store);
    let request = ComparisonRequest::new(
        vec![ComparisonTrace::new(id, "O1"), ComparisonTrace::new(id, "O2")],
        RenderOptions::disabled(),
    );
    let token = CancelToken::new();
    token.cancel();
    let result = Engine::new().compare(&store, &request, Some(&token));
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::Cancelled);
}

// ===========================================================================
// 3. Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any window inside the recording is applied without clamping.
    #[test]
    fn inner_windows_are_never_clamped(start in 0.0f64..8.0, len in 1.0f64..2.0) {
        let mut store = RecordingStore::new();
        let id = two_channel(&mut store);
        let request = AnalysisRequest::new(
            id,
            AnalysisParams::Psd(PsdParams::default()),
            RenderOptions::disabled(),
        )
        .with_window(TimeWindow::new(start, start + len));
        let result = Engine::new().analyze(&store, &request);
        prop_assert!(result.success);
        let applied = result.window.unwrap();
        prop_assert!(!applied.clamped);
        prop_assert!((applied.length() - len).abs() <= 0.01 + 1e-9);
    }
}
