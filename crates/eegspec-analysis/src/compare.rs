//! Multi-trace spectral comparison
//!
//! A comparison overlays the PSDs of two or more traces, each one a
//! `(recording, channel, optional window)` selection, computed with one shared
//! [`PsdParams`] set. Traces that reference an unknown recording or channel are
//! skipped and reported; the comparison proceeds with the rest.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eegspec_core::{AppliedWindow, ChannelRead, RecordingId, RecordingStore, TimeWindow, crop};

use crate::error::{AnalysisError, Result};
use crate::spectrum::{Psd, PsdParams, compute_psd};

/// Minimum number of traces in a comparison.
pub const MIN_TRACES: usize = 2;

/// Line colours assigned to traces without an explicit colour, in order.
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6", "#EC4899", "#14B8A6", "#F97316",
    "#6366F1", "#84CC16",
];

/// One line of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTrace {
    /// Source recording
    pub recording: RecordingId,
    /// Channel label
    pub channel: String,
    /// Optional time window within the recording
    #[serde(default)]
    pub window: Option<TimeWindow>,
    /// Legend label; derived from the selection when absent
    #[serde(default)]
    pub label: Option<String>,
    /// Line colour (`#RRGGBB`); taken from the palette when absent
    #[serde(default)]
    pub color: Option<String>,
}

impl ComparisonTrace {
    /// A full-length trace of one channel.
    pub fn new(recording: RecordingId, channel: impl Into<String>) -> Self {
        Self {
            recording,
            channel: channel.into(),
            window: None,
            label: None,
            color: None,
        }
    }

    /// Restrict to a time window.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the legend label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the line colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Label shown in the legend.
    pub fn display_label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match self.window {
            Some(w) => format!(
                "{} ({} {:.1}-{:.1}s)",
                self.channel, self.recording, w.start, w.end
            ),
            None => format!("{} ({})", self.channel, self.recording),
        }
    }
}

/// Best-effort cancellation flag shared with the caller
///
/// Checked between traces; a trace already being computed runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once [`Self::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A computed comparison line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSeries {
    /// Position in the request
    pub index: usize,
    /// Legend label
    pub label: String,
    /// Line colour
    pub color: String,
    /// Source recording
    pub recording: RecordingId,
    /// Channel label as stored in the recording
    pub channel: String,
    /// Window actually used
    pub applied: AppliedWindow,
    /// Spectrum of the trace
    pub psd: Psd,
}

/// Why a trace was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The recording is not in the store
    MissingRecording,
    /// The channel does not exist in the recording
    ChannelNotFound,
    /// The window holds no samples
    EmptySignal,
}

/// A trace that could not be computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTrace {
    /// Position in the request
    pub index: usize,
    /// Legend label the trace would have had
    pub label: String,
    /// Category
    pub reason: SkipReason,
    /// Human-readable detail
    pub message: String,
}

/// Outcome of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Computed lines, in request order
    pub series: Vec<TraceSeries>,
    /// Traces left out
    pub skipped: Vec<SkippedTrace>,
    /// Shared estimator settings
    pub psd: PsdParams,
}

/// Compute every trace of a comparison.
///
/// Fails before any computation with [`AnalysisError::InvalidParameter`] when
/// fewer than [`MIN_TRACES`] traces are given or `params` is invalid, and fails
/// afterwards when no trace could be computed.
pub fn compare_traces(
    store: &RecordingStore,
    traces: &[ComparisonTrace],
    params: &PsdParams,
    cancel: Option<&CancelToken>,
) -> Result<Comparison> {
    compare_traces_with_progress(store, traces, params, cancel, |_| {})
}

/// [`compare_traces`] with a callback invoked after each trace.
pub fn compare_traces_with_progress<F>(
    store: &RecordingStore,
    traces: &[ComparisonTrace],
    params: &PsdParams,
    cancel: Option<&CancelToken>,
    mut on_trace: F,
) -> Result<Comparison>
where
    F: FnMut(usize),
{
    if traces.len() < MIN_TRACES {
        return Err(AnalysisError::invalid(
            "traces",
            format!(
                "a comparison needs at least {MIN_TRACES} traces, got {}",
                traces.len()
            ),
        ));
    }
    params.validate()?;

    let mut series = Vec::with_capacity(traces.len());
    let mut skipped = Vec::new();

    for (index, trace) in traces.iter().enumerate() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            tracing::info!(completed = index, "comparison cancelled");
            return Err(AnalysisError::Cancelled);
        }

        let label = trace.display_label();
        match compute_trace(store, trace, params) {
            Ok((channel, applied, psd)) => {
                let color = trace.color.clone().unwrap_or_else(|| {
                    DEFAULT_PALETTE[series.len() % DEFAULT_PALETTE.len()].to_string()
                });
                series.push(TraceSeries {
                    index,
                    label,
                    color,
                    recording: trace.recording,
                    channel,
                    applied,
                    psd,
                });
            }
            Err(err) => {
                let reason = match err {
                    AnalysisError::MissingRecording(_) => SkipReason::MissingRecording,
                    AnalysisError::EmptySignal => SkipReason::EmptySignal,
                    _ => SkipReason::ChannelNotFound,
                };
                tracing::warn!(trace = index, recording = %trace.recording, %err, "trace skipped");
                skipped.push(SkippedTrace {
                    index,
                    label,
                    reason,
                    message: err.to_string(),
                });
            }
        }
        on_trace(index);
    }

    if series.is_empty() {
        return Err(AnalysisError::invalid(
            "traces",
            format!("none of the {} traces could be computed", traces.len()),
        ));
    }

    tracing::debug!(traces = series.len(), skipped = skipped.len(), "comparison done");
    Ok(Comparison {
        series,
        skipped,
        psd: params.clone(),
    })
}

fn compute_trace(
    store: &RecordingStore,
    trace: &ComparisonTrace,
    params: &PsdParams,
) -> Result<(String, AppliedWindow, Psd)> {
    let recording = store.get(trace.recording)?;
    let view = crop(recording.as_ref(), trace.window);
    let index = view
        .channel_index(&trace.channel)
        .ok_or_else(|| AnalysisError::ChannelNotFound(trace.channel.clone()))?;
    let samples = view
        .channel_samples(index)
        .ok_or_else(|| AnalysisError::ChannelNotFound(trace.channel.clone()))?;
    if samples.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }
    let psd = compute_psd(samples, view.sample_rate(), params)?;
    Ok((view.channel_names()[index].clone(), view.applied(), psd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::Recording;

    fn store_with(n: usize) -> (RecordingStore, Vec<RecordingId>) {
        let mut store = RecordingStore::new();
        let ids = (0..n)
            .map(|k| {
                let data: Vec<f64> = (0..1000)
                    .map(|i| ((i * (k + 3)) as f64 * 0.1).sin())
                    .collect();
                store.insert(Recording::new(vec!["O1".into()], 100.0, vec![data]).unwrap())
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn single_trace_is_rejected() {
        let (store, ids) = store_with(1);
        let err = compare_traces(
            &store,
            &[ComparisonTrace::new(ids[0], "O1")],
            &PsdParams::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { ref param, .. } if param == "traces"));
    }

    #[test]
    fn two_recordings_give_two_series() {
        let (store, ids) = store_with(2);
        let traces = [
            ComparisonTrace::new(ids[0], "O1").with_label("before"),
            ComparisonTrace::new(ids[1], "o1").with_window(TimeWindow::new(2.0, 8.0)),
        ];
        let cmp = compare_traces(&store, &traces, &PsdParams::default(), None).unwrap();
        assert_eq!(cmp.series.len(), 2);
        assert_eq!(cmp.series[0].label, "before");
        assert_eq!(cmp.series[0].color, DEFAULT_PALETTE[0]);
        assert_eq!(cmp.series[1].color, DEFAULT_PALETTE[1]);
        assert_eq!(cmp.series[1].channel, "O1");
        assert!((cmp.series[1].applied.length() - 6.0).abs() < 1e-9);
        assert!(cmp.skipped.is_empty());
    }

    #[test]
    fn missing_recording_is_skipped_not_fatal() {
        let (mut store, ids) = store_with(3);
        store.remove(ids[1]);
        let traces: Vec<_> = ids.iter().map(|&id| ComparisonTrace::new(id, "O1")).collect();
        let cmp = compare_traces(&store, &traces, &PsdParams::default(), None).unwrap();
        assert_eq!(cmp.series.len(), 2);
        assert_eq!(cmp.skipped.len(), 1);
        assert_eq!(cmp.skipped[0].index, 1);
        assert_eq!(cmp.skipped[0].reason, SkipReason::MissingRecording);
    }

    #[test]
    fn all_traces_invalid_fails() {
        let (store, ids) = store_with(1);
        let traces = [
            ComparisonTrace::new(ids[0], "Cz"),
            ComparisonTrace::new(RecordingId::from_raw(99), "O1"),
        ];
        assert!(compare_traces(&store, &traces, &PsdParams::default(), None).is_err());
    }

    #[test]
    fn cancelled_token_stops_before_work() {
        let (store, ids) = store_with(2);
        let token = CancelToken::new();
        token.cancel();
        let traces: Vec<_> = ids.iter().map(|&id| ComparisonTrace::new(id, "O1")).collect();
        assert!(matches!(
            compare_traces(&store, &traces, &PsdParams::default(), Some(&token)),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn progress_reports_each_trace() {
        let (store, ids) = store_with(3);
        let traces: Vec<_> = ids.iter().map(|&id| ComparisonTrace::new(id, "O1")).collect();
        let mut seen = Vec::new();
        compare_traces_with_progress(&store, &traces, &PsdParams::default(), None, |i| {
            seen.push(i)
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
