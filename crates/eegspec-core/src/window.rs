//! Time-window cropping.
//!
//! [`crop`] turns an optional `[start, end)` request into a [`CroppedView`]:
//! a borrowed view that implements [`ChannelRead`] over the restricted
//! sample range. The view translates window-relative indices to absolute
//! offsets in the source; no samples are copied.
//!
//! Requests outside the recording are clamped, never rejected. The applied
//! range is reported back through [`AppliedWindow`] so that downstream labels
//! match the samples that were actually analyzed.
//!
//! ```rust
//! use eegspec_core::{ChannelRead, Recording, TimeWindow, crop};
//!
//! let rec = Recording::new(vec!["Oz".into()], 100.0, vec![vec![0.0; 1000]]).unwrap();
//! let view = crop(&rec, Some(TimeWindow::new(2.0, 7.0)));
//! assert_eq!(view.sample_count(), 500);
//! assert!((view.duration() - 5.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::recording::ChannelRead;

/// A requested analysis window in seconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start in seconds.
    pub start: f64,
    /// Window end in seconds (exclusive).
    pub end: f64,
}

impl TimeWindow {
    /// Create a window.
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Window length in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// True when `0 ≤ start < end ≤ duration`.
    pub fn is_valid_for(&self, duration: f64) -> bool {
        self.start >= 0.0 && self.end > self.start && self.end <= duration
    }
}

/// The window that was actually applied after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedWindow {
    /// Applied start in seconds, aligned to a sample boundary.
    pub start: f64,
    /// Applied end in seconds, aligned to a sample boundary.
    pub end: f64,
    /// The caller's request, if any.
    pub requested: Option<TimeWindow>,
    /// True when the request had to be adjusted.
    pub clamped: bool,
}

impl AppliedWindow {
    /// Applied length in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Resolve a requested window against a source into sample bounds.
///
/// Non-finite requests fall back to the full range. A reversed request is
/// swapped. Bounds are clamped into `[0, duration]`, and a window that
/// collapses to zero samples is widened to one sample at the nearest edge.
fn resolve(
    requested: Option<TimeWindow>,
    sample_rate: f64,
    total: usize,
) -> (usize, usize, bool) {
    let Some(req) = requested else {
        return (0, total, false);
    };
    if !req.start.is_finite() || !req.end.is_finite() || total == 0 {
        return (0, total, true);
    }

    let (lo, hi) = if req.end < req.start {
        (req.end, req.start)
    } else {
        (req.start, req.end)
    };
    let to_index = |secs: f64| ((secs * sample_rate).round().max(0.0) as usize).min(total);
    let mut first = to_index(lo);
    let mut last = to_index(hi);
    if last == first {
        if last < total {
            last += 1;
        } else {
            first -= 1;
        }
    }

    let duration = total as f64 / sample_rate;
    let clamped = !req.is_valid_for(duration + 0.5 / sample_rate);
    (first, last, clamped)
}

/// A read-only window into another [`ChannelRead`] source.
#[derive(Debug)]
pub struct CroppedView<'a, R: ChannelRead + ?Sized> {
    source: &'a R,
    offset: usize,
    len: usize,
    applied: AppliedWindow,
}

impl<R: ChannelRead + ?Sized> Clone for CroppedView<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ChannelRead + ?Sized> Copy for CroppedView<'_, R> {}

impl<'a, R: ChannelRead + ?Sized> CroppedView<'a, R> {
    /// The underlying source.
    pub fn source(&self) -> &'a R {
        self.source
    }

    /// Absolute sample offset of the first windowed sample.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The window that was applied.
    pub fn applied(&self) -> AppliedWindow {
        self.applied
    }

    /// Convert a window-relative sample index to an absolute one.
    pub fn absolute_index(&self, relative: usize) -> usize {
        self.offset + relative
    }
}

impl<R: ChannelRead + ?Sized> ChannelRead for CroppedView<'_, R> {
    fn channel_names(&self) -> &[String] {
        self.source.channel_names()
    }

    fn sample_rate(&self) -> f64 {
        self.source.sample_rate()
    }

    fn sample_count(&self) -> usize {
        self.len
    }

    fn channel_samples(&self, index: usize) -> Option<&[f64]> {
        self.source
            .channel_samples(index)
            .map(|all| &all[self.offset..self.offset + self.len])
    }
}

/// Crop a source to an optional time window.
///
/// With `None` the view covers the whole source and reports `clamped = false`.
pub fn crop<R: ChannelRead + ?Sized>(source: &R, window: Option<TimeWindow>) -> CroppedView<'_, R> {
    let fs = source.sample_rate();
    let (first, last, clamped) = resolve(window, fs, source.sample_count());
    if clamped {
        tracing::debug!(
            requested = ?window,
            start = first as f64 / fs,
            end = last as f64 / fs,
            "time window clamped"
        );
    }
    CroppedView {
        source,
        offset: first,
        len: last - first,
        applied: AppliedWindow {
            start: first as f64 / fs,
            end: last as f64 / fs,
            requested: window,
            clamped,
        },
    }
}
