//! Decoded multichannel recordings.
//!
//! A [`Recording`] is the immutable result of decoding an uploaded file:
//! ordered unique channel labels, one sample rate shared by every channel,
//! equal-length sample buffers, and an optional annotation list. Sample units
//! are resolved by the decoder before construction and recorded in
//! [`SignalUnit`]; nothing downstream re-interprets them.
//!
//! All readers go through the [`ChannelRead`] trait so that cropped views
//! ([`crate::CroppedView`]) and full recordings are interchangeable.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Physical unit of the sample values held by a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "label")]
pub enum SignalUnit {
    /// Values are microvolts.
    Microvolts,
    /// Values are dimensionless (e.g. normalized audio samples).
    Arbitrary,
    /// The source declared a unit that could not be mapped to microvolts.
    Unknown(String),
}

impl SignalUnit {
    /// Short display label used on plot axes.
    pub fn axis_label(&self) -> &str {
        match self {
            Self::Microvolts => "µV",
            Self::Arbitrary => "a.u.",
            Self::Unknown(label) => label,
        }
    }
}

/// A timed event attached to a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Onset in seconds from the start of the recording.
    pub onset: f64,
    /// Duration in seconds, if the source provided one.
    pub duration: Option<f64>,
    /// Free-text description.
    pub description: String,
}

impl Annotation {
    /// Create an annotation.
    pub fn new(onset: f64, duration: Option<f64>, description: impl Into<String>) -> Self {
        Self {
            onset,
            duration,
            description: description.into(),
        }
    }

    /// Real-world time of the onset, given the recording start time.
    pub fn timestamp(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        let micros = (self.onset * 1e6).round();
        if !micros.is_finite() {
            return None;
        }
        start.checked_add_signed(Duration::microseconds(micros as i64))
    }
}

/// Read access to equal-length channels sharing one sample rate.
///
/// Sample indices are always relative to the implementor: for a cropped view,
/// offset `0` is the first sample of the window.
pub trait ChannelRead {
    /// Ordered channel labels.
    fn channel_names(&self) -> &[String];

    /// Sample rate in Hz.
    fn sample_rate(&self) -> f64;

    /// Samples per channel.
    fn sample_count(&self) -> usize;

    /// Borrow every sample of one channel.
    fn channel_samples(&self, index: usize) -> Option<&[f64]>;

    /// Number of channels.
    fn channel_count(&self) -> usize {
        self.channel_names().len()
    }

    /// `sample_count / sample_rate`, in seconds.
    fn duration(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate()
    }

    /// Find a channel by label: exact match first, then case-insensitive.
    fn channel_index(&self, name: &str) -> Option<usize> {
        let names = self.channel_names();
        names
            .iter()
            .position(|n| n == name)
            .or_else(|| names.iter().position(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Borrow a channel by label.
    fn channel(&self, name: &str) -> Result<&[f64]> {
        self.channel_index(name)
            .and_then(|i| self.channel_samples(i))
            .ok_or_else(|| CoreError::ChannelNotFound(name.to_string()))
    }

    /// Read `count` samples of channel `channel` starting at `offset`.
    ///
    /// The returned slice is truncated at the end of the channel. An offset
    /// past the end is an error; an offset exactly at the end yields an empty slice.
    fn read(&self, channel: usize, offset: usize, count: usize) -> Result<&[f64]> {
        let samples = self
            .channel_samples(channel)
            .ok_or_else(|| CoreError::ChannelNotFound(format!("#{channel}")))?;
        if offset > samples.len() {
            return Err(CoreError::OutOfBounds {
                offset,
                len: samples.len(),
            });
        }
        let end = offset.saturating_add(count).min(samples.len());
        Ok(&samples[offset..end])
    }
}

/// An immutable decoded recording.
#[derive(Debug, Clone)]
pub struct Recording {
    channel_names: Vec<String>,
    sample_rate: f64,
    data: Vec<Vec<f64>>,
    unit: SignalUnit,
    annotations: Vec<Annotation>,
    start_time: Option<NaiveDateTime>,
    source: Option<String>,
}

impl Recording {
    /// Build a recording from labels and per-channel samples.
    ///
    /// Fails when the sample rate is not positive and finite, when the label
    /// count differs from the channel count, when labels repeat, when channel
    /// lengths differ, or when there are no channels.
    pub fn new(channel_names: Vec<String>, sample_rate: f64, data: Vec<Vec<f64>>) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(CoreError::InvalidRecording(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if data.is_empty() {
            return Err(CoreError::InvalidRecording("no channels".into()));
        }
        if channel_names.len() != data.len() {
            return Err(CoreError::InvalidRecording(format!(
                "{} labels for {} channels",
                channel_names.len(),
                data.len()
            )));
        }
        for (i, name) in channel_names.iter().enumerate() {
            if channel_names[..i].contains(name) {
                return Err(CoreError::InvalidRecording(format!(
                    "duplicate channel label '{name}'"
                )));
            }
        }
        let len = data[0].len();
        if let Some((i, ch)) = data.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(CoreError::InvalidRecording(format!(
                "channel '{}' has {} samples, expected {len}",
                channel_names[i],
                ch.len()
            )));
        }

        Ok(Self {
            channel_names,
            sample_rate,
            data,
            unit: SignalUnit::Microvolts,
            annotations: Vec::new(),
            start_time: None,
            source: None,
        })
    }

    /// Set the sample unit.
    pub fn with_unit(mut self, unit: SignalUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Attach annotations, sorted by onset.
    pub fn with_annotations(mut self, mut annotations: Vec<Annotation>) -> Self {
        annotations.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        self.annotations = annotations;
        self
    }

    /// Set the real-world start time.
    pub fn with_start_time(mut self, start: NaiveDateTime) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Record where the data came from (usually a file name).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sample unit.
    pub fn unit(&self) -> &SignalUnit {
        &self.unit
    }

    /// Annotations sorted by onset.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Real-world start time, if known.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }

    /// Source description, if known.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Real-world timestamp of an annotation.
    pub fn annotation_timestamp(&self, annotation: &Annotation) -> Option<NaiveDateTime> {
        self.start_time.and_then(|start| annotation.timestamp(start))
    }
}

impl ChannelRead for Recording {
    fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn sample_count(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    fn channel_samples(&self, index: usize) -> Option<&[f64]> {
        self.data.get(index).map(Vec::as_slice)
    }
}
