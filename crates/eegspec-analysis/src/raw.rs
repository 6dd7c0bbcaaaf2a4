//! Raw trace extraction for display.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::selection::ChannelData;

/// Parameters for raw trace display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTraceParams {
    /// Points kept per channel after decimation (default: 4000)
    pub max_points: usize,
}

impl Default for RawTraceParams {
    fn default() -> Self {
        Self { max_points: 4000 }
    }
}

impl RawTraceParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_points < 2 {
            return Err(AnalysisError::invalid(
                "max_points",
                format!("must be at least 2, got {}", self.max_points),
            ));
        }
        Ok(())
    }
}

/// One decimated channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceChannel {
    /// Channel label
    pub channel: String,
    /// Every `step`-th sample of the window
    pub samples: Vec<f64>,
}

/// Decimated traces of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTraces {
    /// Original sample rate
    pub sample_rate: f64,
    /// Decimation step; point `i` is sample `i·step` of the window
    pub step: usize,
    /// Window start in seconds from recording start
    pub start_time: f64,
    /// One entry per channel
    pub channels: Vec<TraceChannel>,
}

impl RawTraces {
    /// Time in seconds of each kept point.
    pub fn times(&self) -> Vec<f64> {
        let n = self.channels.first().map_or(0, |c| c.samples.len());
        (0..n)
            .map(|i| self.start_time + (i * self.step) as f64 / self.sample_rate)
            .collect()
    }
}

/// Decimate the given channels by a common stride.
pub fn raw_traces(
    channels: &[ChannelData<'_>],
    sample_rate: f64,
    start_time: f64,
    params: &RawTraceParams,
) -> Result<RawTraces> {
    params.validate()?;
    let len = channels.iter().map(|c| c.samples.len()).max().unwrap_or(0);
    if len == 0 {
        return Err(AnalysisError::EmptySignal);
    }
    let step = len.div_ceil(params.max_points).max(1);
    Ok(RawTraces {
        sample_rate,
        step,
        start_time,
        channels: channels
            .iter()
            .map(|c| TraceChannel {
                channel: c.name.to_string(),
                samples: c.samples.iter().step_by(step).copied().collect(),
            })
            .collect(),
    })
}
