//! Stimulation-period (epoch) analysis.
//!
//! A stimulation protocol is a list of [`StimulationPeriod`]s grouped by
//! experiment name. For one experiment every period that fits inside the
//! recording becomes a window; each selected channel is then summarised by its
//! mean spectra over those windows and by band SNRs at the target frequencies.
//!
//! Periods can differ slightly in length. All windows are truncated to the
//! shortest one so the spectra share one frequency grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use eegspec_core::{ChannelRead, TimeWindow, crop};

use crate::error::{AnalysisError, Result};
use crate::selection::ChannelSelection;
use crate::snr::{SnrSpectrum, snr_spectrum, target_band_snr};
use crate::spectrum::{Psd, PsdMethod, PsdParams, estimate};

/// One stimulation interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulationPeriod {
    /// Onset in seconds from recording start
    pub start: f64,
    /// Length in seconds
    pub duration: f64,
    /// Experiment (condition) the period belongs to
    pub experiment: String,
    /// Period label
    pub label: String,
}

impl StimulationPeriod {
    /// A period in the `default` experiment.
    pub fn new(start: f64, duration: f64, label: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            experiment: "default".to_string(),
            label: label.into(),
        }
    }

    /// Move to an experiment.
    pub fn in_experiment(mut self, experiment: impl Into<String>) -> Self {
        self.experiment = experiment.into();
        self
    }

    /// End in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// The period as a time window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end())
    }

    /// Copy shifted by a sync offset in seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            ..self.clone()
        }
    }
}

/// Add a sync offset to every period start.
pub fn apply_sync_offset(periods: &mut [StimulationPeriod], offset: f64) {
    for p in periods {
        p.start += offset;
    }
}

/// Group periods by experiment, keeping file order within each group.
pub fn group_by_experiment(periods: &[StimulationPeriod]) -> BTreeMap<String, Vec<StimulationPeriod>> {
    let mut groups: BTreeMap<String, Vec<StimulationPeriod>> = BTreeMap::new();
    for p in periods {
        groups.entry(p.experiment.clone()).or_default().push(p.clone());
    }
    groups
}

/// Parameters for epoch analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochParams {
    /// Welch settings and reported frequency range
    pub psd: PsdParams,
    /// Stimulation frequencies in Hz (default: [40.0])
    pub target_frequencies: Vec<f64>,
    /// Total width of the band SNR signal band and SNR-spectrum neighbourhood (default: 1.0 Hz)
    pub snr_bandwidth_hz: f64,
    /// Half width searched for the SNR peak around each target (default: 0.1 Hz)
    pub peak_search_hz: f64,
}

impl Default for EpochParams {
    fn default() -> Self {
        Self {
            psd: PsdParams::default(),
            target_frequencies: vec![40.0],
            snr_bandwidth_hz: 1.0,
            peak_search_hz: 0.1,
        }
    }
}

impl EpochParams {
    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        self.psd.validate()?;
        if self.target_frequencies.is_empty() {
            return Err(AnalysisError::invalid(
                "target_frequencies",
                "at least one target is required",
            ));
        }
        if let Some(bad) = self
            .target_frequencies
            .iter()
            .find(|f| !(f.is_finite() && **f > 0.0))
        {
            return Err(AnalysisError::invalid(
                "target_frequencies",
                format!("targets must be positive, got {bad}"),
            ));
        }
        if self.snr_bandwidth_hz.is_nan() || self.snr_bandwidth_hz <= 0.0 {
            return Err(AnalysisError::invalid("snr_bandwidth_hz", "must be positive"));
        }
        if self.peak_search_hz.is_nan() || self.peak_search_hz < 0.0 {
            return Err(AnalysisError::invalid("peak_search_hz", "must be >= 0"));
        }
        Ok(())
    }
}

/// SNR summary at one target frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSnr {
    /// Target frequency in Hz
    pub frequency: f64,
    /// Mean over periods of the band SNR; `None` when never computable
    pub band_snr_db: Option<f64>,
    /// Frequency of the highest mean SNR-spectrum value near the target
    pub peak_frequency: Option<f64>,
    /// That SNR in dB
    pub peak_snr_db: Option<f64>,
}

/// Per-channel epoch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochChannel {
    /// Channel label
    pub channel: String,
    /// Mean Welch PSD over periods
    pub welch: Psd,
    /// Mean periodogram over periods
    pub periodogram: Psd,
    /// Mean SNR spectrum over periods
    pub snr: SnrSpectrum,
    /// One entry per target frequency
    pub targets: Vec<TargetSnr>,
}

/// A period that was not analysed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPeriod {
    /// The period
    pub period: StimulationPeriod,
    /// Why it was skipped
    pub reason: String,
}

/// Epoch analysis of one experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// Experiment name
    pub experiment: String,
    /// Periods analysed
    pub periods: Vec<StimulationPeriod>,
    /// Periods outside the recording
    pub skipped: Vec<SkippedPeriod>,
    /// Samples per analysed window
    pub window_samples: usize,
    /// One summary per selected channel
    pub channels: Vec<EpochChannel>,
}

/// Analyse the periods of one experiment.
///
/// Periods that start before 0 or end after the recording are skipped and
/// reported; it is an error when none remain.
pub fn analyze_epochs<R: ChannelRead + ?Sized>(
    source: &R,
    experiment: &str,
    periods: &[StimulationPeriod],
    selection: &ChannelSelection,
    params: &EpochParams,
) -> Result<EpochReport> {
    params.validate()?;
    let channels = selection.resolve(source)?;
    let fs = source.sample_rate();
    let tolerance = 0.5 / fs;
    let duration = source.duration();

    let mut used = Vec::new();
    let mut skipped = Vec::new();
    for p in periods.iter().filter(|p| p.experiment == experiment) {
        if p.start < 0.0 || p.end() > duration + tolerance || p.duration <= 0.0 {
            tracing::warn!(label = %p.label, start = p.start, end = p.end(), "period outside recording");
            skipped.push(SkippedPeriod {
                period: p.clone(),
                reason: format!(
                    "{:.3}-{:.3}s lies outside the recording (0-{duration:.3}s)",
                    p.start,
                    p.end()
                ),
            });
        } else {
            used.push(p.clone());
        }
    }
    if used.is_empty() {
        return Err(AnalysisError::invalid(
            "periods",
            format!("experiment '{experiment}' has no period inside the recording"),
        ));
    }

    let views: Vec<_> = used.iter().map(|p| crop(source, Some(p.window()))).collect();
    let window_samples = views.iter().map(ChannelRead::sample_count).min().unwrap_or(0);
    if window_samples == 0 {
        return Err(AnalysisError::EmptySignal);
    }

    let welch_params = params.psd.clone().with_method(PsdMethod::Welch);
    let periodogram_params = params.psd.clone().with_method(PsdMethod::Periodogram);
    let (fmin, fmax) = (params.psd.frequency_min, params.psd.frequency_max);

    let mut summaries = Vec::with_capacity(channels.len());
    for &ch in &channels {
        let name = source.channel_names()[ch].clone();
        let mut welch = Vec::with_capacity(views.len());
        let mut periodogram = Vec::with_capacity(views.len());
        let mut snr = Vec::with_capacity(views.len());
        let mut band_snr: Vec<Vec<f64>> = vec![Vec::new(); params.target_frequencies.len()];

        for view in &views {
            let samples = view.read(ch, 0, window_samples)?;
            let full = estimate(samples, fs, &welch_params)?;
            for (acc, &target) in band_snr.iter_mut().zip(&params.target_frequencies) {
                if let Some(v) = target_band_snr(&full, target, params.snr_bandwidth_hz) {
                    acc.push(v);
                }
            }
            snr.push(snr_spectrum(&full, params.snr_bandwidth_hz).restrict(fmin, fmax));
            welch.push(full.restrict(fmin, fmax));
            periodogram.push(estimate(samples, fs, &periodogram_params)?.restrict(fmin, fmax));
        }

        let snr = SnrSpectrum::average(&snr).unwrap_or_default();
        let targets = params
            .target_frequencies
            .iter()
            .zip(&band_snr)
            .map(|(&frequency, values)| {
                let peak = snr.peak_in(
                    frequency - params.peak_search_hz,
                    frequency + params.peak_search_hz,
                );
                TargetSnr {
                    frequency,
                    band_snr_db: eegspec_core::mean(values),
                    peak_frequency: peak.map(|p| p.0),
                    peak_snr_db: peak.map(|p| p.1),
                }
            })
            .collect();

        summaries.push(EpochChannel {
            channel: name,
            welch: Psd::average(&welch).unwrap_or_default(),
            periodogram: Psd::average(&periodogram).unwrap_or_default(),
            snr,
            targets,
        });
    }

    tracing::info!(
        experiment,
        periods = used.len(),
        skipped = skipped.len(),
        channels = summaries.len(),
        "epoch analysis done"
    );
    Ok(EpochReport {
        experiment: experiment.to_string(),
        periods: used,
        skipped,
        window_samples,
        channels: summaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::Recording;
    use std::f64::consts::PI;

    fn recording_with_bursts(fs: f64, seconds: f64, bursts: &[(f64, f64)]) -> Recording {
        let n = (fs * seconds) as usize;
        let data: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let on = bursts.iter().any(|&(s, d)| t >= s && t < s + d);
                let tone = if on { (2.0 * PI * 40.0 * t).sin() } else { 0.0 };
                tone + 0.05 * ((i * 7919 % 101) as f64 / 101.0 - 0.5)
            })
            .collect();
        Recording::new(vec!["O1".into()], fs, vec![data]).unwrap()
    }

    #[test]
    fn forty_hertz_bursts_stand_out() {
        let fs = 250.0;
        let bursts = [(2.0, 4.0), (10.0, 4.0)];
        let rec = recording_with_bursts(fs, 20.0, &bursts);
        let periods: Vec<_> = bursts
            .iter()
            .enumerate()
            .map(|(i, &(s, d))| StimulationPeriod::new(s, d, format!("Period_{}", i + 1)))
            .collect();
        let report = analyze_epochs(
            &rec,
            "default",
            &periods,
            &ChannelSelection::Default,
            &EpochParams::default(),
        )
        .unwrap();
        assert_eq!(report.periods.len(), 2);
        assert_eq!(report.window_samples, 1000);
        let ch = &report.channels[0];
        assert_eq!(ch.welch.len(), ch.welch.power.len());
        assert!(ch.periodogram.bin_spacing().unwrap() < ch.welch.bin_spacing().unwrap());
        let target = ch.targets[0];
        assert!(target.band_snr_db.unwrap() > 10.0);
        assert!((target.peak_frequency.unwrap() - 40.0).abs() <= 0.1);
    }

    #[test]
    fn periods_outside_are_skipped() {
        let rec = recording_with_bursts(100.0, 10.0, &[]);
        let periods = [
            StimulationPeriod::new(1.0, 3.0, "a"),
            StimulationPeriod::new(8.0, 5.0, "b"),
            StimulationPeriod::new(1.0, 3.0, "c").in_experiment("other"),
        ];
        let report = analyze_epochs(
            &rec,
            "default",
            &periods,
            &ChannelSelection::Default,
            &EpochParams::default(),
        )
        .unwrap();
        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].period.label, "b");
    }

    #[test]
    fn no_valid_period_is_an_error() {
        let rec = recording_with_bursts(100.0, 5.0, &[]);
        let periods = [StimulationPeriod::new(6.0, 1.0, "late")];
        assert!(
            analyze_epochs(
                &rec,
                "default",
                &periods,
                &ChannelSelection::Default,
                &EpochParams::default()
            )
            .is_err()
        );
    }

    #[test]
    fn sync_offset_and_grouping() {
        let mut periods = vec![
            StimulationPeriod::new(1.0, 2.0, "a").in_experiment("x"),
            StimulationPeriod::new(5.0, 2.0, "b").in_experiment("y"),
            StimulationPeriod::new(9.0, 2.0, "c").in_experiment("x"),
        ];
        apply_sync_offset(&mut periods, -0.5);
        assert_eq!(periods[0].start, 0.5);
        let groups = group_by_experiment(&periods);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["x"].len(), 2);
        assert_eq!(groups["x"][1].label, "c");
    }
}
