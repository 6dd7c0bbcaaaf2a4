//! The analysis engine.
//!
//! [`Engine::analyze`] and [`Engine::compare`] are the only entry points. Both
//! take every input as an argument and always return an [`AnalysisResult`]:
//! failures become `success: false` with a [`ResultError`], never an `Err`.

use eegspec_analysis::{
    AnalysisError, CancelToken, ChannelBands, PeakFitter, Psd, SkipReason, SpectralParameterizer,
    SsvepParams, SsvepReport, analyze_epochs, compare_traces_with_progress, compute_band_powers,
    compute_psd, compute_snr_spectrum, compute_spectrogram, detect_ssvep, find_peaks,
    parameterize, pca, raw_traces, theta_beta_ratio,
};
use eegspec_core::{AppliedWindow, ChannelRead, Recording, RecordingStore, crop};
use serde::Serialize;
use serde_json::Value;

use crate::payload::{
    BandPayload, ChannelSnr, ChannelSpectrogram, ChannelSpectrum, ComparisonPayload, PcaPayload,
    PsdPayload, SnrPayload, SpectrogramPayload, TraceIdentity,
};
use crate::render::{BarGroup, Figure, Labels, RenderOptions, Series, render_png};
use crate::request::{AnalysisKind, AnalysisParams, AnalysisRequest, ComparisonRequest, EpochSpec};
use crate::result::{AnalysisResult, ErrorKind, ResultError};

/// Minimum spacing between reported PSD peaks.
const PEAK_SPACING_HZ: f64 = 1.0;
/// Peaks reported per channel.
const MAX_PEAKS: usize = 5;

/// Everything a successful run produces before rendering.
struct Outcome {
    payload: Value,
    figure: Option<Figure>,
    window: Option<AppliedWindow>,
    notes: Vec<ResultError>,
}

impl Outcome {
    fn new<T: Serialize>(payload: &T, figure: Figure) -> Self {
        Self {
            payload: to_value(payload),
            figure: Some(figure),
            window: None,
            notes: Vec::new(),
        }
    }
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        tracing::error!(%err, "payload serialization failed");
        Value::Null
    })
}

fn psd_points(psd: &Psd) -> Vec<(f64, f64)> {
    psd.frequencies
        .iter()
        .copied()
        .zip(psd.power.iter().copied())
        .collect()
}

fn lines(labels: Labels, series: Vec<Series>, markers: Vec<f64>) -> Figure {
    Figure::Lines {
        labels,
        series,
        markers,
    }
}

/// SSVEP overview: filtered spectra, SNR per channel against the confidence
/// thresholds, PCA cumulative variance, relative band power of the first
/// channel and the tier counts.
fn ssvep_figure(report: &SsvepReport, params: &SsvepParams, unit: &str) -> Figure {
    let series = report
        .detections
        .iter()
        .zip(&report.spectra)
        .map(|(d, psd)| {
            let snr = d.snr_db.map_or_else(|| "n/a".to_string(), |s| format!("{s:.1} dB"));
            Series::new(format!("{} ({snr}, {})", d.channel, d.confidence), psd_points(psd))
        })
        .collect();
    let mut panels = vec![
        lines(
            Labels::new("Filtered spectra", "Frequency (Hz)", format!("PSD ({unit}²/Hz)")),
            series,
            vec![params.target_frequency],
        ),
        Figure::Bars {
            labels: Labels::new("SNR by channel", "Channel", "SNR (dB)"),
            categories: report.detections.iter().map(|d| d.channel.clone()).collect(),
            groups: vec![BarGroup {
                label: "SNR".into(),
                values: report.detections.iter().map(|d| d.snr_db).collect(),
            }],
            thresholds: vec![params.medium_threshold_db, params.high_threshold_db],
        },
    ];

    if let Some(pca) = &report.pca {
        let points = pca
            .cumulative_variance
            .iter()
            .enumerate()
            .map(|(i, &v)| ((i + 1) as f64, v))
            .collect();
        panels.push(lines(
            Labels::new("PCA cumulative variance", "Component", "Cumulative ratio"),
            vec![Series::new("cumulative", points)],
            Vec::new(),
        ));
    }

    if let Some(first) = report.bands.first() {
        panels.push(Figure::Bars {
            labels: Labels::new(
                format!("Relative band power ({})", first.channel),
                "Band",
                "Relative power",
            ),
            categories: first.powers.bands.iter().map(|b| b.name.clone()).collect(),
            groups: vec![BarGroup {
                label: first.channel.clone(),
                values: first.powers.bands.iter().map(|b| b.relative).collect(),
            }],
            thresholds: Vec::new(),
        });
    }

    let tiers_title = match &report.best_channel {
        Some(best) => format!("Confidence tiers (best: {best})"),
        None => "Confidence tiers (no defined SNR)".to_string(),
    };
    let t = &report.tiers;
    panels.push(Figure::Bars {
        labels: Labels::new(tiers_title, "Tier", "Channels"),
        categories: vec!["high".into(), "medium".into(), "low".into()],
        groups: vec![BarGroup {
            label: "channels".into(),
            values: [t.high, t.medium, t.low].iter().map(|&c| Some(c as f64)).collect(),
        }],
        thresholds: Vec::new(),
    });

    Figure::Panels {
        title: format!("SSVEP at {} Hz", report.target_frequency),
        panels,
    }
}

/// Spectral analysis engine
///
/// Holds no recordings and no state from earlier calls; the only
/// configuration is the spectral parameterizer used for `fooof` requests.
pub struct Engine {
    parameterizer: Box<dyn SpectralParameterizer>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("parameterizer", &self.parameterizer.name())
            .finish()
    }
}

impl Engine {
    /// An engine using the built-in [`PeakFitter`].
    pub fn new() -> Self {
        Self::with_parameterizer(PeakFitter)
    }

    /// An engine using another parameterizer.
    pub fn with_parameterizer(parameterizer: impl SpectralParameterizer + 'static) -> Self {
        Self {
            parameterizer: Box::new(parameterizer),
        }
    }

    /// Run one analysis against one recording of `store`.
    pub fn analyze(&self, store: &RecordingStore, request: &AnalysisRequest) -> AnalysisResult {
        let kind = request.kind();
        let parameters = to_value(&request.params);
        tracing::debug!(%kind, recording = %request.recording, "analysis started");

        match self.run(store, request) {
            Ok(outcome) => finish(kind, parameters, outcome, request),
            Err(err) => {
                tracing::warn!(%kind, recording = %request.recording, error = %err.message, "analysis failed");
                AnalysisResult::failure(kind, parameters, err)
            }
        }
    }

    /// Overlay the PSDs of independent traces.
    ///
    /// Traces whose recording or channel is gone are skipped and listed in
    /// `notes`; the call fails only when fewer than two traces are given or
    /// none can be computed. `cancel` is checked between traces.
    pub fn compare(
        &self,
        store: &RecordingStore,
        request: &ComparisonRequest,
        cancel: Option<&CancelToken>,
    ) -> AnalysisResult {
        self.compare_with_progress(store, request, cancel, |_| {})
    }

    /// [`Engine::compare`], calling `on_trace` with the index of every trace
    /// once it has been computed or skipped.
    pub fn compare_with_progress<F>(
        &self,
        store: &RecordingStore,
        request: &ComparisonRequest,
        cancel: Option<&CancelToken>,
        on_trace: F,
    ) -> AnalysisResult
    where
        F: FnMut(usize),
    {
        let kind = AnalysisKind::Comparison;
        let parameters = to_value(&request.psd);
        tracing::debug!(traces = request.traces.len(), "comparison started");

        let comparison = match compare_traces_with_progress(
            store,
            &request.traces,
            &request.psd,
            cancel,
            on_trace,
        ) {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(traces = request.traces.len(), %err, "comparison failed");
                return AnalysisResult::failure(kind, parameters, err.into());
            }
        };

        let notes = comparison
            .skipped
            .iter()
            .map(|s| {
                let kind = match s.reason {
                    SkipReason::MissingRecording => ErrorKind::MissingRecording,
                    SkipReason::ChannelNotFound => ErrorKind::InvalidParameter,
                    SkipReason::EmptySignal => ErrorKind::EmptySignal,
                };
                ResultError::new(kind, format!("trace {} ({}): {}", s.index, s.label, s.message))
            })
            .collect();

        let traces = request
            .traces
            .iter()
            .enumerate()
            .map(|(index, t)| TraceIdentity {
                index,
                label: t.display_label(),
                recording: t.recording,
                channel: t.channel.clone(),
                computed: comparison.series.iter().any(|s| s.index == index),
            })
            .collect();

        let y = if request.psd.use_decibel { "Power (dB)" } else { "Power" };
        let series = comparison
            .series
            .iter()
            .map(|s| {
                Series::new(s.label.clone(), psd_points(&s.psd))
                    .with_color(Some(s.color.clone()))
            })
            .collect();
        let figure = lines(
            Labels::new("PSD comparison", "Frequency (Hz)", y),
            series,
            Vec::new(),
        );

        let payload = ComparisonPayload { traces, comparison };
        let computed = payload.comparison.series.len();
        let mut result = AnalysisResult::success(kind, to_value(&payload), parameters);
        result.notes = notes;
        attach_image(&mut result, Some(figure), &request.render);
        tracing::info!(traces = computed, skipped = result.notes.len(), "comparison finished");
        result
    }

    fn run(&self, store: &RecordingStore, request: &AnalysisRequest) -> Result<Outcome, ResultError> {
        let recording = store
            .get(request.recording)
            .map_err(AnalysisError::from)?;

        let view = crop(recording.as_ref(), request.window);
        let applied = view.applied();
        let channels = request.channels.gather(&view)?;
        let fs = view.sample_rate();
        let unit = recording.unit().axis_label().to_string();

        let mut outcome = match &request.params {
            AnalysisParams::Psd(p) => {
                let mut spectra = Vec::with_capacity(channels.len());
                for ch in &channels {
                    let psd = compute_psd(ch.samples, fs, p)?;
                    let peaks = find_peaks(&psd, PEAK_SPACING_HZ, MAX_PEAKS);
                    spectra.push(ChannelSpectrum {
                        channel: ch.name.to_string(),
                        psd,
                        peaks,
                    });
                }
                let y = if p.use_decibel {
                    "PSD (dB)".to_string()
                } else {
                    format!("PSD ({unit}²/Hz)")
                };
                let series = spectra
                    .iter()
                    .map(|s| Series::new(s.channel.clone(), psd_points(&s.psd)))
                    .collect();
                let figure = lines(
                    Labels::new(format!("Power spectral density ({})", p.method), "Frequency (Hz)", y),
                    series,
                    Vec::new(),
                );
                Outcome::new(&PsdPayload { unit, channels: spectra }, figure)
            }

            AnalysisParams::Snr(p) => {
                let mut rows = Vec::with_capacity(channels.len());
                let mut notes = Vec::new();
                for ch in &channels {
                    let snr = compute_snr_spectrum(ch.samples, fs, p)?;
                    if snr.snr_db.iter().all(Option::is_none) {
                        notes.push(ResultError::degenerate(format!(
                            "{}: SNR undefined at every bin",
                            ch.name
                        )));
                    }
                    rows.push(ChannelSnr {
                        channel: ch.name.to_string(),
                        snr,
                    });
                }
                let series = rows
                    .iter()
                    .map(|r| {
                        let points = r
                            .snr
                            .frequencies
                            .iter()
                            .zip(&r.snr.snr_db)
                            .filter_map(|(f, s)| s.map(|s| (*f, s)))
                            .collect();
                        Series::new(r.channel.clone(), points)
                    })
                    .collect();
                let figure = lines(
                    Labels::new("SNR spectrum", "Frequency (Hz)", "SNR (dB)"),
                    series,
                    Vec::new(),
                );
                let mut outcome = Outcome::new(&SnrPayload { channels: rows }, figure);
                outcome.notes = notes;
                outcome
            }

            AnalysisParams::BandPower(p) => {
                let mut rows = Vec::with_capacity(channels.len());
                let mut notes = Vec::new();
                for ch in &channels {
                    let powers = compute_band_powers(ch.samples, fs, p)?;
                    if powers.bands.iter().any(|b| b.relative.is_none()) {
                        notes.push(ResultError::degenerate(format!(
                            "{}: total band power is zero; relative power undefined",
                            ch.name
                        )));
                    }
                    rows.push(ChannelBands {
                        channel: ch.name.to_string(),
                        powers,
                    });
                }
                let all: Vec<_> = rows.iter().map(|r| r.powers.clone()).collect();
                let ratio = theta_beta_ratio(&all);
                if ratio.is_none() {
                    notes.push(ResultError::degenerate(
                        "theta/beta ratio undefined (beta power is not positive or a band is missing)",
                    ));
                }
                let figure = Figure::Bars {
                    labels: Labels::new("Relative band power", "Band", "Relative power"),
                    categories: p.bands.bands().iter().map(|b| b.name.to_string()).collect(),
                    groups: rows
                        .iter()
                        .map(|r| BarGroup {
                            label: r.channel.clone(),
                            values: r.powers.bands.iter().map(|b| b.relative).collect(),
                        })
                        .collect(),
                    thresholds: Vec::new(),
                };
                let mut outcome = Outcome::new(
                    &BandPayload {
                        channels: rows,
                        theta_beta_ratio: ratio,
                    },
                    figure,
                );
                outcome.notes = notes;
                outcome
            }

            AnalysisParams::Pca(p) => {
                let slices: Vec<&[f64]> = channels.iter().map(|c| c.samples).collect();
                let summary = pca(&slices, p)?;
                let mut notes = Vec::new();
                let figure = match &summary {
                    Some(s) => Figure::Bars {
                        labels: Labels::new("Explained variance", "Component", "Ratio"),
                        categories: (1..=s.n_components).map(|i| format!("PC{i}")).collect(),
                        groups: vec![
                            BarGroup {
                                label: "explained".into(),
                                values: s.explained_variance_ratio.iter().copied().map(Some).collect(),
                            },
                            BarGroup {
                                label: "cumulative".into(),
                                values: s.cumulative_variance.iter().copied().map(Some).collect(),
                            },
                        ],
                        thresholds: Vec::new(),
                    },
                    None => {
                        notes.push(ResultError::degenerate(
                            "every channel is constant; no variance to decompose",
                        ));
                        Figure::Bars {
                            labels: Labels::default(),
                            categories: Vec::new(),
                            groups: Vec::new(),
                            thresholds: Vec::new(),
                        }
                    }
                };
                let payload = PcaPayload {
                    channels: channels.iter().map(|c| c.name.to_string()).collect(),
                    summary,
                };
                let mut outcome = Outcome::new(&payload, figure);
                if payload.summary.is_none() {
                    outcome.figure = None;
                }
                outcome.notes = notes;
                outcome
            }

            AnalysisParams::Ssvep(p) => {
                let report = detect_ssvep(&channels, fs, p)?;
                let notes = report
                    .detections
                    .iter()
                    .filter(|d| d.snr_db.is_none())
                    .map(|d| {
                        ResultError::degenerate(format!(
                            "{}: noise power is zero or has no bins; SNR undefined",
                            d.channel
                        ))
                    })
                    .collect();
                let figure = ssvep_figure(&report, p, &unit);
                let mut outcome = Outcome::new(&report, figure);
                outcome.notes = notes;
                outcome
            }

            AnalysisParams::Spectrogram(p) => {
                let mut maps = Vec::with_capacity(channels.len());
                for ch in &channels {
                    maps.push(ChannelSpectrogram {
                        channel: ch.name.to_string(),
                        spectrogram: compute_spectrogram(ch.samples, fs, p)?,
                    });
                }
                let figure = maps.first().map(|m| Figure::Heatmap {
                    labels: Labels::new(
                        format!("Spectrogram {}", m.channel),
                        "Time (s)",
                        "Frequency (Hz)",
                    ),
                    times: m
                        .spectrogram
                        .times
                        .iter()
                        .map(|t| t + applied.start)
                        .collect(),
                    frequencies: m.spectrogram.frequencies.clone(),
                    values: m.spectrogram.power.clone(),
                });
                Outcome {
                    payload: to_value(&SpectrogramPayload { channels: maps }),
                    figure,
                    window: None,
                    notes: Vec::new(),
                }
            }

            AnalysisParams::Fooof(p) => {
                let report = parameterize(&channels, fs, p, self.parameterizer.as_ref())?;
                let mut notes = Vec::new();
                if !report.omitted_channels.is_empty() {
                    notes.push(ResultError::new(
                        ErrorKind::InvalidParameter,
                        format!(
                            "only the first {} channels were fitted; omitted: {}",
                            p.max_channels,
                            report.omitted_channels.join(", ")
                        ),
                    ));
                }
                let mut series = Vec::new();
                for ch in &report.channels {
                    let f = &ch.fit.frequencies;
                    series.push(Series::new(
                        format!("{} spectrum", ch.channel),
                        f.iter().copied().zip(ch.fit.log_power.iter().copied()).collect(),
                    ));
                    series.push(Series::new(
                        format!("{} model (R² {:.2})", ch.channel, ch.fit.r_squared),
                        f.iter().copied().zip(ch.fit.model.iter().copied()).collect(),
                    ));
                }
                let markers = report
                    .channels
                    .iter()
                    .filter_map(|c| c.alpha_peak.as_ref().map(|a| a.center_hz))
                    .collect();
                let figure = lines(
                    Labels::new(
                        format!("Spectral parameterization ({})", report.parameterizer),
                        "Frequency (Hz)",
                        "log10 power",
                    ),
                    series,
                    markers,
                );
                let mut outcome = Outcome::new(&report, figure);
                outcome.notes = notes;
                outcome
            }

            AnalysisParams::RawTraces(p) => {
                let traces = raw_traces(&channels, fs, applied.start, p)?;
                let times = traces.times();
                let spacing = traces
                    .channels
                    .iter()
                    .map(|c| {
                        let (lo, hi) = c
                            .samples
                            .iter()
                            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                                (lo.min(*v), hi.max(*v))
                            });
                        hi - lo
                    })
                    .filter(|r| r.is_finite())
                    .fold(0.0f64, f64::max)
                    .max(f64::EPSILON)
                    * 1.2;
                let series = traces
                    .channels
                    .iter()
                    .enumerate()
                    .map(|(k, c)| {
                        let offset = k as f64 * spacing;
                        Series::new(
                            c.channel.clone(),
                            times.iter().copied().zip(c.samples.iter().map(|v| v - offset)).collect(),
                        )
                    })
                    .collect();
                let figure = lines(
                    Labels::new("Raw traces", "Time (s)", format!("Amplitude ({unit}, offset)")),
                    series,
                    Vec::new(),
                );
                Outcome::new(&traces, figure)
            }

            AnalysisParams::Epochs(spec) => {
                // Periods index the whole recording, not the cropped view.
                let mut outcome = epochs(recording.as_ref(), request, spec)?;
                if request.window.is_some() {
                    outcome.notes.push(ResultError::new(
                        ErrorKind::InvalidParameter,
                        "time window ignored; epochs use the stimulation periods",
                    ));
                }
                return Ok(outcome);
            }
        };

        if applied.clamped {
            outcome.notes.push(ResultError::new(
                ErrorKind::InvalidParameter,
                format!(
                    "window clamped to [{:.3}, {:.3}) s",
                    applied.start, applied.end
                ),
            ));
        }
        outcome.window = Some(applied);
        Ok(outcome)
    }
}

fn epochs(
    recording: &Recording,
    request: &AnalysisRequest,
    spec: &EpochSpec,
) -> Result<Outcome, ResultError> {
    let report = analyze_epochs(
        recording,
        &spec.experiment,
        &spec.periods,
        &request.channels,
        &spec.params,
    )?;

    let mut notes: Vec<ResultError> = report
        .skipped
        .iter()
        .map(|s| {
            ResultError::new(
                ErrorKind::InvalidParameter,
                format!("period '{}' skipped: {}", s.period.label, s.reason),
            )
        })
        .collect();
    for ch in &report.channels {
        for t in ch.targets.iter().filter(|t| t.band_snr_db.is_none()) {
            notes.push(ResultError::degenerate(format!(
                "{}: band SNR at {} Hz undefined",
                ch.channel, t.frequency
            )));
        }
    }

    let series = report
        .channels
        .iter()
        .map(|c| {
            let points = c
                .snr
                .frequencies
                .iter()
                .zip(&c.snr.snr_db)
                .filter_map(|(f, s)| s.map(|s| (*f, s)))
                .collect();
            Series::new(c.channel.clone(), points)
        })
        .collect();
    let figure = lines(
        Labels::new(
            format!("{}: mean SNR over {} periods", report.experiment, report.periods.len()),
            "Frequency (Hz)",
            "SNR (dB)",
        ),
        series,
        spec.params.target_frequencies.clone(),
    );
    let mut outcome = Outcome::new(&report, figure);
    outcome.notes = notes;
    Ok(outcome)
}

fn attach_image(result: &mut AnalysisResult, figure: Option<Figure>, render: &RenderOptions) {
    if !render.render {
        return;
    }
    let Some(figure) = figure else {
        return;
    };
    match render_png(&figure, render) {
        Ok(png) => result.image = Some(png),
        Err(err) => {
            tracing::warn!(kind = %result.kind, %err, "plot not rendered");
            result.notes.push(err.into());
        }
    }
}

fn finish(
    kind: AnalysisKind,
    parameters: Value,
    outcome: Outcome,
    request: &AnalysisRequest,
) -> AnalysisResult {
    let mut result = AnalysisResult::success(kind, outcome.payload, parameters);
    result.window = outcome.window;
    result.notes = outcome.notes;
    attach_image(&mut result, outcome.figure, &request.render);
    tracing::info!(
        %kind,
        recording = %request.recording,
        notes = result.notes.len(),
        image = result.image.is_some(),
        "analysis finished"
    );
    result
}
