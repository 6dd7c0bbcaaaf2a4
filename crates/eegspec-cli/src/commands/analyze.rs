//! Single-recording analyses.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use eegspec_analysis::PsdMethod;
use eegspec_analysis::export::{
    write_bands_csv, write_psd_csv, write_snr_csv, write_spectrogram_csv,
};
use eegspec_core::RecordingStore;
use eegspec_engine::{
    AnalysisKind, AnalysisParams, AnalysisRequest, AnalysisResult, BandPayload, Engine,
    PsdPayload, SnrPayload, SpectrogramPayload,
};

use super::common::{
    InputArgs, OutputArgs, ProfileArgs, SelectionArgs, emit, load_profile, load_recording,
};

/// Analysis kinds available on a single recording
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Power spectral density
    Psd,
    /// Per-bin SNR spectrum
    Snr,
    /// Band power table and theta/beta ratio
    BandPower,
    /// Cross-channel PCA
    Pca,
    /// SSVEP detection at a target frequency
    Ssvep,
    /// Time-frequency map
    Spectrogram,
    /// Aperiodic/periodic spectral parameterization
    Fooof,
    /// Decimated raw traces
    RawTraces,
}

impl From<KindArg> for AnalysisKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Psd => AnalysisKind::Psd,
            KindArg::Snr => AnalysisKind::Snr,
            KindArg::BandPower => AnalysisKind::BandPower,
            KindArg::Pca => AnalysisKind::Pca,
            KindArg::Ssvep => AnalysisKind::Ssvep,
            KindArg::Spectrogram => AnalysisKind::Spectrogram,
            KindArg::Fooof => AnalysisKind::Fooof,
            KindArg::RawTraces => AnalysisKind::RawTraces,
        }
    }
}

/// PSD estimator choice on the command line
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MethodArg {
    /// Averaged overlapping segments
    Welch,
    /// Single rectangular-window transform
    Periodogram,
}

impl From<MethodArg> for PsdMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Welch => PsdMethod::Welch,
            MethodArg::Periodogram => PsdMethod::Periodogram,
        }
    }
}

/// Run one analysis on a recording.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// What to compute
    #[arg(value_enum)]
    kind: KindArg,

    /// Recording file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    selection: SelectionArgs,

    #[command(flatten)]
    profile: ProfileArgs,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// SSVEP target frequency in Hz
    #[arg(long, value_name = "HZ")]
    target: Option<f64>,

    /// Lower frequency limit in Hz
    #[arg(long, value_name = "HZ")]
    fmin: Option<f64>,

    /// Upper frequency limit in Hz
    #[arg(long, value_name = "HZ")]
    fmax: Option<f64>,

    /// PSD estimator
    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Also write the main table as CSV (psd, snr, band-power, spectrogram)
    #[arg(long, value_name = "CSV")]
    csv: Option<PathBuf>,
}

impl AnalyzeArgs {
    /// Command-line overrides on top of the profile's parameters.
    fn apply_overrides(&self, params: &mut AnalysisParams) {
        let range = |min: &mut f64, max: &mut f64| {
            if let Some(f) = self.fmin {
                *min = f;
            }
            if let Some(f) = self.fmax {
                *max = f;
            }
        };
        match params {
            AnalysisParams::Psd(p) => {
                range(&mut p.frequency_min, &mut p.frequency_max);
                if let Some(m) = self.method {
                    p.method = m.into();
                }
            }
            AnalysisParams::Snr(p) => {
                range(&mut p.psd.frequency_min, &mut p.psd.frequency_max);
                if let Some(m) = self.method {
                    p.psd.method = m.into();
                }
            }
            AnalysisParams::Spectrogram(p) => range(&mut p.frequency_min, &mut p.frequency_max),
            AnalysisParams::Ssvep(p) => {
                if let Some(target) = self.target {
                    p.target_frequency = target;
                }
            }
            AnalysisParams::Fooof(p) => {
                let [low, high] = &mut p.fit.frequency_range;
                range(low, high);
            }
            AnalysisParams::BandPower(_)
            | AnalysisParams::Pca(_)
            | AnalysisParams::RawTraces(_)
            | AnalysisParams::Epochs(_) => {}
        }
    }
}

/// Run the analyze command.
pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let kind = AnalysisKind::from(args.kind);
    let profile = load_profile(&args.profile.profile)?;
    let mut params = profile
        .params_for(kind)
        .with_context(|| format!("{kind} cannot run from a profile alone"))?;
    args.apply_overrides(&mut params);

    let recording = load_recording(&args.file, &args.input)?;
    let mut store = RecordingStore::new();
    let id = store.insert(recording);

    let mut request = AnalysisRequest::new(id, params, args.output.render_options(&profile))
        .with_channels(args.selection.selection());
    request.window = args.selection.window;

    let result = Engine::new().analyze(&store, &request);
    if let Some(path) = &args.csv
        && result.success
    {
        write_csv(&result, path)?;
    }
    emit(result, &args.output)
}

fn write_csv(result: &AnalysisResult, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut out = std::io::BufWriter::new(file);
    let payload = result.payload.clone();

    match result.kind {
        AnalysisKind::Psd => {
            let p: PsdPayload = serde_json::from_value(payload)?;
            let columns: Vec<_> = p.channels.iter().map(|c| (c.channel.as_str(), &c.psd)).collect();
            write_psd_csv(&mut out, &columns)?;
        }
        AnalysisKind::Snr => {
            let p: SnrPayload = serde_json::from_value(payload)?;
            let first = p.channels.first().context("no channel in the result")?;
            write_snr_csv(&mut out, &first.snr)?;
        }
        AnalysisKind::BandPower => {
            let p: BandPayload = serde_json::from_value(payload)?;
            let rows: Vec<_> = p
                .channels
                .iter()
                .map(|c| (c.channel.as_str(), &c.powers))
                .collect();
            write_bands_csv(&mut out, &rows)?;
        }
        AnalysisKind::Spectrogram => {
            let p: SpectrogramPayload = serde_json::from_value(payload)?;
            let first = p.channels.first().context("no channel in the result")?;
            write_spectrogram_csv(&mut out, &first.spectrogram)?;
        }
        other => anyhow::bail!("CSV export is not available for {other}"),
    }
    out.flush()?;
    tracing::info!(path = %path.display(), kind = %result.kind, "CSV written");
    Ok(())
}
