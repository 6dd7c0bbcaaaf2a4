//! Synthetic recording generation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use eegspec_analysis::SyntheticEeg;
use eegspec_core::{ChannelRead, Recording};
use eegspec_io::{write_edf_file, write_wav};

/// Generate a synthetic EEG recording (EDF+, or WAV by extension).
#[derive(Args)]
pub struct GenerateArgs {
    /// Output file (.edf or .wav)
    #[arg(value_name = "OUT")]
    output: PathBuf,

    /// Length in seconds
    #[arg(short, long, default_value_t = 30.0)]
    duration: f64,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value_t = 256.0)]
    sample_rate: f64,

    /// Channel labels, comma separated
    #[arg(short, long, value_delimiter = ',', default_value = "Fz,Cz,Pz,O1,Oz,O2")]
    channels: Vec<String>,

    /// Stimulation tone frequency in Hz
    #[arg(long, value_name = "HZ", default_value_t = 40.0)]
    ssvep: f64,

    /// Leave the stimulation tone out
    #[arg(long, conflicts_with = "ssvep")]
    no_ssvep: bool,

    /// Tone amplitude on occipital channels in µV
    #[arg(long, default_value_t = 3.0)]
    ssvep_amplitude: f64,

    /// Switch the tone on and off in blocks of this many seconds
    #[arg(long, value_name = "SECONDS")]
    block: Option<f64>,

    /// Mains interference frequency in Hz (amplitude 2 µV)
    #[arg(long, value_name = "HZ")]
    mains: Option<f64>,

    /// Background noise standard deviation in µV
    #[arg(long, default_value_t = 5.0)]
    noise: f64,

    /// Random seed
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

const MAINS_UV: f64 = 2.0;

impl GenerateArgs {
    fn recipe(&self) -> SyntheticEeg {
        SyntheticEeg {
            sample_rate: self.sample_rate,
            duration: self.duration,
            channels: self.channels.iter().map(|c| c.trim().to_string()).collect(),
            noise_uv: self.noise,
            ssvep_hz: (!self.no_ssvep).then_some(self.ssvep),
            ssvep_uv: self.ssvep_amplitude,
            mains: self.mains.map(|hz| (hz, MAINS_UV)),
            ssvep_block_seconds: self.block,
            seed: self.seed,
            ..SyntheticEeg::default()
        }
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn write(path: &Path, recording: &Recording) -> anyhow::Result<()> {
    if is_wav(path) {
        write_wav(path, recording)
    } else {
        write_edf_file(path, recording)
    }
    .with_context(|| format!("failed to write '{}'", path.display()))
}

/// Run the generate command.
pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let recipe = args.recipe();
    let recording = recipe
        .generate()
        .context("invalid synthetic recording settings")?;
    write(&args.output, &recording)?;

    tracing::info!(
        path = %args.output.display(),
        channels = recording.channel_count(),
        samples = recording.sample_count(),
        "synthetic recording written"
    );
    println!(
        "Wrote {} ({} channels, {:.1}s at {} Hz)",
        args.output.display(),
        recording.channel_count(),
        recording.duration(),
        recording.sample_rate()
    );
    Ok(())
}
