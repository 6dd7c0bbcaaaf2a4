//! Display recording metadata.

use std::path::PathBuf;

use clap::Args;
use eegspec_core::{ChannelRead, Recording};
use serde::Serialize;

use super::common::{InputArgs, load_recording};

/// Display recording information.
#[derive(Args)]
pub struct InfoArgs {
    /// Recording file (EDF/EDF+/BDF, WAV or delimited text)
    pub file: PathBuf,

    #[command(flatten)]
    input: InputArgs,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    source: Option<&'a str>,
    channels: &'a [String],
    sample_rate: f64,
    samples: usize,
    duration: f64,
    unit: String,
    start_time: Option<String>,
    annotations: Vec<AnnotationRow<'a>>,
}

#[derive(Serialize)]
struct AnnotationRow<'a> {
    onset: f64,
    duration: Option<f64>,
    description: &'a str,
    timestamp: Option<String>,
}

fn summarize(recording: &Recording) -> Summary<'_> {
    Summary {
        source: recording.source(),
        channels: recording.channel_names(),
        sample_rate: recording.sample_rate(),
        samples: recording.sample_count(),
        duration: recording.duration(),
        unit: recording.unit().axis_label().to_string(),
        start_time: recording.start_time().map(|t| t.to_string()),
        annotations: recording
            .annotations()
            .iter()
            .map(|a| AnnotationRow {
                onset: a.onset,
                duration: a.duration,
                description: &a.description,
                timestamp: recording.annotation_timestamp(a).map(|t| t.to_string()),
            })
            .collect(),
    }
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let recording = load_recording(&args.file, &args.input)?;
    let summary = summarize(&recording);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File:        {}", args.file.display());
    println!("Channels:    {} ({})", summary.channels.len(), summary.channels.join(", "));
    println!("Sample Rate: {} Hz", summary.sample_rate);
    println!(
        "Duration:    {:.3}s ({} samples)",
        summary.duration, summary.samples
    );
    println!("Unit:        {}", summary.unit);
    if let Some(start) = &summary.start_time {
        println!("Start:       {start}");
    }

    let file_size = std::fs::metadata(&args.file)?.len();
    println!("File Size:   {}", format_bytes(file_size));

    if !summary.annotations.is_empty() {
        println!("\nAnnotations ({}):", summary.annotations.len());
        for a in &summary.annotations {
            match a.duration {
                Some(d) => println!("  {:>10.3}s  +{d:.3}s  {}", a.onset, a.description),
                None => println!("  {:>10.3}s           {}", a.onset, a.description),
            }
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
