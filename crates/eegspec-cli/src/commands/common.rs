//! Shared CLI helpers used across multiple commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use eegspec_analysis::export::{export_json, write_json};
use eegspec_analysis::{CancelToken, ChannelSelection};
use eegspec_config::{Profile, resolve_profile, validate_profile};
use eegspec_core::{Recording, TimeWindow};
use eegspec_engine::{AnalysisResult, RenderOptions};
use eegspec_io::{DecodeOptions, DecoderChain};
use indicatif::{ProgressBar, ProgressStyle};

/// Decoding hints for commands that read recordings.
#[derive(Args, Clone, Debug, Default)]
pub struct InputArgs {
    /// Sample rate of delimited text without a time column
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<f64>,
}

/// Decode a recording with the default decoder chain.
pub fn load_recording(path: &Path, input: &InputArgs) -> anyhow::Result<Recording> {
    let mut options = DecodeOptions::default();
    if let Some(fs) = input.sample_rate {
        options = options.with_sample_rate(fs);
    }
    DecoderChain::default()
        .decode_file(path, &options)
        .with_context(|| format!("failed to read recording '{}'", path.display()))
}

/// Profile selection.
#[derive(Args, Clone, Debug)]
pub struct ProfileArgs {
    /// Analysis profile: user profile name, factory profile name or TOML path
    #[arg(short, long, default_value = "default")]
    pub profile: String,
}

/// Resolve and validate a profile.
pub fn load_profile(name: &str) -> anyhow::Result<Profile> {
    let profile =
        resolve_profile(name).with_context(|| format!("failed to load profile '{name}'"))?;
    validate_profile(&profile).with_context(|| format!("profile '{}' is invalid", profile.name))?;
    Ok(profile)
}

/// Channel and time-window selection.
#[derive(Args, Clone, Debug, Default)]
pub struct SelectionArgs {
    /// Channels to analyse, comma separated (default: occipital channels, else the first 8)
    #[arg(short, long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Time window in seconds, as START:END
    #[arg(short, long, value_parser = parse_window)]
    pub window: Option<TimeWindow>,
}

impl SelectionArgs {
    /// The channel selection these arguments describe.
    pub fn selection(&self) -> ChannelSelection {
        if self.channels.is_empty() {
            ChannelSelection::Default
        } else {
            ChannelSelection::named(self.channels.iter().map(|c| c.trim().to_string()))
        }
    }
}

/// Parse `START:END` seconds for clap's `value_parser`.
pub fn parse_window(s: &str) -> Result<TimeWindow, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid window '{s}' (expected START:END)"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid window bound '{v}': {e}"))
    };
    Ok(TimeWindow::new(parse(start)?, parse(end)?))
}

/// Where results and plots go.
#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Write the JSON result to this file instead of stdout
    #[arg(short, long, value_name = "JSON")]
    pub output: Option<PathBuf>,

    /// Render the plot into this PNG file
    #[arg(long, value_name = "PNG")]
    pub plot: Option<PathBuf>,

    /// Plot width in pixels (default: from the profile)
    #[arg(long)]
    pub width: Option<u32>,

    /// Plot height in pixels (default: from the profile)
    #[arg(long)]
    pub height: Option<u32>,

    /// Use the house palette and heavier lines
    #[arg(long)]
    pub house_style: bool,
}

impl OutputArgs {
    /// Render options for one call: the profile's settings, rendering only
    /// when a plot file was asked for.
    pub fn render_options(&self, profile: &Profile) -> RenderOptions {
        let mut render = profile.render;
        render.render = self.plot.is_some();
        if let Some(width) = self.width {
            render.width = width;
        }
        if let Some(height) = self.height {
            render.height = height;
        }
        render.house_style |= self.house_style;
        render
    }
}

/// Write one result: PNG to the plot file, JSON to the output.
///
/// Fails after writing when the analysis itself failed, so the exit status
/// reflects the outcome.
pub fn emit(result: AnalysisResult, output: &OutputArgs) -> anyhow::Result<()> {
    let result = save_plot(result, output.plot.as_deref())?;
    write_result(&result, output.output.as_deref())?;
    check(&result)
}

/// Write several named results as one JSON object keyed by name. Plots get
/// the name appended to the file stem.
pub fn emit_named(results: Vec<(String, AnalysisResult)>, output: &OutputArgs) -> anyhow::Result<()> {
    let mut saved = serde_json::Map::new();
    let mut failed = Vec::new();
    for (name, result) in results {
        let plot = output.plot.as_deref().map(|p| suffixed(p, &name));
        let result = save_plot(result, plot.as_deref())?;
        if !result.success {
            failed.push(name.clone());
        }
        saved.insert(name, serde_json::to_value(&result)?);
    }
    write_result(&saved, output.output.as_deref())?;
    if !failed.is_empty() {
        anyhow::bail!("analysis failed for: {}", failed.join(", "));
    }
    Ok(())
}

fn save_plot(mut result: AnalysisResult, plot: Option<&Path>) -> anyhow::Result<AnalysisResult> {
    if let (Some(path), Some(png)) = (plot, result.image.take()) {
        std::fs::write(path, png)
            .with_context(|| format!("failed to write plot '{}'", path.display()))?;
        tracing::info!(path = %path.display(), "plot written");
    }
    for note in &result.notes {
        tracing::warn!(kind = ?note.kind, "{}", note.message);
    }
    Ok(result)
}

fn write_result<T: serde::Serialize>(value: &T, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => export_json(value, path)
            .with_context(|| format!("failed to write '{}'", path.display())),
        None => write_json(&mut std::io::stdout().lock(), value).context("failed to write stdout"),
    }
}

fn check(result: &AnalysisResult) -> anyhow::Result<()> {
    match (&result.error, result.success) {
        (Some(err), false) => anyhow::bail!("{} failed: {}", result.kind, err.message),
        (None, false) => anyhow::bail!("{} failed", result.kind),
        _ => Ok(()),
    }
}

/// `plot.png` + `alpha` -> `plot-alpha.png`.
fn suffixed(path: &Path, name: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let clean: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let file = match path.extension() {
        Some(ext) => format!("{stem}-{clean}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{clean}"),
    };
    path.with_file_name(file)
}

/// A token cancelled by Ctrl+C.
pub fn cancel_on_ctrlc() -> anyhow::Result<CancelToken> {
    let token = CancelToken::new();
    let handle = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handle.cancel();
    })
    .context("failed to install Ctrl+C handler")?;
    Ok(token)
}

/// A progress bar on stderr, hidden for a single step.
pub fn progress(len: usize, message: &'static str) -> ProgressBar {
    if len < 2 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message(message);
    pb
}
