//! Overlay PSDs of channels from one or more recordings.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Args;
use eegspec_analysis::ComparisonTrace;
use eegspec_core::{RecordingId, RecordingStore, TimeWindow};
use eegspec_engine::{ComparisonRequest, Engine};

use super::common::{
    InputArgs, OutputArgs, ProfileArgs, cancel_on_ctrlc, emit, load_profile, load_recording,
    parse_window, progress,
};

/// One `--trace` argument before its file is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSpec {
    file: PathBuf,
    channel: String,
    window: Option<TimeWindow>,
    label: Option<String>,
}

/// Parse `FILE:CHANNEL[@START:END][=LABEL]` for clap's `value_parser`.
pub fn parse_trace(s: &str) -> Result<TraceSpec, String> {
    let (rest, label) = match s.rsplit_once('=') {
        Some((rest, label)) if !label.trim().is_empty() => (rest, Some(label.trim().to_string())),
        Some(_) => return Err(format!("empty label in trace '{s}'")),
        None => (s, None),
    };
    let (rest, window) = match rest.rsplit_once('@') {
        Some((rest, window)) => (rest, Some(parse_window(window)?)),
        None => (rest, None),
    };
    let (file, channel) = rest
        .rsplit_once(':')
        .filter(|(file, channel)| !file.is_empty() && !channel.trim().is_empty())
        .ok_or_else(|| format!("invalid trace '{s}' (expected FILE:CHANNEL[@START:END][=LABEL])"))?;
    Ok(TraceSpec {
        file: PathBuf::from(file),
        channel: channel.trim().to_string(),
        window,
        label,
    })
}

/// Compare channel PSDs across recordings.
#[derive(Args)]
pub struct CompareArgs {
    /// Trace as FILE:CHANNEL[@START:END][=LABEL]; repeat for each trace
    #[arg(short, long = "trace", value_name = "TRACE", value_parser = parse_trace, required = true)]
    traces: Vec<TraceSpec>,

    #[command(flatten)]
    profile: ProfileArgs,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,
}

/// Run the compare command.
pub fn run(args: CompareArgs) -> anyhow::Result<()> {
    let profile = load_profile(&args.profile.profile)?;

    let mut store = RecordingStore::new();
    let mut loaded: HashMap<PathBuf, RecordingId> = HashMap::new();
    let mut traces = Vec::with_capacity(args.traces.len());
    for spec in &args.traces {
        let id = match loaded.get(&spec.file) {
            Some(id) => *id,
            None => {
                let id = store.insert(load_recording(&spec.file, &args.input)?);
                loaded.insert(spec.file.clone(), id);
                id
            }
        };
        let mut trace = ComparisonTrace::new(id, spec.channel.clone());
        if let Some(window) = spec.window {
            trace = trace.with_window(window);
        }
        if let Some(label) = &spec.label {
            trace = trace.with_label(label.clone());
        }
        traces.push(trace);
    }
    tracing::debug!(recordings = loaded.len(), traces = traces.len(), "traces loaded");

    let request = ComparisonRequest::new(traces, args.output.render_options(&profile))
        .with_psd(profile.psd.clone());
    let cancel = cancel_on_ctrlc()?;
    let pb = progress(request.traces.len(), "Computing");
    let result = Engine::new().compare_with_progress(&store, &request, Some(&cancel), |_| pb.inc(1));
    pb.finish_and_clear();

    emit(result, &args.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_trace() {
        let t = parse_trace("rec.edf:O1").unwrap();
        assert_eq!(t.file, PathBuf::from("rec.edf"));
        assert_eq!(t.channel, "O1");
        assert!(t.window.is_none());
        assert!(t.label.is_none());
    }

    #[test]
    fn trace_with_window_and_label() {
        let t = parse_trace("data/a.bdf:Oz@10:20=baseline").unwrap();
        assert_eq!(t.file, PathBuf::from("data/a.bdf"));
        assert_eq!(t.channel, "Oz");
        assert_eq!(t.window, Some(TimeWindow::new(10.0, 20.0)));
        assert_eq!(t.label.as_deref(), Some("baseline"));
    }

    #[test]
    fn malformed_traces_are_rejected() {
        assert!(parse_trace("rec.edf").is_err());
        assert!(parse_trace("rec.edf:").is_err());
        assert!(parse_trace(":O1").is_err());
        assert!(parse_trace("rec.edf:O1=").is_err());
        assert!(parse_trace("rec.edf:O1@5").is_err());
    }
}
