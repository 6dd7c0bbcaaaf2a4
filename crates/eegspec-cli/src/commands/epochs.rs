//! Stimulation-period epoch analysis.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use eegspec_analysis::StimulationPeriod;
use eegspec_core::{Recording, RecordingStore};
use eegspec_engine::{AnalysisParams, AnalysisRequest, Engine};
use eegspec_io::read_stimulation_csv;

use super::common::{
    InputArgs, OutputArgs, ProfileArgs, SelectionArgs, cancel_on_ctrlc, emit_named, load_profile,
    load_recording, progress,
};

/// Average spectra over stimulation periods, per experiment.
#[derive(Args)]
pub struct EpochsArgs {
    /// Recording file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Stimulation CSV (start_time, duration, experiment, label); default: the
    /// recording's own annotations that carry a duration
    #[arg(short, long, value_name = "CSV")]
    annotations: Option<PathBuf>,

    /// Only analyse this experiment
    #[arg(short, long)]
    experiment: Option<String>,

    /// Seconds added to every period start
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    sync_offset: f64,

    /// Target frequency in Hz; repeat for several (default: from the profile)
    #[arg(long = "target", value_name = "HZ")]
    targets: Vec<f64>,

    #[command(flatten)]
    selection: SelectionArgs,

    #[command(flatten)]
    profile: ProfileArgs,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,
}

/// Periods from the recording's annotations: every annotation with a
/// positive duration, in the `default` experiment.
fn periods_from_recording(recording: &Recording) -> Vec<StimulationPeriod> {
    recording
        .annotations()
        .iter()
        .filter_map(|a| {
            let duration = a.duration.filter(|d| *d > 0.0)?;
            Some(StimulationPeriod::new(a.onset, duration, a.description.clone()))
        })
        .collect()
}

fn select_experiments(
    mut experiments: BTreeMap<String, Vec<StimulationPeriod>>,
    only: Option<&str>,
) -> anyhow::Result<BTreeMap<String, Vec<StimulationPeriod>>> {
    let Some(name) = only else {
        return Ok(experiments);
    };
    let periods = experiments.remove(name).with_context(|| {
        let known: Vec<_> = experiments.keys().map(String::as_str).collect();
        format!("no experiment '{name}' (available: {})", known.join(", "))
    })?;
    Ok(BTreeMap::from([(name.to_string(), periods)]))
}

/// Run the epochs command.
pub fn run(args: EpochsArgs) -> anyhow::Result<()> {
    let profile = load_profile(&args.profile.profile)?;
    let recording = load_recording(&args.file, &args.input)?;

    let mut periods = match &args.annotations {
        Some(path) => {
            let table = read_stimulation_csv(path)
                .with_context(|| format!("failed to read annotations '{}'", path.display()))?;
            for warning in &table.warnings {
                tracing::warn!(path = %path.display(), "{warning}");
            }
            table.periods
        }
        None => periods_from_recording(&recording),
    };
    if periods.is_empty() {
        anyhow::bail!("no stimulation periods found");
    }
    eegspec_analysis::apply_sync_offset(&mut periods, args.sync_offset);

    let experiments = select_experiments(
        eegspec_analysis::group_by_experiment(&periods),
        args.experiment.as_deref(),
    )?;

    let mut store = RecordingStore::new();
    let id = store.insert(recording);
    let engine = Engine::new();
    let render = args.output.render_options(&profile);
    let cancel = cancel_on_ctrlc()?;
    let pb = progress(experiments.len(), "Experiments");

    let mut results = Vec::with_capacity(experiments.len());
    for (name, periods) in experiments {
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled");
        }
        let mut spec = profile.epoch_spec(name.clone(), periods);
        if !args.targets.is_empty() {
            spec.params.target_frequencies.clone_from(&args.targets);
        }
        let mut request = AnalysisRequest::new(id, AnalysisParams::Epochs(spec), render)
            .with_channels(args.selection.selection());
        request.window = args.selection.window;
        tracing::info!(experiment = %name, "analysing experiment");
        results.push((name, engine.analyze(&store, &request)));
        pb.inc(1);
    }
    pb.finish_and_clear();

    emit_named(results, &args.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::Annotation;

    #[test]
    fn recording_annotations_with_duration_become_periods() {
        let recording = Recording::new(vec!["Oz".into()], 100.0, vec![vec![0.0; 1000]])
            .unwrap()
            .with_annotations(vec![
                Annotation::new(1.0, Some(2.0), "flicker"),
                Annotation::new(4.0, None, "marker"),
                Annotation::new(6.0, Some(0.0), "zero"),
            ]);
        let periods = periods_from_recording(&recording);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].label, "flicker");
        assert_eq!(periods[0].experiment, "default");
    }

    #[test]
    fn experiment_filter() {
        let periods = vec![
            StimulationPeriod::new(0.0, 1.0, "a").in_experiment("x"),
            StimulationPeriod::new(2.0, 1.0, "b").in_experiment("y"),
        ];
        let all = eegspec_analysis::group_by_experiment(&periods);
        assert_eq!(select_experiments(all.clone(), None).unwrap().len(), 2);

        let only = select_experiments(all.clone(), Some("y")).unwrap();
        assert_eq!(only.keys().collect::<Vec<_>>(), vec!["y"]);

        let err = select_experiments(all, Some("z")).unwrap_err();
        assert!(err.to_string().contains("available: x, y"));
    }
}
