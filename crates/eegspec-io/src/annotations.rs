//! Stimulation-period tables.
//!
//! A table has a header row and one row per period. Column names are matched
//! case-insensitively against these aliases:
//!
//! | field | aliases | required |
//! |---|---|---|
//! | start | `start_time`, `start`, `onset`, `begin`, `time` | yes |
//! | duration | `duration`, `length`, `dur` | yes |
//! | experiment | `experiment`, `exp`, `condition` | no (`default`) |
//! | label | `label`, `name`, `description` | no (`Period_<n>`) |
//!
//! The delimiter is whichever of `,` `;` tab splits the header into the most
//! columns. Rows with the wrong column count are skipped with a warning.

use std::collections::BTreeMap;
use std::path::Path;

use eegspec_analysis::epochs::{StimulationPeriod, apply_sync_offset, group_by_experiment};

use crate::delimited::{detect_delimiter, split_fields};
use crate::{Error, Result};

const START_ALIASES: [&str; 5] = ["start_time", "start", "onset", "begin", "time"];
const DURATION_ALIASES: [&str; 3] = ["duration", "length", "dur"];
const EXPERIMENT_ALIASES: [&str; 3] = ["experiment", "exp", "condition"];
const LABEL_ALIASES: [&str; 3] = ["label", "name", "description"];
const DUPLICATE_TOLERANCE_S: f64 = 1e-3;
const MISSING_MARKERS: [&str; 5] = ["", "na", "n/a", "null", "none"];

/// Parsed stimulation periods plus non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationTable {
    /// Periods in file order
    pub periods: Vec<StimulationPeriod>,
    /// Skipped rows and duplicate periods
    pub warnings: Vec<String>,
    /// Detected delimiter
    pub delimiter: char,
}

impl AnnotationTable {
    /// Shift every period by a sync offset in seconds.
    pub fn with_sync_offset(mut self, offset: f64) -> Self {
        apply_sync_offset(&mut self.periods, offset);
        self
    }

    /// Periods grouped by experiment name.
    pub fn experiments(&self) -> BTreeMap<String, Vec<StimulationPeriod>> {
        group_by_experiment(&self.periods)
    }
}

fn find_column(header: &[String], aliases: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| aliases.iter().any(|a| h.eq_ignore_ascii_case(a)))
}

fn number(value: &str, column: &str, row: usize) -> Result<f64> {
    if MISSING_MARKERS.contains(&value.to_ascii_lowercase().as_str()) {
        return Err(Error::Annotation {
            row,
            reason: format!("missing {column} value '{value}'"),
        });
    }
    value.parse::<f64>().map_err(|_| Error::Annotation {
        row,
        reason: format!("{column} '{value}' is not a number"),
    })
}

/// Parse a stimulation table from text.
///
/// # Example
///
/// ```rust
/// use eegspec_io::parse_stimulation_csv;
///
/// let table = parse_stimulation_csv("onset;dur\n10;5\n20;5\n").unwrap();
/// assert_eq!(table.periods.len(), 2);
/// assert_eq!(table.periods[1].label, "Period_2");
/// ```
pub fn parse_stimulation_csv(text: &str) -> Result<AnnotationTable> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines.next().ok_or(Error::Annotation {
        row: 0,
        reason: "file is empty".into(),
    })?;
    let delimiter = detect_delimiter(header_line);
    let header = split_fields(header_line, delimiter);

    let missing = |what: &str| Error::Annotation {
        row: 0,
        reason: format!("no {what} column; found {}", header.join(", ")),
    };
    let start_col = find_column(&header, &START_ALIASES).ok_or_else(|| missing("start_time"))?;
    let duration_col = find_column(&header, &DURATION_ALIASES).ok_or_else(|| missing("duration"))?;
    let experiment_col = find_column(&header, &EXPERIMENT_ALIASES);
    let label_col = find_column(&header, &LABEL_ALIASES);

    let mut periods: Vec<StimulationPeriod> = Vec::new();
    let mut warnings = Vec::new();
    for (i, line) in lines.enumerate() {
        let row = i + 1;
        let fields = split_fields(line, delimiter);
        if fields.len() != header.len() {
            let msg = format!(
                "row {row} has {} columns, expected {}; skipped",
                fields.len(),
                header.len()
            );
            tracing::warn!(row, "{msg}");
            warnings.push(msg);
            continue;
        }

        let start = number(&fields[start_col], "start_time", row)?;
        let duration = number(&fields[duration_col], "duration", row)?;
        if start < 0.0 {
            return Err(Error::Annotation {
                row,
                reason: format!("start_time must not be negative, got {start}"),
            });
        }
        if duration.is_nan() || duration <= 0.0 {
            return Err(Error::Annotation {
                row,
                reason: format!("duration must be positive, got {duration}"),
            });
        }

        let experiment = experiment_col
            .map(|c| fields[c].clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "default".to_string());
        let label = label_col
            .map(|c| fields[c].clone())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("Period_{}", periods.len() + 1));

        if let Some(dup) = periods.iter().find(|p| {
            (p.start - start).abs() < DUPLICATE_TOLERANCE_S
                && (p.duration - duration).abs() < DUPLICATE_TOLERANCE_S
        }) {
            let msg = format!("row {row} duplicates period '{}' at {start} s", dup.label);
            tracing::warn!(row, "{msg}");
            warnings.push(msg);
        }

        periods.push(StimulationPeriod::new(start, duration, label).in_experiment(experiment));
    }

    if periods.is_empty() {
        return Err(Error::Annotation {
            row: 0,
            reason: "no valid data rows".into(),
        });
    }
    tracing::debug!(periods = periods.len(), %delimiter, "parsed stimulation table");
    Ok(AnnotationTable {
        periods,
        warnings,
        delimiter,
    })
}

/// Read and parse a stimulation table file.
pub fn read_stimulation_csv<P: AsRef<Path>>(path: P) -> Result<AnnotationTable> {
    parse_stimulation_csv(&std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_and_defaults() {
        let text = "Condition,Onset,Length\nA,1.0,2.0\n,5.0,2.0\n";
        let table = parse_stimulation_csv(text).unwrap();
        assert_eq!(table.delimiter, ',');
        assert_eq!(table.periods[0].experiment, "A");
        assert_eq!(table.periods[1].experiment, "default");
        assert_eq!(table.periods[1].label, "Period_2");
        assert_eq!(table.periods[1].start, 5.0);
    }

    #[test]
    fn ragged_rows_are_skipped() {
        let text = "start_time\tduration\tlabel\n1\t2\tfirst\n3\t4\n5\t6\tthird\n";
        let table = parse_stimulation_csv(text).unwrap();
        assert_eq!(table.delimiter, '\t');
        assert_eq!(table.periods.len(), 2);
        assert_eq!(table.warnings.len(), 1);
        assert_eq!(table.periods[1].label, "third");
    }

    #[test]
    fn invalid_values_name_the_row() {
        let err = parse_stimulation_csv("start,duration\n1,2\nNA,3\n").unwrap_err();
        assert!(matches!(err, Error::Annotation { row: 2, .. }));
        let err = parse_stimulation_csv("start,duration\n-1,2\n").unwrap_err();
        assert!(matches!(err, Error::Annotation { row: 1, .. }));
        let err = parse_stimulation_csv("start,duration\n1,0\n").unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn missing_required_column() {
        let err = parse_stimulation_csv("begin,label\n1,x\n").unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn duplicates_warn() {
        let table = parse_stimulation_csv("start,duration\n1.0,2\n1.0004,2\n").unwrap();
        assert_eq!(table.periods.len(), 2);
        assert!(table.warnings[0].contains("duplicates"));
    }

    #[test]
    fn sync_offset_and_grouping() {
        let table = parse_stimulation_csv("exp,start,dur\nB,1,1\nA,2,1\nB,3,1\n")
            .unwrap()
            .with_sync_offset(-0.5);
        assert_eq!(table.periods[0].start, 0.5);
        let groups = table.experiments();
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(groups["B"].len(), 2);
    }
}
