//! Delimited text recordings (CSV, semicolon or tab separated).
//!
//! One row per sample, one column per channel. The first row holds channel
//! labels unless it is entirely numeric, in which case channels are named
//! `ch<n>`. A leading `time`/`timestamp`/`time_s` column supplies the sample
//! rate; without it the caller's [`DecodeOptions::sample_rate`] is required.
//! Lines starting with `#` are comments. Values are taken as microvolts.

use std::path::Path;

use eegspec_core::{Recording, SignalUnit};

use crate::decoder::{DecodeOptions, Decoder};
use crate::{Error, Result, disambiguate_labels};

const DELIMITERS: [char; 3] = [',', ';', '\t'];
const TIME_COLUMNS: [&str; 3] = ["time", "timestamp", "time_s"];

/// The delimiter splitting `line` into the most fields.
pub(crate) fn detect_delimiter(line: &str) -> char {
    let mut best = DELIMITERS[0];
    let mut most = 0;
    for d in DELIMITERS {
        let n = line.split(d).count();
        if n > most {
            most = n;
            best = d;
        }
    }
    best
}

pub(crate) fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|f| f.trim().trim_matches(['"', '\'']).to_string())
        .collect()
}

/// Parse delimited text into a recording.
pub fn read_delimited(text: &str, options: &DecodeOptions) -> Result<Recording> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let (first_no, first) = lines.next().ok_or(Error::Delimited {
        line: 1,
        reason: "no data".into(),
    })?;
    let delimiter = detect_delimiter(first);
    let first_fields = split_fields(first, delimiter);
    if first_fields.len() < 2 && first_fields[0].parse::<f64>().is_err() {
        return Err(Error::Delimited {
            line: first_no,
            reason: "expected at least one delimited column".into(),
        });
    }

    let headerless = first_fields.iter().all(|f| f.parse::<f64>().is_ok());
    let mut labels: Vec<String> = if headerless {
        (1..=first_fields.len()).map(|i| format!("ch{i}")).collect()
    } else {
        first_fields.clone()
    };
    let has_time = !headerless
        && TIME_COLUMNS
            .iter()
            .any(|t| labels[0].eq_ignore_ascii_case(t));
    if has_time {
        labels.remove(0);
    }
    if labels.is_empty() {
        return Err(Error::Delimited {
            line: first_no,
            reason: "no channel columns".into(),
        });
    }
    let width = labels.len() + usize::from(has_time);

    let mut times = Vec::new();
    let mut data: Vec<Vec<f64>> = vec![Vec::new(); labels.len()];
    let rows: Box<dyn Iterator<Item = (usize, &str)>> = if headerless {
        Box::new(std::iter::once((first_no, first)).chain(lines))
    } else {
        Box::new(lines)
    };
    for (line, row) in rows {
        let fields = split_fields(row, delimiter);
        if fields.len() != width {
            return Err(Error::Delimited {
                line,
                reason: format!("expected {width} columns, found {}", fields.len()),
            });
        }
        let values = fields
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| Error::Delimited {
                line,
                reason: e.to_string(),
            })?;
        let mut values = values.into_iter();
        if has_time {
            times.extend(values.next());
        }
        for (ch, v) in data.iter_mut().zip(values) {
            ch.push(v);
        }
    }

    let sample_rate = if has_time {
        match (times.first(), times.last()) {
            (Some(t0), Some(t1)) if times.len() > 1 && t1 > t0 => {
                (times.len() - 1) as f64 / (t1 - t0)
            }
            _ => {
                return Err(Error::Delimited {
                    line: first_no,
                    reason: "time column must increase over at least two rows".into(),
                });
            }
        }
    } else {
        options.sample_rate.ok_or(Error::Delimited {
            line: first_no,
            reason: "no time column; a sample rate must be supplied".into(),
        })?
    };

    disambiguate_labels(&mut labels);
    Ok(Recording::new(labels, sample_rate, data)?.with_unit(SignalUnit::Microvolts))
}

/// [`Decoder`] for delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedDecoder;

impl DelimitedDecoder {
    /// Decode a text file.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P, options: &DecodeOptions) -> Result<Recording> {
        read_delimited(&std::fs::read_to_string(path)?, options)
    }
}

impl Decoder for DelimitedDecoder {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Recording> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::Delimited {
            line: 1,
            reason: format!("not UTF-8 text: {e}"),
        })?;
        read_delimited(text, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::ChannelRead;

    #[test]
    fn time_column_sets_rate() {
        let text = "time,O1,O2\n0.00,1,2\n0.01,3,4\n0.02,5,6\n";
        let rec = read_delimited(text, &DecodeOptions::default()).unwrap();
        assert_eq!(rec.channel_names(), &["O1", "O2"]);
        assert!((rec.sample_rate() - 100.0).abs() < 1e-9);
        assert_eq!(rec.channel_samples(1).unwrap(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn semicolons_and_quotes() {
        let text = "\"Fz\";\"Cz\"\n1;2\n3;4\n";
        let rec = read_delimited(text, &DecodeOptions::default().with_sample_rate(250.0)).unwrap();
        assert_eq!(rec.channel_names(), &["Fz", "Cz"]);
        assert_eq!(rec.sample_rate(), 250.0);
    }

    #[test]
    fn headerless_tab_separated() {
        let text = "# exported\n1\t2\t3\n4\t5\t6\n";
        let rec = read_delimited(text, &DecodeOptions::default().with_sample_rate(10.0)).unwrap();
        assert_eq!(rec.channel_names(), &["ch1", "ch2", "ch3"]);
        assert_eq!(rec.sample_count(), 2);
    }

    #[test]
    fn missing_rate_is_an_error() {
        let err = read_delimited("A,B\n1,2\n", &DecodeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("sample rate"));
    }

    #[test]
    fn bad_value_names_the_line() {
        let err = read_delimited("A,B\n1,2\n3,x\n", &DecodeOptions::default().with_sample_rate(1.0))
            .unwrap_err();
        assert!(matches!(err, Error::Delimited { line: 3, .. }));
    }

    #[test]
    fn delimiter_detection() {
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb"), '\t');
        assert_eq!(detect_delimiter("a,b;c"), ',');
    }
}
