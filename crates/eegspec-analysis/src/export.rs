//! Export formats for analysis results.
//!
//! - CSV tables for spectra, SNR spectra, band powers and spectrograms
//! - Pretty-printed JSON for any serializable result
//!
//! Undefined values are written as empty CSV cells and as JSON `null`.

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::bands::BandPowers;
use crate::snr::SnrSpectrum;
use crate::spectrogram::Spectrogram;
use crate::spectrum::Psd;

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Write one or more equally gridded spectra as columns.
///
/// The header is `frequency_hz` followed by one column per label.
///
/// # Example
///
/// ```rust,ignore
/// use eegspec_analysis::export::write_psd_csv;
///
/// write_psd_csv(&mut std::io::stdout(), &[("O1", &psd)])?;
/// ```
pub fn write_psd_csv<W: Write>(out: &mut W, columns: &[(&str, &Psd)]) -> std::io::Result<()> {
    let Some((_, first)) = columns.first() else {
        return Ok(());
    };
    write!(out, "frequency_hz")?;
    for (label, psd) in columns {
        let unit = if psd.decibel { "db" } else { "power" };
        write!(out, ",{label}_{unit}")?;
    }
    writeln!(out)?;

    for (i, f) in first.frequencies.iter().enumerate() {
        write!(out, "{f:.6}")?;
        for (_, psd) in columns {
            write!(out, ",{}", cell(psd.power.get(i).copied()))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Export spectra to a CSV file.
pub fn export_psd_csv(columns: &[(&str, &Psd)], path: impl AsRef<Path>) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_psd_csv(&mut file, columns)?;
    file.flush()
}

/// Write an SNR spectrum as `frequency_hz,snr_db`.
pub fn write_snr_csv<W: Write>(out: &mut W, snr: &SnrSpectrum) -> std::io::Result<()> {
    writeln!(out, "frequency_hz,snr_db")?;
    for (f, s) in snr.frequencies.iter().zip(&snr.snr_db) {
        writeln!(out, "{f:.6},{}", cell(*s))?;
    }
    Ok(())
}

/// Write a band-power table, one row per channel and band.
pub fn write_bands_csv<W: Write>(out: &mut W, rows: &[(&str, &BandPowers)]) -> std::io::Result<()> {
    writeln!(out, "channel,band,low_hz,high_hz,absolute,relative")?;
    for (channel, powers) in rows {
        for b in &powers.bands {
            writeln!(
                out,
                "{channel},{},{},{},{:.6e},{}",
                b.name,
                b.low_hz,
                b.high_hz,
                b.absolute,
                cell(b.relative)
            )?;
        }
    }
    Ok(())
}

/// Write a spectrogram with time on rows and frequency bins on columns.
///
/// First row contains frequency labels, first column contains time labels.
pub fn write_spectrogram_csv<W: Write>(out: &mut W, spectrogram: &Spectrogram) -> std::io::Result<()> {
    write!(out, "time_s")?;
    for f in &spectrogram.frequencies {
        write!(out, ",{f:.3}")?;
    }
    writeln!(out)?;

    for (t, frame) in spectrogram.times.iter().zip(&spectrogram.power) {
        write!(out, "{t:.6}")?;
        for v in frame {
            write!(out, ",{v:.6}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write any result as pretty JSON.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

/// Export any result to a JSON file.
pub fn export_json<T: Serialize + ?Sized>(value: &T, path: impl AsRef<Path>) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_json(&mut file, value)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::{BandSet, band_powers};
    use tempfile::tempdir;

    fn psd() -> Psd {
        Psd {
            frequencies: vec![1.0, 2.0, 3.0],
            power: vec![0.5, 1.5, 0.25],
            decibel: false,
        }
    }

    #[test]
    fn psd_columns() {
        let a = psd();
        let mut buf = Vec::new();
        write_psd_csv(&mut buf, &[("O1", &a), ("O2", &a)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "frequency_hz,O1_power,O2_power");
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("2.000000,1.500000,"));
    }

    #[test]
    fn undefined_snr_is_empty_cell() {
        let snr = SnrSpectrum {
            frequencies: vec![1.0, 2.0],
            snr_db: vec![None, Some(3.0)],
            radius_bins: 1,
        };
        let mut buf = Vec::new();
        write_snr_csv(&mut buf, &snr).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("1.000000,\n"));
        assert!(text.contains("2.000000,3.000000"));
    }

    #[test]
    fn bands_and_json_to_files() {
        let dir = tempdir().unwrap();
        let powers = band_powers(&psd(), &BandSet::default());
        let mut buf = Vec::new();
        write_bands_csv(&mut buf, &[("O1", &powers)]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 6);

        let path = dir.path().join("psd.json");
        export_json(&psd(), &path).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["power"][1], 1.5);

        let csv = dir.path().join("psd.csv");
        export_psd_csv(&[("O1", &psd())], &csv).unwrap();
        assert!(std::fs::read_to_string(csv).unwrap().starts_with("frequency_hz"));
    }
}
