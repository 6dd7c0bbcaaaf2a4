//! Recording I/O layer for eegspec.
//!
//! This crate provides:
//!
//! - **Decoder chain**: [`DecoderChain`] tries [`EdfDecoder`], [`WavDecoder`] and
//!   [`DelimitedDecoder`] in order and keeps the first success
//! - **EDF/BDF**: [`read_edf`] for EDF, EDF+ (with annotations) and 24-bit BDF,
//!   [`write_edf`] for EDF+C output
//! - **WAV**: [`read_wav`] / [`write_wav`] for multichannel recordings via `hound`
//! - **Stimulation annotations**: [`parse_stimulation_csv`] for period tables
//!
//! Sample units are resolved here, once, at ingestion.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eegspec_io::{DecodeOptions, DecoderChain};
//!
//! let chain = DecoderChain::default();
//! let recording = chain.decode_file("session.edf", &DecodeOptions::default())?;
//! println!("{} channels at {} Hz", recording.channel_count(), recording.sample_rate());
//! ```

mod annotations;
mod decoder;
mod delimited;
mod edf;
mod wav;

pub use annotations::{AnnotationTable, parse_stimulation_csv, read_stimulation_csv};
pub use decoder::{DecodeOptions, Decoder, DecoderChain, DecoderFailure};
pub use delimited::{DelimitedDecoder, read_delimited};
pub use edf::{
    EdfDecoder, EdfHeader, EdfVariant, SignalHeader, read_edf, write_edf, write_edf_file,
};
pub use wav::{WavDecoder, WavInfo, read_wav, read_wav_info, write_wav};

/// Error types for recording I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// EDF/BDF structure could not be parsed or written.
    #[error("EDF error: {0}")]
    Edf(String),

    /// Delimited text could not be parsed.
    #[error("delimited text error at line {line}: {reason}")]
    Delimited {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },

    /// A stimulation annotation row is invalid.
    #[error("annotation error at row {row}: {reason}")]
    Annotation {
        /// 1-based data row number (the header is row 0).
        row: usize,
        /// What was wrong.
        reason: String,
    },

    /// Every decoder in the chain rejected the input.
    #[error("no decoder accepted the input: {}", DecoderFailure::summary(.0))]
    NoDecoder(Vec<DecoderFailure>),

    /// The decoded data did not form a valid recording.
    #[error(transparent)]
    Recording(#[from] eegspec_core::CoreError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for recording I/O.
pub type Result<T> = std::result::Result<T, Error>;

/// Append `-<n>` to repeated labels so every label is unique.
pub(crate) fn disambiguate_labels(labels: &mut [String]) {
    for i in 1..labels.len() {
        if labels[..i].contains(&labels[i]) {
            let base = labels[i].clone();
            let mut n = 2;
            while labels.contains(&format!("{base}-{n}")) {
                n += 1;
            }
            tracing::warn!(label = %base, renamed = %format!("{base}-{n}"), "duplicate channel label");
            labels[i] = format!("{base}-{n}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_labels_get_suffixes() {
        let mut labels: Vec<String> = ["Cz", "Cz", "O1", "Cz"].iter().map(|s| s.to_string()).collect();
        disambiguate_labels(&mut labels);
        assert_eq!(labels, vec!["Cz", "Cz-2", "O1", "Cz-3"]);
    }

    #[test]
    fn no_decoder_lists_reasons() {
        let err = Error::NoDecoder(vec![
            DecoderFailure::new("edf", "bad header"),
            DecoderFailure::new("wav", "no RIFF"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("edf: bad header"));
        assert!(msg.contains("wav: no RIFF"));
    }
}
