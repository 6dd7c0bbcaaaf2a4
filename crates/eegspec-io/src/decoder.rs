//! Ranked decoder chain.

use std::path::Path;

use eegspec_core::Recording;

use crate::delimited::DelimitedDecoder;
use crate::edf::EdfDecoder;
use crate::wav::WavDecoder;
use crate::{Error, Result};

/// Caller-supplied hints for decoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOptions {
    /// Sample rate for formats that do not carry one (delimited text without a time column)
    pub sample_rate: Option<f64>,
    /// Source description attached to the recording (usually the file name)
    pub source: Option<String>,
}

impl DecodeOptions {
    /// Options with a sample-rate hint.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Options with a source description.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One strategy for turning bytes into a [`Recording`].
pub trait Decoder: Send + Sync {
    /// Short name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Decode, or explain why this strategy does not apply.
    fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Recording>;
}

/// Why one decoder rejected the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderFailure {
    /// Decoder name
    pub decoder: String,
    /// Error message
    pub reason: String,
}

impl DecoderFailure {
    /// Create a failure record.
    pub fn new(decoder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            decoder: decoder.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn summary(failures: &[DecoderFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{}: {}", f.decoder, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Decoders tried in order; the first success wins.
pub struct DecoderChain {
    decoders: Vec<Box<dyn Decoder>>,
}

impl Default for DecoderChain {
    /// EDF/BDF, then WAV, then delimited text.
    fn default() -> Self {
        let mut chain = Self::new();
        chain.push(Box::new(EdfDecoder));
        chain.push(Box::new(WavDecoder));
        chain.push(Box::new(DelimitedDecoder));
        chain
    }
}

impl DecoderChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Append a decoder at the lowest rank.
    pub fn push(&mut self, decoder: Box<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.push(decoder);
        self
    }

    /// Decoder names in rank order.
    pub fn names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    /// Get the number of decoders in the chain.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Try every decoder in order.
    ///
    /// Returns [`Error::NoDecoder`] listing each decoder's reason when none
    /// succeeds.
    pub fn decode(&self, bytes: &[u8], options: &DecodeOptions) -> Result<Recording> {
        let mut failures = Vec::with_capacity(self.decoders.len());
        for decoder in &self.decoders {
            match decoder.decode(bytes, options) {
                Ok(recording) => {
                    tracing::info!(
                        decoder = decoder.name(),
                        source = options.source.as_deref().unwrap_or("<bytes>"),
                        "decoded recording"
                    );
                    return Ok(match &options.source {
                        Some(source) => recording.with_source(source.clone()),
                        None => recording,
                    });
                }
                Err(err) => {
                    tracing::debug!(decoder = decoder.name(), %err, "decoder rejected input");
                    failures.push(DecoderFailure::new(decoder.name(), err.to_string()));
                }
            }
        }
        Err(Error::NoDecoder(failures))
    }

    /// Read a file and decode it. The file name becomes the source unless
    /// `options` already names one.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P, options: &DecodeOptions) -> Result<Recording> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut options = options.clone();
        if options.source.is_none() {
            options.source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        self.decode(&bytes, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eegspec_core::ChannelRead;

    struct Fails;
    impl Decoder for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        fn decode(&self, _: &[u8], _: &DecodeOptions) -> Result<Recording> {
            Err(Error::Edf("never".into()))
        }
    }

    struct Constant;
    impl Decoder for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }
        fn decode(&self, _: &[u8], _: &DecodeOptions) -> Result<Recording> {
            Ok(Recording::new(vec!["A".into()], 10.0, vec![vec![1.0; 10]])?)
        }
    }

    #[test]
    fn default_rank_order() {
        assert_eq!(DecoderChain::default().names(), vec!["edf", "wav", "delimited"]);
    }

    #[test]
    fn first_success_short_circuits() {
        let chain = DecoderChain::new()
            .with(Box::new(Fails))
            .with(Box::new(Constant))
            .with(Box::new(Fails));
        let rec = chain
            .decode(b"", &DecodeOptions::default().with_source("x.bin"))
            .unwrap();
        assert_eq!(rec.channel_count(), 1);
        assert_eq!(rec.source(), Some("x.bin"));
    }

    #[test]
    fn all_failures_are_collected() {
        let chain = DecoderChain::new().with(Box::new(Fails)).with(Box::new(Fails));
        match chain.decode(b"junk", &DecodeOptions::default()) {
            Err(Error::NoDecoder(failures)) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].decoder, "fails");
            }
            other => panic!("expected NoDecoder, got {other:?}"),
        }
    }

    #[test]
    fn empty_chain_fails() {
        assert!(DecoderChain::new().is_empty());
        assert!(matches!(
            DecoderChain::new().decode(b"", &DecodeOptions::default()),
            Err(Error::NoDecoder(f)) if f.is_empty()
        ));
    }
}
