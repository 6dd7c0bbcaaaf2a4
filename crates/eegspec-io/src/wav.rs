//! WAV file reading and writing.
//!
//! Every WAV channel becomes one recording channel named `ch<n>` (1-based).
//! Integer formats are normalized by `2^(bits-1)`; values are dimensionless
//! and the recording is marked [`SignalUnit::Arbitrary`].

use std::io::Cursor;
use std::path::Path;

use eegspec_core::{ChannelRead, Recording, SignalUnit};
use hound::{SampleFormat, WavReader, WavWriter};

use crate::decoder::{DecodeOptions, Decoder};
use crate::{Error, Result};

/// WAV file metadata extracted without loading sample data.
#[derive(Debug, Clone)]
pub struct WavInfo {
    /// Number of channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample.
    pub bits_per_sample: u16,
    /// Samples per channel.
    pub num_frames: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Whether samples are IEEE floats.
    pub float: bool,
}

/// Read WAV metadata without loading sample data.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_frames = u64::from(reader.len()) / u64::from(spec.channels.max(1));

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        num_frames,
        duration_secs: num_frames as f64 / f64::from(spec.sample_rate),
        float: spec.sample_format == SampleFormat::Float,
    })
}

fn decode_reader<R: std::io::Read>(reader: WavReader<R>) -> Result<Recording> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(Error::Wav(hound::Error::FormatError("zero channels")));
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = f64::from(1u32 << (spec.bits_per_sample - 1));
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| f64::from(v) / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let frames = interleaved.len() / channels;
    let mut data = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &v) in data.iter_mut().zip(frame) {
            ch.push(v);
        }
    }
    let labels = (1..=channels).map(|i| format!("ch{i}")).collect();

    Ok(Recording::new(labels, f64::from(spec.sample_rate), data)?.with_unit(SignalUnit::Arbitrary))
}

/// Read a WAV file into a recording, one channel per WAV channel.
///
/// # Example
/// ```ignore
/// let recording = read_wav("session.wav")?;
/// println!("Loaded {} channels at {} Hz", recording.channel_count(), recording.sample_rate());
/// ```
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Recording> {
    decode_reader(WavReader::open(path)?)
}

/// Write a recording as 32-bit float WAV.
///
/// The sample rate is rounded to whole Hz.
pub fn write_wav<P: AsRef<Path>>(path: P, recording: &Recording) -> Result<()> {
    let spec = hound::WavSpec {
        channels: recording.channel_count() as u16,
        sample_rate: recording.sample_rate().round() as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let channels: Vec<&[f64]> = (0..recording.channel_count())
        .filter_map(|i| recording.channel_samples(i))
        .collect();

    for i in 0..recording.sample_count() {
        for ch in &channels {
            writer.write_sample(ch[i] as f32)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// [`Decoder`] for RIFF/WAVE data.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, bytes: &[u8], _options: &DecodeOptions) -> Result<Recording> {
        decode_reader(WavReader::new(Cursor::new(bytes))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn multichannel_float_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.wav");
        let rec = Recording::new(
            vec!["a".into(), "b".into(), "c".into()],
            500.0,
            vec![vec![0.25; 100], vec![-0.5; 100], vec![0.0; 100]],
        )
        .unwrap();
        write_wav(&path, &rec).unwrap();

        let info = read_wav_info(&path).unwrap();
        assert_eq!(info.channels, 3);
        assert_eq!(info.num_frames, 100);
        assert!(info.float);

        let back = read_wav(&path).unwrap();
        assert_eq!(back.channel_names(), &["ch1", "ch2", "ch3"]);
        assert_eq!(back.sample_rate(), 500.0);
        assert_eq!(back.channel_samples(1).unwrap()[7], -0.5);
        assert_eq!(back.unit(), &SignalUnit::Arbitrary);
    }

    #[test]
    fn int16_is_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = WavWriter::create(&path, spec).unwrap();
        w.write_sample(16384i16).unwrap();
        w.write_sample(-32768i16).unwrap();
        w.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let rec = WavDecoder.decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(rec.channel_samples(0).unwrap(), &[0.5, -1.0]);
    }

    #[test]
    fn rejects_non_wav() {
        assert!(WavDecoder.decode(b"0       not a wav", &DecodeOptions::default()).is_err());
    }
}
