//! EDF, EDF+ and BDF reading; EDF+C writing.
//!
//! Header layout: a 256-byte fixed header followed by 256 bytes per signal,
//! stored field-major (all labels, then all transducers, ...). Data records
//! follow, each holding `samples_per_record` little-endian integers per signal
//! (16-bit for EDF, 24-bit for BDF). Text fields are Latin-1.
//!
//! The `EDF Annotations` signal of EDF+ files is decoded into the recording's
//! annotation list rather than kept as a channel. Physical dimensions are
//! mapped to microvolts here; when any channel's dimension is not a voltage
//! the recording keeps raw physical values for every channel and is marked
//! with that dimension.

use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use eegspec_core::{Annotation, ChannelRead, Recording, SignalUnit};

use crate::decoder::{DecodeOptions, Decoder};
use crate::{Error, Result, disambiguate_labels};

const FIXED_HEADER_BYTES: usize = 256;
const SIGNAL_HEADER_BYTES: usize = 256;
const DIGITAL_MIN: i32 = -32768;
const DIGITAL_MAX: i32 = 32767;
const TAL_DURATION: u8 = 0x15;
const TAL_SEPARATOR: u8 = 0x14;

/// File flavour, from the version and reserved header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdfVariant {
    /// Plain EDF
    Edf,
    /// EDF+ with contiguous records
    EdfPlusContinuous,
    /// EDF+ with possibly discontiguous records
    EdfPlusDiscontinuous,
    /// BioSemi 24-bit
    Bdf,
}

impl EdfVariant {
    fn sample_bytes(self) -> usize {
        match self {
            EdfVariant::Bdf => 3,
            _ => 2,
        }
    }
}

/// Per-signal header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    /// Channel label
    pub label: String,
    /// Transducer type
    pub transducer: String,
    /// Physical dimension (unit) string
    pub physical_dimension: String,
    /// Physical value of `digital_min`
    pub physical_min: f64,
    /// Physical value of `digital_max`
    pub physical_max: f64,
    /// Smallest digital value
    pub digital_min: i32,
    /// Largest digital value
    pub digital_max: i32,
    /// Prefiltering description
    pub prefiltering: String,
    /// Samples in each data record
    pub samples_per_record: usize,
}

impl SignalHeader {
    /// True for the EDF+/BDF+ annotation pseudo-signal.
    pub fn is_annotation(&self) -> bool {
        self.label == "EDF Annotations" || self.label == "BDF Annotations"
    }

    fn to_physical(&self, digital: i32) -> f64 {
        let span = f64::from(self.digital_max) - f64::from(self.digital_min);
        if span == 0.0 {
            return f64::from(digital);
        }
        let gain = (self.physical_max - self.physical_min) / span;
        (f64::from(digital) - f64::from(self.digital_min)) * gain + self.physical_min
    }
}

/// Parsed EDF/BDF header.
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    /// File flavour
    pub variant: EdfVariant,
    /// Local patient identification
    pub patient: String,
    /// Local recording identification
    pub recording: String,
    /// Start date and time, if parseable
    pub start: Option<NaiveDateTime>,
    /// Total header size in bytes
    pub header_bytes: usize,
    /// Declared data record count; `None` when the header says `-1`
    pub data_records: Option<usize>,
    /// Duration of one data record in seconds
    pub record_duration: f64,
    /// Signal headers in file order
    pub signals: Vec<SignalHeader>,
}

struct Fields<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Fields<'_> {
    fn text(&mut self, width: usize) -> Result<String> {
        let end = self.pos + width;
        let raw = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| Error::Edf(format!("header truncated at byte {}", self.pos)))?;
        self.pos = end;
        // Latin-1 maps each byte to the code point of the same value.
        Ok(raw.iter().map(|&b| b as char).collect::<String>().trim().to_string())
    }

    fn number(&mut self, width: usize, field: &str) -> Result<f64> {
        let text = self.text(width)?;
        text.parse::<f64>()
            .map_err(|_| Error::Edf(format!("{field} is not a number: '{text}'")))
    }

    fn texts(&mut self, count: usize, width: usize) -> Result<Vec<String>> {
        (0..count).map(|_| self.text(width)).collect()
    }

    fn numbers(&mut self, count: usize, width: usize, field: &str) -> Result<Vec<f64>> {
        (0..count).map(|_| self.number(width, field)).collect()
    }
}

fn parse_start(date: &str, time: &str) -> Option<NaiveDateTime> {
    let d: Vec<u32> = date.split('.').filter_map(|p| p.parse().ok()).collect();
    let t: Vec<u32> = time.split(['.', ':']).filter_map(|p| p.parse().ok()).collect();
    let ([day, month, yy], [h, m, s]) = (d.as_slice(), t.as_slice()) else {
        return None;
    };
    let year = if *yy >= 85 { 1900 + *yy } else { 2000 + *yy };
    let date = NaiveDate::from_ymd_opt(year as i32, *month, *day)?;
    let time = NaiveTime::from_hms_opt(*h, *m, *s)?;
    Some(NaiveDateTime::new(date, time))
}

impl EdfHeader {
    /// Parse the fixed and per-signal headers.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_BYTES {
            return Err(Error::Edf(format!(
                "file too short for a header ({} bytes)",
                bytes.len()
            )));
        }
        let bdf = bytes[0] == 0xFF && &bytes[1..8] == b"BIOSEMI";
        let mut fields = Fields { bytes, pos: 0 };
        let version = fields.text(8)?;
        if !bdf && version != "0" {
            return Err(Error::Edf(format!("unknown version field '{version}'")));
        }

        let patient = fields.text(80)?;
        let recording = fields.text(80)?;
        let date = fields.text(8)?;
        let time = fields.text(8)?;
        let header_bytes = fields.number(8, "header size")? as usize;
        let reserved = fields.text(44)?;
        let records = fields.number(8, "data record count")?;
        let record_duration = fields.number(8, "record duration")?;
        let ns = fields.number(4, "signal count")?;
        if !(1.0..=4096.0).contains(&ns) {
            return Err(Error::Edf(format!("implausible signal count {ns}")));
        }
        let ns = ns as usize;
        if header_bytes != FIXED_HEADER_BYTES + ns * SIGNAL_HEADER_BYTES {
            return Err(Error::Edf(format!(
                "header size {header_bytes} does not match {ns} signals"
            )));
        }
        if bytes.len() < header_bytes {
            return Err(Error::Edf("signal headers truncated".into()));
        }

        let variant = if bdf {
            EdfVariant::Bdf
        } else if reserved.starts_with("EDF+D") {
            EdfVariant::EdfPlusDiscontinuous
        } else if reserved.starts_with("EDF+C") {
            EdfVariant::EdfPlusContinuous
        } else {
            EdfVariant::Edf
        };

        let labels = fields.texts(ns, 16)?;
        let transducers = fields.texts(ns, 80)?;
        let dimensions = fields.texts(ns, 8)?;
        let pmin = fields.numbers(ns, 8, "physical minimum")?;
        let pmax = fields.numbers(ns, 8, "physical maximum")?;
        let dmin = fields.numbers(ns, 8, "digital minimum")?;
        let dmax = fields.numbers(ns, 8, "digital maximum")?;
        let prefilters = fields.texts(ns, 80)?;
        let spr = fields.numbers(ns, 8, "samples per record")?;

        let signals = (0..ns)
            .map(|i| SignalHeader {
                label: labels[i].clone(),
                transducer: transducers[i].clone(),
                physical_dimension: dimensions[i].clone(),
                physical_min: pmin[i],
                physical_max: pmax[i],
                digital_min: dmin[i].round() as i32,
                digital_max: dmax[i].round() as i32,
                prefiltering: prefilters[i].clone(),
                samples_per_record: spr[i].max(0.0) as usize,
            })
            .collect();

        Ok(Self {
            variant,
            patient,
            recording,
            start: parse_start(&date, &time),
            header_bytes,
            data_records: (records >= 0.0).then_some(records as usize),
            record_duration,
            signals,
        })
    }

    /// Bytes in one data record.
    pub fn record_bytes(&self) -> usize {
        self.signals
            .iter()
            .map(|s| s.samples_per_record)
            .sum::<usize>()
            * self.variant.sample_bytes()
    }
}

fn read_sample(raw: &[u8], bytes_per_sample: usize) -> i32 {
    if bytes_per_sample == 3 {
        (i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8) >> 8
    } else {
        i32::from(i16::from_le_bytes([raw[0], raw[1]]))
    }
}

fn parse_tals(raw: &[u8], out: &mut Vec<Annotation>) {
    for tal in raw.split(|&b| b == 0).filter(|t| !t.is_empty()) {
        let mut parts = tal.split(|&b| b == TAL_SEPARATOR);
        let Some(stamp) = parts.next() else {
            continue;
        };
        let mut stamp = stamp.split(|&b| b == TAL_DURATION);
        let onset = stamp
            .next()
            .and_then(|o| std::str::from_utf8(o).ok())
            .and_then(|o| o.trim().parse::<f64>().ok());
        let Some(onset) = onset else {
            tracing::warn!("skipping annotation with unreadable onset");
            continue;
        };
        let duration = stamp
            .next()
            .and_then(|d| std::str::from_utf8(d).ok())
            .and_then(|d| d.trim().parse::<f64>().ok());
        for text in parts {
            let text = String::from_utf8_lossy(text);
            let text = text.trim();
            if !text.is_empty() {
                out.push(Annotation::new(onset, duration, text));
            }
        }
    }
}

fn voltage_scale(dimension: &str) -> Option<f64> {
    match dimension.trim().to_lowercase().as_str() {
        "uv" | "µv" | "μv" => Some(1.0),
        "mv" => Some(1e3),
        "v" => Some(1e6),
        "nv" => Some(1e-3),
        _ => None,
    }
}

/// Decode an EDF, EDF+ or BDF file held in memory.
pub fn read_edf(bytes: &[u8]) -> Result<Recording> {
    let header = EdfHeader::parse(bytes)?;
    if !(header.record_duration.is_finite() && header.record_duration > 0.0) {
        return Err(Error::Edf(format!(
            "record duration must be positive, got {}",
            header.record_duration
        )));
    }
    let record_bytes = header.record_bytes();
    if record_bytes == 0 {
        return Err(Error::Edf("data records are empty".into()));
    }
    let available = (bytes.len() - header.header_bytes) / record_bytes;
    let records = match header.data_records {
        Some(declared) if declared > available => {
            tracing::warn!(declared, available, "file holds fewer data records than declared");
            available
        }
        Some(declared) => declared,
        None => available,
    };

    let data_signals: Vec<usize> = (0..header.signals.len())
        .filter(|&i| !header.signals[i].is_annotation())
        .collect();
    let Some(&first) = data_signals.first() else {
        return Err(Error::Edf("no data signals".into()));
    };
    let spr = header.signals[first].samples_per_record;
    let kept: Vec<usize> = data_signals
        .into_iter()
        .filter(|&i| {
            let same = header.signals[i].samples_per_record == spr;
            if !same {
                tracing::warn!(
                    channel = %header.signals[i].label,
                    samples_per_record = header.signals[i].samples_per_record,
                    expected = spr,
                    "dropping channel with a different sample rate"
                );
            }
            same
        })
        .collect();

    let width = header.variant.sample_bytes();
    let mut offsets = Vec::with_capacity(header.signals.len());
    let mut acc = 0;
    for s in &header.signals {
        offsets.push(acc);
        acc += s.samples_per_record * width;
    }

    let mut data: Vec<Vec<f64>> = kept.iter().map(|_| Vec::with_capacity(records * spr)).collect();
    let mut annotations = Vec::new();
    for r in 0..records {
        let record = &bytes[header.header_bytes + r * record_bytes..][..record_bytes];
        for (out, &s) in data.iter_mut().zip(&kept) {
            let signal = &header.signals[s];
            let raw = &record[offsets[s]..offsets[s] + signal.samples_per_record * width];
            out.extend(
                raw.chunks_exact(width)
                    .map(|c| signal.to_physical(read_sample(c, width))),
            );
        }
        for (s, signal) in header.signals.iter().enumerate() {
            if signal.is_annotation() {
                let raw = &record[offsets[s]..offsets[s] + signal.samples_per_record * width];
                parse_tals(raw, &mut annotations);
            }
        }
    }

    let dimensions: Vec<&str> = kept
        .iter()
        .map(|&s| header.signals[s].physical_dimension.as_str())
        .collect();
    let unit = match dimensions.iter().find(|d| voltage_scale(d).is_none()) {
        None => {
            for (channel, dim) in data.iter_mut().zip(&dimensions) {
                let scale = voltage_scale(dim).unwrap_or(1.0);
                if scale != 1.0 {
                    channel.iter_mut().for_each(|v| *v *= scale);
                }
            }
            SignalUnit::Microvolts
        }
        Some(dim) if dim.is_empty() => SignalUnit::Arbitrary,
        Some(dim) => {
            tracing::warn!(dimension = %dim, "physical dimension is not a voltage; values kept as stored");
            SignalUnit::Unknown((*dim).to_string())
        }
    };

    let mut labels: Vec<String> = kept.iter().map(|&s| header.signals[s].label.clone()).collect();
    disambiguate_labels(&mut labels);

    let sample_rate = spr as f64 / header.record_duration;
    tracing::debug!(
        variant = ?header.variant,
        channels = labels.len(),
        records,
        sample_rate,
        annotations = annotations.len(),
        "parsed EDF"
    );

    let mut recording = Recording::new(labels, sample_rate, data)?
        .with_unit(unit)
        .with_annotations(annotations);
    if let Some(start) = header.start {
        recording = recording.with_start_time(start);
    }
    Ok(recording)
}

/// [`Decoder`] for EDF, EDF+ and BDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdfDecoder;

impl Decoder for EdfDecoder {
    fn name(&self) -> &'static str {
        "edf"
    }

    fn decode(&self, bytes: &[u8], _options: &DecodeOptions) -> Result<Recording> {
        read_edf(bytes)
    }
}

fn push_field(buf: &mut Vec<u8>, text: &str, width: usize) {
    let mut field: Vec<u8> = text
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'_' })
        .take(width)
        .collect();
    field.resize(width, b' ');
    buf.extend_from_slice(&field);
}

/// Shortest rendering of `value` in at most 8 characters, rounded outward.
fn fit_number(value: f64, round_up: bool) -> Result<String> {
    for decimals in (0..=6).rev() {
        let scale = 10f64.powi(decimals);
        let v = if round_up {
            (value * scale).ceil() / scale
        } else {
            (value * scale).floor() / scale
        };
        let text = format!("{v:.prec$}", prec = decimals as usize);
        if text.len() <= 8 {
            return Ok(text);
        }
    }
    Err(Error::Edf(format!("value {value} does not fit an 8-character field")))
}

fn tal(onset: f64, duration: Option<f64>, text: &str) -> Vec<u8> {
    let mut out = format!("{onset:+}").into_bytes();
    if let Some(d) = duration {
        out.push(TAL_DURATION);
        out.extend_from_slice(d.to_string().as_bytes());
    }
    out.push(TAL_SEPARATOR);
    out.extend(
        text.bytes()
            .filter(|b| b.is_ascii() && !b.is_ascii_control()),
    );
    out.push(TAL_SEPARATOR);
    out.push(0);
    out
}

/// Write a recording as EDF+C with one-second data records.
///
/// The sample rate must be a whole number. The last record is zero-padded
/// when the sample count is not a multiple of the sample rate. Annotations
/// go to the record containing their onset.
pub fn write_edf<W: Write>(out: &mut W, recording: &Recording) -> Result<()> {
    let fs = recording.sample_rate();
    if (fs - fs.round()).abs() > 1e-9 {
        return Err(Error::Edf(format!(
            "sample rate {fs} Hz is not a whole number of samples per second"
        )));
    }
    let spr = fs.round() as usize;
    let n = recording.sample_count();
    let records = n.div_ceil(spr).max(1);
    if records * spr != n {
        tracing::debug!(padding = records * spr - n, "zero-padding last data record");
    }

    let mut per_record: Vec<Vec<u8>> = (0..records)
        .map(|r| {
            let mut t = format!("{:+}", r as f64).into_bytes();
            t.extend_from_slice(&[TAL_SEPARATOR, TAL_SEPARATOR, 0]);
            t
        })
        .collect();
    for a in recording.annotations() {
        let r = (a.onset.max(0.0).floor() as usize).min(records - 1);
        per_record[r].extend(tal(a.onset, a.duration, &a.description));
    }
    let annotation_spr = per_record.iter().map(Vec::len).max().unwrap_or(0).div_ceil(2).max(30);

    let unit = match recording.unit() {
        SignalUnit::Microvolts => "uV",
        SignalUnit::Arbitrary => "",
        SignalUnit::Unknown(dim) => dim.as_str(),
    };

    struct Channel<'a> {
        label: &'a str,
        samples: &'a [f64],
        pmin: f64,
        pmax: f64,
    }
    let mut channels = Vec::with_capacity(recording.channel_count());
    for (i, label) in recording.channel_names().iter().enumerate() {
        let samples = recording.channel_samples(i).unwrap_or(&[]);
        let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if lo.is_finite() && hi.is_finite() && hi > lo {
            (lo, hi)
        } else {
            let c = if lo.is_finite() { lo } else { 0.0 };
            (c - 1.0, c + 1.0)
        };
        let pmin = fit_number(lo, false)?;
        let pmax = fit_number(hi, true)?;
        channels.push((
            Channel {
                label,
                samples,
                pmin: pmin.parse().unwrap_or(lo),
                pmax: pmax.parse().unwrap_or(hi),
            },
            pmin,
            pmax,
        ));
    }

    let ns = channels.len() + 1;
    let header_bytes = FIXED_HEADER_BYTES + ns * SIGNAL_HEADER_BYTES;
    let start = recording.start_time().unwrap_or_else(|| {
        NaiveDate::from_ymd_opt(1985, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    });

    let mut head = Vec::with_capacity(header_bytes);
    push_field(&mut head, "0", 8);
    push_field(&mut head, "X X X X", 80);
    push_field(
        &mut head,
        &format!(
            "Startdate {} X X {}",
            start.format("%d-%b-%Y").to_string().to_uppercase(),
            recording.source().unwrap_or("eegspec")
        ),
        80,
    );
    push_field(&mut head, &start.format("%d.%m.%y").to_string(), 8);
    push_field(&mut head, &start.format("%H.%M.%S").to_string(), 8);
    push_field(&mut head, &header_bytes.to_string(), 8);
    push_field(&mut head, "EDF+C", 44);
    push_field(&mut head, &records.to_string(), 8);
    push_field(&mut head, "1", 8);
    push_field(&mut head, &ns.to_string(), 4);

    for (c, _, _) in &channels {
        push_field(&mut head, c.label, 16);
    }
    push_field(&mut head, "EDF Annotations", 16);
    for _ in 0..ns {
        push_field(&mut head, "", 80);
    }
    for _ in &channels {
        push_field(&mut head, unit, 8);
    }
    push_field(&mut head, "", 8);
    for (_, pmin, _) in &channels {
        push_field(&mut head, pmin, 8);
    }
    push_field(&mut head, "-1", 8);
    for (_, _, pmax) in &channels {
        push_field(&mut head, pmax, 8);
    }
    push_field(&mut head, "1", 8);
    for _ in 0..ns {
        push_field(&mut head, &DIGITAL_MIN.to_string(), 8);
    }
    for _ in 0..ns {
        push_field(&mut head, &DIGITAL_MAX.to_string(), 8);
    }
    for _ in 0..ns {
        push_field(&mut head, "", 80);
    }
    for _ in &channels {
        push_field(&mut head, &spr.to_string(), 8);
    }
    push_field(&mut head, &annotation_spr.to_string(), 8);
    for _ in 0..ns {
        push_field(&mut head, "", 32);
    }
    debug_assert_eq!(head.len(), header_bytes);
    out.write_all(&head)?;

    let span = f64::from(DIGITAL_MAX) - f64::from(DIGITAL_MIN);
    let mut record = Vec::with_capacity((channels.len() * spr + annotation_spr) * 2);
    for (r, tals) in per_record.iter().enumerate() {
        record.clear();
        for (c, _, _) in &channels {
            let gain = span / (c.pmax - c.pmin);
            for k in 0..spr {
                let v = c.samples.get(r * spr + k).copied().unwrap_or(0.0);
                let d = ((v - c.pmin) * gain + f64::from(DIGITAL_MIN))
                    .round()
                    .clamp(f64::from(DIGITAL_MIN), f64::from(DIGITAL_MAX)) as i16;
                record.extend_from_slice(&d.to_le_bytes());
            }
        }
        let mut tal_bytes = tals.clone();
        tal_bytes.resize(annotation_spr * 2, 0);
        record.extend_from_slice(&tal_bytes);
        out.write_all(&record)?;
    }
    Ok(())
}

/// Write a recording to an EDF+ file.
pub fn write_edf_file<P: AsRef<Path>>(path: P, recording: &Recording) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_edf(&mut file, recording)?;
    file.flush()?;
    Ok(())
}
