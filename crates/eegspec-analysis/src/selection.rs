//! Channel selection.
//!
//! Every analysis receives its channel list explicitly. [`ChannelSelection::Default`]
//! resolves to the occipital channels of the recording, falling back to the
//! first eight channels when none are labelled as occipital.

use serde::{Deserialize, Serialize};

use eegspec_core::ChannelRead;

use crate::error::{AnalysisError, Result};

/// Channel count used when no occipital labels are present.
pub const FALLBACK_CHANNELS: usize = 8;

const OCCIPITAL_MARKERS: [&str; 4] = ["O1", "O2", "OZ", "PO"];

/// Which channels an analysis reads
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSelection {
    /// Occipital channels, else the first eight
    #[default]
    Default,
    /// Explicit labels, in order
    Named(Vec<String>),
}

impl ChannelSelection {
    /// Explicit labels.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(names.into_iter().map(Into::into).collect())
    }

    /// Resolve to channel indices of `source`.
    ///
    /// An explicit empty list is rejected, as is a label that does not exist.
    pub fn resolve<R: ChannelRead + ?Sized>(&self, source: &R) -> Result<Vec<usize>> {
        match self {
            ChannelSelection::Named(names) => {
                if names.is_empty() {
                    return Err(AnalysisError::invalid("channels", "selection is empty"));
                }
                names
                    .iter()
                    .map(|name| {
                        source
                            .channel_index(name)
                            .ok_or_else(|| AnalysisError::ChannelNotFound(name.clone()))
                    })
                    .collect()
            }
            ChannelSelection::Default => {
                let names = source.channel_names();
                if names.is_empty() {
                    return Err(AnalysisError::invalid("channels", "recording has no channels"));
                }
                let occipital: Vec<usize> = names
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| is_occipital(n))
                    .map(|(i, _)| i)
                    .collect();
                if occipital.is_empty() {
                    Ok((0..names.len().min(FALLBACK_CHANNELS)).collect())
                } else {
                    Ok(occipital)
                }
            }
        }
    }

    /// Resolve and borrow the selected channels.
    pub fn gather<'a, R: ChannelRead + ?Sized>(&self, source: &'a R) -> Result<Vec<ChannelData<'a>>> {
        self.resolve(source)?
            .into_iter()
            .map(|i| {
                let samples = source
                    .channel_samples(i)
                    .ok_or_else(|| AnalysisError::ChannelNotFound(format!("#{i}")))?;
                Ok(ChannelData {
                    name: &source.channel_names()[i],
                    samples,
                })
            })
            .collect()
    }
}

fn is_occipital(label: &str) -> bool {
    let upper = label.to_ascii_uppercase();
    OCCIPITAL_MARKERS.iter().any(|m| upper.contains(m))
}

/// A borrowed, labelled channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelData<'a> {
    /// Channel label
    pub name: &'a str,
    /// Samples in the analysed window
    pub samples: &'a [f64],
}
