//! Registry of loaded recordings.
//!
//! Every analysis names its input explicitly by [`RecordingId`]; the store has
//! no notion of an "active" recording. Recordings are shared as
//! `Arc<Recording>` so a caller can finish an analysis even if the entry is
//! evicted meanwhile, while new lookups of an evicted id fail with
//! [`CoreError::MissingRecording`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::recording::{ChannelRead, Recording};

/// Opaque handle to a recording in a [`RecordingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(u64);

impl RecordingId {
    /// Wrap a raw id. Ids are only meaningful for the store that issued them.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

impl FromStr for RecordingId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("rec-")
            .unwrap_or(s)
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidRecording(format!("bad recording id '{s}'")))
    }
}

/// In-memory registry of recordings keyed by id.
#[derive(Debug, Default)]
pub struct RecordingStore {
    next_id: u64,
    recordings: BTreeMap<RecordingId, Arc<Recording>>,
}

impl RecordingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recording and return its id. Ids are never reused.
    pub fn insert(&mut self, recording: Recording) -> RecordingId {
        self.next_id += 1;
        let id = RecordingId(self.next_id);
        tracing::debug!(
            recording = %id,
            channels = recording.channel_names().len(),
            source = recording.source().unwrap_or("-"),
            "recording stored"
        );
        self.recordings.insert(id, Arc::new(recording));
        id
    }

    /// Look up a recording.
    pub fn get(&self, id: RecordingId) -> Result<Arc<Recording>> {
        self.recordings
            .get(&id)
            .cloned()
            .ok_or(CoreError::MissingRecording(id))
    }

    /// Evict a recording.
    pub fn remove(&mut self, id: RecordingId) -> Option<Arc<Recording>> {
        let removed = self.recordings.remove(&id);
        if removed.is_some() {
            tracing::debug!(recording = %id, "recording evicted");
        }
        removed
    }

    /// True if the id is currently loaded.
    pub fn contains(&self, id: RecordingId) -> bool {
        self.recordings.contains_key(&id)
    }

    /// Loaded ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = RecordingId> + '_ {
        self.recordings.keys().copied()
    }

    /// Iterate over `(id, recording)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (RecordingId, &Arc<Recording>)> + '_ {
        self.recordings.iter().map(|(id, rec)| (*id, rec))
    }

    /// Number of loaded recordings.
    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    /// True when nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    /// Drop every recording (end of session).
    pub fn clear(&mut self) {
        self.recordings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::ChannelRead;

    fn rec(label: &str) -> Recording {
        Recording::new(vec![label.into()], 10.0, vec![vec![0.0; 10]]).unwrap()
    }

    #[test]
    fn insert_get_remove() {
        let mut store = RecordingStore::new();
        let a = store.insert(rec("a"));
        let b = store.insert(rec("b"));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b).unwrap().channel_names()[0], "b");

        let held = store.get(a).unwrap();
        assert!(store.remove(a).is_some());
        assert!(matches!(store.get(a), Err(CoreError::MissingRecording(id)) if id == a));
        // An outstanding handle stays readable after eviction.
        assert_eq!(held.channel_names()[0], "a");
    }

    #[test]
    fn ids_are_not_reused() {
        let mut store = RecordingStore::new();
        let a = store.insert(rec("a"));
        store.remove(a);
        let b = store.insert(rec("b"));
        assert_ne!(a, b);
    }

    #[test]
    fn id_parse_and_display() {
        let id = RecordingId::from_raw(42);
        assert_eq!(id.to_string(), "rec-42");
        assert_eq!("rec-42".parse::<RecordingId>().unwrap(), id);
        assert_eq!("42".parse::<RecordingId>().unwrap(), id);
        assert!("rec-x".parse::<RecordingId>().is_err());
    }
}
