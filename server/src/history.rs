//! Tracks which tracks have already been played this session

use log::debug;
use std::collections::HashSet;

/// Grow-only set of played track ids.
///
/// Track selection lives outside the engine; it queries `has` to avoid
/// repeating a song.
#[derive(Debug, Default)]
pub struct SongHistory {
    played: HashSet<String>,
}

impl SongHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, track_id: &str) -> bool {
        self.played.contains(track_id)
    }

    /// Records a track id. Returns false if it was already present.
    pub fn record(&mut self, track_id: &str) -> bool {
        let inserted = self.played.insert(track_id.to_string());
        if inserted {
            debug!("Archived track {} ({} played)", track_id, self.played.len());
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.played.len()
    }

    pub fn is_empty(&self) -> bool {
        self.played.is_empty()
    }
}
