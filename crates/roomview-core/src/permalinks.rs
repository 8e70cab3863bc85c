//! Per-room permalink creators.
//!
//! Created lazily, keyed by room id. The viewed room's creator tracks room
//! state; creators for other rooms (search results) only load once. Every
//! creator is stopped at teardown.

use std::collections::BTreeMap;

use crate::types::RoomId;

/// How a permalink creator follows its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermalinkMode {
    /// Started; keeps tracking room state until stopped
    Tracking,
    /// Loaded once
    Snapshot,
}

/// Registry of permalink creators.
#[derive(Debug, Clone, Default)]
pub struct PermalinkRegistry {
    creators: BTreeMap<RoomId, PermalinkMode>,
}

impl PermalinkRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a creator exists for `room_id`.
    ///
    /// Returns the mode to set it up with if it was just created.
    pub fn ensure(&mut self, room_id: &RoomId, primary: bool) -> Option<PermalinkMode> {
        if self.creators.contains_key(room_id) {
            return None;
        }
        let mode = if primary { PermalinkMode::Tracking } else { PermalinkMode::Snapshot };
        self.creators.insert(room_id.clone(), mode);
        Some(mode)
    }

    /// Number of live creators.
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Whether no creator exists.
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// Releases every creator, returning the rooms to stop.
    pub fn stop_all(&mut self) -> Vec<RoomId> {
        std::mem::take(&mut self.creators).into_keys().collect()
    }
}
