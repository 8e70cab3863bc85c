//! Settings consumed by the room view.
//!
//! The settings provider delivers values keyed by [`SettingKey`]; some keys
//! are global, the visibility toggles are scoped to the viewed room.
//! [`ViewSettings`] holds the current value of every key.

use serde::{Deserialize, Serialize};

use crate::{error::SettingError, visibility::VisibilityPolicy};

/// Default read-marker threshold while the marker is in view.
pub const DEFAULT_READ_MARKER_IN_VIEW_MS: u64 = 3_000;

/// Default read-marker threshold while the marker is out of view.
pub const DEFAULT_READ_MARKER_OUT_OF_VIEW_MS: u64 = 30_000;

/// Timeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Modern grouped layout
    #[default]
    Group,
    /// Compact IRC layout
    Irc,
    /// Message bubbles
    Bubble,
}

/// Setting keys the room view watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingKey {
    /// `layout`
    Layout,
    /// `lowBandwidth`
    LowBandwidth,
    /// `alwaysShowTimestamps`
    AlwaysShowTimestamps,
    /// `showTwelveHourTimestamps`
    ShowTwelveHourTimestamps,
    /// `readMarkerInViewThresholdMs`
    ReadMarkerInViewThresholdMs,
    /// `readMarkerOutOfViewThresholdMs`
    ReadMarkerOutOfViewThresholdMs,
    /// `showHiddenEventsInTimeline`
    ShowHiddenEventsInTimeline,
    /// `urlPreviewsEnabled`
    UrlPreviewsEnabled,
    /// `urlPreviewsEnabled_e2ee`
    UrlPreviewsEnabledE2ee,
    /// `showReadReceipts` (room scoped)
    ShowReadReceipts,
    /// `showRedactions` (room scoped)
    ShowRedactions,
    /// `showJoinLeaves` (room scoped)
    ShowJoinLeaves,
    /// `showAvatarChanges` (room scoped)
    ShowAvatarChanges,
    /// `showDisplaynameChanges` (room scoped)
    ShowDisplaynameChanges,
}

impl SettingKey {
    /// Keys watched without a room scope.
    pub const GLOBAL: [Self; 9] = [
        Self::Layout,
        Self::LowBandwidth,
        Self::AlwaysShowTimestamps,
        Self::ShowTwelveHourTimestamps,
        Self::ReadMarkerInViewThresholdMs,
        Self::ReadMarkerOutOfViewThresholdMs,
        Self::ShowHiddenEventsInTimeline,
        Self::UrlPreviewsEnabled,
        Self::UrlPreviewsEnabledE2ee,
    ];

    /// Keys watched for the viewed room.
    pub const ROOM: [Self; 5] = [
        Self::ShowReadReceipts,
        Self::ShowRedactions,
        Self::ShowJoinLeaves,
        Self::ShowAvatarChanges,
        Self::ShowDisplaynameChanges,
    ];

    /// Whether the key is scoped to a room.
    pub fn is_room_scoped(self) -> bool {
        Self::ROOM.contains(&self)
    }

    /// Whether the key affects URL preview visibility.
    pub fn affects_url_previews(self) -> bool {
        matches!(self, Self::UrlPreviewsEnabled | Self::UrlPreviewsEnabledE2ee)
    }
}

/// A setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Toggle
    Bool(bool),
    /// Duration in milliseconds
    Millis(u64),
    /// Timeline layout
    Layout(Layout),
}

/// Current value of every watched setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    /// Timeline layout
    pub layout: Layout,
    /// Reduce network usage
    pub low_bandwidth: bool,
    /// Always show message timestamps
    pub always_show_timestamps: bool,
    /// Use a 12 hour clock
    pub show_twelve_hour_timestamps: bool,
    /// Read marker threshold while in view
    pub read_marker_in_view_threshold_ms: u64,
    /// Read marker threshold while out of view
    pub read_marker_out_of_view_threshold_ms: u64,
    /// URL previews in unencrypted rooms
    pub url_previews_enabled: bool,
    /// URL previews in encrypted rooms
    pub url_previews_enabled_e2ee: bool,
    /// Hidden-event policy
    pub visibility: VisibilityPolicy,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            layout: Layout::Group,
            low_bandwidth: false,
            always_show_timestamps: false,
            show_twelve_hour_timestamps: false,
            read_marker_in_view_threshold_ms: DEFAULT_READ_MARKER_IN_VIEW_MS,
            read_marker_out_of_view_threshold_ms: DEFAULT_READ_MARKER_OUT_OF_VIEW_MS,
            url_previews_enabled: true,
            url_previews_enabled_e2ee: false,
            visibility: VisibilityPolicy::default(),
        }
    }
}

impl ViewSettings {
    /// Applies one setting update. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// - `SettingError` if the value type does not match the key
    pub fn apply(&mut self, key: SettingKey, value: SettingValue) -> Result<bool, SettingError> {
        let changed = match (key, value) {
            (SettingKey::Layout, SettingValue::Layout(layout)) => replace(&mut self.layout, layout),
            (SettingKey::Layout, _) => return Err(SettingError { key, expected: "layout" }),
            (SettingKey::ReadMarkerInViewThresholdMs, SettingValue::Millis(ms)) => {
                replace(&mut self.read_marker_in_view_threshold_ms, ms)
            },
            (SettingKey::ReadMarkerOutOfViewThresholdMs, SettingValue::Millis(ms)) => {
                replace(&mut self.read_marker_out_of_view_threshold_ms, ms)
            },
            (SettingKey::ReadMarkerInViewThresholdMs | SettingKey::ReadMarkerOutOfViewThresholdMs, _) => {
                return Err(SettingError { key, expected: "millisecond" });
            },
            (key, SettingValue::Bool(flag)) => match self.toggle_mut(key) {
                Some(slot) => replace(slot, flag),
                None => return Err(SettingError { key, expected: "boolean" }),
            },
            (key, _) => return Err(SettingError { key, expected: "boolean" }),
        };
        Ok(changed)
    }

    /// Whether URL previews are shown for a room with the given encryption.
    pub fn url_previews_for(&self, encrypted: bool) -> bool {
        if encrypted { self.url_previews_enabled_e2ee } else { self.url_previews_enabled }
    }

    fn toggle_mut(&mut self, key: SettingKey) -> Option<&mut bool> {
        let slot = match key {
            SettingKey::LowBandwidth => &mut self.low_bandwidth,
            SettingKey::AlwaysShowTimestamps => &mut self.always_show_timestamps,
            SettingKey::ShowTwelveHourTimestamps => &mut self.show_twelve_hour_timestamps,
            SettingKey::ShowHiddenEventsInTimeline => &mut self.visibility.show_hidden_events,
            SettingKey::UrlPreviewsEnabled => &mut self.url_previews_enabled,
            SettingKey::UrlPreviewsEnabledE2ee => &mut self.url_previews_enabled_e2ee,
            SettingKey::ShowReadReceipts => &mut self.visibility.show_read_receipts,
            SettingKey::ShowRedactions => &mut self.visibility.show_redactions,
            SettingKey::ShowJoinLeaves => &mut self.visibility.show_join_leaves,
            SettingKey::ShowAvatarChanges => &mut self.visibility.show_avatar_changes,
            SettingKey::ShowDisplaynameChanges => &mut self.visibility.show_displayname_changes,
            SettingKey::Layout
            | SettingKey::ReadMarkerInViewThresholdMs
            | SettingKey::ReadMarkerOutOfViewThresholdMs => return None,
        };
        Some(slot)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn toggles_update_visibility_policy() {
        let mut settings = ViewSettings::default();
        assert_eq!(settings.apply(SettingKey::ShowJoinLeaves, SettingValue::Bool(false)), Ok(true));
        assert!(!settings.visibility.show_join_leaves);

        assert_eq!(settings.apply(SettingKey::ShowJoinLeaves, SettingValue::Bool(false)), Ok(false));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut settings = ViewSettings::default();
        let err = settings.apply(SettingKey::Layout, SettingValue::Bool(true)).unwrap_err();
        assert_eq!(err.key, SettingKey::Layout);

        assert!(settings.apply(SettingKey::ShowRedactions, SettingValue::Millis(5)).is_err());
        assert!(settings.apply(SettingKey::ReadMarkerInViewThresholdMs, SettingValue::Bool(true)).is_err());
    }

    #[test]
    fn encrypted_rooms_use_e2ee_preview_key() {
        let settings = ViewSettings::default();
        assert!(settings.url_previews_for(false));
        assert!(!settings.url_previews_for(true));
    }

    #[test]
    fn scopes_partition_keys() {
        for key in SettingKey::GLOBAL {
            assert!(!key.is_room_scoped());
        }
        for key in SettingKey::ROOM {
            assert!(key.is_room_scoped());
        }
    }
}
