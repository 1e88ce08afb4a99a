//! Core types for playback management

use serde::{Deserialize, Serialize};

/// Optional descriptive metadata for a muse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuseMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl MuseMeta {
    /// Metadata with only a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Playback state of a single muse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuseState {
    /// Resource has not been loaded yet
    Unloaded,

    /// Loaded and idle (also the state of every deselected loaded muse)
    Loaded,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Stopped and rewound to the start
    Stopped,
}

impl MuseState {
    /// Whether the resource is loaded in this state
    pub fn is_loaded(self) -> bool {
        !matches!(self, MuseState::Unloaded)
    }
}

/// Snapshot of a playlist entry
///
/// The playable resource itself stays inside the playlist; callers get
/// a copy of the descriptive fields and the state at the time of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Muse {
    /// Unique id within the playlist
    pub id: String,

    /// Resource locator handed to the resource factory
    pub src: String,

    /// Descriptive metadata
    pub meta: MuseMeta,

    /// Playback state when the snapshot was taken
    pub state: MuseState,
}

/// What a bound timestamp element displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeDisplay {
    /// Current position, e.g. `1:01`
    CurrentTime,

    /// Total length, e.g. `3:45`
    DurationTime,

    /// Both, e.g. `1:01/3:45`
    CompleteTime,
}
