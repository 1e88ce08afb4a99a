//! Error types for playback management

use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No muse with this id (or index) exists
    #[error("Muse not found: {0}")]
    NotFound(String),

    /// A muse with this id is already in the playlist
    #[error("Duplicate muse id: {0}")]
    DuplicateId(String),

    /// The playable resource failed to load or decode
    #[error("Failed to load resource: {0}")]
    LoadFailure(String),

    /// Transport operation attempted with nothing selected
    #[error("No muse selected")]
    NoSelection,

    /// Operation needs a loaded resource (e.g. a duration)
    #[error("Selected muse is not loaded")]
    NotLoaded,

    /// Seek target is not a usable number
    #[error("Invalid seek position: {0}")]
    InvalidSeekPosition(f64),

    /// Navigation past either end of the playlist
    #[error("Index {index} out of range (playlist length {len})")]
    OutOfRange { index: isize, len: usize },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
