use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failures surfaced by the scanner, the cover cache and the playback controller.
///
/// Scanning never fails as a whole: `FileNotReadable`, `MetadataUnavailable`
/// and `CoverWriteFailed` are logged and the offending entry is omitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// The audio output could not be activated.
    #[error("audio backend failed to initialize: {0}")]
    BackendInitFailed(String),

    /// The backend refused to load or start a track.
    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    /// A file or directory could not be read.
    #[error("file not readable: {}", .0.display())]
    FileNotReadable(PathBuf),

    /// Duration or tags could not be extracted from an audio file.
    #[error("metadata unavailable for {}: {1}", .0.display())]
    MetadataUnavailable(PathBuf, String),

    /// Embedded artwork could not be written into the cover cache.
    #[error("failed to write cover {}: {1}", .0.display())]
    CoverWriteFailed(PathBuf, String),

    /// A seek was requested while no track is loaded.
    #[error("no active track")]
    NoActiveTrack,
}

impl PlayerError {
    pub(crate) fn playback(err: &anyhow::Error) -> Self {
        Self::PlaybackFailed(format!("{err:#}"))
    }
}
