use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One playable file in the catalog.
///
/// Identity is the generated `id`, not the path: scanning the same file twice
/// yields two distinct items.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogItem {
    id: Uuid,
    title: String,
    artist: String,
    album: String,
    duration: f64,
    path: PathBuf,
    extension: String,
    cover_path: Option<PathBuf>,
}

impl CatalogItem {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        duration: f64,
        path: impl Into<PathBuf>,
        cover_path: Option<PathBuf>,
    ) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration,
            path,
            extension,
            cover_path,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn cover_path(&self) -> Option<&Path> {
        self.cover_path.as_deref()
    }

    /// `needle` must already be lowercased.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.artist.to_lowercase().contains(needle)
            || self.album.to_lowercase().contains(needle)
    }
}

impl PartialEq for CatalogItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CatalogItem {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct ProgressSnapshot {
    pub current_time: f64,
    pub duration: f64,
    pub fraction: f64,
    pub is_user_interacting: bool,
}

/// What a now-playing view needs in one read.
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub item: Option<CatalogItem>,
    pub state: PlaybackState,
    pub progress: ProgressSnapshot,
}

/// Renders seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let minutes = total / 60;
    let seconds = total % 60;
    format!("{minutes}:{seconds:02}")
}
