use crate::config::{self, Settings};
use crate::error::PlayerError;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk cache of embedded artwork plus lookup of sibling cover images.
///
/// Entries are keyed by `<file name>_<path hash>.jpg`. An existing entry is
/// trusted as-is and never rewritten; nothing is invalidated during a run.
/// Writes are not locked, so two scans of the same tree must not overlap.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
    image_extensions: Vec<String>,
}

impl CoverCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_settings(dir, &Settings::default())
    }

    pub fn with_settings(dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            dir: dir.into(),
            image_extensions: settings.cover_extensions.clone(),
        }
    }

    /// Cache rooted in the process cache location.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::with_settings(settings.cover_cache_dir()?, settings))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Picks a cover for `audio_path`: embedded artwork first (cached to disk),
    /// then a sibling image sharing the audio file's stem. A failed cache write
    /// leaves the item without a cover.
    pub fn resolve(
        &self,
        audio_path: &Path,
        embedded: Option<&[u8]>,
        siblings: &[PathBuf],
    ) -> Option<PathBuf> {
        if let Some(bytes) = embedded {
            return match self.store_embedded(audio_path, bytes) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!("{err}");
                    None
                }
            };
        }

        self.sibling_cover(audio_path, siblings)
    }

    /// Cache location for `audio_path`'s embedded artwork.
    pub fn cache_path_for(&self, audio_path: &Path) -> PathBuf {
        self.dir.join(cache_file_name(audio_path))
    }

    fn store_embedded(&self, audio_path: &Path, bytes: &[u8]) -> Result<PathBuf, PlayerError> {
        let target = self.cache_path_for(audio_path);
        if target.exists() {
            return Ok(target);
        }

        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&target, bytes))
            .map_err(|err| PlayerError::CoverWriteFailed(target.clone(), err.to_string()))?;
        debug!("cached embedded cover {}", target.display());
        Ok(target)
    }

    fn sibling_cover(&self, audio_path: &Path, siblings: &[PathBuf]) -> Option<PathBuf> {
        let stem = audio_path.file_stem().and_then(OsStr::to_str)?.to_lowercase();
        siblings
            .iter()
            .filter(|candidate| candidate.as_path() != audio_path)
            .filter(|candidate| config::has_extension_in(candidate, &self.image_extensions))
            .find(|candidate| {
                candidate
                    .file_stem()
                    .and_then(OsStr::to_str)
                    .is_some_and(|candidate_stem| candidate_stem.to_lowercase() == stem)
            })
            .cloned()
    }
}

fn cache_file_name(audio_path: &Path) -> String {
    let name = audio_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("cover"));
    format!("{name}_{}.jpg", path_hash(audio_path))
}

fn path_hash(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect()
}
