use crate::config::{self, Settings};
use crate::cover::CoverCache;
use crate::error::PlayerError;
use crate::metadata::{LoftyMetadataSource, MetadataSource};
use crate::model::CatalogItem;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Turns a directory tree into an ordered catalog.
///
/// Each directory contributes its audio files first (by file name), then the
/// contents of its subdirectories, depth first. Unreadable entries and
/// subtrees are logged and left out; a scan never fails as a whole.
pub struct LibraryScanner<M = LoftyMetadataSource> {
    metadata: M,
    covers: CoverCache,
    settings: Settings,
}

impl LibraryScanner<LoftyMetadataSource> {
    /// Scanner reading tags with lofty and caching covers under the process
    /// cache directory.
    pub fn with_settings(settings: Settings) -> anyhow::Result<Self> {
        let covers = CoverCache::from_settings(&settings)?;
        Ok(Self::new(LoftyMetadataSource, covers, settings))
    }
}

impl<M: MetadataSource> LibraryScanner<M> {
    pub fn new(metadata: M, covers: CoverCache, settings: Settings) -> Self {
        Self {
            metadata,
            covers,
            settings,
        }
    }

    pub fn covers(&self) -> &CoverCache {
        &self.covers
    }

    pub fn scan(&self, root: &Path) -> Vec<CatalogItem> {
        let root = config::normalize_path(root);
        let mut visited = HashSet::new();
        let mut items = Vec::new();

        if let Err(err) = self.scan_dir(&root, &mut visited, &mut items) {
            warn!("library root skipped: {err}");
            return Vec::new();
        }

        info!("scanned {} tracks under {}", items.len(), root.display());
        items
    }

    /// Scans each root in turn, dropping files already seen under an earlier root.
    pub fn scan_many(&self, roots: &[PathBuf]) -> Vec<CatalogItem> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for root in roots {
            all.extend(
                self.scan(root)
                    .into_iter()
                    .filter(|item| seen.insert(item.path().to_path_buf())),
            );
        }
        all
    }

    fn scan_dir(
        &self,
        dir: &Path,
        visited: &mut HashSet<PathBuf>,
        out: &mut Vec<CatalogItem>,
    ) -> Result<(), PlayerError> {
        // Symlinked directories can point back up the tree.
        if !visited.insert(config::normalize_path(dir)) {
            return Ok(());
        }

        let (subdirs, files) = list_dir(dir)?;

        for file in files
            .iter()
            .filter(|file| self.settings.is_supported_audio(file))
        {
            match self.catalog_item(file, &files) {
                Ok(Some(item)) => out.push(item),
                Ok(None) => {}
                Err(err) => warn!("skipping file: {err}"),
            }
        }

        for subdir in &subdirs {
            if let Err(err) = self.scan_dir(subdir, visited, out) {
                warn!("skipping directory: {err}");
            }
        }

        Ok(())
    }

    fn catalog_item(
        &self,
        path: &Path,
        siblings: &[PathBuf],
    ) -> Result<Option<CatalogItem>, PlayerError> {
        let metadata = self
            .metadata
            .read(path)
            .map_err(|err| PlayerError::MetadataUnavailable(path.to_path_buf(), format!("{err:#}")))?;

        if metadata.duration <= self.settings.min_duration_secs {
            debug!(
                "skipping {}: {:.2}s is below the duration floor",
                path.display(),
                metadata.duration
            );
            return Ok(None);
        }

        let cover = self
            .covers
            .resolve(path, metadata.artwork.as_deref(), siblings);
        let title = metadata.title.unwrap_or_else(|| {
            path.file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("unknown")
                .to_string()
        });

        Ok(Some(CatalogItem::new(
            title,
            metadata.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            metadata.album.unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            metadata.duration,
            path,
            cover,
        )))
    }
}

/// Visible subdirectories and files of `dir`, each sorted by file name.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), PlayerError> {
    dir.read_dir()
        .map_err(|_| PlayerError::FileNotReadable(dir.to_path_buf()))?;

    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("unreadable entry in {}: {err}", dir.display());
                continue;
            }
        };
        if is_hidden(entry.file_name()) {
            continue;
        }

        let path = entry.into_path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.is_file() {
            files.push(path);
        }
    }

    Ok((subdirs, files))
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrackMetadata;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Serves canned metadata keyed by file name; unknown names fail to parse.
    #[derive(Default)]
    struct FakeMetadata {
        by_name: HashMap<String, TrackMetadata>,
    }

    impl FakeMetadata {
        fn with(mut self, name: &str, duration: f64) -> Self {
            self.by_name.insert(
                name.to_string(),
                TrackMetadata {
                    duration,
                    ..TrackMetadata::default()
                },
            );
            self
        }

        fn with_tags(mut self, name: &str, metadata: TrackMetadata) -> Self {
            self.by_name.insert(name.to_string(), metadata);
            self
        }
    }

    impl MetadataSource for FakeMetadata {
        fn read(&self, path: &Path) -> anyhow::Result<TrackMetadata> {
            let name = path
                .file_name()
                .and_then(OsStr::to_str)
                .unwrap_or_default();
            self.by_name
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unrecognised stream"))
        }
    }

    fn scanner(metadata: FakeMetadata, cache: &Path) -> LibraryScanner<FakeMetadata> {
        LibraryScanner::new(metadata, CoverCache::new(cache), Settings::default())
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, b"x").expect("write");
    }

    #[test]
    fn scan_filters_non_audio_and_hidden_files() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("b.txt"));
        touch(&dir.path().join(".hidden.mp3"));
        touch(&dir.path().join(".git/c.mp3"));

        let metadata = FakeMetadata::default()
            .with("a.mp3", 10.0)
            .with("b.txt", 10.0)
            .with(".hidden.mp3", 10.0)
            .with("c.mp3", 10.0);
        let items = scanner(metadata, &dir.path().join("cache")).scan(dir.path());

        assert_eq!(items.len(), 1);
        assert!(items[0].path().ends_with("a.mp3"));
        assert!(items[0].path().is_absolute());
        assert_eq!(items[0].title(), "a");
        assert_eq!(items[0].artist(), UNKNOWN_ARTIST);
        assert_eq!(items[0].album(), UNKNOWN_ALBUM);
        assert_eq!(items[0].extension(), "mp3");
    }

    #[test]
    fn files_come_before_subdirectories_in_name_order() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("z.mp3"));
        touch(&dir.path().join("a/inner.flac"));
        touch(&dir.path().join("a/deeper/deep.m4a"));
        touch(&dir.path().join("b.MP3"));
        touch(&dir.path().join("c/last.mp3"));

        let metadata = FakeMetadata::default()
            .with("z.mp3", 5.0)
            .with("inner.flac", 5.0)
            .with("deep.m4a", 5.0)
            .with("b.MP3", 5.0)
            .with("last.mp3", 5.0);
        let titles: Vec<String> = scanner(metadata, &dir.path().join("cache"))
            .scan(dir.path())
            .iter()
            .map(|item| item.title().to_string())
            .collect();

        assert_eq!(titles, vec!["b", "z", "inner", "deep", "last"]);
    }

    #[test]
    fn short_and_unreadable_files_are_dropped() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("glitch.mp3"));
        touch(&dir.path().join("edge.mp3"));
        touch(&dir.path().join("broken.mp3"));
        touch(&dir.path().join("song.mp3"));

        let metadata = FakeMetadata::default()
            .with("glitch.mp3", 0.5)
            .with("edge.mp3", 1.0)
            .with("song.mp3", 1.5);
        let items = scanner(metadata, &dir.path().join("cache")).scan(dir.path());

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title(), "song");
        assert_eq!(items[0].duration(), 1.5);
    }

    #[test]
    fn tags_override_filename_fallbacks() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("01.flac"));

        let metadata = FakeMetadata::default().with_tags(
            "01.flac",
            TrackMetadata {
                duration: 200.0,
                title: Some(String::from("Blue")),
                artist: Some(String::from("Joni")),
                album: None,
                artwork: None,
            },
        );
        let items = scanner(metadata, &dir.path().join("cache")).scan(dir.path());

        assert_eq!(items[0].title(), "Blue");
        assert_eq!(items[0].artist(), "Joni");
        assert_eq!(items[0].album(), UNKNOWN_ALBUM);
    }

    #[test]
    fn sibling_cover_is_attached() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("track.mp3"));
        touch(&dir.path().join("track.jpg"));

        let metadata = FakeMetadata::default().with("track.mp3", 30.0);
        let items = scanner(metadata, &dir.path().join("cache")).scan(dir.path());

        let expected = config::normalize_path(&dir.path().join("track.jpg"));
        assert_eq!(items[0].cover_path(), Some(expected.as_path()));
    }

    #[test]
    fn embedded_artwork_lands_in_cache() {
        let dir = tempdir().expect("tempdir");
        let cache = dir.path().join("cache");
        touch(&dir.path().join("music/track.mp3"));
        touch(&dir.path().join("music/track.jpg"));

        let metadata = FakeMetadata::default().with_tags(
            "track.mp3",
            TrackMetadata {
                duration: 30.0,
                artwork: Some(b"art".to_vec()),
                ..TrackMetadata::default()
            },
        );
        let items = scanner(metadata, &cache).scan(&dir.path().join("music"));

        let cover = items[0].cover_path().expect("cover");
        assert!(cover.starts_with(&cache));
        assert_eq!(fs::read(cover).expect("read"), b"art");
    }

    #[test]
    fn missing_root_yields_empty_catalog() {
        let dir = tempdir().expect("tempdir");
        let items = scanner(FakeMetadata::default(), &dir.path().join("cache"))
            .scan(&dir.path().join("nope"));
        assert!(items.is_empty());
    }

    #[test]
    fn repeated_scans_produce_fresh_identities() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));
        let scanner = scanner(
            FakeMetadata::default().with("a.mp3", 4.0),
            &dir.path().join("cache"),
        );

        let first = scanner.scan(dir.path());
        let second = scanner.scan(dir.path());
        assert_eq!(first[0].path(), second[0].path());
        assert_ne!(first[0].id(), second[0].id());
    }

    #[test]
    fn scan_many_skips_paths_seen_under_earlier_roots() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("sub/b.mp3"));
        let scanner = scanner(
            FakeMetadata::default().with("a.mp3", 4.0).with("b.mp3", 4.0),
            &dir.path().join("cache"),
        );

        let items = scanner.scan_many(&[dir.path().to_path_buf(), dir.path().join("sub")]);
        let titles: Vec<&str> = items.iter().map(CatalogItem::title).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
