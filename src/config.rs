use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "sonata";
const CACHE_DIR_ENV: &str = "SONATA_CACHE_DIR";

/// Tunables for scanning and playback. Every field falls back to its default
/// when missing, so a host application can embed a partial section in its own
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
    #[serde(default = "default_cover_extensions")]
    pub cover_extensions: Vec<String>,
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: f64,
    #[serde(default = "default_restart_threshold_secs")]
    pub restart_threshold_secs: f64,
    #[serde(default = "default_decode_error_delay_ms")]
    pub decode_error_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_cover_cache_dir_name")]
    pub cover_cache_dir_name: String,
}

fn default_supported_extensions() -> Vec<String> {
    ["mp3", "flac", "m4a"].map(String::from).to_vec()
}

fn default_cover_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png"].map(String::from).to_vec()
}

fn default_min_duration_secs() -> f64 {
    1.0
}

fn default_restart_threshold_secs() -> f64 {
    5.0
}

fn default_decode_error_delay_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_volume() -> f32 {
    0.5
}

fn default_cover_cache_dir_name() -> String {
    String::from("CoverCache")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supported_extensions: default_supported_extensions(),
            cover_extensions: default_cover_extensions(),
            min_duration_secs: default_min_duration_secs(),
            restart_threshold_secs: default_restart_threshold_secs(),
            decode_error_delay_ms: default_decode_error_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            volume: default_volume(),
            cover_cache_dir_name: default_cover_cache_dir_name(),
        }
    }
}

impl Settings {
    pub fn is_supported_audio(&self, path: &Path) -> bool {
        has_extension_in(path, &self.supported_extensions)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.restart_threshold_secs.max(0.0))
    }

    pub fn decode_error_delay(&self) -> Duration {
        Duration::from_millis(self.decode_error_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `<cache root>/<cover_cache_dir_name>`; not created here.
    pub fn cover_cache_dir(&self) -> Result<PathBuf> {
        Ok(cache_root()?.join(&self.cover_cache_dir_name))
    }
}

pub(crate) fn has_extension_in(path: &Path, allowed: &[String]) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    !ext.is_empty() && allowed.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

/// Process-wide cache location shared by every scan.
pub fn cache_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var(CACHE_DIR_ENV) {
        return Ok(PathBuf::from(override_dir));
    }

    if cfg!(windows) {
        let local = env::var("LOCALAPPDATA").context("LOCALAPPDATA is not set")?;
        return Ok(PathBuf::from(local).join(APP_DIR).join("cache"));
    }

    if let Ok(xdg) = env::var("XDG_CACHE_HOME")
        && !xdg.trim().is_empty()
    {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }

    let home = env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".cache").join(APP_DIR))
}

/// Absolute form of `path` without the Windows `\\?\` prefix.
pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
