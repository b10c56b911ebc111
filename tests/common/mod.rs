#![allow(dead_code)]

use anyhow::Result;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use sonata::audio::{AudioEngine, BackendEvent, EventSender};
use sonata::{CatalogItem, Player, Settings, event_channel};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine whose clock and failures are set by the test.
pub struct ScriptedEngine {
    pub loaded: Option<PathBuf>,
    pub played: Vec<PathBuf>,
    pub seeks: Vec<Duration>,
    pub position: Duration,
    pub duration: Duration,
    pub paused: bool,
    pub failing: HashSet<PathBuf>,
    events: EventSender,
}

impl ScriptedEngine {
    pub fn new(events: EventSender) -> Self {
        Self {
            loaded: None,
            played: Vec::new(),
            seeks: Vec::new(),
            position: Duration::ZERO,
            duration: Duration::from_secs(180),
            paused: false,
            failing: HashSet::new(),
            events,
        }
    }

    pub fn finish(&self) {
        self.events
            .send(BackendEvent::Finished)
            .expect("player should hold the receiver");
    }

    pub fn fail_decoding(&self, reason: &str) {
        self.events
            .send(BackendEvent::DecodeError(reason.to_string()))
            .expect("player should hold the receiver");
    }
}

impl AudioEngine for ScriptedEngine {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, path: &Path) -> Result<()> {
        self.played.push(path.to_path_buf());
        if self.failing.contains(path) {
            anyhow::bail!("cannot decode {}", path.display());
        }
        self.loaded = Some(path.to_path_buf());
        self.position = Duration::ZERO;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {
        self.loaded = None;
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.loaded.is_none() {
            anyhow::bail!("no active track");
        }
        self.seeks.push(position);
        self.position = position;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.loaded.is_some() && !self.paused
    }

    fn current_track(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    fn tick(&mut self) {}
}

pub fn scripted_player(items: Vec<CatalogItem>) -> Player<ScriptedEngine> {
    scripted_player_with(items, Settings::default())
}

pub fn scripted_player_with(items: Vec<CatalogItem>, settings: Settings) -> Player<ScriptedEngine> {
    let (tx, rx) = event_channel();
    let mut player = Player::new(ScriptedEngine::new(tx), rx, settings).expect("player");
    player.set_queue(items);
    player
}

pub fn track(title: &str, seconds: f64) -> CatalogItem {
    CatalogItem::new(
        title,
        "Artist",
        "Album",
        seconds,
        format!("/library/{title}.mp3"),
        None,
    )
}

/// Silent 16-bit mono PCM.
pub fn write_wav(path: &Path, duration_ms: u32) {
    let sample_rate: u32 = 8_000;
    let total_samples = (u64::from(sample_rate) * u64::from(duration_ms) / 1_000) as u32;
    let data_size = total_samples * 2;

    let mut bytes = Vec::with_capacity(44 + data_size as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16_u32.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&1_u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2_u16.to_le_bytes());
    bytes.extend_from_slice(&16_u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    bytes.resize(44 + data_size as usize, 0);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture dir");
    }
    fs::write(path, bytes).expect("wav fixture");
}

/// WAV fixture carrying an ID3v2 tag with text fields and a front cover.
pub fn write_tagged_wav(path: &Path, duration_ms: u32, cover: &[u8]) {
    write_wav(path, duration_ms);

    let mut tag = Tag::new(TagType::Id3v2);
    tag.set_title(String::from("So What"));
    tag.set_artist(String::from("Miles Davis"));
    tag.set_album(String::from("Kind of Blue"));
    tag.push_picture(
        Picture::unchecked(cover.to_vec())
            .pic_type(PictureType::CoverFront)
            .mime_type(MimeType::Jpeg)
            .build(),
    );

    let mut tagged_file = Probe::open(path)
        .expect("open fixture")
        .read()
        .expect("parse fixture");
    tagged_file.insert_tag(tag);
    tagged_file
        .save_to_path(path, WriteOptions::default())
        .expect("save tags");
}
