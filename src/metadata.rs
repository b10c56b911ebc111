use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

/// Everything the scanner needs from one audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    /// Seconds; `0.0` when the stream length is unknown.
    pub duration: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<Vec<u8>>,
}

/// Extracts duration, well-known tags and embedded artwork from a file.
pub trait MetadataSource {
    fn read(&self, path: &Path) -> Result<TrackMetadata>;
}

/// Tag and artwork reading through `lofty`, with a `symphonia` probe when the
/// container does not report a length.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyMetadataSource;

impl MetadataSource for LoftyMetadataSource {
    fn read(&self, path: &Path) -> Result<TrackMetadata> {
        let tagged_file = Probe::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .read()
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let mut duration = tagged_file.properties().duration().as_secs_f64();
        if duration <= 0.0 {
            duration = probe_duration_secs(path).unwrap_or_default();
        }

        let mut metadata = TrackMetadata {
            duration,
            ..TrackMetadata::default()
        };

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            metadata.title = tag.title().as_deref().and_then(clean_metadata_value);
            metadata.artist = tag.artist().as_deref().and_then(clean_metadata_value);
            metadata.album = tag.album().as_deref().and_then(clean_metadata_value);
            metadata.artwork = cover_picture(tag);
        }

        Ok(metadata)
    }
}

fn cover_picture(tag: &Tag) -> Option<Vec<u8>> {
    let pictures = tag.pictures();
    pictures
        .iter()
        .find(|picture| picture.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .map(|picture| picture.data())
        .filter(|data| !data.is_empty())
        .map(<[u8]>::to_vec)
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn probe_duration_secs(path: &Path) -> Option<f64> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    probed
        .format
        .default_track()
        .and_then(|track| codec_duration_secs(&track.codec_params))
}

fn codec_duration_secs(codec_params: &CodecParameters) -> Option<f64> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        return Some(time.seconds as f64 + time.frac);
    }

    codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
        .map(|(frame_count, sample_rate)| frame_count as f64 / f64::from(sample_rate))
}
