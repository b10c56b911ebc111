use anyhow::{Context, Result};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A track that stops this far short of its reported length is treated as a
/// decode failure rather than a normal finish.
const EARLY_END_TOLERANCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Finished,
    DecodeError(String),
}

pub type EventSender = Sender<BackendEvent>;
pub type EventReceiver = Receiver<BackendEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel()
}

/// Contract of the OS decoding/output primitive.
///
/// Every attempt started by `play` produces at most one `BackendEvent` on the
/// engine's event channel. Queries made while no track is loaded return the
/// last known values instead of failing.
pub trait AudioEngine {
    fn initialize(&mut self) -> Result<()>;
    fn play(&mut self, path: &Path) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, position: Duration) -> Result<()>;
    fn position(&self) -> Duration;
    fn duration(&self) -> Duration;
    fn is_playing(&self) -> bool;
    fn current_track(&self) -> Option<&Path>;
    fn tick(&mut self);
}

struct ActiveTrack {
    path: PathBuf,
    sink: Sink,
    duration: Option<Duration>,
    reported: bool,
}

enum Session {
    Inactive {
        last_position: Duration,
        last_duration: Duration,
    },
    Active(ActiveTrack),
}

impl Session {
    fn inactive() -> Self {
        Self::Inactive {
            last_position: Duration::ZERO,
            last_duration: Duration::ZERO,
        }
    }
}

pub struct RodioAudioEngine {
    stream: Option<OutputStream>,
    session: Session,
    volume: f32,
    events: EventSender,
}

impl RodioAudioEngine {
    pub fn new(events: EventSender, volume: f32) -> Self {
        Self {
            stream: None,
            session: Session::inactive(),
            volume: volume.clamp(0.0, 1.0),
            events,
        }
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    let host = rodio::cpal::default_host();
                    let mut started = None;
                    for device in host.output_devices().ok().into_iter().flatten() {
                        let name = device.name().unwrap_or_default();
                        let opened = OutputStreamBuilder::from_device(device)
                            .context("failed to open fallback output device")
                            .and_then(|builder| {
                                builder
                                    .with_error_callback(|_| {})
                                    .open_stream_or_fallback()
                                    .context("failed to start fallback output stream")
                            });
                        match opened {
                            Ok(stream) => {
                                debug!("using fallback output device {name}");
                                started = Some(stream);
                                break;
                            }
                            Err(err) => debug!("output device {name} unavailable: {err:#}"),
                        }
                    }
                    started.with_context(|| {
                        format!("unable to start any audio output stream: {default_err:#}")
                    })
                }
            }
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }

    fn publish(&self, event: BackendEvent) {
        if self.events.send(event).is_err() {
            debug!("backend event dropped, no receiver");
        }
    }
}

impl AudioEngine for RodioAudioEngine {
    fn initialize(&mut self) -> Result<()> {
        if self.stream.is_none() {
            self.stream = Some(Self::open_output_stream()?);
        }
        Ok(())
    }

    fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();
        let stream = self
            .stream
            .as_ref()
            .context("audio output is not initialized")?;

        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let duration = source.total_duration().filter(|d| !d.is_zero());

        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();

        self.session = Session::Active(ActiveTrack {
            path: path.to_path_buf(),
            sink,
            duration,
            reported: false,
        });
        Ok(())
    }

    fn pause(&mut self) {
        if let Session::Active(track) = &self.session {
            track.sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Session::Active(track) = &self.session {
            track.sink.play();
        }
    }

    fn stop(&mut self) {
        if let Session::Active(track) = &self.session {
            let last_position = track.sink.get_pos();
            let last_duration = track.duration.unwrap_or_default();
            track.sink.stop();
            self.session = Session::Inactive {
                last_position,
                last_duration,
            };
        }
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        let Session::Active(track) = &mut self.session else {
            return Err(anyhow::anyhow!("no active track"));
        };
        track
            .sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        track.reported = false;
        Ok(())
    }

    fn position(&self) -> Duration {
        match &self.session {
            Session::Active(track) => track.sink.get_pos(),
            Session::Inactive { last_position, .. } => *last_position,
        }
    }

    fn duration(&self) -> Duration {
        match &self.session {
            Session::Active(track) => track.duration.unwrap_or_default(),
            Session::Inactive { last_duration, .. } => *last_duration,
        }
    }

    fn is_playing(&self) -> bool {
        match &self.session {
            Session::Active(track) => !track.sink.is_paused() && !track.sink.empty(),
            Session::Inactive { .. } => false,
        }
    }

    fn current_track(&self) -> Option<&Path> {
        match &self.session {
            Session::Active(track) => Some(track.path.as_path()),
            Session::Inactive { .. } => None,
        }
    }

    fn tick(&mut self) {
        let Session::Active(track) = &mut self.session else {
            return;
        };
        if track.reported || track.sink.is_paused() || !track.sink.empty() {
            return;
        }
        track.reported = true;

        let reached = track.sink.get_pos();
        let event = match track.duration {
            Some(total) if reached + EARLY_END_TOLERANCE < total => {
                warn!(
                    "{} ended at {:.1}s of {:.1}s",
                    track.path.display(),
                    reached.as_secs_f64(),
                    total.as_secs_f64()
                );
                BackendEvent::DecodeError(format!(
                    "stream ended early at {:.1}s",
                    reached.as_secs_f64()
                ))
            }
            _ => BackendEvent::Finished,
        };
        self.publish(event);
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

pub struct NullAudioEngine {
    paused: bool,
    current: Option<PathBuf>,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    reported: bool,
    events: EventSender,
}

impl NullAudioEngine {
    pub fn new(events: EventSender) -> Self {
        Self {
            paused: false,
            current: None,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            reported: false,
            events,
        }
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }
}

impl AudioEngine for NullAudioEngine {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self, path: &Path) -> Result<()> {
        self.paused = false;
        self.current = Some(path.to_path_buf());
        self.started_at = Some(Instant::now());
        self.position_offset = Duration::ZERO;
        self.track_duration = Self::estimate_duration(path);
        self.reported = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn resume(&mut self) {
        if self.current.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.paused = false;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.reported = false;
    }

    fn seek_to(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        self.reported = false;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.current_position()
    }

    fn duration(&self) -> Duration {
        self.track_duration.unwrap_or_default()
    }

    fn is_playing(&self) -> bool {
        self.current.is_some() && !self.paused && !self.is_finished()
    }

    fn current_track(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    fn tick(&mut self) {
        if self.reported || !self.is_finished() {
            return;
        }
        self.reported = true;
        if self.events.send(BackendEvent::Finished).is_err() {
            debug!("backend event dropped, no receiver");
        }
    }
}
