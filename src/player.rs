use crate::audio::{AudioEngine, BackendEvent, EventReceiver};
use crate::config::Settings;
use crate::error::{PlayerError, Result};
use crate::model::{CatalogItem, NowPlaying, PlaybackState, ProgressSnapshot};
use crate::progress::ProgressReporter;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::{IndexedRandom, SliceRandom};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Owns the queue, the current item and the backend.
pub struct Player<E: AudioEngine> {
    engine: E,
    events: EventReceiver,
    progress: ProgressReporter,
    settings: Settings,
    queue: Vec<CatalogItem>,
    current_index: usize,
    current: Option<CatalogItem>,
    state: PlaybackState,
    paused_at: Duration,
    pending_advance: Option<Instant>,
    last_error: Option<PlayerError>,
    rng: SmallRng,
}

impl<E: AudioEngine> Player<E> {
    pub fn new(mut engine: E, events: EventReceiver, settings: Settings) -> Result<Self> {
        if let Err(err) = engine.initialize() {
            let err = PlayerError::BackendInitFailed(format!("{err:#}"));
            warn!("{err}");
            return Err(err);
        }

        Ok(Self {
            engine,
            events,
            progress: ProgressReporter::new(),
            settings,
            queue: Vec::new(),
            current_index: 0,
            current: None,
            state: PlaybackState::Idle,
            paused_at: Duration::ZERO,
            pending_advance: None,
            last_error: None,
            rng: SmallRng::from_os_rng(),
        })
    }

    pub fn set_queue(&mut self, items: Vec<CatalogItem>) {
        info!("queue loaded with {} tracks", items.len());
        self.queue = items;
        self.current_index = 0;
        if let Some(current) = &self.current
            && let Some(index) = self.queue.iter().position(|item| item == current)
        {
            self.current_index = index;
        }
    }

    /// Stops whatever is playing and starts `item`.
    ///
    /// On failure the player is left `Paused` with `item` still current and
    /// the error kept in [`Player::last_error`].
    pub fn play(&mut self, item: &CatalogItem) -> Result<()> {
        self.pending_advance = None;
        self.current = Some(item.clone());
        if let Some(index) = self.queue.iter().position(|queued| queued == item) {
            self.current_index = index;
        }

        self.engine.stop();
        // Anything still queued belongs to the attempt we just stopped.
        while self.events.try_recv().is_ok() {}
        self.paused_at = Duration::ZERO;

        let started = self.engine.play(item.path());
        self.progress.sync_time(Duration::ZERO, &self.engine);
        match started {
            Ok(()) => {
                debug!("playing {}", item.path().display());
                self.state = PlaybackState::Playing;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                let err = PlayerError::playback(&err);
                warn!("{err}");
                self.state = PlaybackState::Paused;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.paused_at = self.engine.position();
        self.state = PlaybackState::Paused;
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.engine.current_track().is_some() {
            self.engine.resume();
            self.state = PlaybackState::Playing;
            return Ok(());
        }

        let target = self
            .current
            .clone()
            .or_else(|| self.queue.get(self.current_index).cloned());
        match target {
            Some(item) => self.play(&item),
            None => Ok(()),
        }
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            self.pause();
            Ok(())
        } else {
            self.resume()
        }
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        if let Err(err) = self.engine.seek_to(position) {
            if self.engine.current_track().is_none() {
                return Err(PlayerError::NoActiveTrack);
            }
            return Err(PlayerError::playback(&err));
        }
        self.paused_at = position;
        self.progress.sync_time(position, &self.engine);
        Ok(())
    }

    pub fn seek_fraction(&mut self, fraction: f64) -> Result<()> {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let target = self.engine.duration().mul_f64(fraction);
        self.seek(target)
    }

    pub fn next(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        self.current_index = (self.current_index + 1) % self.queue.len();
        let item = self.queue[self.current_index].clone();
        self.play(&item)
    }

    pub fn previous(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        if self.current_time() > self.settings.restart_threshold() {
            return self.seek(Duration::ZERO);
        }

        self.current_index = if self.current_index > 0 {
            self.current_index - 1
        } else {
            self.queue.len() - 1
        };
        let item = self.queue[self.current_index].clone();
        self.play(&item)
    }

    pub fn shuffle(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        self.queue.shuffle(&mut self.rng);
        if let Some(current) = &self.current
            && let Some(index) = self.queue.iter().position(|item| item == current)
        {
            self.current_index = index;
        }

        let head = self.queue[0].clone();
        self.play(&head)
    }

    pub fn play_random(&mut self) -> Result<()> {
        let Some(item) = self.queue.choose(&mut self.rng).cloned() else {
            return Ok(());
        };
        self.play(&item)
    }

    pub fn search(&self, query: &str) -> Vec<&CatalogItem> {
        let needle = query.to_lowercase();
        self.queue
            .iter()
            .filter(|item| needle.is_empty() || item.matches(&needle))
            .collect()
    }

    /// Drives everything time-based: backend finish detection, auto-advance
    /// (a decode error waits `decode_error_delay` first) and progress polling.
    pub fn tick(&mut self, now: Instant) {
        self.engine.tick();

        while let Ok(event) = self.events.try_recv() {
            match event {
                BackendEvent::Finished => {
                    debug!("track finished, advancing");
                    self.auto_advance();
                }
                BackendEvent::DecodeError(reason) => {
                    warn!("decode error: {reason}");
                    if self.pending_advance.is_none() {
                        self.pending_advance = Some(now + self.settings.decode_error_delay());
                    }
                }
            }
        }

        if self.pending_advance.is_some_and(|due| now >= due) {
            self.pending_advance = None;
            self.auto_advance();
        }

        self.progress.poll(&self.engine);
    }

    fn auto_advance(&mut self) {
        if let Err(err) = self.next() {
            warn!("auto-advance failed: {err}");
        }
    }

    pub fn set_user_interacting(&mut self, interacting: bool) {
        self.progress.set_user_interacting(interacting);
    }

    pub fn current_time(&self) -> Duration {
        if self.engine.current_track().is_some() {
            self.engine.position()
        } else {
            self.paused_at
        }
    }

    pub fn queue(&self) -> &[CatalogItem] {
        &self.queue
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.queue.is_empty()).then_some(self.current_index)
    }

    pub fn current_item(&self) -> Option<&CatalogItem> {
        self.current.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn last_error(&self) -> Option<&PlayerError> {
        self.last_error.as_ref()
    }

    pub fn has_pending_advance(&self) -> bool {
        self.pending_advance.is_some()
    }

    pub fn now_playing(&self) -> NowPlaying {
        NowPlaying {
            item: self.current.clone(),
            state: self.state,
            progress: self.progress.snapshot(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn seed_shuffle(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }
}
