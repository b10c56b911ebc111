use crate::audio::AudioEngine;
use crate::config::Settings;
use crate::model::ProgressSnapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ProgressReporter {
    snapshot: ProgressSnapshot,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }

    /// While set, polling leaves the last reported values untouched.
    pub fn set_user_interacting(&mut self, interacting: bool) {
        self.snapshot.is_user_interacting = interacting;
    }

    pub fn poll<E: AudioEngine + ?Sized>(&mut self, engine: &E) {
        if !engine.is_playing() || self.snapshot.is_user_interacting {
            return;
        }
        self.update(engine.position(), engine.duration());
    }

    /// Pushes an authoritative time outside the poll cadence, e.g. right after
    /// a seek. Duration is re-read in case the track just changed.
    pub fn sync_time<E: AudioEngine + ?Sized>(&mut self, time: Duration, engine: &E) {
        self.update(time, engine.duration());
    }

    fn update(&mut self, time: Duration, duration: Duration) {
        let current_time = time.as_secs_f64();
        let duration = duration.as_secs_f64();
        self.snapshot.current_time = current_time;
        self.snapshot.duration = duration;
        self.snapshot.fraction = if duration > 0.0 {
            (current_time / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}

pub struct ProgressTicker {
    ticks: Receiver<()>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    pub fn spawn(interval: Duration) -> Self {
        let (tx, ticks) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let join = thread::spawn(move || {
            while !stop_for_thread.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if stop_for_thread.load(Ordering::Relaxed) || tx.send(()).is_err() {
                    break;
                }
            }
        });

        Self {
            ticks,
            stop,
            join: Some(join),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::spawn(settings.poll_interval())
    }

    pub fn wait(&self, timeout: Duration) -> bool {
        match self.ticks.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Collapses ticks that piled up while the owner was busy. Returns how
    /// many were pending.
    pub fn drain(&self) -> usize {
        self.ticks.try_iter().count()
    }

    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
