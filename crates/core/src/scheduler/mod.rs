//! Polling beat scheduler.
//!
//! Rather than arming one timer per beat, a dedicated thread wakes up every
//! few milliseconds, reads the current rhythm and decides whether a beat is
//! due. Tempo and meter edits are therefore heard on the next tick without any
//! rescheduling.
//!
//! When a beat fires, the next one is measured from the moment it actually
//! fired, not from when it was due. A stalled tick delays the following beats
//! instead of producing a burst of catch-up clicks, at the cost of long-run
//! phase drifting by up to one tick period per beat.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use serde::{Deserialize, Serialize};

use crate::{
    accent::{self, Accent, AccentPattern},
    audio::{AudioOutput, SharedOutput},
    clock::Clock,
    config::SchedulerConfig,
    repo::RhythmReader,
    rhythm::RhythmModel,
    MetronomeError, Result,
};

/// A click that was played.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub at_millis: u64,
    /// Position in the measure, starting at 0.
    pub position: usize,
    pub accent: Accent,
    pub gain: f32,
}

/// Scheduler bookkeeping between two ticks.
#[derive(Debug, Clone, Default)]
pub struct BeatState {
    last_beat: Option<u64>,
    position: usize,
    divisions: Vec<u32>,
    pattern: AccentPattern,
}

impl BeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the last beat so the next due check fires immediately, and
    /// rewinds to the top of the measure.
    pub fn reset(&mut self) {
        self.last_beat = None;
        self.position = 0;
    }

    pub fn pattern(&self) -> &AccentPattern {
        &self.pattern
    }

    /// Runs one poll at time `now`. Returns the beat if one was played.
    pub fn tick(
        &mut self,
        now: u64,
        rhythm: &RhythmModel,
        output: &mut AudioOutput,
        config: &SchedulerConfig,
    ) -> Option<Beat> {
        if !rhythm.playing() {
            self.reset();
            return None;
        }

        self.refresh_pattern(rhythm.divisions());
        if self.pattern.is_empty() {
            return None;
        }

        let interval = rhythm.beat_interval_ms();
        let due = self
            .last_beat
            .map_or(true, |last| now.saturating_sub(last) >= interval);
        if !due {
            return None;
        }

        output.trigger();
        self.last_beat = Some(now);

        if self.position >= self.pattern.len() {
            self.position = 0;
        }
        let accent = self.pattern[self.position];
        let gain = match accent {
            Accent::Accent => config.accent_gain,
            Accent::Plain => config.plain_gain,
        };
        output.set_gain(gain);

        let beat = Beat {
            at_millis: now,
            position: self.position,
            accent,
            gain,
        };
        self.position += 1;
        Some(beat)
    }

    fn refresh_pattern(&mut self, divisions: &[u32]) {
        if self.divisions != divisions {
            self.divisions = divisions.to_vec();
            self.pattern = accent::compile(divisions);
            tracing::debug!(?divisions, beats = self.pattern.len(), "accent pattern recompiled");
        }
    }
}

/// Whether the polling thread is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Stopped,
    Running,
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the polling thread. `start` and `stop` may be called from any thread,
/// any number of times.
pub struct BeatScheduler {
    reader: RhythmReader,
    output: SharedOutput,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    worker: Mutex<Option<Worker>>,
}

impl BeatScheduler {
    pub fn new(
        reader: RhythmReader,
        output: SharedOutput,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            reader,
            output,
            clock,
            config,
            worker: Mutex::new(None),
        }
    }

    pub fn status(&self) -> Result<SchedulerStatus> {
        let worker = self.lock_worker()?;
        Ok(match worker.as_ref() {
            Some(worker) if !worker.handle.is_finished() => SchedulerStatus::Running,
            _ => SchedulerStatus::Stopped,
        })
    }

    /// Spawns the polling thread unless it is already running.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.lock_worker()?;
        if let Some(existing) = worker.as_ref() {
            if !existing.handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(finished) = worker.take() {
            let _ = finished.handle.join();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let run = TickLoop {
            reader: self.reader.clone(),
            output: self.output.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name("beat-scheduler".into())
            .spawn(move || run.run())?;

        tracing::info!(tick_ms = self.config.tick_period_ms, "beat scheduler started");
        *worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Stops the polling thread. Once this returns no further click is
    /// triggered, except when called from the scheduler thread itself, where
    /// the current tick is left to finish.
    pub fn stop(&self) -> Result<()> {
        let Some(worker) = self.lock_worker()?.take() else {
            return Ok(());
        };

        worker.stop.store(true, Ordering::SeqCst);
        worker.handle.thread().unpark();
        if worker.handle.thread().id() != thread::current().id() {
            worker
                .handle
                .join()
                .map_err(|_| MetronomeError::msg("beat scheduler thread panicked"))?;
        }

        tracing::info!("beat scheduler stopped");
        Ok(())
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, Option<Worker>>> {
        self.worker
            .lock()
            .map_err(|_| MetronomeError::Poisoned("beat scheduler"))
    }
}

impl Drop for BeatScheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for BeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeatScheduler")
            .field("config", &self.config)
            .finish()
    }
}

struct TickLoop {
    reader: RhythmReader,
    output: SharedOutput,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    stop: Arc<AtomicBool>,
}

impl TickLoop {
    fn run(self) {
        let period = self.config.tick_period();
        let mut state = BeatState::new();

        while !self.stop.load(Ordering::SeqCst) {
            let now = self.clock.now_millis();
            let rhythm = self.reader.load();

            match self.output.lock() {
                Ok(mut output) => {
                    // stop() may have been called while waiting for the lock.
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(beat) = state.tick(now, &rhythm, &mut output, &self.config) {
                        tracing::trace!(?beat, "beat");
                    }
                }
                Err(err) => {
                    tracing::error!(%err, "beat scheduler giving up");
                    break;
                }
            }

            thread::park_timeout(period);
        }
    }
}
