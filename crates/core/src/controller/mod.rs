use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    audio::{AudioSink, SharedOutput},
    clock::Clock,
    config::AppConfig,
    editor::SubdivisionEditor,
    repo::{RhythmReader, RhythmRepository},
    rhythm::{self, RhythmModel},
    scheduler::{BeatScheduler, SchedulerStatus},
    store::RhythmStore,
    tap::TapTempoEstimator,
    MetronomeError, Result,
};

/// Front door of the metronome: every user gesture ends up here.
///
/// Edits are published through the [`RhythmRepository`]; the play state also
/// starts or stops the [`BeatScheduler`]. `start_service` and `stop_service`
/// bracket a session: they own audio set-up and persistence.
pub struct Metronome<S> {
    repo: RhythmRepository<S>,
    output: SharedOutput,
    scheduler: BeatScheduler,
    clock: Arc<dyn Clock>,
    tap: Mutex<TapTempoEstimator>,
    // Held while the play flag is published and the scheduler follows it.
    transport: Mutex<()>,
}

impl<S: RhythmStore> Metronome<S> {
    pub fn new(
        store: S,
        sink: Box<dyn AudioSink>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Result<Self> {
        config.validate()?;

        let repo = RhythmRepository::new(store, SubdivisionEditor::new(&config.editor));
        let output = SharedOutput::new(sink);
        let scheduler = BeatScheduler::new(
            repo.reader(),
            output.clone(),
            Arc::clone(&clock),
            config.scheduler.clone(),
        );

        Ok(Self {
            repo,
            output,
            scheduler,
            clock,
            tap: Mutex::new(TapTempoEstimator::new(&config.tap)),
            transport: Mutex::new(()),
        })
    }

    pub fn rhythm(&self) -> Arc<RhythmModel> {
        self.repo.current()
    }

    pub fn reader(&self) -> RhythmReader {
        self.repo.reader()
    }

    pub fn scheduler_status(&self) -> Result<SchedulerStatus> {
        self.scheduler.status()
    }

    /// Prepares audio and restores the saved rhythm. An audio failure is not
    /// fatal: the metronome keeps working, silently.
    pub fn start_service(&self) -> Result<()> {
        self.output.set_up()?;
        let _transport = self.lock_transport()?;
        let rhythm = self.repo.load()?;
        if rhythm.playing() {
            self.scheduler.start()?;
        }
        tracing::info!(%rhythm, "metronome service started");
        Ok(())
    }

    /// Stops playback, releases audio and saves the rhythm.
    pub fn stop_service(&self) -> Result<()> {
        let _transport = self.lock_transport()?;
        self.scheduler.stop()?;
        self.output.tear_down()?;
        if let Err(err) = self.repo.save() {
            tracing::warn!(%err, "could not save rhythm");
        }
        tracing::info!("metronome service stopped");
        Ok(())
    }

    /// Publishes the play state and starts or stops the scheduler to match.
    /// Concurrent calls are applied one at a time, so the scheduler always
    /// agrees with the last published state.
    pub fn set_playing(&self, playing: bool) -> Result<Arc<RhythmModel>> {
        let _transport = self.lock_transport()?;
        self.apply_playing(playing)
    }

    pub fn toggle_playing(&self) -> Result<Arc<RhythmModel>> {
        let _transport = self.lock_transport()?;
        self.apply_playing(!self.rhythm().playing())
    }

    fn apply_playing(&self, playing: bool) -> Result<Arc<RhythmModel>> {
        let rhythm = self.repo.set_playing(playing)?;
        if playing {
            self.scheduler.start()?;
        } else {
            self.scheduler.stop()?;
        }
        tracing::info!(playing, "play state changed");
        Ok(rhythm)
    }

    pub fn set_tempo(&self, bpm: i64) -> Result<Arc<RhythmModel>> {
        self.repo.set_tempo(rhythm::clamp_bpm(bpm))
    }

    pub fn nudge_tempo(&self, delta: i64) -> Result<Arc<RhythmModel>> {
        let bpm = i64::from(self.rhythm().bpm()) + delta;
        self.set_tempo(bpm)
    }

    /// Registers a tap now. Returns the new rhythm when the tap changed the
    /// tempo.
    pub fn tap(&self) -> Result<Option<Arc<RhythmModel>>> {
        let now = self.clock.now_millis();
        let bpm = self.lock_tap()?.on_tap(now);
        bpm.map(|bpm| self.repo.set_tempo(bpm)).transpose()
    }

    pub fn set_group(&self, index: usize, beats: i64) -> Result<Arc<RhythmModel>> {
        let editor = *self.repo.editor();
        self.repo.update(|rhythm| {
            rhythm.with_divisions(editor.set_group(rhythm.divisions(), index, beats))
        })
    }

    pub fn nudge_group(&self, index: usize, delta: i64) -> Result<Arc<RhythmModel>> {
        let editor = *self.repo.editor();
        self.repo.update(|rhythm| {
            rhythm.with_divisions(editor.adjust_group(rhythm.divisions(), index, delta))
        })
    }

    pub fn set_divisions(&self, divisions: &[u32]) -> Result<Arc<RhythmModel>> {
        self.repo.set_divisions(divisions)
    }

    fn lock_transport(&self) -> Result<MutexGuard<'_, ()>> {
        self.transport
            .lock()
            .map_err(|_| MetronomeError::Poisoned("transport"))
    }

    fn lock_tap(&self) -> Result<MutexGuard<'_, TapTempoEstimator>> {
        self.tap
            .lock()
            .map_err(|_| MetronomeError::Poisoned("tap tempo"))
    }
}

impl<S> std::fmt::Debug for Metronome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
