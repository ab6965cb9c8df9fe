use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use arc_swap::ArcSwap;

use crate::{
    editor::SubdivisionEditor, rhythm::RhythmModel, store::RhythmStore, MetronomeError, Result,
};

/// Read-only handle on the current rhythm.
///
/// Every `load` returns one whole snapshot, so tempo and divisions always come
/// from the same edit.
#[derive(Debug, Clone)]
pub struct RhythmReader {
    slot: Arc<ArcSwap<RhythmModel>>,
}

impl RhythmReader {
    pub fn load(&self) -> Arc<RhythmModel> {
        self.slot.load_full()
    }
}

/// Owner of the current rhythm and the only way to change it.
///
/// Edits publish a fresh snapshot which readers, the beat scheduler among
/// them, pick up on their next poll. Nothing is written to the store until
/// [`save`](Self::save) is called.
#[derive(Debug)]
pub struct RhythmRepository<S> {
    slot: Arc<ArcSwap<RhythmModel>>,
    // Serializes read-modify-write edits from several control threads.
    writer: Mutex<()>,
    established: AtomicBool,
    editor: SubdivisionEditor,
    store: S,
}

impl<S: RhythmStore> RhythmRepository<S> {
    pub fn new(store: S, editor: SubdivisionEditor) -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(RhythmModel::default())),
            writer: Mutex::new(()),
            established: AtomicBool::new(false),
            editor,
            store,
        }
    }

    pub fn reader(&self) -> RhythmReader {
        RhythmReader {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn current(&self) -> Arc<RhythmModel> {
        self.slot.load_full()
    }

    pub fn editor(&self) -> &SubdivisionEditor {
        &self.editor
    }

    /// Whether a rhythm has been loaded or edited, i.e. whether `save` will
    /// write anything.
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) -> Result<Arc<RhythmModel>> {
        self.publish(|rhythm| rhythm.with_playing(playing))
    }

    pub fn set_tempo(&self, bpm: u32) -> Result<Arc<RhythmModel>> {
        let next = self.publish(|rhythm| rhythm.with_bpm(bpm))?;
        self.established.store(true, Ordering::Release);
        Ok(next)
    }

    /// Replaces the divisions. The list is repaired if it breaks any
    /// invariant.
    pub fn set_divisions(&self, divisions: &[u32]) -> Result<Arc<RhythmModel>> {
        let divisions = self.editor.sanitize(divisions);
        let next = self.publish(|rhythm| rhythm.with_divisions(divisions))?;
        self.established.store(true, Ordering::Release);
        Ok(next)
    }

    /// Applies `edit` to the current rhythm and publishes the result. The
    /// divisions of the result are repaired like in `set_divisions`.
    pub fn update<F>(&self, edit: F) -> Result<Arc<RhythmModel>>
    where
        F: FnOnce(&RhythmModel) -> RhythmModel,
    {
        let next = self.publish(|rhythm| {
            let edited = edit(rhythm);
            let divisions = self.editor.sanitize(edited.divisions());
            edited.with_divisions(divisions)
        })?;
        self.established.store(true, Ordering::Release);
        Ok(next)
    }

    /// Replaces the current rhythm with the stored one, keeping the play
    /// state. A failing store is logged and yields the default rhythm.
    pub fn load(&self) -> Result<Arc<RhythmModel>> {
        let loaded = self.store.load().unwrap_or_else(|err| {
            tracing::warn!(%err, "could not load saved rhythm, using defaults");
            RhythmModel::default()
        });
        let divisions = self.editor.sanitize(loaded.divisions());

        let next = self.publish(|rhythm| {
            loaded
                .with_divisions(divisions)
                .with_playing(rhythm.playing())
        })?;
        self.established.store(true, Ordering::Release);
        tracing::info!(rhythm = %next, "rhythm loaded");
        Ok(next)
    }

    /// Writes the current rhythm to the store, unless nothing was loaded or
    /// edited yet.
    pub fn save(&self) -> Result<()> {
        if !self.is_established() {
            tracing::debug!("no rhythm established yet, skipping save");
            return Ok(());
        }
        self.store.save(&self.current())
    }

    fn publish<F>(&self, edit: F) -> Result<Arc<RhythmModel>>
    where
        F: FnOnce(&RhythmModel) -> RhythmModel,
    {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| MetronomeError::Poisoned("rhythm writer"))?;

        let current = self.slot.load_full();
        let next = Arc::new(edit(&current));
        if *next != *current {
            self.slot.store(Arc::clone(&next));
        }
        Ok(next)
    }
}
