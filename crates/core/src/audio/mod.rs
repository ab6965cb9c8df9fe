use std::sync::{Arc, Mutex, MutexGuard};

use crate::{MetronomeError, Result};

/// Quietest gain a sink is ever asked to play at.
pub const MIN_GAIN: f32 = 0.0;
/// Loudest gain a sink is ever asked to play at.
pub const MAX_GAIN: f32 = 2.0;

/// Audio backend that plays a single click sample.
pub trait AudioSink: Send {
    /// Opens the output stream and loads the click. Returns `false` on failure.
    fn set_up(&mut self) -> bool;

    fn tear_down(&mut self);

    /// Plays the click from its start.
    fn trigger(&mut self);

    /// Gain of the click just triggered and any that follow, within
    /// `MIN_GAIN..=MAX_GAIN`. The scheduler calls it right after `trigger`.
    fn set_gain(&mut self, gain: f32);
}

/// Sink that discards everything. Useful when no audio device is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn set_up(&mut self) -> bool {
        true
    }

    fn tear_down(&mut self) {}

    fn trigger(&mut self) {}

    fn set_gain(&mut self, _gain: f32) {}
}

/// Wraps a sink and only forwards clicks while it is set up.
pub struct AudioOutput {
    sink: Box<dyn AudioSink>,
    ready: bool,
}

impl AudioOutput {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self { sink, ready: false }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Prepares the sink. A failure is logged and leaves the output silent
    /// until a later call succeeds.
    pub fn set_up(&mut self) -> bool {
        if self.ready {
            return true;
        }

        self.ready = self.sink.set_up();
        if self.ready {
            tracing::info!("audio output ready");
        } else {
            tracing::warn!("audio output failed to set up, clicks will be silent");
        }
        self.ready
    }

    pub fn tear_down(&mut self) {
        if self.ready {
            self.sink.tear_down();
            self.ready = false;
            tracing::info!("audio output torn down");
        }
    }

    pub fn trigger(&mut self) {
        if self.ready {
            self.sink.trigger();
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        if self.ready {
            self.sink.set_gain(gain.clamp(MIN_GAIN, MAX_GAIN));
        }
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput")
            .field("ready", &self.ready)
            .finish()
    }
}

/// Thread-safe handle to the audio output shared by the controller and the
/// scheduler thread.
#[derive(Debug, Clone)]
pub struct SharedOutput {
    shared: Arc<Mutex<AudioOutput>>,
}

impl SharedOutput {
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(AudioOutput::new(sink))),
        }
    }

    pub fn set_up(&self) -> Result<bool> {
        Ok(self.lock()?.set_up())
    }

    pub fn tear_down(&self) -> Result<()> {
        self.lock()?.tear_down();
        Ok(())
    }

    pub fn is_ready(&self) -> Result<bool> {
        Ok(self.lock()?.is_ready())
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, AudioOutput>> {
        self.shared
            .lock()
            .map_err(|_| MetronomeError::Poisoned("audio output"))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub(crate) enum SinkEvent {
        SetUp,
        TearDown,
        Trigger,
        Gain(f32),
    }

    /// Sink that records every call for later inspection.
    #[derive(Debug, Clone)]
    pub(crate) struct RecordingSink {
        events: Arc<Mutex<Vec<SinkEvent>>>,
        set_up_succeeds: bool,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Self {
            Self {
                events: Arc::default(),
                set_up_succeeds: true,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                set_up_succeeds: false,
                ..Self::new()
            }
        }

        pub(crate) fn events(&self) -> Vec<SinkEvent> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn triggers(&self) -> usize {
            self.events()
                .iter()
                .filter(|event| **event == SinkEvent::Trigger)
                .count()
        }

        pub(crate) fn gains(&self) -> Vec<f32> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    SinkEvent::Gain(gain) => Some(gain),
                    _ => None,
                })
                .collect()
        }

        fn push(&self, event: SinkEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl AudioSink for RecordingSink {
        fn set_up(&mut self) -> bool {
            self.push(SinkEvent::SetUp);
            self.set_up_succeeds
        }

        fn tear_down(&mut self) {
            self.push(SinkEvent::TearDown);
        }

        fn trigger(&mut self) {
            self.push(SinkEvent::Trigger);
        }

        fn set_gain(&mut self, gain: f32) {
            self.push(SinkEvent::Gain(gain));
        }
    }
}
