//! Core library for the subdivided metronome.
//!
//! A rhythm is a tempo plus a list of beat groups such as `4+2+3`. The first
//! beat of every group is accented. Each module owns one piece of the
//! pipeline: editing the groups, estimating tempo from taps, compiling the
//! accent pattern, polling for due beats and persisting the rhythm.

pub mod accent;
pub mod audio;
pub mod clock;
pub mod config;
pub mod controller;
pub mod editor;
pub mod error;
pub mod repo;
pub mod rhythm;
pub mod scheduler;
pub mod store;
pub mod tap;

pub use accent::{compile, Accent, AccentPattern};
pub use audio::{AudioOutput, AudioSink, NullSink, SharedOutput};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AppConfig, EditorConfig, SchedulerConfig, TapConfig};
pub use controller::Metronome;
pub use editor::{DragStepper, SubdivisionEditor};
pub use error::{MetronomeError, Result};
pub use repo::{RhythmReader, RhythmRepository};
pub use rhythm::RhythmModel;
pub use scheduler::{Beat, BeatScheduler, BeatState, SchedulerStatus};
pub use store::{JsonFileStore, MemoryStore, RhythmStore, StoredRhythm};
pub use tap::TapTempoEstimator;
