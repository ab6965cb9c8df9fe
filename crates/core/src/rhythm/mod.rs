use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_BPM: u32 = 1;
pub const MAX_BPM: u32 = 500;
pub const DEFAULT_BPM: u32 = 120;

/// Upper bound on the number of beats in one group.
pub const MAX_BEATS_PER_GROUP: u32 = 16;

/// Divisions of a freshly created rhythm: one beat plus the sentinel.
pub const DEFAULT_DIVISIONS: [u32; 2] = [1, 0];

/// Clamps a tempo into `MIN_BPM..=MAX_BPM`.
pub fn clamp_bpm(bpm: i64) -> u32 {
    bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32
}

/// Immutable snapshot of everything the scheduler needs to know.
///
/// `divisions` lists the beat count of each metrical group, for example
/// `[4, 2, 3, 0]` is a nine beat measure felt as 4 + 2 + 3. The trailing `0` is
/// the slot where another group can be added. Keeping that list valid is the
/// job of [`SubdivisionEditor`](crate::SubdivisionEditor); this type only
/// guarantees the tempo range.
///
/// `new` and `with_divisions` accept any list, even an empty one. Only
/// snapshots published by [`RhythmRepository`](crate::RhythmRepository) are
/// guaranteed to hold valid divisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmModel {
    bpm: u32,
    divisions: Vec<u32>,
    #[serde(default)]
    playing: bool,
}

impl Default for RhythmModel {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            divisions: DEFAULT_DIVISIONS.to_vec(),
            playing: false,
        }
    }
}

impl RhythmModel {
    pub fn new(bpm: u32, divisions: Vec<u32>) -> Self {
        Self {
            bpm: clamp_bpm(bpm as i64),
            divisions,
            playing: false,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn divisions(&self) -> &[u32] {
        &self.divisions
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn with_bpm(&self, bpm: u32) -> Self {
        Self {
            bpm: clamp_bpm(bpm as i64),
            ..self.clone()
        }
    }

    pub fn with_divisions(&self, divisions: Vec<u32>) -> Self {
        Self {
            divisions,
            ..self.clone()
        }
    }

    pub fn with_playing(&self, playing: bool) -> Self {
        Self {
            playing,
            ..self.clone()
        }
    }

    /// Milliseconds between two clicks at the current tempo.
    pub fn beat_interval_ms(&self) -> u64 {
        60_000 / u64::from(self.bpm.max(MIN_BPM))
    }

    /// The non-empty groups, in order.
    pub fn groups(&self) -> impl Iterator<Item = u32> + '_ {
        self.divisions.iter().copied().filter(|&beats| beats > 0)
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.groups().sum()
    }
}

impl fmt::Display for RhythmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self.groups().map(|beats| beats.to_string()).collect();
        if groups.is_empty() {
            write!(f, "- @ {} bpm", self.bpm)
        } else {
            write!(f, "{} @ {} bpm", groups.join("+"), self.bpm)
        }
    }
}
