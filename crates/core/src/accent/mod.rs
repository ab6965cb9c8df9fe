use std::ops::Index;

use serde::{Deserialize, Serialize};

/// Emphasis of one beat in a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accent {
    /// First beat of a group, played louder.
    Accent,
    Plain,
}

/// Flat, one-entry-per-beat view of a list of divisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccentPattern {
    beats: Vec<Accent>,
}

impl AccentPattern {
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Accent> {
        self.beats.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Accent] {
        &self.beats
    }

    /// Indices of the accented beats.
    pub fn accent_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.beats
            .iter()
            .enumerate()
            .filter(|(_, accent)| **accent == Accent::Accent)
            .map(|(index, _)| index)
    }
}

impl Index<usize> for AccentPattern {
    type Output = Accent;

    fn index(&self, index: usize) -> &Self::Output {
        &self.beats[index]
    }
}

/// Expands divisions into one accent followed by `beats - 1` plain beats per
/// group. Empty groups, including the sentinel, contribute nothing.
///
/// `[4, 2, 3, 0]` becomes `A P P P A P A P P`.
pub fn compile(divisions: &[u32]) -> AccentPattern {
    let beats = divisions
        .iter()
        .filter(|&&beats| beats > 0)
        .flat_map(|&beats| {
            std::iter::once(Accent::Accent)
                .chain(std::iter::repeat(Accent::Plain).take(beats as usize - 1))
        })
        .collect();

    AccentPattern { beats }
}
