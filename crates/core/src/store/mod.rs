use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{
    rhythm::{RhythmModel, DEFAULT_BPM, DEFAULT_DIVISIONS},
    MetronomeError, Result,
};

/// Storage for the rhythm between sessions.
pub trait RhythmStore: Send {
    /// Returns the saved rhythm, or the default rhythm if nothing was saved.
    fn load(&self) -> Result<RhythmModel>;

    /// Persists `rhythm`. Empty divisions and a zero tempo are rejected.
    fn save(&self, rhythm: &RhythmModel) -> Result<()>;
}

/// On-disk shape of a rhythm: the tempo and the divisions joined by commas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRhythm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub div: Option<String>,
}

impl StoredRhythm {
    pub fn from_model(rhythm: &RhythmModel) -> Result<Self> {
        check_savable(rhythm)?;
        Ok(Self {
            bpm: Some(rhythm.bpm()),
            div: Some(serialize_divisions(rhythm.divisions())),
        })
    }

    /// Missing or unreadable fields fall back to their defaults.
    pub fn to_model(&self) -> RhythmModel {
        let bpm = self.bpm.unwrap_or(DEFAULT_BPM);
        let divisions = self
            .div
            .as_deref()
            .and_then(deserialize_divisions)
            .unwrap_or_else(|| DEFAULT_DIVISIONS.to_vec());
        RhythmModel::new(bpm, divisions)
    }
}

pub fn serialize_divisions(divisions: &[u32]) -> String {
    divisions
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses `"4,2,3"`. Returns `None` for anything malformed.
pub fn deserialize_divisions(serialized: &str) -> Option<Vec<u32>> {
    let divisions = serialized
        .split(',')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    if divisions.is_empty() {
        None
    } else {
        Some(divisions)
    }
}

fn check_savable(rhythm: &RhythmModel) -> Result<()> {
    if rhythm.divisions().is_empty() {
        return Err(MetronomeError::InvalidRhythm("divisions cannot be empty"));
    }
    if rhythm.bpm() == 0 {
        return Err(MetronomeError::InvalidRhythm("bpm must be positive"));
    }
    Ok(())
}

/// Keeps the rhythm in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RhythmStore for JsonFileStore {
    fn load(&self) -> Result<RhythmModel> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?self.path, "no saved rhythm, using defaults");
                return Ok(RhythmModel::default());
            }
            Err(err) => return Err(err.into()),
        };

        let stored: StoredRhythm = serde_json::from_str(&raw)?;
        Ok(stored.to_model())
    }

    fn save(&self, rhythm: &RhythmModel) -> Result<()> {
        let stored = StoredRhythm::from_model(rhythm)?;
        let json = serde_json::to_string_pretty(&stored)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = ?self.path, %rhythm, "rhythm saved");
        Ok(())
    }
}

/// Keeps the rhythm in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    stored: Arc<Mutex<StoredRhythm>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rhythm(rhythm: &RhythmModel) -> Result<Self> {
        Ok(Self {
            stored: Arc::new(Mutex::new(StoredRhythm::from_model(rhythm)?)),
        })
    }

    pub fn stored(&self) -> Result<StoredRhythm> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoredRhythm>> {
        self.stored
            .lock()
            .map_err(|_| MetronomeError::Poisoned("memory store"))
    }
}

impl RhythmStore for MemoryStore {
    fn load(&self) -> Result<RhythmModel> {
        Ok(self.lock()?.to_model())
    }

    fn save(&self, rhythm: &RhythmModel) -> Result<()> {
        let stored = StoredRhythm::from_model(rhythm)?;
        *self.lock()? = stored;
        Ok(())
    }
}
