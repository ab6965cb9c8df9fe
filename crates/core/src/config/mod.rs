use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{audio, MetronomeError, Result};

/// Shortest and longest poll periods the scheduler accepts, in milliseconds.
pub const TICK_PERIOD_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=30;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub tap: TapConfig,
    pub editor: EditorConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections use their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()
    }
}

/// Timing and gain settings for the beat scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_period_ms: u64,
    pub accent_gain: f32,
    pub plain_gain: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 10,
            accent_gain: 1.8,
            plain_gain: 0.4,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !TICK_PERIOD_RANGE_MS.contains(&self.tick_period_ms) {
            return Err(MetronomeError::InvalidConfig(format!(
                "tick period {}ms outside of {}..={}ms",
                self.tick_period_ms,
                TICK_PERIOD_RANGE_MS.start(),
                TICK_PERIOD_RANGE_MS.end()
            )));
        }

        for (name, gain) in [("accent", self.accent_gain), ("plain", self.plain_gain)] {
            if !(audio::MIN_GAIN..=audio::MAX_GAIN).contains(&gain) {
                return Err(MetronomeError::InvalidConfig(format!(
                    "{name} gain {gain} outside of {}..={}",
                    audio::MIN_GAIN,
                    audio::MAX_GAIN
                )));
            }
        }

        Ok(())
    }
}

/// Settings for tap tempo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Taps further apart than this start a new sequence. `None` keeps every
    /// pair of taps, however far apart.
    pub idle_reset_ms: Option<u64>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            idle_reset_ms: Some(2_000),
        }
    }
}

/// Settings for subdivision editing and drag translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum length of the division list, sentinel included.
    pub max_groups: Option<usize>,
    pub tempo_drag_threshold: f32,
    pub group_drag_threshold: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_groups: Some(4),
            tempo_drag_threshold: 10.0,
            group_drag_threshold: 35.0,
        }
    }
}
