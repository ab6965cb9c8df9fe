use crate::{config::TapConfig, rhythm};

/// Turns a sequence of taps into a tempo.
///
/// Only the last tap is remembered: every new tap yields the tempo implied by
/// the gap to the previous one.
#[derive(Debug, Clone, Default)]
pub struct TapTempoEstimator {
    last_tap: Option<u64>,
    idle_reset_ms: Option<u64>,
}

impl TapTempoEstimator {
    pub fn new(config: &TapConfig) -> Self {
        Self {
            last_tap: None,
            idle_reset_ms: config.idle_reset_ms,
        }
    }

    /// Records a tap at `now` (monotonic milliseconds) and returns the new
    /// tempo, or `None` when this tap starts a sequence.
    pub fn on_tap(&mut self, now: u64) -> Option<u32> {
        let previous = self.last_tap.replace(now)?;
        let delta = now.saturating_sub(previous);

        if self.idle_reset_ms.is_some_and(|idle| delta > idle) {
            tracing::debug!(delta, "tap gap too long, starting a new sequence");
            return None;
        }

        if delta == 0 {
            return Some(rhythm::MAX_BPM);
        }

        let bpm = (60_000.0 / delta as f64).round() as i64;
        Some(rhythm::clamp_bpm(bpm))
    }

    /// Forgets the previous tap.
    pub fn reset(&mut self) {
        self.last_tap = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> TapTempoEstimator {
        TapTempoEstimator::new(&TapConfig::default())
    }

    #[test]
    fn first_tap_yields_nothing() {
        let mut tap = estimator();
        assert_eq!(tap.on_tap(1_000), None);
    }

    #[test]
    fn half_second_gap_is_120_bpm() {
        let mut tap = estimator();
        tap.on_tap(10_000);
        assert_eq!(tap.on_tap(10_500), Some(120));
        assert_eq!(tap.on_tap(11_250), Some(80));
    }

    #[test]
    fn rounds_to_nearest_bpm() {
        let mut tap = estimator();
        tap.on_tap(0);
        // 60000 / 433 = 138.56
        assert_eq!(tap.on_tap(433), Some(139));
    }

    #[test]
    fn tiny_and_zero_gaps_clamp_to_max_tempo() {
        let mut tap = estimator();
        tap.on_tap(5);
        assert_eq!(tap.on_tap(6), Some(rhythm::MAX_BPM));
        assert_eq!(tap.on_tap(6), Some(rhythm::MAX_BPM));
    }

    #[test]
    fn long_pause_restarts_the_sequence() {
        let mut tap = estimator();
        tap.on_tap(0);
        assert_eq!(tap.on_tap(5_000), None);
        assert_eq!(tap.on_tap(5_600), Some(100));
    }

    #[test]
    fn without_idle_reset_slow_taps_clamp_to_min_tempo() {
        let mut tap = TapTempoEstimator::new(&TapConfig {
            idle_reset_ms: None,
        });
        tap.on_tap(0);
        assert_eq!(tap.on_tap(30_000), Some(2));
        assert_eq!(tap.on_tap(200_000), Some(rhythm::MIN_BPM));
    }

    #[test]
    fn reset_forgets_previous_tap() {
        let mut tap = estimator();
        tap.on_tap(0);
        tap.reset();
        assert_eq!(tap.on_tap(500), None);
    }
}
