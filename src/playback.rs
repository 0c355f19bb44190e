// src/playback.rs - Run/pause state and bounded speed multiplier
use std::time::Duration;

use crate::config::PlaybackConfig;

/// Owns the run flag and the speed multiplier, and derives the wall-clock
/// tick interval the virtual clock runs at. Speed changes outside the
/// configured range are silently rejected; that is a clamp, not an error.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    speed: f64,
    min_speed: f64,
    max_speed: f64,
    base_tick: Duration,
    base_segment: Duration,
    running: bool,
    initialized: bool,
}

impl PlaybackController {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            speed: 1.0,
            min_speed: config.min_speed,
            max_speed: config.max_speed,
            base_tick: Duration::from_millis(config.base_tick_ms),
            base_segment: Duration::from_millis(config.segment_base_ms),
            running: false,
            initialized: false,
        }
    }

    /// Apply a speed request. A factor of exactly `1` resets to 1.0; any
    /// other factor multiplies the current speed. Returns whether the
    /// change was applied.
    pub fn set_speed(&mut self, factor: f64) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        if factor == 1.0 {
            self.speed = 1.0;
            return true;
        }
        let candidate = self.speed * factor;
        if candidate < self.min_speed || candidate > self.max_speed {
            tracing::debug!(
                "Speed request x{} rejected: {} outside [{}, {}]",
                factor,
                candidate,
                self.min_speed,
                self.max_speed
            );
            return false;
        }
        self.speed = candidate;
        true
    }

    pub fn reset_speed(&mut self) {
        self.speed = 1.0;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Wall-clock period between virtual-minute advances. Higher speed,
    /// proportionally shorter interval.
    pub fn tick_interval(&self) -> Duration {
        self.base_tick.div_f64(self.speed)
    }

    /// Wall-clock time to traverse one route segment at the current speed.
    pub fn segment_duration(&self) -> Duration {
        self.base_segment.div_f64(self.speed)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Whether the one-time remote initialization has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn clear_initialized(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;

    fn controller() -> PlaybackController {
        PlaybackController::new(&PlaybackConfig::default())
    }

    #[test]
    fn test_speed_starts_at_one() {
        let pb = controller();
        assert_eq!(pb.speed(), 1.0);
        assert_eq!(pb.tick_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_halve_and_double_within_bounds() {
        let mut pb = controller();
        assert!(pb.set_speed(0.5));
        assert_eq!(pb.speed(), 0.5);
        assert!(pb.set_speed(2.0));
        assert_eq!(pb.speed(), 1.0);
        assert!(pb.set_speed(2.0));
        assert_eq!(pb.speed(), 2.0);
    }

    #[test]
    fn test_out_of_range_request_is_silently_rejected() {
        let mut pb = controller();
        assert!(pb.set_speed(2.0));
        // Already at the ceiling; another doubling would leave the range.
        assert!(!pb.set_speed(2.0));
        assert_eq!(pb.speed(), 2.0);
        assert!(pb.set_speed(0.5));
        assert!(pb.set_speed(0.5));
        assert!(!pb.set_speed(0.5));
        assert_eq!(pb.speed(), 0.5);
    }

    #[test]
    fn test_clamp_holds_for_any_nudge_sequence() {
        let mut pb = controller();
        let nudges = [2.0, 2.0, 0.5, 2.0, 2.0, 2.0, 0.5, 0.5, 0.5, 0.5, 2.0, 1.0, 0.5];
        for factor in nudges {
            pb.set_speed(factor);
            assert!(pb.speed() >= 0.5 && pb.speed() <= 2.0);
        }
    }

    #[test]
    fn test_factor_one_resets_exactly() {
        let mut pb = controller();
        pb.set_speed(0.5);
        assert!(pb.set_speed(1.0));
        assert_eq!(pb.speed(), 1.0);
    }

    #[test]
    fn test_interval_inverse_to_speed() {
        let mut pb = controller();
        pb.set_speed(2.0);
        assert_eq!(pb.tick_interval(), Duration::from_millis(500));
        assert_eq!(pb.segment_duration(), Duration::from_millis(750));
        pb.set_speed(1.0);
        pb.set_speed(0.5);
        assert_eq!(pb.tick_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_garbage_factors_rejected() {
        let mut pb = controller();
        assert!(!pb.set_speed(0.0));
        assert!(!pb.set_speed(-1.0));
        assert!(!pb.set_speed(f64::NAN));
        assert_eq!(pb.speed(), 1.0);
    }
}
