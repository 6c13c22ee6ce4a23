//! Frame timing

use std::time::{Duration, Instant};

/// Per-frame clock driving the main loop
///
/// Deltas are clamped to `max_delta` so a breakpoint or a window drag does not
/// hand a multi-second step to gameplay and physics.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    elapsed: f64,
    delta: f32,
    max_delta: f32,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl FrameClock {
    /// Clock whose deltas never exceed `max_delta` seconds
    pub fn new(max_delta: f32) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            elapsed: 0.0,
            delta: 0.0,
            max_delta,
            frame_count: 0,
        }
    }

    /// Advance one frame, returning the clamped delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta = now
            .duration_since(self.last_tick)
            .as_secs_f32()
            .min(self.max_delta);
        self.last_tick = now;
        self.elapsed = now.duration_since(self.start).as_secs_f64();
        self.frame_count += 1;
        self.delta
    }

    /// Delta of the last tick
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Seconds from creation to the last tick
    ///
    /// Stays fixed between ticks, so everything in one frame sees the same time.
    pub fn now(&self) -> f64 {
        self.elapsed
    }

    /// Ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        let total = self.now() as f32;
        if total > 0.0 {
            self.frame_count as f32 / total
        } else {
            0.0
        }
    }
}

/// Measures how long something took, for log output
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start measuring now
    pub fn start_new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time since start in milliseconds
    pub fn elapsed_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new(0.0);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.tick(), 0.0);
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_delta_is_non_negative() {
        let mut clock = FrameClock::default();
        let dt = clock.tick();
        assert!(dt >= 0.0);
        assert!(dt <= 0.25);
    }
}
