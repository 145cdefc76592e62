//! Frame timing for the streaming tick.

use std::time::{Duration, Instant};

/// Tracks delta time and elapsed time across ticks.
#[derive(Debug)]
pub struct Time {
    start_time: Instant,
    last_tick: Instant,
    delta: Duration,
    elapsed: Duration,
    tick_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_tick: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            tick_count: 0,
        }
    }

    /// Update timing at the start of a new tick.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_tick;
        self.last_tick = now;
        self.elapsed = now - self.start_time;
        self.tick_count += 1;
    }

    /// Delta time of the last tick in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_counters() {
        let mut time = Time::new();
        assert_eq!(time.tick_count(), 0);
        std::thread::sleep(Duration::from_millis(2));
        time.update();
        assert_eq!(time.tick_count(), 1);
        assert!(time.delta_seconds() > 0.0);
        assert!(time.elapsed_seconds() >= time.delta_seconds());
    }
}
