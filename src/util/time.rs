//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const SNAPSHOT_TPS: u32 = 20; // 20 snapshots per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;
pub const SNAPSHOT_INTERVAL_MICROS: u64 = 1_000_000 / SNAPSHOT_TPS as u64;

/// Length of one simulation tick in milliseconds
pub const TICK_MS: f32 = 1000.0 / SIMULATION_TPS as f32;

/// Length of one simulation tick in seconds
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Convert a per-second rate into the amount applied on a single tick
pub fn per_tick(per_second: f32) -> f32 {
    per_second * tick_delta()
}

/// Monotonic millisecond clock for a match.
///
/// Gameplay deadlines are stored as milliseconds since the clock started so the
/// world never reads the system clock itself; the runtime samples this and
/// passes `now` down.
#[derive(Debug, Clone)]
pub struct MatchClock {
    start: Instant,
    /// Offset so that `now_ms` never returns 0, which is reserved for "idle"
    /// timers on the player.
    offset_ms: u64,
}

impl MatchClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: 1,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64 + self.offset_ms
    }
}

impl Default for MatchClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_match_cadence() {
        assert_eq!(TICK_DURATION_MICROS, 16_666);
        assert_eq!(SNAPSHOT_INTERVAL_MICROS, 50_000);
        assert!((per_tick(60.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn match_clock_is_monotonic_and_nonzero() {
        let clock = MatchClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(a >= 1);
        assert!(b >= a);
    }
}
