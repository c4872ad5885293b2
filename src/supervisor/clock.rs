use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Last-activity timestamp shared between the draining loop and the
/// stall watchdog.
///
/// A single atomic holding milliseconds since construction. The watchdog
/// only needs second-level freshness, so relaxed ordering and a stale read
/// of one tick are fine.
#[derive(Debug)]
pub struct ActivityClock {
    base: Instant,
    last_activity_ms: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    /// Record "now" as the last activity time
    pub fn touch(&self) {
        let now = self.base.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    /// Elapsed time since the last touch
    pub fn idle(&self) -> Duration {
        let now = self.base.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_idle_starts_near_zero() {
        let clock = ActivityClock::new();
        assert!(clock.idle() < Duration::from_millis(100));
    }

    #[test]
    fn clock_touch_resets_idle() {
        let clock = ActivityClock::new();
        std::thread::sleep(Duration::from_millis(30));
        assert!(clock.idle() >= Duration::from_millis(25));

        clock.touch();
        assert!(clock.idle() < Duration::from_millis(25));
    }
}
