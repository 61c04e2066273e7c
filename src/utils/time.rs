use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Process-wide anchor for monotonic timestamps
static ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Timer for measuring operation latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

/// Clock utilities
pub struct Clock;

impl Clock {
    /// Nanoseconds since the first call in this process.
    ///
    /// Backed by `Instant`, so it never goes backwards even if the wall
    /// clock is adjusted. Used to stamp order arrival for FIFO ordering.
    pub fn monotonic_nanos() -> u64 {
        let anchor = ANCHOR.get_or_init(Instant::now);
        anchor.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::start();
        thread::sleep(Duration::from_millis(1));
        let elapsed = timer.stop();

        assert!(elapsed >= Duration::from_millis(1));
    }

    #[test]
    fn test_monotonic_nanos_never_decreases() {
        let mut last = Clock::monotonic_nanos();
        for _ in 0..1000 {
            let now = Clock::monotonic_nanos();
            assert!(now >= last);
            last = now;
        }

        thread::sleep(Duration::from_millis(1));
        assert!(Clock::monotonic_nanos() > last);
    }
}
