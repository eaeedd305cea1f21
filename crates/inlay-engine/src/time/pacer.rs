use std::time::{Duration, Instant};

/// Fixed-interval frame pacing.
///
/// The interval is `1000 / rate` milliseconds. A rate of zero disables pacing
/// entirely and the loop runs as fast as frames complete.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FramePacer {
    interval: Duration,
}

impl FramePacer {
    pub fn from_rate(frames_per_second: u32) -> Self {
        let interval = if frames_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(1_000_000 / u64::from(frames_per_second))
        };
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the current interval after `elapsed` was spent on a frame.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Sleeps out the rest of the interval that began at `frame_start`.
    pub fn pace(&self, frame_start: Instant) {
        let remaining = self.remaining(frame_start.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::from_rate(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_follows_rate() {
        assert_eq!(FramePacer::from_rate(60).interval(), Duration::from_micros(16_666));
        assert_eq!(FramePacer::from_rate(1000).interval(), Duration::from_millis(1));
        assert_eq!(FramePacer::from_rate(0).interval(), Duration::ZERO);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let pacer = FramePacer::from_rate(100);
        assert_eq!(pacer.remaining(Duration::from_millis(4)), Duration::from_millis(6));
        assert_eq!(pacer.remaining(Duration::from_millis(10)), Duration::ZERO);
        assert_eq!(pacer.remaining(Duration::from_millis(25)), Duration::ZERO);
    }

    #[test]
    fn pace_sleeps_out_the_interval() {
        let pacer = FramePacer::from_rate(50);
        let start = Instant::now();
        pacer.pace(start);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
