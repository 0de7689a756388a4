//! Frame pacing for callers that redraw in a loop.

use std::time::{Duration, Instant};

/// Opens at most once per frame interval.
#[derive(Copy, Clone, Debug)]
pub struct FrameGate {
    interval: Duration,
    last: Option<Instant>,
}
impl FrameGate {
    /// A non-positive or non-finite rate never throttles.
    #[must_use]
    pub fn new(fps: f32) -> Self {
        let interval = if fps > 0.0 && fps.is_finite() {
            Duration::from_secs_f32(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last: None,
        }
    }
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
    /// Is a new frame due at `now`? Returning `true` starts the next interval.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }
    /// Time left until the next frame is due.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.last.map_or(Duration::ZERO, |last| {
            self.interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn gates_by_interval() {
        let mut gate = FrameGate::new(8.0);
        assert_eq!(gate.interval(), Duration::from_millis(125));
        let start = Instant::now();
        assert!(gate.ready(start));
        assert!(!gate.ready(start + Duration::from_millis(60)));
        assert!(gate.remaining(start + Duration::from_millis(60)) > Duration::ZERO);
        assert!(gate.ready(start + Duration::from_millis(125)));
        assert!(!gate.ready(start + Duration::from_millis(190)));
    }
    #[test]
    fn zero_rate_never_throttles() {
        let mut gate = FrameGate::new(0.0);
        let now = Instant::now();
        assert!(gate.ready(now));
        assert!(gate.ready(now));
    }
}
