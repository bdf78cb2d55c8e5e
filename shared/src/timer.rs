//! Timers driven by the simulation clock.
//!
//! The simulation never reads wall-clock time; `now` is the accumulated tick
//! time owned by [`crate::Simulation`]. Cancelling is idempotent so teardown
//! paths can call it unconditionally.

use std::time::Duration;

/// Fires at most once per `period`.
#[derive(Clone, Debug)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Option<Duration>,
}

impl IntervalTimer {
    /// A timer whose first firing is at `first_due`.
    pub fn new(period: Duration, first_due: Duration) -> Self {
        Self {
            period,
            next_due: Some(first_due),
        }
    }

    /// Returns `true` if the timer is due and re-arms it relative to `now`.
    ///
    /// Re-arming from `now` (not from the missed deadline) means a long stall
    /// never produces a burst of catch-up firings.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// One-shot deadline.
#[derive(Clone, Debug, Default)]
pub struct Countdown {
    ends_at: Option<Duration>,
}

impl Countdown {
    pub fn start(&mut self, now: Duration, length: Duration) {
        self.ends_at = Some(now + length);
    }

    pub fn is_armed(&self) -> bool {
        self.ends_at.is_some()
    }

    pub fn ends_at(&self) -> Option<Duration> {
        self.ends_at
    }

    /// Time left, saturating at zero. `None` when not armed.
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.ends_at.map(|end| end.saturating_sub(now))
    }

    /// Returns `true` exactly once, on the first poll at or after the deadline.
    pub fn poll_expired(&mut self, now: Duration) -> bool {
        match self.ends_at {
            Some(end) if now >= end => {
                self.ends_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.ends_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn interval_fires_at_most_once_per_period() {
        let mut timer = IntervalTimer::new(ms(1000), ms(0));
        assert!(timer.poll(ms(0)));
        assert!(!timer.poll(ms(500)));
        assert!(!timer.poll(ms(999)));
        assert!(timer.poll(ms(1000)));
        assert!(!timer.poll(ms(1500)));
    }

    #[test]
    fn interval_does_not_burst_after_a_stall() {
        let mut timer = IntervalTimer::new(ms(100), ms(0));
        assert!(timer.poll(ms(0)));
        assert!(timer.poll(ms(5000)));
        assert!(!timer.poll(ms(5050)));
    }

    #[test]
    fn cancelled_interval_never_fires() {
        let mut timer = IntervalTimer::new(ms(100), ms(0));
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_active());
        assert!(!timer.poll(ms(10_000)));
    }

    #[test]
    fn countdown_expires_once() {
        let mut countdown = Countdown::default();
        countdown.start(ms(1000), ms(600));
        assert_eq!(countdown.remaining(ms(1200)), Some(ms(400)));
        assert!(!countdown.poll_expired(ms(1599)));
        assert!(countdown.poll_expired(ms(1600)));
        assert!(!countdown.poll_expired(ms(1700)));
        assert_eq!(countdown.remaining(ms(1700)), None);
    }

    #[test]
    fn countdown_remaining_saturates() {
        let mut countdown = Countdown::default();
        countdown.start(ms(0), ms(100));
        assert_eq!(countdown.remaining(ms(500)), Some(Duration::ZERO));
    }
}
