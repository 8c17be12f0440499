// Cancellable countdowns for the undo window

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Handle to an armed countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Countdown(u64);

/// Arms countdowns and reports when they run out
///
/// The store polls rather than receiving callbacks, so an expired countdown
/// can never touch a store that has already been dropped.
pub trait Scheduler {
    /// Start a countdown that expires after `delay`
    fn arm(&mut self, delay: Duration) -> Countdown;

    /// Forget a countdown. Unknown or already cancelled handles are ignored.
    fn cancel(&mut self, countdown: Countdown);

    /// Whether `countdown` has run out. Cancelled countdowns never expire.
    fn is_expired(&self, countdown: Countdown) -> bool;
}

impl<S: Scheduler + ?Sized> Scheduler for &mut S {
    fn arm(&mut self, delay: Duration) -> Countdown {
        (**self).arm(delay)
    }

    fn cancel(&mut self, countdown: Countdown) {
        (**self).cancel(countdown)
    }

    fn is_expired(&self, countdown: Countdown) -> bool {
        (**self).is_expired(countdown)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Box<S> {
    fn arm(&mut self, delay: Duration) -> Countdown {
        (**self).arm(delay)
    }

    fn cancel(&mut self, countdown: Countdown) {
        (**self).cancel(countdown)
    }

    fn is_expired(&self, countdown: Countdown) -> bool {
        (**self).is_expired(countdown)
    }
}

/// Countdowns measured against the monotonic wall clock
#[derive(Debug, Default)]
pub struct SystemScheduler {
    next: u64,
    deadlines: HashMap<u64, Instant>,
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for SystemScheduler {
    fn arm(&mut self, delay: Duration) -> Countdown {
        self.next += 1;
        self.deadlines.insert(self.next, Instant::now() + delay);
        Countdown(self.next)
    }

    fn cancel(&mut self, countdown: Countdown) {
        self.deadlines.remove(&countdown.0);
    }

    fn is_expired(&self, countdown: Countdown) -> bool {
        self.deadlines
            .get(&countdown.0)
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

/// Countdowns against a virtual clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next: u64,
    deadlines: HashMap<u64, Duration>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Current virtual time since construction
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of countdowns armed and not yet cancelled
    pub fn armed(&self) -> usize {
        self.deadlines.len()
    }
}

impl Scheduler for ManualScheduler {
    fn arm(&mut self, delay: Duration) -> Countdown {
        self.next += 1;
        self.deadlines.insert(self.next, self.now + delay);
        Countdown(self.next)
    }

    fn cancel(&mut self, countdown: Countdown) {
        self.deadlines.remove(&countdown.0);
    }

    fn is_expired(&self, countdown: Countdown) -> bool {
        self.deadlines
            .get(&countdown.0)
            .is_some_and(|deadline| self.now >= *deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_countdown_expires() {
        let mut scheduler = ManualScheduler::new();
        let countdown = scheduler.arm(Duration::from_secs(3));

        assert!(!scheduler.is_expired(countdown));
        scheduler.advance(Duration::from_millis(2999));
        assert!(!scheduler.is_expired(countdown));
        scheduler.advance(Duration::from_millis(1));
        assert!(scheduler.is_expired(countdown));
    }

    #[test]
    fn test_cancelled_countdown_never_expires() {
        let mut scheduler = ManualScheduler::new();
        let countdown = scheduler.arm(Duration::from_secs(1));
        scheduler.cancel(countdown);
        scheduler.advance(Duration::from_secs(10));

        assert!(!scheduler.is_expired(countdown));
        assert_eq!(scheduler.armed(), 0);

        // Cancelling twice is harmless
        scheduler.cancel(countdown);
    }

    #[test]
    fn test_countdowns_are_independent() {
        let mut scheduler = ManualScheduler::new();
        let first = scheduler.arm(Duration::from_secs(1));
        scheduler.advance(Duration::from_millis(500));
        let second = scheduler.arm(Duration::from_secs(1));
        scheduler.advance(Duration::from_millis(600));

        assert_ne!(first, second);
        assert!(scheduler.is_expired(first));
        assert!(!scheduler.is_expired(second));
        assert_eq!(scheduler.armed(), 2);
    }

    #[test]
    fn test_system_countdown() {
        let mut scheduler = SystemScheduler::new();
        let zero = scheduler.arm(Duration::ZERO);
        let long = scheduler.arm(Duration::from_secs(3600));

        assert!(scheduler.is_expired(zero));
        assert!(!scheduler.is_expired(long));

        scheduler.cancel(zero);
        assert!(!scheduler.is_expired(zero));
    }
}
