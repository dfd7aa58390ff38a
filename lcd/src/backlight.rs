//! Backlight auto-dimming.
//!
//! The text engine reports every character it writes to an [Activity]. [AutoDim] turns that into
//! "backlight on now, off after a minute of silence", with the timing left to a [Scheduler] so
//! the host decides what a timer is.

use log::debug;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Inactivity after which [AutoDim] turns the backlight off.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub trait Activity: Debug {
    /// Something was written. Returns `true` if the backlight has to be turned on now.
    fn kick(&mut self) -> bool;

    /// Returns `true`, once, when the backlight should go off.
    fn take_expired(&mut self) -> bool;

    /// Drops any pending off-transition.
    fn cancel(&mut self);
}

/// Leaves the backlight alone.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoActivity;

impl Activity for NoActivity {
    fn kick(&mut self) -> bool {
        false
    }

    fn take_expired(&mut self) -> bool {
        false
    }

    fn cancel(&mut self) {}
}

/// A single-shot timer.
pub trait Scheduler: Debug {
    /// Arms the timer to expire `after` from now, replacing any earlier deadline.
    fn schedule(&mut self, after: Duration);

    fn cancel(&mut self);

    /// Whether the timer is armed and hasn't expired yet.
    fn is_pending(&self) -> bool;

    /// Returns `true`, once, after the timer expired. Disarms it.
    fn take_expired(&mut self) -> bool;
}

/// Turns the backlight on with activity and off after `timeout` without any.
#[derive(Debug)]
pub struct AutoDim<S: Scheduler> {
    scheduler: S,
    timeout: Duration,
}

impl<S: Scheduler> AutoDim<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_timeout(scheduler, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(scheduler: S, timeout: Duration) -> Self {
        Self { scheduler, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

impl<S: Scheduler> Activity for AutoDim<S> {
    fn kick(&mut self) -> bool {
        // A pending timer means the backlight is still on
        let wake = !self.scheduler.is_pending();
        self.scheduler.schedule(self.timeout);
        if wake {
            debug!("Backlight on, off again in {:?}", self.timeout);
        }
        wake
    }

    fn take_expired(&mut self) -> bool {
        let expired = self.scheduler.take_expired();
        if expired {
            debug!("No activity for {:?}, backlight off", self.timeout);
        }
        expired
    }

    fn cancel(&mut self) {
        self.scheduler.cancel();
    }
}

/// A [Scheduler] on the monotonic clock. It doesn't call anything by itself, it has to be polled
/// through [Scheduler::take_expired].
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    deadline: Option<Instant>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Scheduler for DeadlineScheduler {
    fn schedule(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn is_pending(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    fn take_expired(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub(crate) struct ManualState {
        pub pending: bool,
        pub expired: bool,
        pub scheduled: Vec<Duration>,
        pub cancelled: usize,
    }

    /// A timer that only expires when the test says so.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct ManualScheduler(pub Rc<RefCell<ManualState>>);

    impl ManualScheduler {
        pub fn fire(&self) {
            let mut state = self.0.borrow_mut();
            if state.pending {
                state.pending = false;
                state.expired = true;
            }
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&mut self, after: Duration) {
            let mut state = self.0.borrow_mut();
            state.pending = true;
            state.scheduled.push(after);
        }

        fn cancel(&mut self) {
            let mut state = self.0.borrow_mut();
            state.pending = false;
            state.cancelled += 1;
        }

        fn is_pending(&self) -> bool {
            self.0.borrow().pending
        }

        fn take_expired(&mut self) -> bool {
            std::mem::take(&mut self.0.borrow_mut().expired)
        }
    }

    #[test]
    fn kick_wakes_only_when_nothing_is_pending() {
        let scheduler = ManualScheduler::default();
        let mut dim = AutoDim::new(scheduler.clone());

        assert!(dim.kick());
        assert!(!dim.kick());
        assert_eq!(scheduler.0.borrow().scheduled, [DEFAULT_TIMEOUT; 2]);

        scheduler.fire();
        assert!(dim.take_expired());
        assert!(!dim.take_expired());
        assert!(dim.kick());
    }

    #[test]
    fn cancel_disarms_the_timer() {
        let scheduler = ManualScheduler::default();
        let mut dim = AutoDim::with_timeout(scheduler.clone(), Duration::from_secs(5));
        dim.kick();
        dim.cancel();
        scheduler.fire();
        assert!(!dim.take_expired());
        assert_eq!(scheduler.0.borrow().cancelled, 1);
        assert_eq!(dim.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn deadline_scheduler_expires_once() {
        let mut scheduler = DeadlineScheduler::new();
        assert!(!scheduler.take_expired());

        scheduler.schedule(Duration::from_secs(3600));
        assert!(scheduler.is_pending());
        assert!(!scheduler.take_expired());

        scheduler.schedule(Duration::ZERO);
        assert!(!scheduler.is_pending());
        assert!(scheduler.take_expired());
        assert!(!scheduler.take_expired());
        assert!(scheduler.deadline().is_none());
    }

    #[test]
    fn no_activity_never_asks() {
        let mut activity = NoActivity;
        assert!(!activity.kick());
        assert!(!activity.take_expired());
    }
}
