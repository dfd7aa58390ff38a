//! Blocking delays for hosts with a standard library.
//!
//! The controller has no handshake on writes, so every transfer is followed by a fixed wait.
//! The driver takes any [DelayNs], so the delay source of an embedded-hal board fits as well.
//! See [crate::driver] for the named durations.

pub use embedded_hal::delay::DelayNs;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Busy-waits on the monotonic clock.
///
/// The host keeps [Instant] calibrated, so no delay-loop calibration is needed before first use.
/// Preferred for the short strobe and settle times, which are far below the scheduler's
/// sleep granularity.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl SpinDelay {
    fn spin(duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            spin_loop();
        }
    }
}

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        Self::spin(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        Self::spin(Duration::from_micros(us.into()));
    }
}

/// Sleeps the current thread.
///
/// Cheaper on the CPU than [SpinDelay], but every wait takes at least one scheduler tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        sleep(Duration::from_micros(us.into()));
    }
}
