//! [GpioDriver] backend for the Linux GPIO character device (`/dev/gpiochipN`), using the gpiod library.
//!
//! Lines are requested from the kernel each time a pin or bus switches direction, which is what
//! the LCD data bus needs when it alternates between writing instructions and reading the busy flag.

use crate::gpio::{
    GpioActiveLevel, GpioBus, GpioBusInput, GpioBusOutput, GpioDriver, GpioInput, GpioOutput,
    GpioPin,
};
use crate::{LcdError, LcdResult};
use bitvec::vec::BitVec;
use std::cell::Cell;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// GPIO driver for one gpiod chip. Keeps track of the lines handed out, so the same line can't be
/// claimed twice.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    claimed: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            claimed: BitVec::repeat(false, n),
        }
    }

    /// Opens the chip at `path`, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> LcdResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }

    fn claim<const N: usize>(&self, offsets: [usize; N]) -> LcdResult<GpiodLines<'_, N>> {
        let n = self.count()?;
        if offsets.iter().any(|&offset| offset >= n) {
            return Err(LcdError::InvalidArgument);
        }
        if offsets.iter().any(|&offset| self.claimed[offset]) {
            return Err(LcdError::AlreadyInUse);
        }
        for offset in offsets {
            self.claimed.set_aliased(offset, true);
        }
        Ok(GpiodLines {
            driver: self,
            offsets,
            active_level: GpioActiveLevel::High,
            requested: Cell::new(false),
        })
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> LcdResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> LcdResult<Box<dyn GpioPin + '_>> {
        Ok(Box::new(self.claim([index])?))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> LcdResult<Box<dyn GpioBus<N> + '_>> {
        Ok(Box::new(self.claim(indices)?))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

/// A group of claimed lines. A single pin is a group of one.
struct GpiodLines<'a, const N: usize> {
    driver: &'a GpiodDriver,
    offsets: [usize; N],
    active_level: GpioActiveLevel,
    /// Set while an input or output handle holds the kernel request.
    requested: Cell<bool>,
}

impl<const N: usize> GpiodLines<'_, N> {
    fn line_ids(&self) -> [u32; N] {
        self.offsets.map(|offset| offset as u32)
    }

    fn begin_request(&self) -> LcdResult<()> {
        if self.requested.replace(true) {
            return Err(LcdError::AlreadyInUse);
        }
        Ok(())
    }

    fn request_input(&self) -> LcdResult<gpiod::Lines<gpiod::Input>> {
        self.begin_request()?;
        self.requested_lines(self.driver.chip.request_lines(
            gpiod::Options::input(self.line_ids())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into()),
        ))
    }

    fn request_output(&self) -> LcdResult<gpiod::Lines<gpiod::Output>> {
        self.begin_request()?;
        self.requested_lines(self.driver.chip.request_lines(
            gpiod::Options::output(self.line_ids())
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into()),
        ))
    }

    fn requested_lines<T>(&self, result: std::io::Result<T>) -> LcdResult<T> {
        if result.is_err() {
            self.requested.set(false);
        }
        Ok(result?)
    }
}

impl<const N: usize> Debug for GpiodLines<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.offsets)
    }
}

impl<const N: usize> Drop for GpiodLines<'_, N> {
    fn drop(&mut self) {
        for &offset in &self.offsets {
            self.driver.claimed.set_aliased(offset, false);
        }
    }
}

impl GpioPin for GpiodLines<'_, 1> {
    fn as_input(&mut self) -> LcdResult<Box<dyn GpioInput + '_>> {
        let lines = self.request_input()?;
        Ok(Box::new(GpiodInput { owner: self, lines }))
    }

    fn as_output(&mut self) -> LcdResult<Box<dyn GpioOutput + '_>> {
        let lines = self.request_output()?;
        Ok(Box::new(GpiodOutput { owner: self, lines }))
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> LcdResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl<const N: usize> GpioBus<N> for GpiodLines<'_, N> {
    fn as_input(&self) -> LcdResult<Box<dyn GpioBusInput<N> + '_>> {
        let lines = self.request_input()?;
        Ok(Box::new(GpiodInput { owner: self, lines }))
    }

    fn as_output(&self) -> LcdResult<Box<dyn GpioBusOutput<N> + '_>> {
        let lines = self.request_output()?;
        Ok(Box::new(GpiodOutput { owner: self, lines }))
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> LcdResult<()> {
        self.active_level = level;
        Ok(())
    }
}

struct GpiodInput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Drop for GpiodInput<'_, N> {
    fn drop(&mut self) {
        self.owner.requested.set(false);
    }
}

impl<const N: usize> Debug for GpiodInput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.owner)
    }
}

impl GpioInput for GpiodInput<'_, 1> {
    fn read(&self) -> LcdResult<bool> {
        let [value] = self.lines.get_values([false])?;
        Ok(value)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodInput<'_, N> {
    fn read(&self) -> LcdResult<[bool; N]> {
        Ok(self.lines.get_values([false; N])?)
    }
}

struct GpiodOutput<'a, const N: usize> {
    owner: &'a GpiodLines<'a, N>,
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Drop for GpiodOutput<'_, N> {
    fn drop(&mut self) {
        self.owner.requested.set(false);
    }
}

impl<const N: usize> Debug for GpiodOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.owner)
    }
}

impl GpioOutput for GpiodOutput<'_, 1> {
    fn write(&self, value: bool) -> LcdResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> LcdResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}
