//! Physical LCD interfaces.
//!
//! An interface is one concrete wiring of the controller to the host. There are two kinds:
//!
//! - [SignalInterface] drives the individual signals (RS, R/W, E, backlight and the data lines).
//!   Timing and nibble multiplexing are done by [crate::driver::Hd44780].
//! - [RegisterInterface] transfers whole register values and handles bus width and timing itself,
//!   e.g. an I/O expander or a controller that is already behind a bus bridge.
//!
//! Which one is used is decided once, when it's bound as an [LcdInterface].

mod gpio;

use crate::LcdResult;
pub use gpio::*;
use std::fmt::Debug;

/// Signal-level access to the controller.
pub trait SignalInterface: Debug {
    /// Sets the register select (`data`: `true` selects the data register) and read/write
    /// (`read`: `true` reads from the controller) signals.
    fn set_rs_rw(&mut self, data: bool, read: bool) -> LcdResult<()>;

    /// Sets the enable (strobe) signal. Data is latched on the falling edge.
    fn set_enable(&mut self, enable: bool) -> LcdResult<()>;

    /// Sets the backlight signal.
    fn set_backlight(&mut self, on: bool) -> LcdResult<()>;

    /// Drives the data lines. With a 4-bit wiring only the upper four bits are connected.
    fn set_data_lines(&mut self, value: u8) -> LcdResult<()>;

    /// Samples the data lines. With a 4-bit wiring only the upper four bits are meaningful.
    fn read_data_lines(&mut self) -> LcdResult<u8>;
}

/// Whole-register access to the controller, bypassing per-signal sequencing.
pub trait RegisterInterface: Debug {
    /// Writes `value` to the data register if `data` is set, to the instruction register otherwise.
    fn write(&mut self, value: u8, data: bool) -> LcdResult<()>;

    /// Reads the data register if `data` is set, the busy flag and address counter otherwise.
    fn read(&mut self, data: bool) -> LcdResult<u8>;

    /// Sets the backlight.
    fn set_backlight(&mut self, on: bool) -> LcdResult<()>;
}

/// An interface bound to a driver. The driver only borrows it, the caller keeps ownership.
#[derive(Debug)]
pub enum LcdInterface<'a> {
    Signals(&'a mut dyn SignalInterface),
    Registers(&'a mut dyn RegisterInterface),
}

impl LcdInterface<'_> {
    pub fn is_signal_level(&self) -> bool {
        matches!(self, LcdInterface::Signals(_))
    }

    pub fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        match self {
            LcdInterface::Signals(signals) => signals.set_backlight(on),
            LcdInterface::Registers(registers) => registers.set_backlight(on),
        }
    }
}

impl<'a> From<&'a mut dyn SignalInterface> for LcdInterface<'a> {
    fn from(signals: &'a mut dyn SignalInterface) -> Self {
        LcdInterface::Signals(signals)
    }
}

impl<'a> From<&'a mut dyn RegisterInterface> for LcdInterface<'a> {
    fn from(registers: &'a mut dyn RegisterInterface) -> Self {
        LcdInterface::Registers(registers)
    }
}
