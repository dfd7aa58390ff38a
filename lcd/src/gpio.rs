//! GPIO capability traits used to wire an LCD to general purpose pins.
//!
//! Buses are read and written LSb first: element 0 of a bus is the lowest data line it drives.

use crate::{LcdError, LcdResult};
use std::fmt::Debug;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> LcdResult<usize>;

    /// Claims the GPIO pin at the given index.
    fn get_pin(&self, index: usize) -> LcdResult<Box<dyn GpioPin + '_>>;

    /// Claims the GPIO lines at the given indices as one bus.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> LcdResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high. Inverted wirings (like the parallel port control lines)
/// use [GpioActiveLevel::Low].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default]
    High,
    Low,
}

pub trait GpioPin: Debug {
    /// Sets the GPIO pin function to input, allowing reading its state.
    fn as_input(&mut self) -> LcdResult<Box<dyn GpioInput + '_>>;
    /// Sets the GPIO pin function to output, allowing writing its state.
    fn as_output(&mut self) -> LcdResult<Box<dyn GpioOutput + '_>>;

    /// Gets the active level of the GPIO pin.
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `LcdError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> LcdResult<()> {
        Err(LcdError::NotSupported)
    }
}

pub trait GpioInput: Debug {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> LcdResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> LcdResult<()>;
}

/// A group of lines switched between input and output together.
///
/// The lines keep their direction for as long as the returned handle is alive, and only one
/// handle can be alive at a time.
pub trait GpioBus<const N: usize>: Debug {
    /// # Errors
    /// - `LcdError::AlreadyInUse` while another handle of this bus is alive.
    fn as_input(&self) -> LcdResult<Box<dyn GpioBusInput<N> + '_>>;
    /// # Errors
    /// - `LcdError::AlreadyInUse` while another handle of this bus is alive.
    fn as_output(&self) -> LcdResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> LcdResult<()> {
        Err(LcdError::NotSupported)
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> LcdResult<[bool; N]>;
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> LcdResult<()>;
}

fn pack<const N: usize>(values: [bool; N]) -> u8 {
    values
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .fold(0, |acc, (i, _)| acc | (1 << i))
}

fn unpack<const N: usize>(value: u8) -> [bool; N] {
    let mut values = [false; N];
    for (i, line) in values.iter_mut().enumerate() {
        *line = value & (1 << i) != 0;
    }
    values
}

impl dyn GpioBusInput<8> + '_ {
    /// Reads the bus as a byte.
    pub fn read_byte(&self) -> LcdResult<u8> {
        Ok(pack(self.read()?))
    }
}

impl dyn GpioBusInput<4> + '_ {
    /// Reads the bus as a nibble in the low four bits.
    pub fn read_nibble(&self) -> LcdResult<u8> {
        Ok(pack(self.read()?))
    }
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes a byte to the bus.
    pub fn write_byte(&self, value: u8) -> LcdResult<()> {
        self.write(&unpack(value))
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes a nibble to the bus.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if `value` does not fit in four bits.
    pub fn write_nibble(&self, value: u8) -> LcdResult<()> {
        if value > 0b1111 {
            return Err(LcdError::InvalidArgument);
        }
        self.write(&unpack(value))
    }
}
