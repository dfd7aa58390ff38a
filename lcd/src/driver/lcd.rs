use crate::delay::DelayNs;
use crate::driver::{
    BusWidth, CursorDirection, HD44780Driver, READ_SETTLE_US, STROBE_HOLD_US, WRITE_SETTLE_US,
    function_set_command,
};
use crate::interface::{LcdInterface, SignalInterface};
use crate::{LcdError, LcdResult};
use log::{debug, info, trace, warn};
use std::fmt::{Display, Formatter};

/// Transfer counters. Only reported, never used for control.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Statistics {
    pub writes: u64,
    pub reads: u64,
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} writes, {} reads", self.writes, self.reads)
    }
}

/// HD44780 transaction layer.
///
/// Turns register transfers into signal sequences for the bound interface: one strobe per byte on
/// an 8-bit bus, two strobes (high nibble first) on a 4-bit bus, followed by the settle time the
/// controller needs. A [LcdInterface::Registers] binding gets whole bytes instead.
///
/// The controller always powers up with an 8-bit bus, and so does this driver. The width only
/// changes through [HD44780Driver::function_set], which keeps both sides in step.
#[derive(Debug)]
pub struct Hd44780<'a, D: DelayNs> {
    interface: Option<LcdInterface<'a>>,
    delay: D,
    width: BusWidth,
    stats: Statistics,
}

impl<'a, D: DelayNs> Hd44780<'a, D> {
    /// Creates a driver with nothing bound.
    pub fn new(delay: D) -> Self {
        Self {
            interface: None,
            delay,
            width: BusWidth::Eight,
            stats: Statistics::default(),
        }
    }

    /// Creates a driver bound to `interface`.
    pub fn with_interface(interface: LcdInterface<'a>, delay: D) -> Self {
        let mut lcd = Self::new(delay);
        lcd.bind(interface);
        lcd
    }

    /// Binds `interface`, returning the one it replaces.
    pub fn bind(&mut self, interface: LcdInterface<'a>) -> Option<LcdInterface<'a>> {
        debug!("Binding {:?}", interface);
        let previous = self.interface.replace(interface);
        if previous.is_some() {
            debug!("Previous interface evicted");
        }
        previous
    }

    pub fn unbind(&mut self) -> Option<LcdInterface<'a>> {
        debug!("Unbinding interface");
        self.interface.take()
    }

    pub fn is_bound(&self) -> bool {
        self.interface.is_some()
    }

    pub fn bus_width(&self) -> BusWidth {
        self.width
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Initializes the controller for a bus of `width_bits` (4 or 8) and a two-line display.
    ///
    /// Any other width skips the function set and only logs a warning, leaving the controller
    /// as it was. The display is then turned on with a blinking cursor, set to increment, and
    /// cleared.
    pub fn init(&mut self, width_bits: u8) -> LcdResult<()>
    where
        D: std::fmt::Debug,
    {
        match BusWidth::from_bits(width_bits) {
            Some(width) => {
                debug!("Initializing with a {}-bit bus", width_bits);
                self.function_set(width == BusWidth::Eight, true, false)?;
            }
            None => warn!("Ignoring unsupported bus width of {} bits", width_bits),
        }
        self.set_display_control(true, true, true)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.clear_display()
    }

    /// Reports the statistics and puts the controller back into 8-bit mode, the state it boots in.
    pub fn cleanup(&mut self) -> LcdResult<()>
    where
        D: std::fmt::Debug,
    {
        info!("Statistics: {}", self.stats);
        self.function_set(true, true, false)
    }

    /// Writes `value` to the data register if `data` is set, to the instruction register otherwise.
    ///
    /// # Errors
    /// - `LcdError::NoDevice` if nothing is bound. No signal is touched then.
    pub fn write_register(&mut self, value: u8, data: bool) -> LcdResult<()> {
        self.stats.writes += 1;
        let Some(interface) = self.interface.as_mut() else {
            return Err(LcdError::NoDevice);
        };
        trace!("Writing {:08b}, RS: {}", value, data);

        let signals = match interface {
            LcdInterface::Registers(registers) => return registers.write(value, data),
            LcdInterface::Signals(signals) => &mut **signals,
        };

        signals.set_rs_rw(data, false)?;
        match self.width {
            BusWidth::Eight => {
                signals.set_data_lines(value)?;
                Self::pulse_enable(signals, &mut self.delay)?;
            }
            BusWidth::Four => {
                // D0..D3 aren't connected, keep them high
                signals.set_data_lines(value | 0x0F)?;
                Self::pulse_enable(signals, &mut self.delay)?;
                self.delay.delay_us(STROBE_HOLD_US);
                signals.set_data_lines((value << 4) | 0x0F)?;
                Self::pulse_enable(signals, &mut self.delay)?;
            }
        }
        self.delay.delay_us(WRITE_SETTLE_US);
        Ok(())
    }

    /// Reads the data register if `data` is set, the busy flag and address counter otherwise.
    ///
    /// # Errors
    /// - `LcdError::NoDevice` if nothing is bound.
    /// - `LcdError::NotSupported` if the interface can't read.
    pub fn read_register(&mut self, data: bool) -> LcdResult<u8> {
        self.stats.reads += 1;
        let Some(interface) = self.interface.as_mut() else {
            return Err(LcdError::NoDevice);
        };

        let signals = match interface {
            LcdInterface::Registers(registers) => return registers.read(data),
            LcdInterface::Signals(signals) => &mut **signals,
        };

        signals.set_rs_rw(data, true)?;
        let mut value = Self::sample(signals, &mut self.delay)?;
        if self.width == BusWidth::Four {
            value &= 0xF0;
            self.delay.delay_us(STROBE_HOLD_US);
            value |= Self::sample(signals, &mut self.delay)? >> 4;
        }
        self.delay.delay_us(READ_SETTLE_US);

        trace!("Read {:08b}, RS: {}", value, data);
        Ok(value)
    }

    fn pulse_enable(signals: &mut dyn SignalInterface, delay: &mut D) -> LcdResult<()> {
        signals.set_enable(true)?;
        delay.delay_us(STROBE_HOLD_US);
        signals.set_enable(false)
    }

    fn sample(signals: &mut dyn SignalInterface, delay: &mut D) -> LcdResult<u8> {
        signals.set_enable(true)?;
        delay.delay_us(STROBE_HOLD_US);
        let value = signals.read_data_lines()?;
        signals.set_enable(false)?;
        Ok(value)
    }
}

impl<D: DelayNs + std::fmt::Debug> HD44780Driver for Hd44780<'_, D> {
    /// Also switches the bus width of the driver.
    ///
    /// Going from 8 to 4 bits, the controller only sees the upper half of the first transfer, so
    /// the instruction is sent once as a single 8-bit transfer and then again as two nibbles, to
    /// set the line count and font too.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> LcdResult<()> {
        let command = function_set_command(data_length, two_lines, font);
        let target = if data_length {
            BusWidth::Eight
        } else {
            BusWidth::Four
        };

        if self.width == BusWidth::Eight && target == BusWidth::Four {
            self.send_command(command)?;
            self.width = BusWidth::Four;
            debug!("Switched to a 4-bit bus");
        }
        self.send_command(command)?;
        if self.width != target {
            debug!("Switched to a {}-bit bus", target.bits());
        }
        self.width = target;
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.write_register(command, false)
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.write_register(data, true)
    }

    fn read_command(&mut self) -> LcdResult<u8> {
        self.read_register(false)
    }

    fn read_data(&mut self) -> LcdResult<u8> {
        self.read_register(true)
    }

    fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        match self.interface.as_mut() {
            Some(interface) => interface.set_backlight(on),
            None => Err(LcdError::NoDevice),
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
