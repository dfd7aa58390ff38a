use crate::gpio::{GpioBus, GpioBusInput, GpioBusOutput, GpioOutput};
use crate::interface::SignalInterface;
use crate::{LcdError, LcdResult};
use log::trace;

/// The data lines of a GPIO-wired display.
///
/// A 4-bit bus is connected to D4..D7 of the controller, D0..D3 are left unconnected.
#[derive(Debug)]
pub enum GpioLcdBus<'a> {
    Bus8Bit(&'a dyn GpioBus<8>),
    Bus4Bit(&'a dyn GpioBus<4>),
}

impl GpioLcdBus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, GpioLcdBus::Bus8Bit(_))
    }
}

/// The direction handle held on the data bus. The lines keep their direction only while it lives.
#[derive(Debug)]
enum DataPort<'a> {
    Released,
    Output8(Box<dyn GpioBusOutput<8> + 'a>),
    Output4(Box<dyn GpioBusOutput<4> + 'a>),
    Input8(Box<dyn GpioBusInput<8> + 'a>),
    Input4(Box<dyn GpioBusInput<4> + 'a>),
}

/// [SignalInterface] on top of GPIO pins.
///
/// Wiring:
///
/// | LCD       | GPIO                   |
/// |-----------|------------------------|
/// | RS        | `pin_rs`               |
/// | R/W       | `pin_rw` (or GND)      |
/// | E         | `pin_e`                |
/// | Backlight | `pin_bl` (or always on)|
/// | D0..D7    | 8-bit bus              |
/// | D4..D7    | 4-bit bus              |
///
/// The data bus stays an output from the first write until a read is selected, and an input from
/// then until the next write, so the lines hold their level across the enable strobe.
///
/// Inverted signals can be handled by setting the active level of the pins.
#[derive(Debug)]
pub struct GpioLcdInterface<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    pin_bl: Option<&'a dyn GpioOutput>,
    data_bus: GpioLcdBus<'a>,
    port: DataPort<'a>,
}

impl<'a> GpioLcdInterface<'a> {
    /// Creates an interface for a display with its D4..D7 lines connected to `data_bus`.
    ///
    /// Without `pin_rw` the R/W line of the display must be tied to GND and reads fail with
    /// [LcdError::NotSupported].
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        pin_bl: Option<&'a dyn GpioOutput>,
        data_bus: &'a dyn GpioBus<4>,
    ) -> Self {
        GpioLcdInterface {
            pin_e,
            pin_rw,
            pin_rs,
            pin_bl,
            data_bus: GpioLcdBus::Bus4Bit(data_bus),
            port: DataPort::Released,
        }
    }

    /// Creates an interface for a display with all eight data lines connected to `data_bus`.
    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        pin_bl: Option<&'a dyn GpioOutput>,
        data_bus: &'a dyn GpioBus<8>,
    ) -> Self {
        GpioLcdInterface {
            pin_e,
            pin_rw,
            pin_rs,
            pin_bl,
            data_bus: GpioLcdBus::Bus8Bit(data_bus),
            port: DataPort::Released,
        }
    }

    pub fn data_bus(&self) -> &GpioLcdBus<'a> {
        &self.data_bus
    }

    /// Makes the data bus an output, unless it already is one.
    fn drive_bus(&mut self) -> LcdResult<()> {
        if matches!(self.port, DataPort::Output8(_) | DataPort::Output4(_)) {
            return Ok(());
        }
        // The lines can't be requested again while the old handle holds them
        self.port = DataPort::Released;
        self.port = match self.data_bus {
            GpioLcdBus::Bus8Bit(bus) => DataPort::Output8(bus.as_output()?),
            GpioLcdBus::Bus4Bit(bus) => DataPort::Output4(bus.as_output()?),
        };
        trace!("Data bus is now an output");
        Ok(())
    }

    /// Makes the data bus an input, unless it already is one.
    fn release_bus(&mut self) -> LcdResult<()> {
        if matches!(self.port, DataPort::Input8(_) | DataPort::Input4(_)) {
            return Ok(());
        }
        self.port = DataPort::Released;
        self.port = match self.data_bus {
            GpioLcdBus::Bus8Bit(bus) => DataPort::Input8(bus.as_input()?),
            GpioLcdBus::Bus4Bit(bus) => DataPort::Input4(bus.as_input()?),
        };
        trace!("Data bus is now an input");
        Ok(())
    }
}

impl SignalInterface for GpioLcdInterface<'_> {
    fn set_rs_rw(&mut self, data: bool, read: bool) -> LcdResult<()> {
        let Some(rw) = self.pin_rw else {
            if read {
                return Err(LcdError::NotSupported);
            }
            self.pin_rs.write(data)?;
            return self.drive_bus();
        };

        if read {
            // Release the drivers before the controller starts driving the bus
            self.release_bus()?;
            self.pin_rs.write(data)?;
            rw.write(true)
        } else {
            self.pin_rs.write(data)?;
            rw.write(false)?;
            self.drive_bus()
        }
    }

    fn set_enable(&mut self, enable: bool) -> LcdResult<()> {
        self.pin_e.write(enable)
    }

    fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        match self.pin_bl {
            Some(bl) => bl.write(on),
            None => {
                trace!("No backlight pin, ignoring backlight {}", on);
                Ok(())
            }
        }
    }

    fn set_data_lines(&mut self, value: u8) -> LcdResult<()> {
        self.drive_bus()?;
        match &self.port {
            DataPort::Output8(port) => {
                trace!("Writing byte: {:08b}", value);
                port.write_byte(value)
            }
            DataPort::Output4(port) => {
                trace!("Writing nibble: {:04b}", value >> 4);
                port.write_nibble(value >> 4)
            }
            _ => Err(LcdError::Other("data bus is not an output".to_string())),
        }
    }

    fn read_data_lines(&mut self) -> LcdResult<u8> {
        self.release_bus()?;
        let value = match &self.port {
            DataPort::Input8(port) => port.read_byte()?,
            DataPort::Input4(port) => port.read_nibble()? << 4,
            _ => return Err(LcdError::Other("data bus is not an input".to_string())),
        };
        trace!("Read data lines: {:08b}", value);
        Ok(value)
    }
}
