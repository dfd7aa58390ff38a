//! HD44780 instruction set.
//!
//! [HD44780Driver] encodes every instruction of the controller on top of four raw register
//! transfers. [Hd44780] implements those transfers for a bound [crate::interface::LcdInterface].
//!
//! # Commands
//!
//! Each instruction is a base opcode (its highest set bit) OR'd with option bits:
//!
//! | Instruction            | Base   | Options                                     |
//! |------------------------|--------|---------------------------------------------|
//! | Clear display          | `0x01` |                                             |
//! | Return home            | `0x02` |                                             |
//! | Entry mode set         | `0x04` | I/D `0x02`, S `0x01`                        |
//! | Display on/off control | `0x08` | D `0x04`, C `0x02`, B `0x01`                |
//! | Cursor or display shift| `0x10` | S/C `0x08`, R/L `0x04`                      |
//! | Function set           | `0x20` | DL `0x10`, N `0x08`, F `0x04`               |
//! | Set CGRAM address      | `0x40` | 6-bit address                               |
//! | Set DDRAM address      | `0x80` | 7-bit address                               |
//!
//! # Sources
//!
//! - Hitachi, “HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,” ADE-207-272(Z).

mod lcd;

use crate::{LcdError, LcdResult};
pub use lcd::*;
use std::fmt::Debug;

/// Enable pulse width, and the gap between two nibbles of a 4-bit transfer.
pub const STROBE_HOLD_US: u32 = 1;
/// Execution time of a regular instruction or data write.
pub const WRITE_SETTLE_US: u32 = 37;
/// Time to wait after a read before the next transfer.
pub const READ_SETTLE_US: u32 = 6;
/// Extra execution time of clear display and return home, which sweep the whole DDRAM.
pub const CLEAR_SETTLE_US: u32 = 1437;

pub const CMD_CLEAR: u8 = 0b0000_0001;
pub const CMD_HOME: u8 = 0b0000_0010;
pub const CMD_ENTRY_MODE: u8 = 0b0000_0100;
pub const CMD_DISPLAY_CONTROL: u8 = 0b0000_1000;
pub const CMD_SHIFT: u8 = 0b0001_0000;
pub const CMD_FUNCTION_SET: u8 = 0b0010_0000;
pub const CMD_CGRAM_ADDRESS: u8 = 0b0100_0000;
pub const CMD_DDRAM_ADDRESS: u8 = 0b1000_0000;

pub const BUSY_FLAG: u8 = 0b1000_0000;
pub const ADDRESS_MASK: u8 = 0b0111_1111;

/// Width of the data bus as configured in the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusWidth {
    Four,
    Eight,
}

impl BusWidth {
    /// Accepts only `4` and `8`.
    pub fn from_bits(bits: u8) -> Option<BusWidth> {
        match bits {
            4 => Some(BusWidth::Four),
            8 => Some(BusWidth::Eight),
            _ => None,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            BusWidth::Four => 4,
            BusWidth::Eight => 8,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing/reading data.
    Left,
    /// Moves the cursor to the right after writing/reading data.
    Right,
}

/// Encodes a function set instruction.
pub fn function_set_command(data_length: bool, two_lines: bool, font: bool) -> u8 {
    let mut command = CMD_FUNCTION_SET;
    if data_length {
        command |= 0b0001_0000;
    }
    if two_lines {
        command |= 0b0000_1000;
    }
    if font {
        command |= 0b0000_0100;
    }
    command
}

pub trait HD44780Driver: Debug {
    /// Clears the display and sets the cursor to the home position.
    ///
    /// Waits [CLEAR_SETTLE_US] afterwards.
    fn clear_display(&mut self) -> LcdResult<()> {
        self.send_command(CMD_CLEAR)?;
        self.delay_us(CLEAR_SETTLE_US);
        Ok(())
    }

    /// Sets the cursor to the home position and undoes any display shift.
    ///
    /// Waits [CLEAR_SETTLE_US] afterwards.
    fn return_home(&mut self) -> LcdResult<()> {
        self.send_command(CMD_HOME)?;
        self.delay_us(CLEAR_SETTLE_US);
        Ok(())
    }

    /// Sets the direction the address counter moves after each data transfer, and whether the
    /// display shifts along with it.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> LcdResult<()> {
        let mut command = CMD_ENTRY_MODE;
        if cursor_direction == CursorDirection::Right {
            command |= 0b0000_0010;
        }
        if shift {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        let mut command = CMD_DISPLAY_CONTROL;
        if display_on {
            command |= 0b0000_0100;
        }
        if cursor_on {
            command |= 0b0000_0010;
        }
        if blink_on {
            command |= 0b0000_0001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the whole display by one position.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> LcdResult<()> {
        let mut command = CMD_SHIFT;
        if display_shift {
            command |= 0b0000_1000;
        }
        if direction == CursorDirection::Right {
            command |= 0b0000_0100;
        }
        self.send_command(command)
    }

    /// Sets the bus width (`data_length`: 8 bits), the line count and the font (`font`: 5×10).
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> LcdResult<()> {
        self.send_command(function_set_command(data_length, two_lines, font))
    }

    /// Sets the CGRAM address.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if the address doesn't fit in 6 bits.
    fn set_cgram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b0011_1111 {
            return Err(LcdError::InvalidArgument);
        }
        self.send_command(CMD_CGRAM_ADDRESS | address)
    }

    /// Sets the DDRAM address.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if the address doesn't fit in 7 bits.
    fn set_ddram_address(&mut self, address: u8) -> LcdResult<()> {
        if address > 0b0111_1111 {
            return Err(LcdError::InvalidArgument);
        }
        self.send_command(CMD_DDRAM_ADDRESS | address)
    }

    /// Reads the busy flag and address counter.
    fn get_busy_flag_and_address(&mut self) -> LcdResult<(bool, u8)> {
        let status = self.read_command()?;
        Ok((status & BUSY_FLAG != 0, status & ADDRESS_MASK))
    }

    /// Reads only the busy flag. There's no polling, callers that want to wait have to retry
    /// themselves.
    fn is_busy(&mut self) -> LcdResult<bool> {
        Ok(self.get_busy_flag_and_address()?.0)
    }

    /// Stores a user-defined 5×8 glyph as character code `index` (0..8).
    ///
    /// Leaves the address counter in CGRAM, so set a DDRAM address before writing text again.
    fn define_glyph(&mut self, index: u8, rows: &[u8; 8]) -> LcdResult<()> {
        if index > 7 {
            return Err(LcdError::InvalidArgument);
        }
        self.set_cgram_address(index << 3)?;
        for row in rows {
            self.send_data(row & 0b0001_1111)?;
        }
        Ok(())
    }

    // Low-level operations
    // These are used by the encodings above and implemented by the driver implementation.

    /// Writes to the instruction register.
    fn send_command(&mut self, command: u8) -> LcdResult<()>;

    /// Writes to the data register, at the address counter.
    fn send_data(&mut self, data: u8) -> LcdResult<()>;

    /// Reads the busy flag and address counter.
    ///
    /// Returns both in a single u8, for easier usage use [Self::get_busy_flag_and_address], which
    /// uses this function internally.
    fn read_command(&mut self) -> LcdResult<u8>;

    /// Reads from the data register, at the address counter.
    fn read_data(&mut self) -> LcdResult<u8>;

    /// Turns the backlight on or off. Not part of the controller, but wired next to it.
    fn set_backlight(&mut self, on: bool) -> LcdResult<()>;

    /// Blocks for at least `us` microseconds.
    fn delay_us(&mut self, us: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingDriver {
        commands: Vec<u8>,
        data: Vec<u8>,
        delays: Vec<u32>,
        status: u8,
    }

    impl HD44780Driver for RecordingDriver {
        fn send_command(&mut self, command: u8) -> LcdResult<()> {
            self.commands.push(command);
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> LcdResult<()> {
            self.data.push(data);
            Ok(())
        }

        fn read_command(&mut self) -> LcdResult<u8> {
            Ok(self.status)
        }

        fn read_data(&mut self) -> LcdResult<u8> {
            Ok(0)
        }

        fn set_backlight(&mut self, _on: bool) -> LcdResult<()> {
            Ok(())
        }

        fn delay_us(&mut self, us: u32) {
            self.delays.push(us);
        }
    }

    #[test]
    fn option_bits_match_the_controller_layout() {
        let mut lcd = RecordingDriver::default();
        lcd.set_entry_mode(CursorDirection::Right, false).unwrap();
        lcd.set_entry_mode(CursorDirection::Left, true).unwrap();
        lcd.set_display_control(true, true, true).unwrap();
        lcd.set_display_control(true, false, false).unwrap();
        lcd.cursor_shift(true, CursorDirection::Left).unwrap();
        lcd.cursor_shift(false, CursorDirection::Right).unwrap();
        lcd.function_set(true, true, false).unwrap();
        lcd.function_set(false, true, true).unwrap();
        assert_eq!(
            lcd.commands,
            [0x06, 0x05, 0x0F, 0x0C, 0x18, 0x14, 0x38, 0x2C]
        );
    }

    #[test]
    fn clear_and_home_wait_for_the_ram_sweep() {
        let mut lcd = RecordingDriver::default();
        lcd.clear_display().unwrap();
        lcd.return_home().unwrap();
        assert_eq!(lcd.commands, [0x01, 0x02]);
        assert_eq!(lcd.delays, [CLEAR_SETTLE_US, CLEAR_SETTLE_US]);
    }

    #[test]
    fn addresses_are_range_checked() {
        let mut lcd = RecordingDriver::default();
        lcd.set_cgram_address(0x3F).unwrap();
        lcd.set_ddram_address(0x54).unwrap();
        assert_eq!(lcd.set_cgram_address(0x40), Err(LcdError::InvalidArgument));
        assert_eq!(lcd.set_ddram_address(0x80), Err(LcdError::InvalidArgument));
        assert_eq!(lcd.commands, [0x7F, 0xD4]);
    }

    #[test]
    fn status_splits_into_busy_flag_and_address() {
        let mut lcd = RecordingDriver {
            status: 0xC5,
            ..Default::default()
        };
        assert_eq!(lcd.get_busy_flag_and_address().unwrap(), (true, 0x45));
        lcd.status = 0x14;
        assert_eq!(lcd.get_busy_flag_and_address().unwrap(), (false, 0x14));
        assert!(!lcd.is_busy().unwrap());
    }

    #[test]
    fn glyph_is_written_to_its_cgram_slot() {
        let mut lcd = RecordingDriver::default();
        lcd.define_glyph(2, &[0xFF, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F, 0x00])
            .unwrap();
        assert_eq!(lcd.commands, [0x50]);
        assert_eq!(lcd.data, [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F, 0x00]);
        assert_eq!(lcd.define_glyph(8, &[0; 8]), Err(LcdError::InvalidArgument));
    }

    #[test]
    fn only_four_and_eight_bit_buses_exist() {
        assert_eq!(BusWidth::from_bits(4), Some(BusWidth::Four));
        assert_eq!(BusWidth::from_bits(8), Some(BusWidth::Eight));
        assert_eq!(BusWidth::from_bits(6), None);
        assert_eq!(BusWidth::Four.bits(), 4);
    }
}
