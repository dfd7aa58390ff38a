//! Text terminal on top of an [HD44780Driver].
//!
//! [TextDisplay] keeps a logical cursor, wraps at the end of each row, treats `\n` as a line
//! break, and scrolls with a [ScrollStrategy] when the cursor runs off the bottom. Because the
//! rows of a display are not contiguous in DDRAM, the physical address is set again every time
//! the cursor lands on column 0.

mod console;
mod layout;
mod scroll;
mod shadow;

use crate::backlight::{Activity, NoActivity};
use crate::driver::HD44780Driver;
use crate::{LcdError, LcdResult};
pub use console::*;
pub use layout::*;
use log::warn;
pub use scroll::*;
pub use shadow::*;
use std::fmt;

/// Longest formatted output [TextDisplay::print] writes, in bytes. The rest is dropped.
pub const PRINT_BUFFER_LEN: usize = 1024;

#[derive(Debug)]
pub struct TextDisplay<'d> {
    lcd: &'d mut dyn HD44780Driver,
    layout: Layout,
    row: usize,
    col: usize,
    scroll: Box<dyn ScrollStrategy>,
    activity: Box<dyn Activity + 'd>,
}

impl<'d> TextDisplay<'d> {
    /// Creates a display that scrolls with a [RedrawScroll].
    ///
    /// The controller is expected to be initialized and cleared, with the cursor at the origin.
    pub fn new(lcd: &'d mut dyn HD44780Driver, layout: Layout) -> Self {
        Self {
            lcd,
            layout,
            row: 0,
            col: 0,
            scroll: Box::new(RedrawScroll::new(&layout)),
            activity: Box::new(NoActivity),
        }
    }

    /// Creates a display that scrolls with `scroll`.
    ///
    /// # Errors
    /// - `LcdError::NotSupported` if `scroll` can't handle `layout`.
    pub fn with_scroll(
        lcd: &'d mut dyn HD44780Driver,
        layout: Layout,
        mut scroll: Box<dyn ScrollStrategy>,
    ) -> LcdResult<Self> {
        scroll.attach(&layout)?;
        Ok(Self {
            scroll,
            ..Self::new(lcd, layout)
        })
    }

    /// Reports every written character to `activity`, e.g. an [crate::backlight::AutoDim].
    pub fn with_activity(mut self, activity: impl Activity + 'd) -> Self {
        self.activity = Box::new(activity);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Logical cursor as (row, column).
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn scroll_strategy(&self) -> &dyn ScrollStrategy {
        self.scroll.as_ref()
    }

    /// The shadow buffer, if the scroll strategy keeps one.
    pub fn shadow(&self) -> Option<&ShadowBuffer> {
        self.scroll.shadow()
    }

    /// Text of `row` according to the shadow buffer.
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.shadow()
            .filter(|_| row < self.layout.rows())
            .map(|shadow| shadow.row_text(row))
    }

    /// Direct access to the controller. Bypasses the cursor and the shadow buffer.
    pub fn driver(&mut self) -> &mut dyn HD44780Driver {
        &mut *self.lcd
    }

    /// Writes one byte at the cursor and advances it.
    ///
    /// `\n` moves to the start of the next row without writing anything. Running off the last
    /// column wraps to the next row, running off the last row scrolls.
    pub fn put_byte(&mut self, byte: u8) -> LcdResult<()> {
        self.wake()?;

        if byte == b'\n' {
            self.col = 0;
            self.row += 1;
        } else {
            self.lcd.send_data(byte)?;
            self.scroll.record(self.row, self.col, byte);
            self.col += 1;
            if self.col == self.layout.cols() {
                self.col = 0;
                self.row += 1;
            }
        }

        if self.row == self.layout.rows() {
            let scrolled = self.scroll.scroll_up(&mut *self.lcd, &self.layout);
            // The cursor has to be back on the screen even if the scroll failed halfway
            self.row -= scrolled.as_ref().map_or(1, |&moved| moved);
            scrolled?;
        }
        if self.col == 0 {
            // The address counter doesn't follow the row layout
            let address = self.scroll.row_address(&self.layout, self.row);
            self.lcd.set_ddram_address(address)?;
        }
        Ok(())
    }

    /// Writes a character. The controller only has 8-bit character codes, wider characters are
    /// replaced with `?`.
    pub fn put_char(&mut self, c: char) -> LcdResult<()> {
        let byte = u8::try_from(c).unwrap_or_else(|_| {
            warn!("Character {:?} not supported by the LCD, replacing with '?'", c);
            b'?'
        });
        self.put_byte(byte)
    }

    pub fn put_str(&mut self, text: &str) -> LcdResult<()> {
        text.chars().try_for_each(|c| self.put_char(c))
    }

    /// Writes formatted text, at most [PRINT_BUFFER_LEN] bytes of it.
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> LcdResult<()> {
        let mut text = fmt::format(args);
        if text.len() > PRINT_BUFFER_LEN {
            warn!(
                "Formatted output of {} bytes truncated to {}",
                text.len(),
                PRINT_BUFFER_LEN
            );
            let mut end = PRINT_BUFFER_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        self.put_str(&text)
    }

    /// Clears the display, the shadow buffer and the scroll state, and moves the cursor home.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.lcd.clear_display()?;
        self.row = 0;
        self.col = 0;
        self.scroll.on_clear();
        Ok(())
    }

    /// Moves the cursor home. The content stays, but the display shift is undone.
    pub fn home(&mut self) -> LcdResult<()> {
        self.lcd.return_home()?;
        self.row = 0;
        self.col = 0;
        self.scroll.on_home();
        Ok(())
    }

    /// Moves the cursor.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if the position is not on the screen.
    pub fn set_cursor(&mut self, row: usize, col: usize) -> LcdResult<()> {
        if !self.layout.contains(row, col) {
            return Err(LcdError::InvalidArgument);
        }
        self.row = row;
        self.col = col;
        self.sync_cursor()
    }

    /// Sets the address counter to the logical cursor.
    fn sync_cursor(&mut self) -> LcdResult<()> {
        let address = self.scroll.row_address(&self.layout, self.row) + self.col as u8;
        self.lcd.set_ddram_address(address)
    }

    /// Reports a write to the activity timer, turning the backlight on if it asks to.
    fn wake(&mut self) -> LcdResult<()> {
        if self.activity.kick() {
            self.lcd.set_backlight(true)?;
        }
        Ok(())
    }

    /// Reads the busy flag and address counter.
    pub fn is_busy(&mut self) -> LcdResult<(bool, u8)> {
        self.lcd.get_busy_flag_and_address()
    }

    pub fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        self.lcd.set_backlight(on)
    }

    /// Turns the backlight off if the activity timeout has passed. Returns whether it did.
    pub fn service_backlight(&mut self) -> LcdResult<bool> {
        if !self.activity.take_expired() {
            return Ok(false);
        }
        self.lcd.set_backlight(false)?;
        Ok(true)
    }

    /// Cancels any pending backlight timeout and hands the driver back.
    pub fn release(mut self) -> &'d mut dyn HD44780Driver {
        self.activity.cancel();
        self.lcd
    }
}

impl fmt::Write for TextDisplay<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlight::AutoDim;
    use crate::backlight::tests::ManualScheduler;
    use crate::driver::{BusWidth, CLEAR_SETTLE_US, CMD_CLEAR, Hd44780};
    use crate::interface::{LcdInterface, RegisterInterface};
    use crate::sim::{SimClock, SimDelay, SimProbe, SimulatedLcd};
    use std::cell::Cell;
    use std::fmt::Write;
    use std::rc::Rc;

    const WELCOME: &str = "Welcome to your\nHitachi HD44780U\ndriving a 20x4 LCD!\n";

    fn simulator(wiring: BusWidth) -> (SimulatedLcd, SimProbe, SimClock) {
        let clock = SimClock::new();
        let sim = SimulatedLcd::new(clock.clone(), wiring);
        let probe = sim.probe();
        (sim, probe, clock)
    }

    fn driver(sim: &mut SimulatedLcd, clock: SimClock, width: u8) -> Hd44780<'_, SimDelay> {
        let mut lcd = Hd44780::with_interface(LcdInterface::Signals(sim), SimDelay::new(clock));
        lcd.init(width).unwrap();
        lcd
    }

    fn padded(text: &str, cols: usize) -> String {
        format!("{:cols$}", text)
    }

    #[test]
    fn welcome_scenario() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.clear().unwrap();
        text.put_str(WELCOME).unwrap();

        assert_eq!(text.cursor(), (3, 0));
        let expected = [
            padded("Welcome to your", 20),
            padded("Hitachi HD44780U", 20),
            padded("driving a 20x4 LCD!", 20),
            padded("", 20),
        ];
        for (row, line) in expected.iter().enumerate() {
            assert_eq!(text.row_text(row).as_ref(), Some(line));
        }
        assert_eq!(probe.screen(&Layout::LCD_20X4), expected);
        assert_eq!(probe.address(), 84);
        assert_eq!(probe.timing_violations(), 0);
    }

    #[test]
    fn welcome_scenario_over_four_bits() {
        let (mut sim, probe, clock) = simulator(BusWidth::Four);
        let mut lcd = driver(&mut sim, clock, 4);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.put_str(WELCOME).unwrap();
        assert_eq!(probe.row_text(&Layout::LCD_20X4, 2), padded("driving a 20x4 LCD!", 20));
        assert_eq!(probe.timing_violations(), 0);
    }

    #[test]
    fn exactly_cols_bytes_stay_on_the_row() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.put_str(&"a".repeat(19)).unwrap();
        assert_eq!(text.cursor(), (0, 19));
        text.put_byte(b'b').unwrap();
        assert_eq!(text.cursor(), (1, 0));
        text.put_byte(b'c').unwrap();
        assert_eq!(text.cursor(), (1, 1));

        assert_eq!(text.row_text(0), Some(format!("{}b", "a".repeat(19))));
        assert_eq!(text.row_text(1), Some(padded("c", 20)));
        assert_eq!(probe.ddram(64), b'c');
    }

    #[test]
    fn one_screen_plus_one_byte_scrolls_once() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let layout = Layout::LCD_16X2;
        let mut text = TextDisplay::new(&mut lcd, layout);
        probe.clear_log();

        let input: Vec<u8> = (0..layout.cells() + 1).map(|i| b'A' + (i % 26) as u8).collect();
        for &byte in &input {
            text.put_byte(byte).unwrap();
        }

        // Each redraw repaints both rows from their first column
        let row_starts = probe
            .commands()
            .iter()
            .filter(|&&command| command == 0x80)
            .count();
        assert_eq!(row_starts, 1);
        let last = input[layout.cells()] as char;
        assert_eq!(text.row_text(1), Some(padded(&last.to_string(), 16)));
        assert_eq!(
            text.row_text(0).map(String::into_bytes),
            Some(input[16..32].to_vec())
        );
        assert_eq!(text.cursor(), (1, 1));
        assert_eq!(probe.screen(&layout)[1], padded(&last.to_string(), 16));
    }

    #[test]
    fn newline_writes_nothing() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);
        probe.clear_log();

        text.put_str("ab\n\n").unwrap();
        assert_eq!(text.cursor(), (2, 0));
        assert_eq!(text.row_text(0), Some(padded("ab", 20)));
        assert_eq!(text.row_text(1), Some(padded("", 20)));
        assert_eq!(probe.commands(), [0x80 | 64, 0x80 | 20]);
    }

    #[test]
    fn clear_resets_cursor_and_shadow() {
        let (mut sim, _probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.put_str("some\ntext").unwrap();
        text.clear().unwrap();
        assert_eq!(text.cursor(), (0, 0));
        assert_eq!(text.shadow(), Some(&ShadowBuffer::new(4, 20)));
        assert!(!text.is_busy().unwrap().0);

        text.driver().send_command(CMD_CLEAR).unwrap();
        assert!(text.is_busy().unwrap().0);
        text.driver().delay_us(CLEAR_SETTLE_US);
        assert_eq!(text.is_busy().unwrap(), (false, 0));
    }

    #[test]
    fn home_keeps_the_content() {
        let (mut sim, _probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.put_str("abc").unwrap();
        text.home().unwrap();
        assert_eq!(text.cursor(), (0, 0));
        text.put_byte(b'X').unwrap();
        assert_eq!(text.row_text(0), Some(padded("Xbc", 20)));
    }

    #[test]
    fn shift_scroll_moves_two_rows() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let layout = Layout::LCD_20X4;
        let mut text =
            TextDisplay::with_scroll(&mut lcd, layout, Box::new(ShiftScroll::new())).unwrap();

        text.put_str("a\nb\nc\nd\ne").unwrap();
        assert_eq!(text.cursor(), (2, 1));
        assert!(text.shadow().is_none());
        assert_eq!(
            probe.screen(&layout),
            [padded("c", 20), padded("d", 20), padded("e", 20), padded("", 20)]
        );

        text.put_str("\nf\ng").unwrap();
        assert_eq!(
            probe.screen(&layout),
            [padded("e", 20), padded("f", 20), padded("g", 20), padded("", 20)]
        );
        assert_eq!(probe.display_shift(), 0);
        assert_eq!(probe.timing_violations(), 0);
    }

    #[test]
    fn shift_scroll_rejects_other_layouts() {
        let (mut sim, _probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let result = TextDisplay::with_scroll(&mut lcd, Layout::LCD_16X2, Box::new(ShiftScroll::new()));
        assert_eq!(result.err(), Some(LcdError::NotSupported));
    }

    #[test]
    fn redraw_scroll_keeps_the_screen_in_step() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let layout = Layout::LCD_20X4;
        let mut text = TextDisplay::new(&mut lcd, layout);

        text.put_str("a\nb\nc\nd\ne").unwrap();
        let expected = [padded("b", 20), padded("c", 20), padded("d", 20), padded("e", 20)];
        assert_eq!(probe.screen(&layout), expected);
        for (row, line) in expected.iter().enumerate() {
            assert_eq!(text.row_text(row).as_ref(), Some(line));
        }
        assert_eq!(text.cursor(), (3, 1));
    }

    #[test]
    fn set_cursor_is_bounds_checked() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.set_cursor(2, 5).unwrap();
        assert_eq!(probe.address(), 25);
        assert_eq!(text.set_cursor(4, 0), Err(LcdError::InvalidArgument));
        assert_eq!(text.set_cursor(0, 20), Err(LcdError::InvalidArgument));
        assert_eq!(text.cursor(), (2, 5));
    }

    #[test]
    fn wide_characters_become_question_marks() {
        let (mut sim, _probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);

        text.put_str("5€ é").unwrap();
        assert_eq!(
            text.shadow().map(|s| s.row(0)[..4].to_vec()),
            Some(vec![b'5', b'?', b' ', 0xE9])
        );
    }

    #[test]
    fn print_formats_and_truncates() {
        let (mut sim, _probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_40X2);

        text.print(format_args!("[{:.3} seconds]", 0.25)).unwrap();
        assert_eq!(text.row_text(0), Some(padded("[0.250 seconds]", 40)));

        write!(text, "\n{}", 42).unwrap();
        assert_eq!(text.cursor(), (1, 2));

        text.clear().unwrap();
        text.print(format_args!("{}", "x".repeat(PRINT_BUFFER_LEN + 7))).unwrap();
        // 1024 bytes on 80 cells: the cursor ends 1024 % 40 columns into the last row
        assert_eq!(text.cursor(), (1, PRINT_BUFFER_LEN % 40));
    }

    #[test]
    fn activity_controls_the_backlight() {
        let (mut sim, probe, clock) = simulator(BusWidth::Eight);
        let mut lcd = driver(&mut sim, clock, 8);
        let scheduler = ManualScheduler::default();
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4)
            .with_activity(AutoDim::new(scheduler.clone()));

        assert!(!probe.backlight());
        text.put_byte(b'x').unwrap();
        assert!(probe.backlight());
        assert!(!text.service_backlight().unwrap());

        scheduler.fire();
        assert!(text.service_backlight().unwrap());
        assert!(!probe.backlight());

        text.put_byte(b'y').unwrap();
        assert!(probe.backlight());
        text.release();
        assert_eq!(scheduler.0.borrow().cancelled, 1);
    }

    /// Register access to a simulator. Fails the write `fail_in` writes from now, once.
    #[derive(Debug)]
    struct FlakyRegisters {
        sim: SimulatedLcd,
        fail_in: Rc<Cell<Option<usize>>>,
    }

    impl RegisterInterface for FlakyRegisters {
        fn write(&mut self, value: u8, data: bool) -> LcdResult<()> {
            match self.fail_in.get() {
                Some(0) => {
                    self.fail_in.set(None);
                    Err(LcdError::Io(std::io::ErrorKind::BrokenPipe))
                }
                Some(n) => {
                    self.fail_in.set(Some(n - 1));
                    self.sim.write(value, data)
                }
                None => self.sim.write(value, data),
            }
        }

        fn read(&mut self, data: bool) -> LcdResult<u8> {
            self.sim.read(data)
        }

        fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
            RegisterInterface::set_backlight(&mut self.sim, on)
        }
    }

    #[test]
    fn failed_scroll_leaves_the_cursor_on_screen() {
        let (sim, _probe, clock) = simulator(BusWidth::Eight);
        let fail_in = Rc::new(Cell::new(None));
        let mut registers = FlakyRegisters {
            sim,
            fail_in: fail_in.clone(),
        };
        let mut lcd =
            Hd44780::with_interface(LcdInterface::Registers(&mut registers), SimDelay::new(clock));
        lcd.init(8).unwrap();
        let mut text = TextDisplay::new(&mut lcd, Layout::LCD_20X4);
        text.put_str("a\nb\nc\nd").unwrap();

        // The repaint's first write
        fail_in.set(Some(0));
        assert_eq!(
            text.put_byte(b'\n'),
            Err(LcdError::Io(std::io::ErrorKind::BrokenPipe))
        );
        assert_eq!(text.cursor(), (3, 0));

        text.put_byte(b'x').unwrap();
        assert_eq!(text.cursor(), (3, 1));
        assert_eq!(text.row_text(0), Some(padded("b", 20)));
        assert_eq!(text.row_text(3), Some(padded("x", 20)));
    }
}
