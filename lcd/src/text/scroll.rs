use crate::driver::{CursorDirection, HD44780Driver};
use crate::text::{Layout, ShadowBuffer};
use crate::{LcdError, LcdResult};
use log::debug;
use std::fmt::Debug;

/// How [super::TextDisplay] scrolls when the cursor runs off the last row.
///
/// The two implementations keep incompatible ideas of where a row lives in DDRAM, so a display
/// uses exactly one of them for its whole life.
pub trait ScrollStrategy: Debug {
    /// Prepares the strategy for `layout`.
    ///
    /// # Errors
    /// - `LcdError::NotSupported` if the strategy can't scroll this layout.
    fn attach(&mut self, layout: &Layout) -> LcdResult<()>;

    /// DDRAM address of the first column of the logical `row`.
    fn row_address(&self, layout: &Layout, row: usize) -> u8;

    /// A byte was written at the logical (`row`, `col`).
    fn record(&mut self, _row: usize, _col: usize, _byte: u8) {}

    /// The display was cleared.
    fn on_clear(&mut self);

    /// The controller returned home, which also undoes any display shift.
    fn on_home(&mut self) {}

    /// Scrolls the content up and returns by how many rows it moved.
    fn scroll_up(&mut self, lcd: &mut dyn HD44780Driver, layout: &Layout) -> LcdResult<usize>;

    fn shadow(&self) -> Option<&ShadowBuffer> {
        None
    }

    fn shadow_mut(&mut self) -> Option<&mut ShadowBuffer> {
        None
    }
}

/// Scrolls by moving the [ShadowBuffer] up one row and repainting the whole screen.
///
/// Works on every layout. Each scroll costs a full repaint.
#[derive(Debug)]
pub struct RedrawScroll {
    shadow: ShadowBuffer,
}

impl RedrawScroll {
    pub fn new(layout: &Layout) -> Self {
        Self {
            shadow: ShadowBuffer::for_layout(layout),
        }
    }
}

impl ScrollStrategy for RedrawScroll {
    fn attach(&mut self, layout: &Layout) -> LcdResult<()> {
        self.shadow = ShadowBuffer::for_layout(layout);
        Ok(())
    }

    fn row_address(&self, layout: &Layout, row: usize) -> u8 {
        layout.row_address(row)
    }

    fn record(&mut self, row: usize, col: usize, byte: u8) {
        self.shadow.set(row, col, byte);
    }

    fn on_clear(&mut self) {
        self.shadow.fill(b' ');
    }

    fn scroll_up(&mut self, lcd: &mut dyn HD44780Driver, layout: &Layout) -> LcdResult<usize> {
        debug!("Scrolling up by redrawing");
        self.shadow.scroll_up(0, layout.rows(), 1);
        self.shadow.redraw(lcd, layout)?;
        Ok(1)
    }

    fn shadow(&self) -> Option<&ShadowBuffer> {
        Some(&self.shadow)
    }

    fn shadow_mut(&mut self) -> Option<&mut ShadowBuffer> {
        Some(&mut self.shadow)
    }
}

/// Scrolls with the controller's display shift, without a shadow buffer.
///
/// Only for folded layouts (see [Layout::is_folded]): shifting the display by one row width swaps
/// the halves of both physical lines, which moves the content up by two rows. The two rows that
/// come into view at the bottom are blanked. Every other scroll shifts back the other way, so the
/// phase flag tells which half of each line is at the top.
#[derive(Debug, Default)]
pub struct ShiftScroll {
    shifted: bool,
}

impl ShiftScroll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shifted(&self) -> bool {
        self.shifted
    }

    fn row_xor(&self) -> usize {
        if self.shifted { 2 } else { 0 }
    }
}

impl ScrollStrategy for ShiftScroll {
    fn attach(&mut self, layout: &Layout) -> LcdResult<()> {
        if !layout.is_folded() {
            return Err(LcdError::NotSupported);
        }
        self.shifted = false;
        Ok(())
    }

    fn row_address(&self, layout: &Layout, row: usize) -> u8 {
        layout.row_address(row ^ self.row_xor())
    }

    fn on_clear(&mut self) {
        self.shifted = false;
    }

    fn on_home(&mut self) {
        self.shifted = false;
    }

    fn scroll_up(&mut self, lcd: &mut dyn HD44780Driver, layout: &Layout) -> LcdResult<usize> {
        let (direction, xor) = if self.shifted {
            (CursorDirection::Right, 2)
        } else {
            (CursorDirection::Left, 0)
        };
        debug!("Scrolling up by shifting {:?}", direction);

        for _ in 0..layout.cols() {
            lcd.cursor_shift(true, direction)?;
        }
        for row in [xor, 1 ^ xor] {
            lcd.set_ddram_address(layout.row_address(row))?;
            for _ in 0..layout.cols() {
                lcd.send_data(b' ')?;
            }
        }
        self.shifted = !self.shifted;
        Ok(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Commands(Vec<u8>, Vec<u8>);

    impl HD44780Driver for Commands {
        fn send_command(&mut self, command: u8) -> LcdResult<()> {
            self.0.push(command);
            Ok(())
        }

        fn send_data(&mut self, data: u8) -> LcdResult<()> {
            self.1.push(data);
            Ok(())
        }

        fn read_command(&mut self) -> LcdResult<u8> {
            Err(LcdError::NotSupported)
        }

        fn read_data(&mut self) -> LcdResult<u8> {
            Err(LcdError::NotSupported)
        }

        fn set_backlight(&mut self, _on: bool) -> LcdResult<()> {
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn shift_needs_a_folded_layout() {
        assert_eq!(
            ShiftScroll::new().attach(&Layout::LCD_16X4),
            Err(LcdError::NotSupported)
        );
        assert!(ShiftScroll::new().attach(&Layout::LCD_20X4).is_ok());
    }

    #[test]
    fn shift_alternates_direction_and_blanked_rows() {
        let layout = Layout::LCD_20X4;
        let mut scroll = ShiftScroll::new();
        let mut lcd = Commands::default();

        assert_eq!(scroll.scroll_up(&mut lcd, &layout).unwrap(), 2);
        assert!(scroll.is_shifted());
        assert_eq!(lcd.0[..20], [0x18; 20]);
        assert_eq!(lcd.0[20..], [0x80, 0x80 | 64]);
        assert_eq!(lcd.1, [b' '; 40]);
        assert_eq!(scroll.row_address(&layout, 0), 20);
        assert_eq!(scroll.row_address(&layout, 3), 64);

        lcd.0.clear();
        scroll.scroll_up(&mut lcd, &layout).unwrap();
        assert!(!scroll.is_shifted());
        assert_eq!(lcd.0[..20], [0x1C; 20]);
        assert_eq!(lcd.0[20..], [0x80 | 20, 0x80 | 84]);
    }

    #[test]
    fn home_and_clear_reset_the_phase() {
        let layout = Layout::LCD_20X4;
        let mut scroll = ShiftScroll::new();
        scroll.scroll_up(&mut Commands::default(), &layout).unwrap();
        scroll.on_home();
        assert_eq!(scroll.row_address(&layout, 2), 20);
        scroll.scroll_up(&mut Commands::default(), &layout).unwrap();
        scroll.on_clear();
        assert!(!scroll.is_shifted());
    }

    #[test]
    fn redraw_repaints_every_row() {
        let layout = Layout::LCD_16X2;
        let mut scroll = RedrawScroll::new(&layout);
        scroll.record(1, 0, b'x');
        let mut lcd = Commands::default();

        assert_eq!(scroll.scroll_up(&mut lcd, &layout).unwrap(), 1);
        assert_eq!(lcd.0, [0x80, 0xC0]);
        assert_eq!(lcd.1.len(), 32);
        assert_eq!(lcd.1[0], b'x');
        assert_eq!(scroll.shadow().map(|s| s.row_text(1)), Some(" ".repeat(16)));
    }
}
