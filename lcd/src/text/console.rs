//! Console surface operations.
//!
//! What a terminal layer needs to use a [TextDisplay] as its screen: drawing at arbitrary
//! positions, clearing and moving regions, and cursor control. None of these move the logical
//! cursor (except [TextDisplay::move_cursor]), and the address counter is put back on it
//! afterwards.

use crate::text::{ShadowBuffer, TextDisplay};
use crate::{LcdError, LcdResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ScrollDirection {
    /// Content moves towards row 0.
    Up,
    Down,
}

impl TextDisplay<'_> {
    fn check_region(&self, row: usize, col: usize, height: usize, width: usize) -> LcdResult<()> {
        if !self.layout.contains_region(row, col, height, width) {
            return Err(LcdError::InvalidArgument);
        }
        Ok(())
    }

    /// Blanks a `height`×`width` region, both on the display and in the shadow buffer.
    ///
    /// The whole screen is cleared with [TextDisplay::clear] instead, which also moves the cursor
    /// home.
    pub fn clear_region(
        &mut self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> LcdResult<()> {
        self.check_region(row, col, height, width)?;
        self.wake()?;
        if (row, col, height, width) == (0, 0, self.layout.rows(), self.layout.cols()) {
            return self.clear();
        }

        for r in row..row + height {
            let address = self.scroll.row_address(&self.layout, r) + col as u8;
            self.lcd.set_ddram_address(address)?;
            for c in col..col + width {
                self.lcd.send_data(b' ')?;
                self.scroll.record(r, c, b' ');
            }
        }
        self.sync_cursor()
    }

    /// Writes `byte` at (`row`, `col`).
    pub fn put_char_at(&mut self, row: usize, col: usize, byte: u8) -> LcdResult<()> {
        self.put_str_at(row, col, &[byte])
    }

    /// Writes `text` starting at (`row`, `col`). Whatever doesn't fit in the row is dropped.
    pub fn put_str_at(&mut self, row: usize, col: usize, text: &[u8]) -> LcdResult<()> {
        self.check_region(row, col, 1, 1)?;
        self.wake()?;

        let address = self.scroll.row_address(&self.layout, row) + col as u8;
        self.lcd.set_ddram_address(address)?;
        let fits = text.len().min(self.layout.cols() - col);
        for (i, &byte) in text[..fits].iter().enumerate() {
            self.lcd.send_data(byte)?;
            self.scroll.record(row, col + i, byte);
        }
        self.sync_cursor()
    }

    /// Moves the cursor to (`row`, `col`) and shows it blinking, or hides it.
    ///
    /// A hidden cursor stays where it is.
    pub fn move_cursor(&mut self, row: usize, col: usize, visible: bool) -> LcdResult<()> {
        if !visible {
            return self.lcd.set_display_control(true, false, false);
        }
        if (row, col) != (self.row, self.col) {
            self.set_cursor(row, col)?;
        }
        self.lcd.set_display_control(true, true, true)
    }

    fn shadow_or_unsupported(&mut self) -> LcdResult<&mut ShadowBuffer> {
        self.scroll.shadow_mut().ok_or(LcdError::NotSupported)
    }

    /// Scrolls rows `top..bottom` by `count` rows, blanking the rows that open up.
    ///
    /// # Errors
    /// - `LcdError::NotSupported` without a shadow buffer to repaint from.
    /// - `LcdError::InvalidArgument` if the rows are not on the screen.
    pub fn scroll_region(
        &mut self,
        top: usize,
        bottom: usize,
        direction: ScrollDirection,
        count: usize,
    ) -> LcdResult<()> {
        if top >= bottom {
            return Err(LcdError::InvalidArgument);
        }
        self.check_region(top, 0, bottom - top, self.layout.cols())?;

        let shadow = self.shadow_or_unsupported()?;
        match direction {
            ScrollDirection::Up => shadow.scroll_up(top, bottom, count),
            ScrollDirection::Down => shadow.scroll_down(top, bottom, count),
        }
        self.wake()?;
        self.redraw_region(top, 0, bottom - top, self.layout.cols())
    }

    /// Copies a `height`×`width` block from (`src_row`, `src_col`) to (`dst_row`, `dst_col`).
    ///
    /// # Errors
    /// - `LcdError::NotSupported` without a shadow buffer to copy from.
    /// - `LcdError::InvalidArgument` if either block is not on the screen.
    pub fn block_move(
        &mut self,
        (src_row, src_col): (usize, usize),
        (dst_row, dst_col): (usize, usize),
        height: usize,
        width: usize,
    ) -> LcdResult<()> {
        self.check_region(src_row, src_col, height, width)?;
        self.check_region(dst_row, dst_col, height, width)?;

        let shadow = self.shadow_or_unsupported()?;
        shadow.copy_block((src_row, src_col), (dst_row, dst_col), height, width);
        self.wake()?;
        self.redraw_region(dst_row, dst_col, height, width)
    }

    fn redraw_region(
        &mut self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> LcdResult<()> {
        if let Some(shadow) = self.scroll.shadow() {
            shadow.redraw_region(&mut *self.lcd, &self.layout, (row, col), height, width)?;
        }
        self.sync_cursor()
    }

    /// Blanking the screen turns off the backlight.
    pub fn blank(&mut self, blank: bool) -> LcdResult<()> {
        self.lcd.set_backlight(!blank)
    }
}
