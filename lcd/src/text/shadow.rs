use crate::LcdResult;
use crate::driver::HD44780Driver;
use crate::text::Layout;

/// Copy of what was last written to each visible cell, row-major.
///
/// The controller can be read back, but not on every wiring, so the text engine keeps its own
/// copy to repaint from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ShadowBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

impl ShadowBuffer {
    /// Creates a buffer of spaces.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![b' '; rows * cols],
        }
    }

    pub fn for_layout(layout: &Layout) -> Self {
        Self::new(layout.rows(), layout.cols())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    /// The row as text, bytes mapped one to one onto chars.
    pub fn row_text(&self, row: usize) -> String {
        self.row(row).iter().map(|&byte| char::from(byte)).collect()
    }

    pub fn set(&mut self, row: usize, col: usize, byte: u8) {
        self.cells[row * self.cols + col] = byte;
    }

    pub fn fill(&mut self, byte: u8) {
        self.cells.fill(byte);
    }

    pub fn blank_region(&mut self, row: usize, col: usize, height: usize, width: usize) {
        for r in row..row + height {
            let start = r * self.cols + col;
            self.cells[start..start + width].fill(b' ');
        }
    }

    /// Moves rows `top..bottom` up by `count`, blanking the rows that open up at the bottom.
    pub fn scroll_up(&mut self, top: usize, bottom: usize, count: usize) {
        let count = count.min(bottom - top);
        let cols = self.cols;
        self.cells
            .copy_within((top + count) * cols..bottom * cols, top * cols);
        self.cells[(bottom - count) * cols..bottom * cols].fill(b' ');
    }

    /// Moves rows `top..bottom` down by `count`, blanking the rows that open up at the top.
    pub fn scroll_down(&mut self, top: usize, bottom: usize, count: usize) {
        let count = count.min(bottom - top);
        let cols = self.cols;
        self.cells
            .copy_within(top * cols..(bottom - count) * cols, (top + count) * cols);
        self.cells[top * cols..(top + count) * cols].fill(b' ');
    }

    /// Copies a `height`×`width` block. Source and destination may overlap.
    pub fn copy_block(
        &mut self,
        (src_row, src_col): (usize, usize),
        (dst_row, dst_col): (usize, usize),
        height: usize,
        width: usize,
    ) {
        let block: Vec<u8> = (src_row..src_row + height)
            .flat_map(|r| self.row(r)[src_col..src_col + width].to_vec())
            .collect();
        for (i, chunk) in block.chunks(width.max(1)).enumerate() {
            let start = (dst_row + i) * self.cols + dst_col;
            self.cells[start..start + width].copy_from_slice(chunk);
        }
    }

    /// Writes a region back to the display, one row at a time from its DDRAM address.
    ///
    /// Leaves the address counter behind the last cell written.
    pub fn redraw_region(
        &self,
        lcd: &mut dyn HD44780Driver,
        layout: &Layout,
        (row, col): (usize, usize),
        height: usize,
        width: usize,
    ) -> LcdResult<()> {
        for r in row..row + height {
            lcd.set_ddram_address(layout.address(r, col))?;
            for &byte in &self.row(r)[col..col + width] {
                lcd.send_data(byte)?;
            }
        }
        Ok(())
    }

    /// [Self::redraw_region] for the whole screen.
    pub fn redraw(&self, lcd: &mut dyn HD44780Driver, layout: &Layout) -> LcdResult<()> {
        self.redraw_region(lcd, layout, (0, 0), self.rows, self.cols)
    }
}
