use crate::{LcdError, LcdResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Most rows a display can have, the controller only drives two physical lines of 40 characters.
pub const MAX_ROWS: usize = 4;
/// Length of one physical line of DDRAM.
pub const LINE_LENGTH: usize = 40;

/// Geometry of a display and where each of its rows starts in DDRAM.
///
/// The controller only has two lines, starting at `0x00` and `0x40`. Displays with four rows fold
/// each of them in half, so rows 2 and 3 continue rows 0 and 1 further into the line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Layout {
    rows: usize,
    cols: usize,
    row_addresses: [u8; MAX_ROWS],
}

impl Layout {
    pub const LCD_16X2: Layout = Layout {
        rows: 2,
        cols: 16,
        row_addresses: [0x00, 0x40, 0, 0],
    };
    pub const LCD_20X2: Layout = Layout {
        rows: 2,
        cols: 20,
        row_addresses: [0x00, 0x40, 0, 0],
    };
    pub const LCD_40X2: Layout = Layout {
        rows: 2,
        cols: 40,
        row_addresses: [0x00, 0x40, 0, 0],
    };
    pub const LCD_16X4: Layout = Layout {
        rows: 4,
        cols: 16,
        row_addresses: [0, 64, 16, 80],
    };
    pub const LCD_20X4: Layout = Layout {
        rows: 4,
        cols: 20,
        row_addresses: [0, 64, 20, 84],
    };

    /// Creates a layout with the given DDRAM address for the start of each row.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if there are not 1 to 4 rows of 1 to 40 columns, there isn't
    ///   exactly one address per row, or a row doesn't fit in its physical line.
    pub fn new(rows: usize, cols: usize, row_addresses: &[u8]) -> LcdResult<Self> {
        if !(1..=MAX_ROWS).contains(&rows)
            || !(1..=LINE_LENGTH).contains(&cols)
            || row_addresses.len() != rows
        {
            return Err(LcdError::InvalidArgument);
        }

        let mut addresses = [0; MAX_ROWS];
        for (slot, &address) in addresses.iter_mut().zip(row_addresses) {
            let offset = usize::from(address & 0x3F);
            if address & 0x80 != 0 || offset + cols > LINE_LENGTH {
                return Err(LcdError::InvalidArgument);
            }
            *slot = address;
        }

        Ok(Self {
            rows,
            cols,
            row_addresses: addresses,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// Whether (`row`, `col`) is on the screen.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// Whether the `height`×`width` region at (`row`, `col`) is entirely on the screen.
    pub fn contains_region(&self, row: usize, col: usize, height: usize, width: usize) -> bool {
        row + height <= self.rows && col + width <= self.cols
    }

    /// DDRAM address of the first column of `row`.
    ///
    /// # Panics
    /// If `row` is not below [MAX_ROWS].
    pub fn row_address(&self, row: usize) -> u8 {
        self.row_addresses[row]
    }

    /// DDRAM address of (`row`, `col`).
    pub fn address(&self, row: usize, col: usize) -> u8 {
        self.row_address(row) + col as u8
    }

    /// Whether the rows are two physical lines folded in half: rows 2 and 3 continue rows 0 and 1,
    /// and two rows fill a whole line. Shifting the display by one row width then moves the
    /// content by two rows.
    pub fn is_folded(&self) -> bool {
        let [first, second, third, fourth] = self.row_addresses;
        let cols = self.cols as u8;
        self.rows == 4
            && self.cols * 2 == LINE_LENGTH
            && first & 0x40 == 0
            && second & 0x40 != 0
            && third == first + cols
            && fourth == second + cols
    }
}

impl FromStr for Layout {
    type Err = LcdError;

    /// Parses `COLSxROWS`, e.g. `20x4`, for the supplied layouts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "16x2" => Ok(Layout::LCD_16X2),
            "20x2" => Ok(Layout::LCD_20X2),
            "40x2" => Ok(Layout::LCD_40X2),
            "16x4" => Ok(Layout::LCD_16X4),
            "20x4" => Ok(Layout::LCD_20X4),
            _ => Err(LcdError::InvalidArgument),
        }
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}
