//! Software HD44780 controller.
//!
//! [SimulatedLcd] sits behind the same [SignalInterface] a GPIO wiring does, and latches what it
//! sees on the falling edge of E, exactly like the controller. Execution times are measured on a
//! shared [SimClock], which only moves when a [SimDelay] waits, so tests run in simulated time and
//! can check the busy flag deterministically.
//!
//! A [SimProbe] looks at the controller from the outside: the visible screen, the instruction log
//! and any transfers that arrived while the controller was still busy.

use crate::LcdResult;
use crate::delay::DelayNs;
use crate::driver::{
    ADDRESS_MASK, BUSY_FLAG, BusWidth, CLEAR_SETTLE_US, CMD_CGRAM_ADDRESS, CMD_CLEAR,
    CMD_DDRAM_ADDRESS, CMD_DISPLAY_CONTROL, CMD_ENTRY_MODE, CMD_FUNCTION_SET, CMD_HOME, CMD_SHIFT,
    WRITE_SETTLE_US,
};
use crate::interface::{RegisterInterface, SignalInterface};
use crate::text::Layout;
use log::{trace, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Characters per physical display line.
const LINE_LENGTH: u8 = 40;
const SECOND_LINE: u8 = 0x40;

/// Simulated monotonic time in microseconds.
#[derive(Debug, Clone, Default)]
pub struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

/// A [DelayNs] that advances a [SimClock] instead of waiting.
#[derive(Debug, Clone)]
pub struct SimDelay {
    clock: SimClock,
}

impl SimDelay {
    pub fn new(clock: SimClock) -> Self {
        Self { clock }
    }
}

/// The clock counts whole microseconds, shorter waits round up.
impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(ns.div_ceil(1000).into());
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance(us.into());
    }
}

/// One register write, as the controller executed it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SimTransfer {
    Command(u8),
    Data(u8),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Memory {
    Ddram,
    Cgram,
}

#[derive(Debug)]
struct Controller {
    clock: SimClock,
    wiring: BusWidth,

    rs: bool,
    rw: bool,
    enable: bool,
    lines: u8,
    backlight: bool,

    mode: BusWidth,
    pending_nibble: Option<u8>,
    read_byte: u8,
    read_second_nibble: bool,
    presented: u8,

    ddram: [u8; 128],
    cgram: [u8; 64],
    memory: Memory,
    address: u8,
    increment: bool,
    shift_on_entry: bool,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    two_lines: bool,
    font_5x10: bool,
    window: u8,
    busy_until: u64,

    log: Vec<SimTransfer>,
    violations: usize,
}

impl Controller {
    fn new(clock: SimClock, wiring: BusWidth) -> Self {
        Self {
            clock,
            wiring,
            rs: false,
            rw: false,
            enable: false,
            lines: 0,
            backlight: false,
            mode: BusWidth::Eight,
            pending_nibble: None,
            read_byte: 0,
            read_second_nibble: false,
            presented: 0,
            ddram: [b' '; 128],
            cgram: [0; 64],
            memory: Memory::Ddram,
            address: 0,
            increment: true,
            shift_on_entry: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            two_lines: false,
            font_5x10: false,
            window: 0,
            busy_until: 0,
            log: Vec::new(),
            violations: 0,
        }
    }

    /// The byte the controller sees, with unconnected lines pulled high.
    fn sampled_lines(&self) -> u8 {
        match self.wiring {
            BusWidth::Eight => self.lines,
            BusWidth::Four => self.lines | 0x0F,
        }
    }

    fn falling_edge(&mut self) {
        if self.rw {
            if self.mode == BusWidth::Four && !self.read_second_nibble {
                self.read_second_nibble = true;
            } else {
                self.read_second_nibble = false;
                if self.rs {
                    self.step_address(self.increment);
                }
            }
            return;
        }

        let value = self.sampled_lines();
        match self.mode {
            BusWidth::Eight => self.execute(value, self.rs),
            BusWidth::Four => match self.pending_nibble.take() {
                None => self.pending_nibble = Some(value & 0xF0),
                Some(high) => self.execute(high | (value >> 4), self.rs),
            },
        }
    }

    fn rising_edge(&mut self) {
        if !self.rw {
            return;
        }
        if self.read_second_nibble {
            self.presented = (self.read_byte << 4) | 0x0F;
            return;
        }
        self.read_byte = self.read_value(self.rs);
        self.presented = match (self.mode, self.wiring) {
            (BusWidth::Eight, BusWidth::Eight) => self.read_byte,
            _ => self.read_byte | 0x0F,
        };
    }

    fn read_value(&self, data: bool) -> u8 {
        if data {
            return match self.memory {
                Memory::Ddram => self.ddram[self.address as usize],
                Memory::Cgram => self.cgram[self.address as usize],
            };
        }
        let busy = if self.is_busy() { BUSY_FLAG } else { 0 };
        busy | (self.address & ADDRESS_MASK)
    }

    fn is_busy(&self) -> bool {
        self.clock.now() < self.busy_until
    }

    fn execute(&mut self, value: u8, data: bool) {
        let now = self.clock.now();
        if self.is_busy() {
            self.violations += 1;
            warn!(
                "Transfer {:#04x} arrived {} µs before the controller was ready",
                value,
                self.busy_until - now
            );
        }

        let mut execution_time = WRITE_SETTLE_US;
        if data {
            self.log.push(SimTransfer::Data(value));
            self.write_data(value);
        } else {
            self.log.push(SimTransfer::Command(value));
            if value == CMD_CLEAR || value & !1 == CMD_HOME {
                execution_time = CLEAR_SETTLE_US;
            }
            self.instruction(value);
        }
        self.busy_until = now + u64::from(execution_time);
    }

    fn instruction(&mut self, value: u8) {
        trace!("Executing instruction {:08b}", value);
        if value & CMD_DDRAM_ADDRESS != 0 {
            self.memory = Memory::Ddram;
            self.address = value & ADDRESS_MASK;
        } else if value & CMD_CGRAM_ADDRESS != 0 {
            self.memory = Memory::Cgram;
            self.address = value & 0x3F;
        } else if value & CMD_FUNCTION_SET != 0 {
            self.mode = if value & 0x10 != 0 {
                BusWidth::Eight
            } else {
                BusWidth::Four
            };
            self.two_lines = value & 0x08 != 0;
            self.font_5x10 = value & 0x04 != 0;
        } else if value & CMD_SHIFT != 0 {
            let right = value & 0x04 != 0;
            if value & 0x08 != 0 {
                self.shift_display(!right);
            } else {
                self.step_address(right);
            }
        } else if value & CMD_DISPLAY_CONTROL != 0 {
            self.display_on = value & 0x04 != 0;
            self.cursor_on = value & 0x02 != 0;
            self.blink_on = value & 0x01 != 0;
        } else if value & CMD_ENTRY_MODE != 0 {
            self.increment = value & 0x02 != 0;
            self.shift_on_entry = value & 0x01 != 0;
        } else if value & CMD_HOME != 0 {
            self.memory = Memory::Ddram;
            self.address = 0;
            self.window = 0;
        } else if value & CMD_CLEAR != 0 {
            self.ddram = [b' '; 128];
            self.memory = Memory::Ddram;
            self.address = 0;
            self.increment = true;
            self.window = 0;
        }
    }

    fn write_data(&mut self, value: u8) {
        match self.memory {
            Memory::Ddram => self.ddram[self.address as usize] = value,
            Memory::Cgram => self.cgram[self.address as usize] = value,
        }
        self.step_address(self.increment);
        if self.shift_on_entry && self.memory == Memory::Ddram {
            self.shift_display(self.increment);
        }
    }

    fn step_address(&mut self, forward: bool) {
        let address = self.address;
        self.address = match self.memory {
            Memory::Cgram if forward => address.wrapping_add(1) & 0x3F,
            Memory::Cgram => address.wrapping_sub(1) & 0x3F,
            Memory::Ddram if self.two_lines => match (forward, address) {
                (true, 0x27) => SECOND_LINE,
                (true, 0x67) => 0x00,
                (false, 0x00) => 0x67,
                (false, SECOND_LINE) => 0x27,
                (true, _) => address.wrapping_add(1) & ADDRESS_MASK,
                (false, _) => address.wrapping_sub(1) & ADDRESS_MASK,
            },
            Memory::Ddram => match (forward, address) {
                (true, 0x4F) => 0x00,
                (false, 0x00) => 0x4F,
                (true, _) => address.wrapping_add(1) & ADDRESS_MASK,
                (false, _) => address.wrapping_sub(1) & ADDRESS_MASK,
            },
        };
    }

    /// Shifting left moves the content left, so the visible window starts further right.
    fn shift_display(&mut self, left: bool) {
        self.window = if left {
            (self.window + 1) % LINE_LENGTH
        } else {
            (self.window + LINE_LENGTH - 1) % LINE_LENGTH
        };
    }

    fn row_text(&self, layout: &Layout, row: usize) -> String {
        let base = layout.row_address(row);
        let line = base & SECOND_LINE;
        let offset = base & !SECOND_LINE;
        (0..layout.cols() as u8)
            .map(|col| {
                let address = line | ((offset + col + self.window) % LINE_LENGTH);
                char::from(self.ddram[address as usize])
            })
            .collect()
    }
}

/// A software HD44780.
///
/// `wiring` is how many data lines are connected. With a 4-line wiring D0..D3 float high, just
/// like the controller's pull-ups make them.
#[derive(Debug)]
pub struct SimulatedLcd {
    state: Rc<RefCell<Controller>>,
}

impl SimulatedLcd {
    pub fn new(clock: SimClock, wiring: BusWidth) -> Self {
        Self {
            state: Rc::new(RefCell::new(Controller::new(clock, wiring))),
        }
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe {
            state: Rc::clone(&self.state),
        }
    }
}

impl SignalInterface for SimulatedLcd {
    fn set_rs_rw(&mut self, data: bool, read: bool) -> LcdResult<()> {
        let mut state = self.state.borrow_mut();
        state.rs = data;
        state.rw = read;
        Ok(())
    }

    fn set_enable(&mut self, enable: bool) -> LcdResult<()> {
        let mut state = self.state.borrow_mut();
        let was = state.enable;
        state.enable = enable;
        match (was, enable) {
            (false, true) => state.rising_edge(),
            (true, false) => state.falling_edge(),
            _ => {}
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        self.state.borrow_mut().backlight = on;
        Ok(())
    }

    fn set_data_lines(&mut self, value: u8) -> LcdResult<()> {
        self.state.borrow_mut().lines = value;
        Ok(())
    }

    fn read_data_lines(&mut self) -> LcdResult<u8> {
        let state = self.state.borrow();
        if state.rw && state.enable {
            Ok(state.presented)
        } else {
            Ok(state.sampled_lines())
        }
    }
}

/// Whole-register access. Waits (in simulated time) for the controller to be ready before every
/// write, the way a bus bridge with its own timing would.
impl RegisterInterface for SimulatedLcd {
    fn write(&mut self, value: u8, data: bool) -> LcdResult<()> {
        let mut state = self.state.borrow_mut();
        let now = state.clock.now();
        if state.busy_until > now {
            state.clock.advance(state.busy_until - now);
        }
        state.execute(value, data);
        Ok(())
    }

    fn read(&mut self, data: bool) -> LcdResult<u8> {
        let mut state = self.state.borrow_mut();
        let value = state.read_value(data);
        if data {
            let increment = state.increment;
            state.step_address(increment);
        }
        Ok(value)
    }

    fn set_backlight(&mut self, on: bool) -> LcdResult<()> {
        self.state.borrow_mut().backlight = on;
        Ok(())
    }
}

/// Read-only view of a [SimulatedLcd].
#[derive(Debug, Clone)]
pub struct SimProbe {
    state: Rc<RefCell<Controller>>,
}

impl SimProbe {
    /// Text of every visible row, taking the display shift into account.
    pub fn screen(&self, layout: &Layout) -> Vec<String> {
        let state = self.state.borrow();
        (0..layout.rows())
            .map(|row| state.row_text(layout, row))
            .collect()
    }

    pub fn row_text(&self, layout: &Layout, row: usize) -> String {
        self.state.borrow().row_text(layout, row)
    }

    pub fn ddram(&self, address: u8) -> u8 {
        self.state.borrow().ddram[(address & ADDRESS_MASK) as usize]
    }

    /// The eight rows of CGRAM glyph `index`.
    pub fn glyph(&self, index: u8) -> [u8; 8] {
        let state = self.state.borrow();
        let start = usize::from(index & 7) * 8;
        let mut rows = [0; 8];
        rows.copy_from_slice(&state.cgram[start..start + 8]);
        rows
    }

    pub fn transfers(&self) -> Vec<SimTransfer> {
        self.state.borrow().log.clone()
    }

    /// Only the instructions of [Self::transfers].
    pub fn commands(&self) -> Vec<u8> {
        self.state
            .borrow()
            .log
            .iter()
            .filter_map(|transfer| match transfer {
                SimTransfer::Command(command) => Some(*command),
                SimTransfer::Data(_) => None,
            })
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    pub fn backlight(&self) -> bool {
        self.state.borrow().backlight
    }

    /// Display, cursor and blink.
    pub fn display_control(&self) -> (bool, bool, bool) {
        let state = self.state.borrow();
        (state.display_on, state.cursor_on, state.blink_on)
    }

    pub fn bus_width(&self) -> BusWidth {
        self.state.borrow().mode
    }

    pub fn two_lines(&self) -> bool {
        self.state.borrow().two_lines
    }

    pub fn large_font(&self) -> bool {
        self.state.borrow().font_5x10
    }

    pub fn address(&self) -> u8 {
        self.state.borrow().address
    }

    /// How many positions the display is shifted to the left, modulo the line length.
    pub fn display_shift(&self) -> u8 {
        self.state.borrow().window
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    /// Transfers that arrived before the previous instruction finished executing.
    pub fn timing_violations(&self) -> usize {
        self.state.borrow().violations
    }
}
