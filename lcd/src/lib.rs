//! Driver for HD44780-class character LCDs.
//!
//! The crate is layered the same way the controller is wired:
//!
//! - [interface]: the physical connection, either signal by signal ([interface::SignalInterface])
//!   or a whole-register override ([interface::RegisterInterface]).
//! - [driver]: the transaction layer ([driver::Hd44780]), which turns register transfers into
//!   strobed 8-bit or nibble-multiplexed 4-bit sequences, and the instruction set on top of it
//!   ([driver::HD44780Driver]).
//! - [text]: a text terminal with a cursor, line wrap and scrolling ([text::TextDisplay]).
//!
//! [gpio] and [gpiod] provide the GPIO plumbing for driving a display from Linux, and [sim] is a
//! software controller for running everything without hardware.

pub mod backlight;
pub mod delay;
pub mod driver;
pub mod gpio;
pub mod gpiod;
pub mod interface;
pub mod sim;
pub mod text;

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("no LCD interface is bound")]
    NoDevice,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported by this interface or configuration")]
    NotSupported,
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for LcdError {
    fn from(err: std::io::Error) -> Self {
        LcdError::Io(err.kind())
    }
}

pub type LcdResult<T> = Result<T, LcdError>;
