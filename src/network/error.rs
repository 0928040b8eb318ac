//! Common error types for serial transports

/// A common error type for serial transports.
///
/// Transport implementations may use this as their associated error type.
/// It is designed to be simple and portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a port that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// The receive FIFO overflowed and bytes were lost.
    Overrun,
    /// A framing or parity error was reported by the UART.
    LineError,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotOpen => write!(f, "port not open"),
            Error::WriteError => write!(f, "write failed"),
            Error::ReadError => write!(f, "read failed"),
            Error::Overrun => write!(f, "receive overrun"),
            Error::LineError => write!(f, "framing or parity error"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Overrun => defmt::write!(f, "Overrun"),
            Error::LineError => defmt::write!(f, "LineError"),
        }
    }
}
