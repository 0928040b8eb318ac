//! A serial transport abstraction for embedded modem links
//!
//! The modem is attached through a byte-oriented, half-duplex channel
//! (usually a UART). This module provides the minimal traits the protocol
//! engine needs from it, plus a [`Platform`] trait for the clock and the
//! cooperative yield hook.
//!

#![deny(unsafe_code)]

/// Common error types for transport implementations
pub mod error;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Platform, Read, Serial, Write};
}

/// Non-blocking byte source.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read buffered bytes into `buf`.
    ///
    /// Must not block: returns `Ok(0)` when no byte is currently available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte sink.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the channel, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A duplex serial channel to the modem.
pub trait Serial: Read + Write {}

impl<T: Read + Write> Serial for T {}

/// Platform services used by the engine.
///
/// Implemented by the board support code, in the same way the OTA agent's
/// platform hooks are supplied by the target.
pub trait Platform {
    /// Monotonic milliseconds since an arbitrary epoch.
    fn millis(&self) -> u64;

    /// Called between polls by the blocking confirm helpers.
    ///
    /// Hosts with a scheduler can yield here; the default busy-waits.
    fn relax(&mut self) {}
}

/// Write the whole buffer, looping over partial writes.
pub(crate) fn write_all<W: Write + ?Sized>(writer: &mut W, mut buf: &[u8]) -> Result<(), error::Error> {
    while !buf.is_empty() {
        match writer.write(buf) {
            Ok(0) => return Err(error::Error::WriteError),
            Ok(n) => buf = &buf[n.min(buf.len())..],
            Err(_) => return Err(error::Error::WriteError),
        }
    }
    Ok(())
}
