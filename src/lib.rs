//! # libetm - Eseye Telemetry Module driver
//!
//! A protocol engine for the AT command interface of Eseye Telemetry Module
//! (ETM) anynet-secure modems. The modem speaks plain AT commands plus an
//! MQTT-like publish/subscribe extension; this crate turns the raw serial
//! byte stream into topic registrations, message callbacks and
//! acknowledgement tracking. It is designed for embedded systems and
//! supports `no_std` environments.
//!
//! ## Features
//!
//! ### Protocol Engine
//! - **Framer**: splits the serial stream into text lines and binary message bodies
//! - **URC Classifier**: recognises module, state, topic and message notifications
//! - **Topic Registries**: fixed-capacity subscribe and publish slot tables
//! - **Ack Filtering**: counts outstanding OK/ERROR replies so application AT
//!   commands can share the channel
//! - **Timeouts**: stuck publish registrations fall back to an error state
//!
//! ### Configuration
//! - Runtime [`Config`] covering ack filtering, timeouts and trace logging
//! - Loadable from JSON with `serde-json-core`
//!
//! ## Usage
//!
//! ```rust
//! use libetm::etm::{Modem, SubscribeState};
//! use libetm::network::{Platform, Read, Write};
//! use libetm::Config;
//! # struct Uart;
//! # impl Read for Uart {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct Board;
//! # impl Platform for Board {
//! #     fn millis(&self) -> u64 { 0 }
//! # }
//!
//! let mut on_message = |payload: &[u8]| {
//!     let _ = payload;
//! };
//!
//! let mut modem: Modem<'_, Uart, Board> = Modem::new(Uart, Board, Config::default());
//! let index = modem.subscribe("sensors/temp", Some(&mut on_message)).unwrap();
//! assert_eq!(modem.subscribe_state(index), Some(SubscribeState::Subscribing));
//!
//! // Drive the protocol from the main loop.
//! modem.poll().unwrap();
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `async`: Enable async confirm helpers that yield to the executor
//! - `defmt`: Enable defmt formatting for error and state types

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Debug tracing gated by [`Config::trace`].
macro_rules! trace {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            log::debug!($($arg)+);
        }
    };
}

/// Serial transport and platform abstractions.
///
/// The engine only needs a non-blocking byte channel and a millisecond clock;
/// both are modelled as small traits so any HAL can be plugged in.
pub mod network;

/// Runtime configuration for the protocol engine.
pub mod config;

/// The ETM protocol engine: framing, URC classification, topic registries
/// and the application-facing [`Modem`](etm::Modem) client.
pub mod etm;

pub use config::Config;
