//! Eseye Telemetry Module AT/MQTT protocol engine.
//!
//! The ETM firmware exposes MQTT through a handful of AT commands and
//! unsolicited result codes (URCs). Topics are addressed by small integer
//! indices that the host picks, and subscribed messages arrive as a textual
//! header followed by a raw binary body.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │     Framer      │───▶│  URC Classifier │───▶│ Topic Registries│
//! │  (line/binary)  │    │                 │    │  (slot FSMs)    │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!          ▲                       │                       │
//!          │                       ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Serial read    │    │   Ack counter   │    │ Timeout monitor │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! Everything is driven from [`Modem::poll`]; request methods only write a
//! command and mark the slot pending.
//!
//! # Wire commands
//!
//! ```text
//! AT+EMQSUBOPEN=i,"t"          subscribe topic index i to name t
//! AT+EMQSUBCLOSE=i             unsubscribe topic index i
//! AT+EMQPUBOPEN=i,"t"          register publish index i with name t
//! AT+EMQPUBCLOSE=i             unregister publish index i
//! AT+EMQPUBLISH=i,q,"<hex>"    publish hex-encoded payload
//! AT+ETMSTATE? / =1 / =0       state report once / on / off
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod command;
pub mod confirm;
pub mod engine;
pub mod framer;
pub mod registry;
pub mod urc;

pub use client::Modem;
pub use registry::{PublishState, SubscribeState};
pub use urc::Urc;

/// Default number of subscribe and publish slots.
pub const DEFAULT_TOPICS: usize = 8;

/// Error code the modem reports when a topic index is already open.
///
/// Treated as success so registrations that survived a host reset are
/// re-adopted instead of failing.
pub const ALREADY_OPEN: i32 = -2;

/// Errors returned by the engine.
///
/// Device-side rejections and timeouts are not errors here: they show up as
/// a slot moving to its `Error` state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Every slot of the registry is in use.
    NoFreeSlot,
    /// The topic index is outside the registry.
    InvalidIndex,
    /// The slot is not in a state that allows the request.
    InvalidState,
    /// Publish was attempted on a topic that is not registered.
    NotRegistered,
    /// The topic name is empty or contains `"`, CR or LF.
    InvalidTopic,
    /// The formatted command does not fit the command buffer.
    CommandTooLong,
    /// The modem rejected a request that was being confirmed.
    Rejected,
    /// Writing to the serial port failed.
    WriteError,
    /// Reading from the serial port failed.
    ReadError,
    /// A configuration document could not be parsed.
    InvalidConfig,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NoFreeSlot => write!(f, "no free topic slot"),
            Error::InvalidIndex => write!(f, "topic index out of range"),
            Error::InvalidState => write!(f, "topic slot is in the wrong state"),
            Error::NotRegistered => write!(f, "publish topic is not registered"),
            Error::InvalidTopic => write!(f, "invalid topic name"),
            Error::CommandTooLong => write!(f, "command too long"),
            Error::Rejected => write!(f, "request rejected by the modem"),
            Error::WriteError => write!(f, "serial write failed"),
            Error::ReadError => write!(f, "serial read failed"),
            Error::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

impl core::error::Error for Error {}

impl From<crate::network::error::Error> for Error {
    fn from(err: crate::network::error::Error) -> Self {
        match err {
            crate::network::error::Error::WriteError => Error::WriteError,
            _ => Error::ReadError,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NoFreeSlot => defmt::write!(f, "NoFreeSlot"),
            Error::InvalidIndex => defmt::write!(f, "InvalidIndex"),
            Error::InvalidState => defmt::write!(f, "InvalidState"),
            Error::NotRegistered => defmt::write!(f, "NotRegistered"),
            Error::InvalidTopic => defmt::write!(f, "InvalidTopic"),
            Error::CommandTooLong => defmt::write!(f, "CommandTooLong"),
            Error::Rejected => defmt::write!(f, "Rejected"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}

/// Quality of Service levels for published messages.
///
/// ```rust
/// use libetm::etm::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce = 1,
    /// Assured single delivery.
    ExactlyOnce = 2,
}

/// Connectivity phase reported by `+ETMSTATE`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleState {
    /// No report yet, or the reported value is not known.
    Unknown,
    /// ETM application idle.
    Idle,
    /// Waiting for provisioning keys.
    WaitingKeys,
    /// Bringing up the cellular network.
    NetworkStarting,
    /// TLS handshake in progress.
    TlsStarting,
    /// TLS session established.
    TlsConnected,
    /// MQTT connection in progress.
    MqttStarting,
    /// MQTT connected and ready.
    MqttReady,
    /// Restoring subscriptions.
    MqttSubscribing,
    /// UDP transport active.
    UdpActive,
    /// The module reported an error.
    Error,
}

impl ModuleState {
    /// Map the numeric state from a state report.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ModuleState::Idle,
            1 => ModuleState::WaitingKeys,
            2 => ModuleState::NetworkStarting,
            3 => ModuleState::TlsStarting,
            4 => ModuleState::TlsConnected,
            5 => ModuleState::MqttStarting,
            6 => ModuleState::MqttReady,
            7 => ModuleState::MqttSubscribing,
            8 => ModuleState::UdpActive,
            9 => ModuleState::Error,
            _ => ModuleState::Unknown,
        }
    }

    /// The numeric code used on the wire; `Unknown` is `-1`.
    pub fn code(self) -> i32 {
        match self {
            ModuleState::Unknown => -1,
            ModuleState::Idle => 0,
            ModuleState::WaitingKeys => 1,
            ModuleState::NetworkStarting => 2,
            ModuleState::TlsStarting => 3,
            ModuleState::TlsConnected => 4,
            ModuleState::MqttStarting => 5,
            ModuleState::MqttReady => 6,
            ModuleState::MqttSubscribing => 7,
            ModuleState::UdpActive => 8,
            ModuleState::Error => 9,
        }
    }
}

/// One-shot readiness notifications seen since the engine was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Readiness(u8);

impl Readiness {
    /// Any ETM URC or the bootstrap banner was seen.
    pub const MODULE_SEEN: u8 = 1 << 0;
    /// `+ETM:IDLE` - the ETM application is running.
    pub const IDLE: u8 = 1 << 1;
    /// `+ETM:EMQRDY` - MQTT is ready.
    pub const MQTT_READY: u8 = 1 << 2;
    /// `+ETM:EURDY` - UDP is ready.
    pub const UDP_READY: u8 = 1 << 3;

    /// True when every bit of `flags` has been seen.
    pub fn contains(self, flags: u8) -> bool {
        self.0 & flags == flags
    }

    /// Raw bitset.
    pub fn bits(self) -> u8 {
        self.0
    }

    pub(crate) fn insert(&mut self, flags: u8) {
        self.0 |= flags;
    }
}

/// Transport started by [`Modem::start_protocol`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Protocol {
    /// `AT+ETMSTATE=startmqtt`
    Mqtt,
    /// `AT+ETMSTATE=startudp`
    Udp,
}

/// State reporting mode for [`Modem::request_state`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StateRequest {
    /// Ask for a single report.
    Once,
    /// Enable continuous reports.
    On,
    /// Disable continuous reports.
    Off,
}
