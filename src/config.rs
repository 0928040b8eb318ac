//! Engine configuration.
//!
//! The three optional behaviours of the engine (ack filtering, publish
//! timeouts and trace logging) all touch the same state machine, so they are
//! plain runtime switches rather than cargo features. A configuration can be
//! built in code or read from a small JSON document:
//!
//! ```rust
//! use libetm::Config;
//!
//! let config = Config::from_json(r#"{"filter_acks":false,"publish_timeout_ms":5000}"#).unwrap();
//! assert!(!config.filter_acks);
//! assert_eq!(config.publish_timeout_ms, Some(5000));
//! assert!(!config.trace);
//! ```

use serde::{Deserialize, Serialize};

use crate::etm::Error;

/// Default publish registration timeout in milliseconds.
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u32 = 3000;

/// Runtime options for [`Modem`](crate::etm::Modem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Track outstanding bare `OK`/`ERROR` replies and swallow them.
    ///
    /// Enable this when the application also sends its own AT commands over
    /// the same channel, so only replies to those reach the unhandled
    /// callback. The blocking confirm helpers rely on it.
    pub filter_acks: bool,

    /// How long a publish registration may stay pending before it is
    /// forced into the error state. `None` disables the timeout.
    pub publish_timeout_ms: Option<u32>,

    /// Emit `log::debug!` traces for every command and handled URC.
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter_acks: true,
            publish_timeout_ms: Some(DEFAULT_PUBLISH_TIMEOUT_MS),
            trace: false,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json_core::from_str::<Config>(json)
            .map(|(config, _)| config)
            .map_err(|_| Error::InvalidConfig)
    }

    /// Serialize the configuration into `buf`, returning the JSON text.
    pub fn to_json<'b>(&self, buf: &'b mut [u8]) -> Result<&'b str, Error> {
        let len = serde_json_core::to_slice(self, buf).map_err(|_| Error::InvalidConfig)?;
        core::str::from_utf8(&buf[..len]).map_err(|_| Error::InvalidConfig)
    }

    /// Builder-style toggle for ack filtering.
    pub fn with_filter_acks(mut self, enabled: bool) -> Self {
        self.filter_acks = enabled;
        self
    }

    /// Builder-style publish timeout.
    pub fn with_publish_timeout(mut self, timeout_ms: Option<u32>) -> Self {
        self.publish_timeout_ms = timeout_ms;
        self
    }

    /// Builder-style toggle for trace logging.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_driver_behaviour() {
        let config = Config::default();
        assert!(config.filter_acks);
        assert_eq!(config.publish_timeout_ms, Some(3000));
        assert!(!config.trace);
    }

    #[test]
    fn empty_object_keeps_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn null_timeout_disables_it() {
        let config = Config::from_json(r#"{"publish_timeout_ms":null,"trace":true}"#).unwrap();
        assert_eq!(config.publish_timeout_ms, None);
        assert!(config.trace);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_eq!(Config::from_json("{\"trace\":"), Err(Error::InvalidConfig));
    }

    #[test]
    fn serializes_back_to_json() {
        let mut buf = [0u8; 128];
        let config = Config::default().with_trace(true);
        let json = config.to_json(&mut buf).unwrap();
        assert_eq!(Config::from_json(json).unwrap(), config);
    }
}
