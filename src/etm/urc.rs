//! Unsolicited result code (URC) classifier.
//!
//! Every completed text line from the framer is mapped to a [`Urc`] by
//! case-sensitive ASCII prefix matching. Classification is pure: it only
//! extracts the embedded fields and leaves applying them to the engine.
//!
//! Recognised lines:
//!
//! | Line                          | Result                          |
//! |-------------------------------|---------------------------------|
//! | `+ETM:IDLE`                   | [`Urc::Idle`]                   |
//! | `+ETM:EMQRDY`                 | [`Urc::MqttReady`]              |
//! | `+ETM:EURDY`                  | [`Urc::UdpReady`]               |
//! | `+ETMSTATE: 6`, `+ETM:STATE=6`| [`Urc::State`]                  |
//! | `+EMQSUBOPEN:<i>,<err>`       | [`Urc::SubscribeOpened`]        |
//! | `+EMQSUBCLOSE:<i>,<err>`      | [`Urc::SubscribeClosed`]        |
//! | `+EMQPUBOPEN:<i>,<err>`       | [`Urc::PublishOpened`]          |
//! | `+EMQPUBCLOSE:<i>,<err>`      | [`Urc::PublishClosed`]          |
//! | `+EMQ:<i>,<len>`              | [`Urc::Message`]                |
//! | `SEND OK`, `SEND FAIL`        | [`Urc::SendOk`], [`Urc::SendFail`] |
//! | `APP RDY`                     | [`Urc::Banner`]                 |
//! | `OK`, `ERROR`, empty line     | [`Urc::Ok`], [`Urc::Error`], [`Urc::Blank`] |

use super::ModuleState;

/// Prefix of module URCs.
pub const ETM_URC: &[u8] = b"+ETM";
/// Prefix of MQTT URCs.
pub const EMQ_URC: &[u8] = b"+EMQ";
/// Bootstrap banner of modems that start with command echo enabled.
pub const APP_READY: &[u8] = b"APP RDY";

/// A classified line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urc<'a> {
    /// The ETM application is running.
    Idle,
    /// MQTT is ready for topic requests.
    MqttReady,
    /// UDP is ready.
    UdpReady,
    /// Connectivity state report.
    State(ModuleState),
    /// Result of a subscribe request.
    SubscribeOpened {
        /// Topic index.
        index: usize,
        /// Device error code, 0 on success.
        code: i32,
    },
    /// Result of an unsubscribe request.
    SubscribeClosed {
        /// Topic index.
        index: usize,
        /// Device error code, 0 on success.
        code: i32,
    },
    /// Result of a publish registration.
    PublishOpened {
        /// Topic index.
        index: usize,
        /// Device error code, 0 on success.
        code: i32,
    },
    /// Result of a publish unregistration.
    PublishClosed {
        /// Topic index.
        index: usize,
        /// Device error code, 0 on success.
        code: i32,
    },
    /// Header of a message on a subscribed topic; `len` raw bytes follow.
    Message {
        /// Subscribe topic index.
        index: usize,
        /// Body length in bytes.
        len: usize,
    },
    /// A publish was sent.
    SendOk,
    /// A publish could not be sent.
    SendFail,
    /// Modem bootstrap banner.
    Banner,
    /// Bare `OK`.
    Ok,
    /// Bare `ERROR`.
    Error,
    /// Empty line.
    Blank,
    /// Anything else, including malformed URCs.
    Unrecognized(&'a [u8]),
}

impl Urc<'_> {
    /// True for lines that can only come from the modem firmware.
    pub fn is_from_module(&self) -> bool {
        !matches!(
            self,
            Urc::Ok | Urc::Error | Urc::Blank | Urc::Unrecognized(_)
        )
    }

    /// True for the three lines that may acknowledge a command.
    pub fn is_ack(&self) -> bool {
        matches!(self, Urc::Ok | Urc::Error | Urc::Blank)
    }
}

/// Classify one line (without its CR/LF terminator).
pub fn classify(line: &[u8]) -> Urc<'_> {
    let urc: Option<Urc<'_>> = if let Some(rest) = line.strip_prefix(ETM_URC) {
        classify_module(rest)
    } else if let Some(rest) = line.strip_prefix(EMQ_URC) {
        classify_mqtt(rest)
    } else {
        classify_plain(line)
    };
    urc.unwrap_or(Urc::Unrecognized(line))
}

fn classify_module(rest: &[u8]) -> Option<Urc<'static>> {
    if let Some(body) = rest.strip_prefix(b":") {
        if body.starts_with(b"IDLE") {
            Some(Urc::Idle)
        } else if body.starts_with(b"EMQRDY") {
            Some(Urc::MqttReady)
        } else if body.starts_with(b"EURDY") {
            Some(Urc::UdpReady)
        } else {
            body.strip_prefix(b"STATE").and_then(parse_state)
        }
    } else {
        rest.strip_prefix(b"STATE").and_then(parse_state)
    }
}

fn parse_state(value: &[u8]) -> Option<Urc<'static>> {
    let value = skip_separators(value);
    let (code, _) = parse_int(value)?;
    Some(Urc::State(ModuleState::from_code(code)))
}

fn classify_mqtt(rest: &[u8]) -> Option<Urc<'static>> {
    if let Some(fields) = rest.strip_prefix(b"SUBOPEN") {
        let (index, code) = parse_result(fields)?;
        Some(Urc::SubscribeOpened { index, code })
    } else if let Some(fields) = rest.strip_prefix(b"PUBOPEN") {
        let (index, code) = parse_result(fields)?;
        Some(Urc::PublishOpened { index, code })
    } else if let Some(fields) = rest.strip_prefix(b"SUBCLOSE") {
        let (index, code) = parse_result(fields)?;
        Some(Urc::SubscribeClosed { index, code })
    } else if let Some(fields) = rest.strip_prefix(b"PUBCLOSE") {
        let (index, code) = parse_result(fields)?;
        Some(Urc::PublishClosed { index, code })
    } else if let Some(fields) = rest.strip_prefix(b":") {
        let (index, len) = parse_pair(fields)?;
        let index = usize::try_from(index).ok()?;
        let len = usize::try_from(len).ok()?;
        Some(Urc::Message { index, len })
    } else {
        None
    }
}

fn classify_plain(line: &[u8]) -> Option<Urc<'static>> {
    let body = line.strip_prefix(b":").unwrap_or(line);
    if body.starts_with(b"SEND OK") {
        Some(Urc::SendOk)
    } else if body.starts_with(b"SEND FAIL") {
        Some(Urc::SendFail)
    } else if line.starts_with(APP_READY) {
        Some(Urc::Banner)
    } else {
        match line {
            b"OK" => Some(Urc::Ok),
            b"ERROR" => Some(Urc::Error),
            b"" => Some(Urc::Blank),
            _ => None,
        }
    }
}

/// Parse `<index>,<code>` after an OPEN/CLOSE marker.
fn parse_result(fields: &[u8]) -> Option<(usize, i32)> {
    let (index, code) = parse_pair(skip_separators(fields))?;
    Some((usize::try_from(index).ok()?, code))
}

/// Parse two comma separated integers.
fn parse_pair(fields: &[u8]) -> Option<(i32, i32)> {
    let (first, rest) = parse_int(fields)?;
    let rest = rest.strip_prefix(b",")?;
    let (second, _) = parse_int(rest)?;
    Some((first, second))
}

fn skip_separators(value: &[u8]) -> &[u8] {
    let start = value
        .iter()
        .position(|&b| !matches!(b, b':' | b'=' | b' '))
        .unwrap_or(value.len());
    &value[start..]
}

/// Parse a leading signed decimal integer, skipping leading spaces.
///
/// Returns the value and the unparsed remainder; at least one digit is
/// required.
pub fn parse_int(value: &[u8]) -> Option<(i32, &[u8])> {
    let mut i = value.iter().take_while(|&&b| b == b' ').count();
    let negative = match value.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let digits_start = i;
    let mut magnitude: i64 = 0;
    while let Some(&b) = value.get(i) {
        if !b.is_ascii_digit() {
            break;
        }
        magnitude = magnitude * 10 + i64::from(b - b'0');
        if magnitude > i64::from(i32::MAX) + 1 {
            return None;
        }
        i += 1;
    }
    if i == digits_start {
        return None;
    }

    let signed = if negative { -magnitude } else { magnitude };
    let number = i32::try_from(signed).ok()?;
    Some((number, &value[i..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_reads_signed_values() {
        assert_eq!(parse_int(b"12,3"), Some((12, &b",3"[..])));
        assert_eq!(parse_int(b" -2"), Some((-2, &b""[..])));
        assert_eq!(parse_int(b"+7x"), Some((7, &b"x"[..])));
    }

    #[test]
    fn parse_int_requires_a_digit() {
        assert_eq!(parse_int(b""), None);
        assert_eq!(parse_int(b"-"), None);
        assert_eq!(parse_int(b"x1"), None);
    }

    #[test]
    fn parse_int_rejects_overflow() {
        assert_eq!(parse_int(b"99999999999"), None);
        assert_eq!(parse_int(b"-2147483648"), Some((i32::MIN, &b""[..])));
    }

    #[test]
    fn separators_are_skipped() {
        assert_eq!(skip_separators(b": =5"), b"5");
        assert_eq!(skip_separators(b"::"), b"");
    }
}
