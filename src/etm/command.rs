//! AT command formatting.
//!
//! Commands are built into fixed-capacity [`heapless::String`] buffers.
//! Publish payloads are streamed straight to the serial port as uppercase
//! ASCII hex, so their size is not limited by the command buffer.

use core::fmt::Write as _;

use heapless::String;

use super::{Error, Protocol, QoS, StateRequest};
use crate::network::{self, Write};

/// Capacity of a formatted command, including the CR/LF terminator.
pub const MAX_COMMAND_LEN: usize = 192;

/// A formatted command ready to be written.
pub type Command = String<MAX_COMMAND_LEN>;

/// Prefix shared by every MQTT command.
pub const MQTT_PREFIX: &str = "AT+EMQ";
/// Disable command echo; sent when the bootstrap banner is seen.
pub const ECHO_OFF: &str = "ATE0\r\n";

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";
// Payload bytes encoded per serial write.
const HEX_CHUNK: usize = 32;

/// Check that `topic` can be embedded in a quoted command argument.
pub fn validate_topic(topic: &str) -> Result<(), Error> {
    if topic.is_empty() || topic.bytes().any(|b| matches!(b, b'"' | b'\r' | b'\n')) {
        return Err(Error::InvalidTopic);
    }
    Ok(())
}

fn format(args: core::fmt::Arguments<'_>) -> Result<Command, Error> {
    let mut command = Command::new();
    command.write_fmt(args).map_err(|_| Error::CommandTooLong)?;
    Ok(command)
}

/// `AT+EMQSUBOPEN=i,"topic"`
pub fn subscribe_open(index: usize, topic: &str) -> Result<Command, Error> {
    validate_topic(topic)?;
    format(format_args!("{MQTT_PREFIX}SUBOPEN={index},\"{topic}\"\r\n"))
}

/// `AT+EMQSUBCLOSE=i`
pub fn subscribe_close(index: usize) -> Result<Command, Error> {
    format(format_args!("{MQTT_PREFIX}SUBCLOSE={index}\r\n"))
}

/// `AT+EMQPUBOPEN=i,"topic"`
pub fn publish_open(index: usize, topic: &str) -> Result<Command, Error> {
    validate_topic(topic)?;
    format(format_args!("{MQTT_PREFIX}PUBOPEN={index},\"{topic}\"\r\n"))
}

/// `AT+EMQPUBCLOSE=i`
pub fn publish_close(index: usize) -> Result<Command, Error> {
    format(format_args!("{MQTT_PREFIX}PUBCLOSE={index}\r\n"))
}

/// `AT+EMQPUBLISH=i,q,"` - the part of a publish before the payload.
pub fn publish_header(index: usize, qos: QoS) -> Result<Command, Error> {
    format(format_args!("{MQTT_PREFIX}PUBLISH={index},{},\"", qos as u8))
}

/// State report request.
pub fn state_request(request: StateRequest) -> &'static str {
    match request {
        StateRequest::Once => "AT+ETMSTATE?\r\n",
        StateRequest::On => "AT+ETMSTATE=1\r\n",
        StateRequest::Off => "AT+ETMSTATE=0\r\n",
    }
}

/// Protocol start request.
pub fn start_protocol(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Mqtt => "AT+ETMSTATE=startmqtt\r\n",
        Protocol::Udp => "AT+ETMSTATE=startudp\r\n",
    }
}

/// Two uppercase hex digits for one byte.
pub fn hex_byte(byte: u8) -> [u8; 2] {
    [
        HEX_DIGITS[usize::from(byte >> 4)],
        HEX_DIGITS[usize::from(byte & 0x0F)],
    ]
}

/// Hex-encode `payload` into `out`, returning the number of bytes written.
///
/// Stops early if `out` cannot hold the whole encoding.
pub fn encode_hex(payload: &[u8], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (&byte, pair) in payload.iter().zip(out.chunks_exact_mut(2)) {
        pair.copy_from_slice(&hex_byte(byte));
        written += 2;
    }
    written
}

/// Stream a complete publish command to `writer`.
///
/// ```rust
/// # use libetm::network::Write;
/// # struct Sink(heapless::Vec<u8, 64>);
/// # impl Write for Sink {
/// #     type Error = ();
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { self.0.extend_from_slice(buf)?; Ok(buf.len()) }
/// #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
/// # }
/// use libetm::etm::{command, QoS};
///
/// let mut sink = Sink(heapless::Vec::new());
/// command::write_publish(&mut sink, 2, QoS::AtLeastOnce, &[0x01, 0x02, 0x03]).unwrap();
/// assert_eq!(&sink.0[..], b"AT+EMQPUBLISH=2,1,\"010203\"\r\n");
/// ```
pub fn write_publish<W: Write + ?Sized>(
    writer: &mut W,
    index: usize,
    qos: QoS,
    payload: &[u8],
) -> Result<(), Error> {
    let header = publish_header(index, qos)?;
    network::write_all(writer, header.as_bytes())?;

    let mut hex = [0u8; HEX_CHUNK * 2];
    for chunk in payload.chunks(HEX_CHUNK) {
        let len = encode_hex(chunk, &mut hex);
        network::write_all(writer, &hex[..len])?;
    }

    network::write_all(writer, b"\"\r\n")?;
    writer.flush().map_err(|_| Error::WriteError)
}

/// Write a formatted command and flush.
pub fn send<W: Write + ?Sized>(writer: &mut W, command: &str) -> Result<(), Error> {
    network::write_all(writer, command.as_bytes())?;
    writer.flush().map_err(|_| Error::WriteError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_digits_are_uppercase() {
        assert_eq!(&hex_byte(0x00), b"00");
        assert_eq!(&hex_byte(0xFF), b"FF");
        assert_eq!(&hex_byte(0x0A), b"0A");
        assert_eq!(&hex_byte(0xB7), b"B7");
    }

    #[test]
    fn encode_hex_stops_when_output_is_full() {
        let mut out = [0u8; 5];
        assert_eq!(encode_hex(&[0xDE, 0xAD, 0xBE], &mut out), 4);
        assert_eq!(&out[..4], b"DEAD");
    }

    #[test]
    fn subscribe_open_quotes_topic() {
        let command = subscribe_open(0, "sensors/temp").unwrap();
        assert_eq!(command.as_str(), "AT+EMQSUBOPEN=0,\"sensors/temp\"\r\n");
    }

    #[test]
    fn close_commands_carry_index_only() {
        assert_eq!(subscribe_close(3).unwrap().as_str(), "AT+EMQSUBCLOSE=3\r\n");
        assert_eq!(publish_close(7).unwrap().as_str(), "AT+EMQPUBCLOSE=7\r\n");
    }

    #[test]
    fn topics_that_break_quoting_are_rejected() {
        assert_eq!(subscribe_open(0, ""), Err(Error::InvalidTopic));
        assert_eq!(publish_open(0, "a\"b"), Err(Error::InvalidTopic));
        assert_eq!(publish_open(0, "a\r\nAT"), Err(Error::InvalidTopic));
    }

    #[test]
    fn overlong_topic_does_not_fit() {
        let topic = "t".repeat(MAX_COMMAND_LEN);
        assert_eq!(subscribe_open(0, &topic), Err(Error::CommandTooLong));
    }

    #[test]
    fn publish_header_uses_numeric_qos() {
        assert_eq!(
            publish_header(5, QoS::ExactlyOnce).unwrap().as_str(),
            "AT+EMQPUBLISH=5,2,\""
        );
    }
}
