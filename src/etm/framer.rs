//! Line/binary framer for the modem receive stream.
//!
//! The receive side of the AT channel carries newline-terminated text lines
//! and, after a `+EMQ:<index>,<len>` header, exactly `len` raw bytes of
//! message body. The framer accumulates bytes into a fixed buffer and emits
//! one [`Frame`] at a time; switching into binary mode is requested by the
//! caller once it has classified a header line.

/// Receive buffer capacity in bytes.
pub const RX_BUFFER_SIZE: usize = 256;

/// Line feed, the frame terminator.
pub const ASCII_LF: u8 = 0x0A;
/// Carriage return, stripped from the end of a line.
pub const ASCII_CR: u8 = 0x0D;
/// Continuation prompt some modems echo before expecting payload.
pub const PROMPT: u8 = b'>';
/// Byte a leading prompt is rewritten to.
pub const PROMPT_FILLER: u8 = 0x00;

/// A completed unit of the receive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A text line without its CR/LF terminator.
    Line(&'a [u8]),
    /// A complete binary block.
    Binary(&'a [u8]),
    /// A binary block longer than the buffer; its bytes were consumed but
    /// not kept.
    DroppedBinary {
        /// Announced block length.
        len: usize,
    },
}

/// Byte-at-a-time framer with a fixed buffer of `N` bytes.
#[derive(Debug)]
pub struct Framer<const N: usize = RX_BUFFER_SIZE> {
    buffer: [u8; N],
    len: usize,
    binary_remaining: usize,
    binary_len: usize,
    // Set after an oversized line; bytes are skipped up to the next LF.
    discarding: bool,
    // A CR arrived with the buffer full; kept out of the buffer until the LF.
    held_cr: bool,
    dropped_lines: u32,
}

impl<const N: usize> Default for Framer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Framer<N> {
    /// Create an empty framer in text mode.
    pub fn new() -> Self {
        Self {
            buffer: [0; N],
            len: 0,
            binary_remaining: 0,
            binary_len: 0,
            discarding: false,
            held_cr: false,
            dropped_lines: 0,
        }
    }

    /// Consume one byte, returning a frame when one completes.
    pub fn feed(&mut self, byte: u8) -> Option<Frame<'_>> {
        if self.binary_remaining > 0 {
            return self.feed_binary(byte);
        }

        if self.discarding {
            if byte == ASCII_LF {
                self.discarding = false;
            }
            return None;
        }

        let byte = if self.len == 0 && byte == PROMPT {
            PROMPT_FILLER
        } else {
            byte
        };

        // A stray CR/LF on an empty buffer would only produce empty frames.
        if self.len == 0 && (byte == ASCII_CR || byte == ASCII_LF) {
            return None;
        }

        if byte == ASCII_LF {
            let mut end = self.len;
            if !self.held_cr && end > 0 && self.buffer[end - 1] == ASCII_CR {
                end -= 1;
            }
            self.len = 0;
            self.held_cr = false;
            return Some(Frame::Line(&self.buffer[..end]));
        }

        if self.len == N {
            if byte == ASCII_CR && !self.held_cr {
                self.held_cr = true;
                return None;
            }
            self.len = 0;
            self.held_cr = false;
            self.discarding = true;
            self.dropped_lines = self.dropped_lines.wrapping_add(1);
            return None;
        }

        self.buffer[self.len] = byte;
        self.len += 1;
        None
    }

    fn feed_binary(&mut self, byte: u8) -> Option<Frame<'_>> {
        if self.len < N {
            self.buffer[self.len] = byte;
            self.len += 1;
        }
        self.binary_remaining -= 1;
        if self.binary_remaining > 0 {
            return None;
        }

        let len = self.binary_len;
        self.len = 0;
        self.binary_len = 0;
        if len > N {
            Some(Frame::DroppedBinary { len })
        } else {
            Some(Frame::Binary(&self.buffer[..len]))
        }
    }

    /// Treat the next `len` bytes as a binary block.
    ///
    /// Any partially buffered text is discarded. A zero length is ignored.
    pub fn expect_binary(&mut self, len: usize) {
        self.len = 0;
        self.discarding = false;
        self.held_cr = false;
        self.binary_remaining = len;
        self.binary_len = len;
    }

    /// True while a binary block is in flight.
    pub fn in_binary(&self) -> bool {
        self.binary_remaining > 0
    }

    /// Bytes still expected for the in-flight binary block.
    pub fn binary_remaining(&self) -> usize {
        self.binary_remaining
    }

    /// Bytes buffered for the current frame.
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Number of lines dropped because they exceeded the buffer.
    pub fn dropped_lines(&self) -> u32 {
        self.dropped_lines
    }

    /// Return to text mode with an empty buffer.
    pub fn reset(&mut self) {
        self.len = 0;
        self.binary_remaining = 0;
        self.binary_len = 0;
        self.discarding = false;
        self.held_cr = false;
    }
}
