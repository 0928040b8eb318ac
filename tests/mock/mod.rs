#![allow(dead_code)]

use std::collections::VecDeque;

use libetm::Config;
use libetm::etm::Modem;
use libetm::network::error::Error;
use libetm::network::{Platform, Read, Write};

/// Serial port double: tests push the modem's output into `rx` and inspect
/// what the driver wrote in `tx`.
#[derive(Debug)]
pub struct MockSerial {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub is_open: bool,
    /// Number of upcoming writes to reject.
    pub fail_writes: u32,
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            is_open: true,
            fail_writes: 0,
        }
    }

    /// Queue bytes as if the modem had sent them.
    pub fn push(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    /// Everything written since the last call, as text.
    pub fn take_written(&mut self) -> String {
        String::from_utf8(core::mem::take(&mut self.tx)).unwrap()
    }
}

impl Read for MockSerial {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        let len = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockSerial {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(Error::WriteError);
        }
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.is_open {
            return Err(Error::NotOpen);
        }
        Ok(())
    }
}

/// Manually driven clock. `relax` advances it by `step` ms.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockClock {
    pub now: u64,
    pub step: u64,
    pub relaxed: u32,
}

impl Platform for MockClock {
    fn millis(&self) -> u64 {
        self.now
    }

    fn relax(&mut self) {
        self.now += self.step;
        self.relaxed += 1;
    }
}

pub type TestModem<'a> = Modem<'a, MockSerial, MockClock>;

pub fn modem<'a>() -> TestModem<'a> {
    modem_with(Config::default())
}

pub fn modem_with<'a>(config: Config) -> TestModem<'a> {
    Modem::new(MockSerial::new(), MockClock::default(), config)
}

/// Queue `data` and run one poll.
pub fn feed(modem: &mut TestModem<'_>, data: &[u8]) {
    modem.transport_mut().push(data);
    modem.poll().unwrap();
}
