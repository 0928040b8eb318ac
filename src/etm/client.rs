//! Application-facing ETM client.

use super::command;
use super::engine::{Engine, StateCallback, UnhandledCallback};
use super::framer::{Frame, Framer};
use super::registry::{MessageCallback, PublishState, SubscribeState};
use super::{DEFAULT_TOPICS, Error, ModuleState, Protocol, QoS, Readiness, StateRequest};
use crate::Config;
use crate::network::{Platform, Serial};

// Bytes pulled from the transport per read call.
const READ_CHUNK: usize = 64;

/// An ETM modem attached through `transport`.
///
/// `SUBS` and `PUBS` size the subscribe and publish tables. Callbacks borrow
/// for `'a`, so they must outlive the modem.
///
/// Requests write a command and return immediately; the result arrives
/// through [`poll`](Modem::poll), which must be called regularly.
pub struct Modem<'a, T, P, const SUBS: usize = DEFAULT_TOPICS, const PUBS: usize = DEFAULT_TOPICS> {
    transport: T,
    platform: P,
    framer: Framer,
    engine: Engine<'a, SUBS, PUBS>,
}

impl<T, P, const SUBS: usize, const PUBS: usize> core::fmt::Debug for Modem<'_, T, P, SUBS, PUBS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Modem")
            .field("framer", &self.framer)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl<'a, T, P, const SUBS: usize, const PUBS: usize> Modem<'a, T, P, SUBS, PUBS>
where
    T: Serial,
    P: Platform,
{
    /// Create a client with empty topic tables.
    pub fn new(transport: T, platform: P, config: Config) -> Self {
        Self {
            transport,
            platform,
            framer: Framer::new(),
            engine: Engine::new(config),
        }
    }

    /// Drive the protocol.
    ///
    /// Expires stuck publish requests, resends a deferred `ATE0`, then
    /// drains every byte the transport has buffered. Never blocks.
    ///
    /// A write failure while handling a line does not abandon the chunk
    /// already read: the rest of it is processed and the first error is
    /// returned afterwards.
    pub fn poll(&mut self) -> Result<(), Error> {
        self.engine.check_timeouts(self.platform.millis());
        self.engine.send_pending(&mut self.transport)?;

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = self.transport.read(&mut chunk).map_err(|_| Error::ReadError)?;
            if read == 0 {
                return Ok(());
            }
            let mut failure = None;
            for &byte in &chunk[..read.min(READ_CHUNK)] {
                if let Err(err) = self.process_byte(byte) {
                    failure.get_or_insert(err);
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }
        }
    }

    fn process_byte(&mut self, byte: u8) -> Result<(), Error> {
        let binary = match self.framer.feed(byte) {
            None => None,
            Some(Frame::Line(line)) => self.engine.on_line(line, &mut self.transport)?,
            Some(Frame::Binary(payload)) => {
                self.engine.deliver(payload);
                None
            }
            Some(Frame::DroppedBinary { len }) => {
                self.engine.drop_binary(len);
                None
            }
        };
        if let Some(len) = binary {
            self.framer.expect_binary(len);
        }
        Ok(())
    }

    fn now(&self) -> u64 {
        self.platform.millis()
    }

    /// Subscribe to `topic` on the lowest free index.
    ///
    /// `callback` receives every message body delivered for the index until
    /// it is unsubscribed. The slot is `Subscribing` until the modem answers.
    pub fn subscribe(
        &mut self,
        topic: &str,
        callback: Option<MessageCallback<'a>>,
    ) -> Result<usize, Error> {
        self.engine.check_timeouts(self.now());
        let index = self
            .engine
            .subscriptions()
            .free_index()
            .ok_or(Error::NoFreeSlot)?;
        let request = command::subscribe_open(index, topic)?;
        command::send(&mut self.transport, &request)?;

        if let Some(slot) = self.engine.subscriptions_mut().get_mut(index) {
            slot.begin_subscribe(callback);
        }
        self.engine.count_ack();
        trace!(self.engine.config().trace, "subscribe {} to {}", index, topic);
        Ok(index)
    }

    /// Unsubscribe a `Subscribed` index.
    pub fn unsubscribe(&mut self, index: usize) -> Result<(), Error> {
        self.engine.check_timeouts(self.now());
        let slot = self
            .engine
            .subscriptions_mut()
            .get_mut(index)
            .ok_or(Error::InvalidIndex)?;
        slot.check_unsubscribe()?;
        let request = command::subscribe_close(index)?;
        command::send(&mut self.transport, &request)?;
        slot.begin_unsubscribe();

        self.engine.count_ack();
        trace!(self.engine.config().trace, "unsubscribe {}", index);
        Ok(())
    }

    /// Register `topic` for publishing on the lowest free index.
    pub fn register(&mut self, topic: &str) -> Result<usize, Error> {
        let now = self.now();
        self.engine.check_timeouts(now);
        let index = self
            .engine
            .publications()
            .free_index()
            .ok_or(Error::NoFreeSlot)?;
        let request = command::publish_open(index, topic)?;
        command::send(&mut self.transport, &request)?;

        if let Some(slot) = self.engine.publications_mut().get_mut(index) {
            slot.begin_register(now);
        }
        self.engine.count_ack();
        trace!(self.engine.config().trace, "pubreg {} to {}", index, topic);
        Ok(index)
    }

    /// Unregister a `Registered` publish index.
    pub fn unregister(&mut self, index: usize) -> Result<(), Error> {
        let now = self.now();
        self.engine.check_timeouts(now);
        let slot = self
            .engine
            .publications_mut()
            .get_mut(index)
            .ok_or(Error::InvalidIndex)?;
        slot.check_unregister()?;
        let request = command::publish_close(index)?;
        command::send(&mut self.transport, &request)?;
        slot.begin_unregister(now);

        self.engine.count_ack();
        trace!(self.engine.config().trace, "pubunreg {}", index);
        Ok(())
    }

    /// Publish `payload` on a `Registered` index.
    ///
    /// The payload is sent hex-encoded; nothing is written if the index is
    /// not registered.
    pub fn publish(&mut self, index: usize, qos: QoS, payload: &[u8]) -> Result<(), Error> {
        self.engine.check_timeouts(self.now());
        let state = self
            .engine
            .publications()
            .get(index)
            .ok_or(Error::InvalidIndex)?
            .state();
        if state != PublishState::Registered {
            return Err(Error::NotRegistered);
        }
        command::write_publish(&mut self.transport, index, qos, payload)?;
        self.engine.count_ack();
        trace!(
            self.engine.config().trace,
            "publish {} bytes on {} qos {}",
            payload.len(),
            index,
            qos as u8
        );
        Ok(())
    }

    /// Write `line` verbatim. Replies are not tracked.
    pub fn send_raw(&mut self, line: &str) -> Result<(), Error> {
        self.engine.check_timeouts(self.now());
        command::send(&mut self.transport, line)
    }

    /// Ask the module to start a transport.
    pub fn start_protocol(&mut self, protocol: Protocol) -> Result<(), Error> {
        command::send(&mut self.transport, command::start_protocol(protocol))?;
        self.engine.count_ack();
        Ok(())
    }

    /// Request a state report, or switch continuous reporting on or off.
    ///
    /// A one-shot request resets [`module_state`](Modem::module_state) to
    /// `Unknown` until the report arrives.
    pub fn request_state(&mut self, request: StateRequest) -> Result<(), Error> {
        if request == StateRequest::Once {
            self.engine.set_module_state(ModuleState::Unknown);
        }
        command::send(&mut self.transport, command::state_request(request))?;
        self.engine.count_ack();
        Ok(())
    }

    /// Set the callback for lines the engine does not consume.
    pub fn on_unhandled(&mut self, callback: Option<UnhandledCallback<'a>>) {
        self.engine.set_unhandled_callback(callback);
    }

    /// Set the callback for module state reports.
    pub fn on_state_change(&mut self, callback: Option<StateCallback<'a>>) {
        self.engine.set_state_callback(callback);
    }

    /// State of a subscribe index, `None` when out of range.
    pub fn subscribe_state(&self, index: usize) -> Option<SubscribeState> {
        self.engine.subscriptions().get(index).map(|slot| slot.state())
    }

    /// State of a publish index, `None` when out of range.
    pub fn publish_state(&self, index: usize) -> Option<PublishState> {
        self.engine.publications().get(index).map(|slot| slot.state())
    }

    /// Readiness notifications seen so far.
    pub fn readiness(&self) -> Readiness {
        self.engine.readiness()
    }

    /// Last reported module state.
    pub fn module_state(&self) -> ModuleState {
        self.engine.module_state()
    }

    /// Replies still expected for sent commands.
    pub fn outstanding_acks(&self) -> u16 {
        self.engine.outstanding_acks()
    }

    /// True when every sent command has been answered.
    pub fn in_sync(&self) -> bool {
        self.engine.in_sync()
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Borrow the platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutably borrow the platform.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Release the transport and platform.
    pub fn into_parts(self) -> (T, P) {
        (self.transport, self.platform)
    }

    pub(crate) fn relax(&mut self) {
        self.platform.relax();
    }
}
