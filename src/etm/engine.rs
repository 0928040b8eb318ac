//! Protocol engine state.
//!
//! [`Engine`] owns the topic registries, the acknowledgement counter and the
//! callbacks, and applies classified lines to them. It never touches the
//! receive side of the transport: [`Modem`](super::Modem) feeds bytes through
//! the framer and hands completed frames to the engine.

use super::registry::{Event, PublishSlot, Registry, SubscribeSlot};
use super::urc::{self, Urc};
use super::{Error, ModuleState, Readiness, command};
use crate::Config;
use crate::network::Write;

/// Called with every state report, including repeats of the current state.
pub type StateCallback<'a> = &'a mut dyn FnMut(ModuleState);

/// Called with every line the engine did not consume, without its CR/LF.
pub type UnhandledCallback<'a> = &'a mut dyn FnMut(&str);

/// Protocol state shared by every request and by `poll`.
pub struct Engine<'a, const SUBS: usize, const PUBS: usize> {
    config: Config,
    subscriptions: Registry<SubscribeSlot<'a>, SUBS>,
    publications: Registry<PublishSlot, PUBS>,
    outstanding_acks: u16,
    readiness: Readiness,
    module_state: ModuleState,
    on_state: Option<StateCallback<'a>>,
    on_unhandled: Option<UnhandledCallback<'a>>,
    // Subscribe index the in-flight binary block belongs to.
    binary_target: Option<usize>,
    // `ATE0` still owed to the module after a failed write.
    echo_off_pending: bool,
}

impl<const SUBS: usize, const PUBS: usize> core::fmt::Debug for Engine<'_, SUBS, PUBS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions)
            .field("publications", &self.publications)
            .field("outstanding_acks", &self.outstanding_acks)
            .field("readiness", &self.readiness)
            .field("module_state", &self.module_state)
            .field("binary_target", &self.binary_target)
            .field("echo_off_pending", &self.echo_off_pending)
            .finish_non_exhaustive()
    }
}

impl<'a, const SUBS: usize, const PUBS: usize> Engine<'a, SUBS, PUBS> {
    /// Create an engine with empty registries.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            subscriptions: Registry::new(),
            publications: Registry::new(),
            outstanding_acks: 0,
            readiness: Readiness::default(),
            module_state: ModuleState::Unknown,
            on_state: None,
            on_unhandled: None,
            binary_target: None,
            echo_off_pending: false,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe slot table.
    pub fn subscriptions(&self) -> &Registry<SubscribeSlot<'a>, SUBS> {
        &self.subscriptions
    }

    pub(crate) fn subscriptions_mut(&mut self) -> &mut Registry<SubscribeSlot<'a>, SUBS> {
        &mut self.subscriptions
    }

    /// Publish slot table.
    pub fn publications(&self) -> &Registry<PublishSlot, PUBS> {
        &self.publications
    }

    pub(crate) fn publications_mut(&mut self) -> &mut Registry<PublishSlot, PUBS> {
        &mut self.publications
    }

    /// Replies still expected for commands sent by the engine.
    pub fn outstanding_acks(&self) -> u16 {
        self.outstanding_acks
    }

    /// True when no reply is outstanding.
    pub fn in_sync(&self) -> bool {
        self.outstanding_acks == 0
    }

    /// Readiness notifications seen so far.
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    /// Last reported module state.
    pub fn module_state(&self) -> ModuleState {
        self.module_state
    }

    pub(crate) fn set_module_state(&mut self, state: ModuleState) {
        self.module_state = state;
    }

    pub(crate) fn set_state_callback(&mut self, callback: Option<StateCallback<'a>>) {
        self.on_state = callback;
    }

    pub(crate) fn set_unhandled_callback(&mut self, callback: Option<UnhandledCallback<'a>>) {
        self.on_unhandled = callback;
    }

    /// Record that a command expecting a bare `OK`/`ERROR` was sent.
    pub(crate) fn count_ack(&mut self) {
        if self.config.filter_acks {
            self.outstanding_acks = self.outstanding_acks.saturating_add(1);
        }
    }

    /// True while an `ATE0` is waiting to be resent.
    pub fn echo_off_pending(&self) -> bool {
        self.echo_off_pending
    }

    /// Send a deferred `ATE0`, if any. The flag stays set on failure.
    pub fn send_pending<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), Error> {
        if !self.echo_off_pending {
            return Ok(());
        }
        command::send(writer, command::ECHO_OFF)?;
        self.echo_off_pending = false;
        self.count_ack();
        Ok(())
    }

    /// Force stuck publish requests into `Error`.
    pub fn check_timeouts(&mut self, now: u64) {
        let Some(timeout_ms) = self.config.publish_timeout_ms else {
            return;
        };
        for (index, slot) in self.publications.iter_mut().enumerate() {
            if slot.expire(now, timeout_ms) {
                log::warn!("publish topic {} timed out after {} ms", index, timeout_ms);
            }
        }
    }

    /// Apply one text line.
    ///
    /// Returns the length of the binary block the framer must read next, if
    /// the line was a message header with a non-empty body. `writer` is used
    /// for the echo-off reply to the bootstrap banner.
    pub fn on_line<W: Write + ?Sized>(
        &mut self,
        line: &[u8],
        writer: &mut W,
    ) -> Result<Option<usize>, Error> {
        let urc = urc::classify(line);
        if urc.is_from_module() {
            self.readiness.insert(Readiness::MODULE_SEEN);
        }

        match urc {
            Urc::Idle => {
                self.readiness.insert(Readiness::IDLE);
                trace!(self.config.trace, "ETM running");
            }
            Urc::MqttReady => {
                self.readiness.insert(Readiness::MQTT_READY);
                trace!(self.config.trace, "MQTT ready");
            }
            Urc::UdpReady => {
                self.readiness.insert(Readiness::UDP_READY);
                trace!(self.config.trace, "UDP ready");
            }
            Urc::State(state) => {
                self.module_state = state;
                trace!(self.config.trace, "module state {:?}", state);
                if let Some(callback) = self.on_state.as_deref_mut() {
                    callback(state);
                }
            }
            Urc::SubscribeOpened { index, code } => {
                trace!(self.config.trace, "subscribe {} err {}", index, code);
                self.subscribe_event(index, Event::Opened(code));
            }
            Urc::SubscribeClosed { index, code } => {
                trace!(self.config.trace, "unsubscribe {} err {}", index, code);
                self.subscribe_event(index, Event::Closed(code));
            }
            Urc::PublishOpened { index, code } => {
                trace!(self.config.trace, "pubreg {} err {}", index, code);
                self.publish_event(index, Event::Opened(code));
            }
            Urc::PublishClosed { index, code } => {
                trace!(self.config.trace, "pubunreg {} err {}", index, code);
                self.publish_event(index, Event::Closed(code));
            }
            Urc::Message { index, len } => {
                if index >= SUBS {
                    log::warn!("message for unknown subscribe index {}", index);
                    self.binary_target = None;
                } else {
                    self.binary_target = Some(index);
                }
                if len == 0 {
                    self.deliver(&[]);
                    return Ok(None);
                }
                return Ok(Some(len));
            }
            Urc::SendOk => trace!(self.config.trace, "send ok"),
            Urc::SendFail => log::warn!("publish send failed"),
            Urc::Banner => {
                trace!(self.config.trace, "bootstrap banner, disabling echo");
                self.echo_off_pending = true;
                self.send_pending(writer)?;
            }
            Urc::Ok | Urc::Error | Urc::Blank => {
                if self.config.filter_acks && self.outstanding_acks > 0 {
                    self.outstanding_acks -= 1;
                } else {
                    self.unhandled(line);
                }
            }
            Urc::Unrecognized(line) => self.unhandled(line),
        }
        Ok(None)
    }

    fn subscribe_event(&mut self, index: usize, event: Event) {
        match self.subscriptions.get_mut(index) {
            Some(slot) => slot.process_event(event),
            None => log::warn!("subscribe ack for unknown index {}", index),
        }
    }

    fn publish_event(&mut self, index: usize, event: Event) {
        match self.publications.get_mut(index) {
            Some(slot) => slot.process_event(event),
            None => log::warn!("publish ack for unknown index {}", index),
        }
    }

    fn unhandled(&mut self, line: &[u8]) {
        let Ok(text) = core::str::from_utf8(line) else {
            trace!(self.config.trace, "discarding non-UTF-8 line of {} bytes", line.len());
            return;
        };
        match self.on_unhandled.as_deref_mut() {
            Some(callback) => callback(text),
            None => trace!(self.config.trace, "discarding {}", text),
        }
    }

    /// Hand a completed message body to the subscriber it was announced for.
    pub fn deliver(&mut self, payload: &[u8]) {
        let Some(index) = self.binary_target.take() else {
            return;
        };
        let delivered = self
            .subscriptions
            .get_mut(index)
            .is_some_and(|slot| slot.deliver(payload));
        if !delivered {
            trace!(
                self.config.trace,
                "no subscriber for {} byte message on index {}",
                payload.len(),
                index
            );
        }
    }

    /// Forget the target of a message body that did not fit the buffer.
    pub fn drop_binary(&mut self, len: usize) {
        if let Some(index) = self.binary_target.take() {
            log::warn!("dropped {} byte message for subscribe index {}", len, index);
        }
    }
}
