//! Fixed-capacity topic registries.
//!
//! The modem addresses topics by small integer indices chosen by the host,
//! so each registry is a plain array of slots whose position is the index.
//! Every slot is a small state machine:
//!
//! ```text
//!             request                ack ok / -2
//! NotInUse ───────────▶ Pending ───────────────────▶ Active
//!    ▲    ▲                │  ack error / timeout        │ request
//!    │    │                ▼                             ▼
//!    │    └──── request ─ Error                     Closing
//!    │                                                   │
//!    └─────────────────────── close ack ◀────────────────┘
//! ```
//!
//! A close acknowledgement returns the slot to `NotInUse` from any state.

use super::{ALREADY_OPEN, Error};

/// Per-topic message callback. Borrowed for as long as the slot is in use.
pub type MessageCallback<'a> = &'a mut dyn FnMut(&[u8]);

/// Events that drive a slot's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Open acknowledgement with the device error code.
    Opened(i32),
    /// Close acknowledgement with the device error code.
    Closed(i32),
    /// No acknowledgement arrived in time. Only publish slots expire;
    /// subscribe slots ignore this event.
    TimedOut,
}

/// Common slot behaviour used by [`Registry`].
pub trait Slot: Default {
    /// Whether a new request may claim this slot.
    fn is_free(&self) -> bool;
}

/// State of a subscribe slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeState {
    /// Free.
    #[default]
    NotInUse,
    /// `AT+EMQSUBOPEN` sent, waiting for the result URC.
    Subscribing,
    /// Messages for this index are delivered to its callback.
    Subscribed,
    /// `AT+EMQSUBCLOSE` sent, waiting for the result URC.
    Unsubscribing,
    /// The modem rejected the subscription. The slot may be reused.
    Error,
}

/// State of a publish slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishState {
    /// Free.
    #[default]
    NotInUse,
    /// `AT+EMQPUBOPEN` sent, waiting for the result URC.
    Registering,
    /// Ready for publishing.
    Registered,
    /// `AT+EMQPUBCLOSE` sent, waiting for the result URC.
    Unregistering,
    /// Rejected or timed out. The slot may be reused.
    Error,
}

fn open_succeeded(code: i32) -> bool {
    code == 0 || code == ALREADY_OPEN
}

/// A subscribe table entry.
#[derive(Default)]
pub struct SubscribeSlot<'a> {
    state: SubscribeState,
    callback: Option<MessageCallback<'a>>,
}

impl core::fmt::Debug for SubscribeSlot<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscribeSlot")
            .field("state", &self.state)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Slot for SubscribeSlot<'_> {
    fn is_free(&self) -> bool {
        matches!(self.state, SubscribeState::NotInUse | SubscribeState::Error)
    }
}

impl<'a> SubscribeSlot<'a> {
    /// Current state.
    pub fn state(&self) -> SubscribeState {
        self.state
    }

    /// Whether a message callback is attached.
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn begin_subscribe(&mut self, callback: Option<MessageCallback<'a>>) {
        self.state = SubscribeState::Subscribing;
        self.callback = callback;
    }

    pub(crate) fn check_unsubscribe(&self) -> Result<(), Error> {
        match self.state {
            SubscribeState::Subscribed => Ok(()),
            _ => Err(Error::InvalidState),
        }
    }

    pub(crate) fn begin_unsubscribe(&mut self) {
        self.state = SubscribeState::Unsubscribing;
    }

    /// Apply an acknowledgement event.
    pub fn process_event(&mut self, event: Event) {
        match (self.state, event) {
            (SubscribeState::Subscribing | SubscribeState::Error, Event::Opened(code)) => {
                self.state = if open_succeeded(code) {
                    SubscribeState::Subscribed
                } else {
                    SubscribeState::Error
                };
            }
            (_, Event::Closed(_)) => {
                self.state = SubscribeState::NotInUse;
                self.callback = None;
            }
            _ => {}
        }
    }

    /// Hand a message body to the callback. Returns whether it was delivered.
    pub(crate) fn deliver(&mut self, payload: &[u8]) -> bool {
        if self.state == SubscribeState::NotInUse {
            return false;
        }
        match self.callback.as_deref_mut() {
            Some(callback) => {
                callback(payload);
                true
            }
            None => false,
        }
    }
}

/// A publish table entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishSlot {
    state: PublishState,
    sent_at: u64,
}

impl Slot for PublishSlot {
    fn is_free(&self) -> bool {
        matches!(self.state, PublishState::NotInUse | PublishState::Error)
    }
}

impl PublishSlot {
    /// Current state.
    pub fn state(&self) -> PublishState {
        self.state
    }

    /// Clock reading of the last register/unregister request.
    pub fn sent_at(&self) -> u64 {
        self.sent_at
    }

    /// Whether the slot is waiting for an acknowledgement.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            PublishState::Registering | PublishState::Unregistering
        )
    }

    pub(crate) fn begin_register(&mut self, now: u64) {
        self.state = PublishState::Registering;
        self.sent_at = now;
    }

    pub(crate) fn check_unregister(&self) -> Result<(), Error> {
        match self.state {
            PublishState::Registered => Ok(()),
            _ => Err(Error::InvalidState),
        }
    }

    pub(crate) fn begin_unregister(&mut self, now: u64) {
        self.state = PublishState::Unregistering;
        self.sent_at = now;
    }

    /// Apply an acknowledgement event.
    pub fn process_event(&mut self, event: Event) {
        match (self.state, event) {
            (PublishState::Registering | PublishState::Error, Event::Opened(code)) => {
                self.state = if open_succeeded(code) {
                    PublishState::Registered
                } else {
                    PublishState::Error
                };
            }
            (_, Event::Closed(_)) => self.state = PublishState::NotInUse,
            (PublishState::Registering | PublishState::Unregistering, Event::TimedOut) => {
                self.state = PublishState::Error;
            }
            _ => {}
        }
    }

    /// Force a pending slot to `Error` once `timeout_ms` has elapsed.
    ///
    /// Returns true when the slot timed out on this call.
    pub fn expire(&mut self, now: u64, timeout_ms: u32) -> bool {
        if self.is_pending() && now.wrapping_sub(self.sent_at) >= u64::from(timeout_ms) {
            self.process_event(Event::TimedOut);
            true
        } else {
            false
        }
    }
}

/// A fixed array of slots addressed by index.
#[derive(Debug)]
pub struct Registry<S, const N: usize> {
    slots: [S; N],
}

impl<S: Slot, const N: usize> Default for Registry<S, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Slot, const N: usize> Registry<S, N> {
    /// Create a registry with every slot free.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| S::default()),
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Lowest-indexed free slot.
    pub fn free_index(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_free)
    }

    /// Slot at `index`.
    pub fn get(&self, index: usize) -> Option<&S> {
        self.slots.get(index)
    }

    /// Mutable slot at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut S> {
        self.slots.get_mut(index)
    }

    /// Iterate over all slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.slots.iter()
    }

    /// Iterate mutably over all slots in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.slots.iter_mut()
    }

    /// Number of slots that are not free.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }
}
