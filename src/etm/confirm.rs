//! Blocking and async confirm helpers.
//!
//! These wrap a request and keep polling until its outcome is known. They
//! rely on [`Config::filter_acks`](crate::Config::filter_acks): with ack
//! filtering disabled the ack counter never moves and waiting for sync
//! returns at once. No helper times out on its own; a modem that never
//! answers keeps them polling.

use super::registry::{MessageCallback, PublishState};
use super::{Error, Modem, QoS};
use crate::network::{Platform, Serial};

impl<'a, T, P, const SUBS: usize, const PUBS: usize> Modem<'a, T, P, SUBS, PUBS>
where
    T: Serial,
    P: Platform,
{
    /// Poll until every sent command has been answered.
    ///
    /// [`Platform::relax`] runs between polls.
    pub fn wait_sync(&mut self) -> Result<(), Error> {
        while !self.in_sync() {
            self.poll()?;
            self.relax();
        }
        Ok(())
    }

    /// [`subscribe`](Modem::subscribe), then [`wait_sync`](Modem::wait_sync).
    ///
    /// Returns once the command has been acknowledged; check
    /// [`subscribe_state`](Modem::subscribe_state) for the outcome.
    pub fn subscribe_confirm(
        &mut self,
        topic: &str,
        callback: Option<MessageCallback<'a>>,
    ) -> Result<usize, Error> {
        let index = self.subscribe(topic, callback)?;
        self.wait_sync()?;
        Ok(index)
    }

    /// [`register`](Modem::register), then poll until the slot settles.
    ///
    /// Returns [`Error::Rejected`] if the modem refused the topic or the
    /// request timed out.
    pub fn register_confirm(&mut self, topic: &str) -> Result<usize, Error> {
        let index = self.register(topic)?;
        loop {
            match self.publish_state(index) {
                Some(PublishState::Registering) => {
                    self.poll()?;
                    self.relax();
                }
                Some(PublishState::Error) => return Err(Error::Rejected),
                _ => return Ok(index),
            }
        }
    }

    /// [`publish`](Modem::publish), then [`wait_sync`](Modem::wait_sync).
    pub fn publish_confirm(&mut self, index: usize, qos: QoS, payload: &[u8]) -> Result<(), Error> {
        self.publish(index, qos, payload)?;
        self.wait_sync()
    }
}

#[cfg(feature = "async")]
impl<'a, T, P, const SUBS: usize, const PUBS: usize> Modem<'a, T, P, SUBS, PUBS>
where
    T: Serial,
    P: Platform,
{
    /// Async [`wait_sync`](Modem::wait_sync): yields to the executor
    /// between polls instead of calling [`Platform::relax`].
    pub async fn wait_sync_async(&mut self) -> Result<(), Error> {
        while !self.in_sync() {
            self.poll()?;
            embassy_futures::yield_now().await;
        }
        Ok(())
    }

    /// Async [`register_confirm`](Modem::register_confirm).
    pub async fn register_confirm_async(&mut self, topic: &str) -> Result<usize, Error> {
        let index = self.register(topic)?;
        loop {
            match self.publish_state(index) {
                Some(PublishState::Registering) => {
                    self.poll()?;
                    embassy_futures::yield_now().await;
                }
                Some(PublishState::Error) => return Err(Error::Rejected),
                _ => return Ok(index),
            }
        }
    }
}
