//! Publish/subscribe abstraction for committed facts.
//!
//! A bus distributes; it does not store. The ledger is the source of truth and
//! publishes only after its own commit, so delivery is at-least-once and
//! consumers dedupe on the envelope id.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use async_trait::async_trait;

/// A subscription to everything published on a bus after the call to
/// [`EventBus::subscribe`].
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(message) => handle(message)?,
///         Err(RecvTimeoutError::Timeout) => continue,
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain whatever is already queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub.
///
/// `publish` resolves once the transport has accepted the message. Failures
/// are surfaced to the caller; the bus never retries on its own.
#[async_trait]
pub trait EventBus<M: Send + 'static>: Send + Sync {
    type Error: core::fmt::Display + core::fmt::Debug + Send + Sync + 'static;

    async fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

#[async_trait]
impl<M, B> EventBus<M> for Arc<B>
where
    M: Send + 'static,
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    async fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message).await
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
