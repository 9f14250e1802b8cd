//! Event publishing/subscription abstraction (mechanics only).
//!
//! ## Delivery
//!
//! - **Broadcast**: every live subscription receives every published message.
//! - **Ordered per publisher**: a subscription yields messages in the order
//!   the bus accepted them.
//! - **No persistence**: a subscription only sees messages published after it
//!   was created.
//!
//! ## Cancellation
//!
//! A [`Subscription`] is a cancellable stream. Calling
//! [`Subscription::unsubscribe`] (or dropping it) detaches it from the bus;
//! the bus prunes closed subscribers on its next publish.

use std::sync::Arc;

use tokio::sync::mpsc;

/// A subscription to an event stream.
///
/// ```ignore
/// let mut subscription = bus.subscribe();
/// while let Some(message) = subscription.recv().await {
///     handle(message);
/// }
/// ```
///
/// `recv` returns `None` once the bus is gone or the subscription was
/// closed.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: mpsc::UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<M, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Stop receiving new messages.
    ///
    /// Messages already queued can still be drained with [`Self::recv`] /
    /// [`Self::try_recv`]; nothing new is accepted.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Detach from the bus for good.
    pub fn unsubscribe(mut self) {
        self.close();
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// `publish()` can fail (e.g. internal lock poisoning). Failures are surfaced
/// to the caller; publishers that cannot do anything useful with the error
/// should log it and carry on.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
