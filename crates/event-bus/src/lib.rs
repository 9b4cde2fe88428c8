use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Publish without caring whether anyone listens; returns the number of receivers.
    fn emit(&self, event: E) -> usize;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Fan-out bus for notifications that any number of observers may watch.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn emit(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(err) => {
                trace!(target: "event-bus", event = ?err.0, "no subscribers");
                0
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let bus = InMemoryBus::<u8>::new(4);
        assert_eq!(bus.emit(1), 0);
        let mut rx = bus.subscribe();
        assert_eq!(bus.emit(7), 1);
        assert_eq!(rx.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event_in_order() {
        let bus = InMemoryBus::<&'static str>::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.emit("recording");
        bus.emit("idle");
        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap(), "recording");
            assert_eq!(rx.recv().await.unwrap(), "idle");
        }
    }
}
