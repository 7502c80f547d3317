use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::models::PushEvent;

/// Fan-out point for push events. Cloning shares the same channel.
#[derive(Clone)]
pub struct PushHub {
    sender: broadcast::Sender<PushEvent>,
    subscribers: Arc<AtomicUsize>,
}

/// What a subscriber receives next.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(PushEvent),
    /// The subscriber fell behind and this many events were dropped.
    Missed(u64),
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish to every live subscription; returns how many received it.
    pub fn publish(&self, event: PushEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!("Published {} to {} subscribers", name, receivers);
                receivers
            }
            Err(_) => {
                debug!("Dropped {}: no subscribers", name);
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Push subscription opened ({} active)", count);

        Subscription {
            receiver: self.sender.subscribe(),
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<PushEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next delivery, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.receiver.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(RecvError::Lagged(missed)) => {
                warn!("Push subscriber lagged, {} events missed", missed);
                Some(Delivery::Missed(missed))
            }
            Err(RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.subscribers.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        debug!("Push subscription closed ({} active)", remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentPush, ChatPush};

    #[tokio::test]
    async fn every_subscriber_gets_the_event() {
        let hub = PushHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let event = PushEvent::NewAppointment(AppointmentPush::default());
        assert_eq!(hub.publish(event.clone()), 2);

        assert_eq!(first.recv().await, Some(Delivery::Event(event.clone())));
        assert_eq!(second.recv().await, Some(Delivery::Event(event)));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let hub = PushHub::new(8);
        let subscription = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        drop(subscription);

        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(PushEvent::NewChatMessage(ChatPush::default())), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_is_told_about_missed_events() {
        let hub = PushHub::new(2);
        let mut subscription = hub.subscribe();

        for _ in 0..4 {
            hub.publish(PushEvent::NewChatMessage(ChatPush::default()));
        }

        assert_eq!(subscription.recv().await, Some(Delivery::Missed(2)));
        assert!(matches!(subscription.recv().await, Some(Delivery::Event(_))));
    }
}
