//! Fan-out of component events to any number of subscribers.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Channel-per-subscriber event fan-out.
///
/// Subscribers whose receiver has been dropped are pruned on the next publish.
pub struct EventFanout<T> {
    senders: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> EventFanout<T> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver an event to every live subscriber. Returns how many received it.
    pub fn publish(&self, event: T) -> usize {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
        senders.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Clone> Default for EventFanout<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all() {
        let fanout = EventFanout::new();
        let a = fanout.subscribe();
        let b = fanout.subscribe();

        assert_eq!(fanout.publish(7), 2);
        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_dropped_subscribers_pruned() {
        let fanout = EventFanout::new();
        let kept = fanout.subscribe();
        drop(fanout.subscribe());

        assert_eq!(fanout.publish("sync"), 1);
        assert_eq!(fanout.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), "sync");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let fanout: EventFanout<u8> = EventFanout::default();
        assert_eq!(fanout.publish(1), 0);
    }
}
