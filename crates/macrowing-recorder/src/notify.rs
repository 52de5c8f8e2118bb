//! Fan-out of notifications to any number of subscribers

pub use crossbeam_channel::Receiver;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

/// Subscribers get an unbounded channel, so publishing never blocks.
/// Dropped receivers are pruned on the next publish.
pub struct Observers<T> {
    senders: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> Observers<T> {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    pub fn publish(&self, value: T) {
        self.senders.lock().retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_value_in_order() {
        let obs = Observers::new();
        let a = obs.subscribe();
        let b = obs.subscribe();
        obs.publish(1);
        obs.publish(2);
        assert_eq!(a.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(b.try_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let obs = Observers::new();
        let keep = obs.subscribe();
        drop(obs.subscribe());
        obs.publish("x");
        assert_eq!(obs.len(), 1);
        assert_eq!(keep.try_recv(), Ok("x"));
    }
}
