//! Single-slot, latest-value-wins mailbox.
//!
//! Producers never block: [`Mailbox::put`] overwrites any value the consumer
//! has not taken yet. Consumers see the most recent value, not a backlog.

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Stores `value`, returning the undelivered value it displaced.
    pub fn put(&self, value: T) -> Option<T> {
        let displaced = self.slot.lock().replace(value);
        self.notify.notify_one();
        displaced
    }

    /// Removes and returns the pending value.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Waits until a value is pending and takes it.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            // notify_one stores a permit, so a put racing this check still wakes us.
            self.notify.notified().await;
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Mailbox<T> {
    /// Returns a copy of the pending value without consuming it.
    pub fn peek(&self) -> Option<T> {
        self.slot.lock().clone()
    }

    /// Waits for the next [`Mailbox::put`] and returns a copy of the pending
    /// value, leaving it in place for whoever takes it.
    pub async fn watch(&self) -> Option<T> {
        self.notify.notified().await;
        self.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_displaces_unconsumed_value() {
        let mb = Mailbox::new();
        assert_eq!(mb.put(1), None);
        assert_eq!(mb.put(2), Some(1));
        assert_eq!(mb.peek(), Some(2));
        assert_eq!(mb.take(), Some(2));
        assert!(mb.is_empty());
    }
}
