//! In-memory message bus for tests/dev.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedSender};

use crate::bus::{BusError, MessageBus, Subscription};

/// In-memory pub/sub bus.
///
/// - No IO
/// - Best-effort fan-out to every live subscriber
#[derive(Debug)]
pub struct InMemoryMessageBus<M> {
    subscribers: Mutex<Vec<UnboundedSender<M>>>,
}

impl<M> InMemoryMessageBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryMessageBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> MessageBus<M> for InMemoryMessageBus<M>
where
    M: Clone + Send + 'static,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        let mut subs = self.subscribers.lock().map_err(|_| BusError::Closed)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
