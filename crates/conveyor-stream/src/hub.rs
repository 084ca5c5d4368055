//! Single-process pub/sub of build events.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use conveyor_core::service::{Message, Pubsub};
use conveyor_core::Result;

const SUBSCRIBER_BUFFER: usize = 100;

/// Fans published messages out to every live subscriber. Subscribers whose
/// receiver is gone are pruned at publish time.
#[derive(Default)]
pub struct Hub {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Message>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[async_trait]
impl Pubsub for Hub {
    async fn publish(&self, message: Message) -> Result<()> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, tx| tx.try_send(message.clone()).is_ok() || !tx.is_closed());
        Ok(())
    }

    async fn subscribe(&self) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().insert(Uuid::now_v7(), tx);
        rx
    }
}
