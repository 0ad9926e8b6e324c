pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryQueue;
pub use redis::RedisQueue;

use async_trait::async_trait;
use errors::Result;
use tokio::sync::mpsc;

/// A message received from the bus. The consumer calls `ack()` once
/// processing succeeded; backends without delivery tracking ignore it.
#[derive(Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    ack_tx: mpsc::Sender<()>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl Message {
    pub fn new(payload: Vec<u8>) -> (Self, mpsc::Receiver<()>) {
        let (ack_tx, ack_rx) = mpsc::channel(1);
        (Message { payload, ack_tx }, ack_rx)
    }

    pub async fn ack(&self) -> Result<()> {
        self.ack_tx
            .send(())
            .await
            .map_err(|_| errors::error::QueueError::AckFailed.into())
    }
}

/// Publish/subscribe of opaque byte frames by topic.
#[async_trait]
pub trait MqBackend: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Routes future frames on `topic` into `sender`. The subscription ends
    /// when the receiving side hangs up.
    async fn subscribe(&self, topic: &str, sender: mpsc::Sender<Message>) -> Result<()>;
}
