use crate::{Message, MqBackend};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config as RedisPoolConfig, Pool, Runtime};
use errors::error::QueueError;
use errors::{Error, ErrorKind, Result};
use log::{debug, error, warn};
use std::time::Duration;
use tokio::sync::mpsc;

/// Redis-backed bus. Topics are namespaced lists: `publish` is RPUSH,
/// each subscription is a BLPOP polling task, so a frame goes to exactly one
/// consumer of the topic across all processes.
pub struct RedisQueue {
    pool: Pool,
    namespace: String,
}

impl RedisQueue {
    /// Poll window for BLPOP; bounds how fast a subscription notices that
    /// its consumer hung up.
    const POLL_SECS: f64 = 2.0;

    pub fn connect(url: &str, namespace: &str) -> Result<Self> {
        let pool = RedisPoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::new(ErrorKind::Queue, Some(e)))?;
        Ok(RedisQueue {
            pool,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, topic: &str) -> String {
        format!("{}:{}", self.namespace, topic)
    }
}

#[async_trait]
impl MqBackend for RedisQueue {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::new(ErrorKind::Queue, Some(e)))?;
        let _: i64 = conn
            .rpush(self.key(topic), payload)
            .await
            .map_err(|e| QueueError::PushFailed(e.into()))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, sender: mpsc::Sender<Message>) -> Result<()> {
        let pool = self.pool.clone();
        let key = self.key(topic);

        tokio::spawn(async move {
            loop {
                if sender.is_closed() {
                    debug!("subscriber of {key} hung up");
                    break;
                }

                let mut conn = match pool.get().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("failed to get redis connection for {key}: {e}. Retrying...");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                let popped: std::result::Result<
                    Option<(String, Vec<u8>)>,
                    deadpool_redis::redis::RedisError,
                > = conn.blpop(&key, RedisQueue::POLL_SECS).await;

                match popped {
                    Ok(Some((_, payload))) => {
                        let (message, _ack_rx) = Message::new(payload);
                        if sender.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        // Poll window elapsed with nothing queued.
                    }
                    Err(e) => {
                        error!("blpop on {key} failed: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            warn!("subscription to {key} closed");
        });

        Ok(())
    }
}
