use crate::{Message, MqBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use errors::Result;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// In-process backend for single-node deployments and tests. Each topic is a
/// FIFO route; when several subscribers share a topic, frames are handed out
/// round-robin so the topic behaves like a work queue, not a broadcast.
///
/// Frames published to a topic with no live subscriber are dropped.
#[derive(Default)]
pub struct MemoryQueue {
    routes: DashMap<String, TopicRoute>,
}

#[derive(Default)]
struct TopicRoute {
    subscribers: Vec<mpsc::Sender<Message>>,
    cursor: AtomicUsize,
}

impl MemoryQueue {
    pub fn new() -> Self {
        MemoryQueue::default()
    }
}

#[async_trait]
impl MqBackend for MemoryQueue {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        loop {
            // Pick under the map guard, send outside it.
            let picked = {
                let Some(route) = self.routes.get(topic) else {
                    debug!("no subscriber on topic {topic}, frame dropped");
                    return Ok(());
                };
                if route.subscribers.is_empty() {
                    debug!("no subscriber on topic {topic}, frame dropped");
                    return Ok(());
                }
                let index =
                    route.cursor.fetch_add(1, Ordering::Relaxed) % route.subscribers.len();
                route.subscribers[index].clone()
            };

            let (message, _ack_rx) = Message::new(payload.to_vec());
            if picked.send(message).await.is_ok() {
                return Ok(());
            }

            // Subscriber hung up: prune it and retry with the rest.
            if let Some(mut route) = self.routes.get_mut(topic) {
                route.subscribers.retain(|s| !s.same_channel(&picked));
            }
        }
    }

    async fn subscribe(&self, topic: &str, sender: mpsc::Sender<Message>) -> Result<()> {
        self.routes
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(sender);
        Ok(())
    }
}
