use crate::model::Request;
use async_trait::async_trait;
use errors::Result;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Durable frontier of pending requests. De-duplication policy belongs to
/// the store, not the engine.
#[async_trait]
pub trait SchedulerStore: Send + Sync {
    /// Accepts a batch, assigns missing fingerprints, and returns how many
    /// requests were newly admitted (duplicates are silently dropped).
    async fn enqueue(&self, requests: Vec<Request>) -> Result<usize>;

    /// Removes and returns up to `count` requests in FIFO order.
    async fn dequeue(&self, count: usize) -> Result<Vec<Request>>;

    /// Cumulative number of accepted requests.
    async fn total(&self) -> u64;
}

/// In-process store: FIFO queue plus a visited-fingerprint set.
///
/// First-time requests are dropped when their fingerprint was ever seen;
/// retries (`requested_times > 1`) bypass the check so a timed-out or failed
/// request can be re-admitted under its original fingerprint.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
    total: AtomicU64,
}

#[derive(Default)]
struct MemoryStoreInner {
    queue: VecDeque<Request>,
    seen: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl SchedulerStore for MemoryStore {
    async fn enqueue(&self, requests: Vec<Request>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut accepted = 0usize;
        for mut request in requests {
            if request.hash.is_empty() {
                request.hash = request.fingerprint();
            }
            let retry = request.requested_times > 1;
            if !inner.seen.insert(request.hash.clone()) && !retry {
                continue;
            }
            inner.queue.push_back(request);
            accepted += 1;
        }
        self.total.fetch_add(accepted as u64, Ordering::SeqCst);
        Ok(accepted)
    }

    async fn dequeue(&self, count: usize) -> Result<Vec<Request>> {
        let mut inner = self.inner.lock().await;
        let take = count.min(inner.queue.len());
        Ok(inner.queue.drain(..take).collect())
    }

    async fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(url: &str) -> Request {
        let mut request = Request::new(url);
        request.requested_times = 1;
        request
    }

    #[tokio::test]
    async fn test_enqueue_assigns_fingerprints_and_dedups() {
        let store = MemoryStore::new();
        let accepted = store
            .enqueue(vec![
                admitted("https://example.com/a"),
                admitted("https://example.com/b"),
                admitted("https://example.com/a"),
            ])
            .await
            .unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(store.total().await, 2);

        let batch = store.dequeue(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|r| !r.hash.is_empty()));
        assert_eq!(batch[0].url, "https://example.com/a");
        assert_eq!(batch[1].url, "https://example.com/b");
    }

    #[tokio::test]
    async fn test_retries_bypass_dedup() {
        let store = MemoryStore::new();
        store.enqueue(vec![admitted("https://example.com/a")]).await.unwrap();
        let mut retry = store.dequeue(1).await.unwrap().remove(0);
        retry.requested_times = 2;

        let accepted = store.enqueue(vec![retry]).await.unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(store.dequeue(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_supplied_hash_is_honored() {
        let store = MemoryStore::new();
        let accepted = store
            .enqueue(vec![
                admitted("https://example.com/a").with_hash("H1"),
                admitted("https://example.com/b").with_hash("H1"),
            ])
            .await
            .unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(store.dequeue(2).await.unwrap()[0].hash, "H1");
    }

    #[tokio::test]
    async fn test_dequeue_respects_count() {
        let store = MemoryStore::new();
        store
            .enqueue(vec![
                admitted("https://example.com/1"),
                admitted("https://example.com/2"),
                admitted("https://example.com/3"),
            ])
            .await
            .unwrap();
        assert_eq!(store.dequeue(2).await.unwrap().len(), 2);
        assert_eq!(store.dequeue(2).await.unwrap().len(), 1);
        assert!(store.dequeue(2).await.unwrap().is_empty());
    }
}
