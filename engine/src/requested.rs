use common::model::Request;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// In-flight table: requests published to agents and not yet resolved.
///
/// A hash map gives O(1) correlation by fingerprint; an insertion-ordered
/// key deque turns the timeout sweep into a prefix scan, since entries age
/// in insertion order. Both live under one mutex, so `enqueue`, `dequeue`
/// and `sweep_timeouts` are mutually atomic. Keys resolved by the consumer
/// linger in the deque until a sweep pops past them.
#[derive(Default)]
pub struct RequestedQueue {
    inner: Mutex<RequestedInner>,
}

#[derive(Default)]
struct RequestedInner {
    entries: HashMap<String, (Request, Instant)>,
    order: VecDeque<String>,
}

impl RequestedQueue {
    pub fn new() -> Self {
        RequestedQueue::default()
    }

    /// Inserts unless a request with the same hash is already in flight.
    /// Returns `false` for a duplicate, which must not be re-dispatched.
    pub fn enqueue(&self, request: Request) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&request.hash) {
            return false;
        }
        inner.order.push_back(request.hash.clone());
        inner
            .entries
            .insert(request.hash.clone(), (request, Instant::now()));
        true
    }

    /// Removes and returns the in-flight request with this hash. `None`
    /// means the response is stale and the caller drops it.
    pub fn dequeue(&self, hash: &str) -> Option<Request> {
        let mut inner = self.inner.lock();
        inner.entries.remove(hash).map(|(request, _)| request)
    }

    /// Removes and returns every entry older than `timeout`, oldest first.
    pub fn sweep_timeouts(&self, timeout: Duration) -> Vec<Request> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let mut timed_out = Vec::new();
        loop {
            let hash = match inner.order.front() {
                Some(hash) => hash.clone(),
                None => break,
            };
            match inner.entries.get(&hash) {
                None => {
                    // Resolved earlier; the deque entry is a leftover.
                    inner.order.pop_front();
                }
                Some((_, enqueued_at)) if now.duration_since(*enqueued_at) > timeout => {
                    inner.order.pop_front();
                    if let Some((request, _)) = inner.entries.remove(&hash) {
                        timed_out.push(request);
                    }
                }
                Some(_) => break,
            }
        }
        timed_out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hash: &str) -> Request {
        Request::new(format!("https://example.com/{hash}")).with_hash(hash)
    }

    #[tokio::test]
    async fn test_enqueue_rejects_duplicate_hash() {
        let queue = RequestedQueue::new();
        assert!(queue.enqueue(request("H1")));
        assert!(!queue.enqueue(request("H1")));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_unknown_hash_is_none() {
        let queue = RequestedQueue::new();
        queue.enqueue(request("H1"));
        assert!(queue.dequeue("H2").is_none());
        assert_eq!(queue.dequeue("H1").unwrap().hash, "H1");
        assert!(queue.dequeue("H1").is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_oldest_first() {
        let queue = RequestedQueue::new();
        queue.enqueue(request("H1"));
        tokio::time::advance(Duration::from_millis(300)).await;
        queue.enqueue(request("H2"));
        tokio::time::advance(Duration::from_millis(300)).await;

        // H1 is 600ms old, H2 300ms.
        let swept = queue.sweep_timeouts(Duration::from_millis(500));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].hash, "H1");
        assert_eq!(queue.len(), 1);

        tokio::time::advance(Duration::from_millis(300)).await;
        let swept = queue.sweep_timeouts(Duration::from_millis(500));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].hash, "H2");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_resolved_entries() {
        let queue = RequestedQueue::new();
        queue.enqueue(request("H1"));
        queue.enqueue(request("H2"));
        queue.dequeue("H1");

        tokio::time::advance(Duration::from_millis(600)).await;
        let swept = queue.sweep_timeouts(Duration::from_millis(500));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].hash, "H2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearmed_hash_uses_fresh_clock() {
        let queue = RequestedQueue::new();
        queue.enqueue(request("H1"));
        queue.dequeue("H1");
        tokio::time::advance(Duration::from_millis(600)).await;
        queue.enqueue(request("H1"));

        assert!(queue.sweep_timeouts(Duration::from_millis(500)).is_empty());
        assert_eq!(queue.len(), 1);
    }
}
