use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tokio::sync::RwLock;

/// Source of outbound proxy endpoints.
#[async_trait]
pub trait ProxyPool: Send + Sync {
    /// Best endpoint whose quality score is at least `min_score`, or `None`
    /// when the pool has nothing usable.
    async fn lease(&self, min_score: f32) -> Option<String>;

    async fn report_success(&self, endpoint: &str);

    async fn report_failure(&self, endpoint: &str);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub endpoint: String,
    success: u32,
    failure: u32,
}

impl ProxyEntry {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ProxyEntry {
            endpoint: endpoint.into(),
            success: 0,
            failure: 0,
        }
    }

    /// 0..=100. An endpoint with no history is trusted until proven bad.
    pub fn quality_score(&self) -> f32 {
        let total = self.success + self.failure;
        if total == 0 {
            return 100.0;
        }
        (self.success as f32 / total as f32 * 100.0).max(0.0)
    }
}

/// Fixed-membership pool. Scores move with reported outcomes so a flaky
/// endpoint drifts below the lease threshold instead of being evicted.
#[derive(Default)]
pub struct StaticProxyPool {
    entries: RwLock<Vec<ProxyEntry>>,
}

impl StaticProxyPool {
    pub fn new() -> Self {
        StaticProxyPool::default()
    }

    pub fn from_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticProxyPool {
            entries: RwLock::new(endpoints.into_iter().map(ProxyEntry::new).collect()),
        }
    }

    pub async fn add(&self, endpoint: impl Into<String>) {
        self.entries.write().await.push(ProxyEntry::new(endpoint));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ProxyPool for StaticProxyPool {
    async fn lease(&self, min_score: f32) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|entry| entry.quality_score() >= min_score)
            .max_by(|a, b| {
                a.quality_score()
                    .partial_cmp(&b.quality_score())
                    .unwrap_or(Ordering::Equal)
            })
            .map(|entry| entry.endpoint.clone())
    }

    async fn report_success(&self, endpoint: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.endpoint == endpoint) {
            entry.success += 1;
        }
    }

    async fn report_failure(&self, endpoint: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.endpoint == endpoint) {
            entry.failure += 1;
        }
    }
}
