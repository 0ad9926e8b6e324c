use async_trait::async_trait;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fire-and-forget crawl counters. Implementations must swallow their own
/// transport failures; statistics never affect business flow.
#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn start(&self, id: &str, name: &str);
    async fn increase_total(&self, id: &str, count: u64);
    async fn increase_success(&self, id: &str);
    async fn increase_failure(&self, id: &str);
    async fn agent_success(&self, agent: &str, elapsed_ms: u64);
    async fn agent_failure(&self, agent: &str, elapsed_ms: u64);
    async fn exit(&self, id: &str);
    async fn print(&self, id: &str);
}

/// Log-backed client with local tallies, the default for single-node runs.
#[derive(Default)]
pub struct LogStats {
    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
}

impl LogStats {
    pub fn new() -> Self {
        LogStats::default()
    }
}

#[async_trait]
impl StatsClient for LogStats {
    async fn start(&self, id: &str, name: &str) {
        info!("spider {id} ({name}) started");
    }

    async fn increase_total(&self, _id: &str, count: u64) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    async fn increase_success(&self, _id: &str) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    async fn increase_failure(&self, _id: &str) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    async fn agent_success(&self, agent: &str, elapsed_ms: u64) {
        debug!("agent {agent} succeeded in {elapsed_ms}ms");
    }

    async fn agent_failure(&self, agent: &str, elapsed_ms: u64) {
        debug!("agent {agent} failed after {elapsed_ms}ms");
    }

    async fn exit(&self, id: &str) {
        info!(
            "spider {id} exited: total={} success={} failure={}",
            self.total.load(Ordering::Relaxed),
            self.success.load(Ordering::Relaxed),
            self.failure.load(Ordering::Relaxed),
        );
    }

    async fn print(&self, id: &str) {
        info!(
            "spider {id}: total={} success={} failure={}",
            self.total.load(Ordering::Relaxed),
            self.success.load(Ordering::Relaxed),
            self.failure.load(Ordering::Relaxed),
        );
    }
}
