use crate::dataflow::{StorageRegistry, run_pipeline};
use crate::lifetime::AppLifetime;
use crate::requested::RequestedQueue;
use common::interface::{DataContext, DataFlow, LogStats, RequestSupplier, SchedulerStore, StatsClient};
use common::model::message::{self, SpiderMessage};
use common::model::{Request, Response, SpiderConfig};
use errors::{Error, Result};
use log::{debug, error, info, warn};
use metrics::{counter, gauge};
use proxy::ProxyPool;
use queue::{Message, MqBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Minimum quality score when leasing a proxy for dispatch.
const PROXY_MIN_SCORE: f32 = 70.0;

/// Cadence of the statistics summary line.
const PRINT_EVERY_MS: u64 = 5000;

/// Longest accepted spider id.
const MAX_ID_LEN: usize = 36;

pub type RequestHook = Arc<dyn Fn(&mut Request) + Send + Sync>;
type InitHook = Box<dyn FnOnce() -> Result<()> + Send>;

/// Why the dispatcher loop ended.
enum ExitReason {
    Drained,
    PausedTooLong,
    NoProxy,
    Cancelled,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Drained => "drained",
            ExitReason::PausedTooLong => "paused too long",
            ExitReason::NoProxy => "no proxy",
            ExitReason::Cancelled => "cancelled",
        }
    }
}

/// One logical crawl: identity, seed suppliers, data-flow pipeline and
/// configuration, driving remote download agents over the message bus.
///
/// `run` owns the dispatcher loop; a consumer task handles the control
/// topic concurrently. The two share the in-flight table and the scheduler
/// store and stop together through the [`AppLifetime`] handle.
pub struct Spider {
    id: String,
    name: String,
    config: Arc<SpiderConfig>,
    mq: Arc<dyn MqBackend>,
    store: Arc<dyn SchedulerStore>,
    stats: Arc<dyn StatsClient>,
    proxies: Option<Arc<dyn ProxyPool>>,
    suppliers: Vec<Box<dyn RequestSupplier>>,
    stages: Vec<Box<dyn DataFlow>>,
    registry: StorageRegistry,
    requested: Arc<RequestedQueue>,
    lifetime: AppLifetime,
    request_hook: Option<RequestHook>,
    init_hook: Option<InitHook>,
}

impl Spider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: SpiderConfig,
        mq: Arc<dyn MqBackend>,
        store: Arc<dyn SchedulerStore>,
    ) -> Self {
        Spider {
            id: id.into(),
            name: name.into(),
            config: Arc::new(config),
            mq,
            store,
            stats: Arc::new(LogStats::new()),
            proxies: None,
            suppliers: Vec::new(),
            stages: Vec::new(),
            registry: StorageRegistry::new(),
            requested: Arc::new(RequestedQueue::new()),
            lifetime: AppLifetime::new(),
            request_hook: None,
            init_hook: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsClient>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_proxy_pool(mut self, pool: Arc<dyn ProxyPool>) -> Self {
        self.proxies = Some(pool);
        self
    }

    pub fn with_lifetime(mut self, lifetime: AppLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn add_supplier(mut self, supplier: impl RequestSupplier + 'static) -> Self {
        self.suppliers.push(Box::new(supplier));
        self
    }

    pub fn add_stage(mut self, stage: impl DataFlow + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Hook applied to every request right before it is published.
    pub fn with_request_hook(
        mut self,
        hook: impl Fn(&mut Request) + Send + Sync + 'static,
    ) -> Self {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    /// One-shot hook run after statistics start, before the suppliers are
    /// drained.
    pub fn on_init(mut self, hook: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        self.init_hook = Some(Box::new(hook));
        self
    }

    /// Registers a storage constructor resolvable through the `storage`
    /// configuration key.
    pub fn register_storage<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&SpiderConfig) -> Result<Box<dyn DataFlow>> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    pub fn lifetime(&self) -> AppLifetime {
        self.lifetime.clone()
    }

    pub fn requested_queue(&self) -> Arc<RequestedQueue> {
        self.requested.clone()
    }

    /// Admits requests into the scheduler store; see the module-level rules.
    /// Re-admission after a download or pipeline failure goes through the
    /// same path, so pipeline retries draw from the same budget as
    /// download retries.
    pub async fn add_requests(&self, requests: Vec<Request>) -> Result<usize> {
        admit(&self.id, &self.config, &self.store, &self.stats, requests).await
    }

    /// Admits plain URIs with default routing.
    pub async fn add_urls<I, S>(&self, urls: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_requests(urls.into_iter().map(Request::new).collect())
            .await
    }

    /// Runs the spider to completion. On any startup failure the lifetime
    /// is stopped so a host watching it terminates as well.
    pub async fn run(self) -> Result<()> {
        let lifetime = self.lifetime.clone();
        let result = self.run_inner().await;
        if result.is_err() {
            lifetime.stop();
        }
        result
    }

    async fn run_inner(mut self) -> Result<()> {
        self.config.validate()?;
        if self.id.trim().is_empty() || self.id.len() > MAX_ID_LEN {
            return Err(Error::invalid_id(format!(
                "'{}' must be non-blank and at most {MAX_ID_LEN} characters",
                self.id
            )));
        }

        self.stats.start(&self.id, &self.name).await;

        if let Some(hook) = self.init_hook.take() {
            hook()?;
        }

        for supplier in &self.suppliers {
            let seeds = supplier.pull().await?;
            if !seeds.is_empty() {
                admit(&self.id, &self.config, &self.store, &self.stats, seeds).await?;
            }
        }

        // Resolve the configured default sink, then bring every stage up.
        if let Some(storage_name) = &self.config.storage {
            let stage = self.registry.create(storage_name, &self.config)?;
            self.stages.push(stage);
        }
        for stage in &self.stages {
            if let Err(e) = stage.init().await {
                return Err(Error::stage_init_failed(stage.name(), e));
            }
        }

        self.stats
            .increase_total(&self.id, self.store.total().await)
            .await;

        let core = Arc::new(SpiderCore {
            id: self.id.clone(),
            config: self.config.clone(),
            mq: self.mq.clone(),
            store: self.store.clone(),
            stats: self.stats.clone(),
            proxies: self.proxies.clone(),
            requested: self.requested.clone(),
            lifetime: self.lifetime.clone(),
        });

        // Register the consumer before the first dispatch so no response
        // can slip past it.
        let control = message::control_topic(&self.id);
        let (tx, rx) = mpsc::channel(1024);
        self.mq.subscribe(&control, tx).await?;
        let stages = Arc::new(std::mem::take(&mut self.stages));
        let consumer = tokio::spawn(consume(core.clone(), stages.clone(), rx, control));

        info!(
            "spider {} dispatching at {} req/s (retry budget {})",
            self.id, self.config.speed, self.config.retried_times
        );
        let outcome = dispatch(&core, self.request_hook.as_ref()).await;

        // Exit: statistics first, then the lifetime; each exactly once per
        // run. The consumer unblocks on the stopped lifetime.
        self.stats.exit(&self.id).await;
        self.lifetime.stop();
        if let Err(e) = consumer.await {
            error!("consumer task failed: {e}");
        }
        for stage in stages.iter() {
            stage.dispose().await;
        }

        match outcome {
            Ok(reason) => {
                info!("spider {} stopped: {}", self.id, reason.as_str());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// State shared between the dispatcher and the consumer.
struct SpiderCore {
    id: String,
    config: Arc<SpiderConfig>,
    mq: Arc<dyn MqBackend>,
    store: Arc<dyn SchedulerStore>,
    stats: Arc<dyn StatsClient>,
    proxies: Option<Arc<dyn ProxyPool>>,
    requested: Arc<RequestedQueue>,
    lifetime: AppLifetime,
}

impl SpiderCore {
    async fn add_requests(&self, requests: Vec<Request>) -> Result<usize> {
        admit(&self.id, &self.config, &self.store, &self.stats, requests).await
    }
}

/// Request admission.
///
/// The ADSL argument check runs over the whole batch before anything else,
/// so an invalid request fails the call without touching any counter or the
/// scheduler. Counters are incremented before the retry test: a request
/// dispatched N times retires after exactly `retried_times` admissions, and
/// its retirement counts as one spider-level failure.
async fn admit(
    id: &str,
    config: &SpiderConfig,
    store: &Arc<dyn SchedulerStore>,
    stats: &Arc<dyn StatsClient>,
    requests: Vec<Request>,
) -> Result<usize> {
    for request in &requests {
        if request.is_adsl() && request.redial_pattern().is_none() {
            return Err(Error::missing_redial_pattern(request.downloader_type.clone()));
        }
    }

    let mut batch = Vec::with_capacity(requests.len());
    for mut request in requests {
        request.requested_times += 1;
        if request.requested_times > config.retried_times {
            debug!(
                "request {} retired after {} admissions",
                request.url,
                request.requested_times - 1
            );
            stats.increase_failure(id).await;
            continue;
        }
        if config.depth > 0 && request.depth > config.depth {
            continue;
        }
        request.owner = id.to_string();
        batch.push(request);
    }

    if batch.is_empty() {
        return Ok(0);
    }
    store.enqueue(batch).await
}

/// Interval-paced drain of the scheduler towards the agents.
async fn dispatch(core: &SpiderCore, request_hook: Option<&RequestHook>) -> Result<ExitReason> {
    let (interval_ms, batch_size) = core.config.pacing();
    let interval = Duration::from_millis(interval_ms);
    let sleep_limit_ms = core.config.sleep_limit_ms();
    let timeout = Duration::from_millis(core.config.request_timeout_ms);

    let mut paused_ms = 0u64;
    let mut idle_ms = 0u64;
    let mut print_ms = 0u64;

    loop {
        print_ms += interval_ms;
        if print_ms >= PRINT_EVERY_MS {
            print_ms = 0;
            core.stats.print(&core.id).await;
        }

        if core.requested.len() > core.config.requested_queue_count {
            // Back-pressure: agents are behind, hold dispatch this tick.
            paused_ms += interval_ms;
            if paused_ms > sleep_limit_ms {
                warn!(
                    "spider {} paused for {paused_ms}ms with {} in flight, giving up",
                    core.id,
                    core.requested.len()
                );
                return Ok(ExitReason::PausedTooLong);
            }
        } else {
            paused_ms = 0;

            // Timed-out work goes back through admission before anything
            // new is dispatched.
            let timed_out = core.requested.sweep_timeouts(timeout);
            if !timed_out.is_empty() {
                warn!("{} in-flight requests timed out, re-admitting", timed_out.len());
                gauge!("spider_inflight").set(core.requested.len() as f64);
                if let Err(e) = core.add_requests(timed_out).await {
                    error!("re-admission of timed-out requests failed: {e}");
                }
            } else {
                let mut batch = core.store.dequeue(batch_size).await?;
                if batch.is_empty() {
                    idle_ms += interval_ms;
                    if idle_ms > sleep_limit_ms {
                        info!("spider {} idle for {idle_ms}ms, scheduler drained", core.id);
                        return Ok(ExitReason::Drained);
                    }
                } else {
                    idle_ms = 0;
                    if let Some(hook) = request_hook {
                        for request in &mut batch {
                            (**hook)(request);
                        }
                    }
                    match publish_batch(core, batch).await {
                        Ok(true) => {}
                        Ok(false) => return Ok(ExitReason::NoProxy),
                        // Fatal to this tick only; the loop keeps pacing.
                        Err(e) => error!("publish aborted for this tick: {e}"),
                    }
                }
            }
        }

        tokio::select! {
            _ = core.lifetime.stopped() => return Ok(ExitReason::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Publishes a batch to the agents. `Ok(false)` means the proxy pool is
/// exhausted, which terminates the dispatcher.
async fn publish_batch(core: &SpiderCore, requests: Vec<Request>) -> Result<bool> {
    for mut request in requests {
        if core.config.use_proxy {
            let leased = match &core.proxies {
                Some(pool) => pool.lease(PROXY_MIN_SCORE).await,
                None => None,
            };
            match leased {
                Some(endpoint) => request.proxy = Some(endpoint),
                None => {
                    warn!("no proxy at score {PROXY_MIN_SCORE} or better");
                    return Ok(false);
                }
            }
        }

        request.timestamp = chrono::Utc::now().timestamp_millis();
        let topic = message::dispatch_topic(&request)?;

        if !core.requested.enqueue(request.clone()) {
            debug!("request {} already in flight, dropped", request.hash);
            continue;
        }
        let payload = serde_json::to_vec(&request)
            .map_err(|e| Error::from(errors::error::QueueError::SerializationFailed(e.into())))?;
        core.mq.publish(&topic, &payload).await?;
        counter!("spider_requests_published_total", "topic" => topic).increment(1);
    }
    gauge!("spider_inflight").set(core.requested.len() as f64);
    Ok(true)
}

/// Control-topic consumer: correlates agent responses with in-flight
/// requests and honors exit frames addressed to this spider.
async fn consume(
    core: Arc<SpiderCore>,
    stages: Arc<Vec<Box<dyn DataFlow>>>,
    mut rx: mpsc::Receiver<Message>,
    topic: String,
) {
    loop {
        let frame = tokio::select! {
            _ = core.lifetime.stopped() => break,
            frame = rx.recv() => frame,
        };
        let Some(frame) = frame else {
            info!("subscription to {topic} ended");
            break;
        };
        let _ = frame.ack().await;

        match serde_json::from_slice::<SpiderMessage>(&frame.payload) {
            Ok(SpiderMessage::Exit(exit)) => {
                // The control topic is shared bus-wide; only our id counts.
                if exit.id == core.id {
                    info!("spider {} received exit, requesting shutdown", core.id);
                    core.lifetime.stop();
                }
            }
            Ok(SpiderMessage::Response(response)) => {
                handle_response(&core, &stages, response).await;
            }
            Err(e) => warn!("undecodable frame on {topic}: {e}"),
        }
    }
    debug!("consumer of {topic} stopped");
}

async fn handle_response(core: &SpiderCore, stages: &[Box<dyn DataFlow>], response: Response) {
    let Some(mut request) = core.requested.dequeue(&response.request_hash) else {
        debug!("stale response for {}, dropped", response.request_hash);
        return;
    };
    gauge!("spider_inflight").set(core.requested.len() as f64);
    counter!("spider_responses_total").increment(1);

    if !response.is_success() {
        core.stats
            .agent_failure(&response.agent, response.elapsed_ms)
            .await;
        if let Err(e) = core.add_requests(vec![request]).await {
            error!("re-admission after agent failure failed: {e}");
        }
        return;
    }

    request.agent = response.agent.clone();
    core.stats
        .agent_success(&response.agent, response.elapsed_ms)
        .await;

    let original = request.clone();
    let mut context = DataContext::new(core.config.clone(), request, response);
    match run_pipeline(stages, &mut context).await {
        Ok(()) => {
            let follows = context.take_follow_requests();
            if !follows.is_empty() {
                match core.add_requests(follows).await {
                    Ok(accepted) if accepted > 0 => {
                        core.stats.increase_total(&core.id, accepted as u64).await;
                    }
                    Ok(_) => {}
                    Err(e) => error!("follow-up admission failed: {e}"),
                }
            }
            core.stats.increase_success(&core.id).await;
        }
        Err(e) => {
            // Whatever earlier stages extracted dies with the context; the
            // request retries until its admission budget runs out.
            error!("data flow failed for {}: {e}", original.url);
            if let Err(e) = core.add_requests(vec![original]).await {
                error!("re-admission after stage failure failed: {e}");
            }
        }
    }
}
