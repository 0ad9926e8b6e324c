use crate::model::{Request, Response, SpiderConfig};
use async_trait::async_trait;
use errors::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-response scope handed through the pipeline. Each successful response
/// gets a fresh context; whatever the stages accumulate dies with it unless
/// a sink persisted it.
pub struct DataContext {
    pub config: Arc<SpiderConfig>,
    pub request: Request,
    pub response: Response,
    properties: HashMap<String, serde_json::Value>,
    follow_requests: Vec<Request>,
}

impl DataContext {
    pub fn new(config: Arc<SpiderConfig>, request: Request, response: Response) -> Self {
        DataContext {
            config,
            request,
            response,
            properties: HashMap::new(),
            follow_requests: Vec::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(value) = serde_json::to_value(value) {
            self.properties.insert(key.into(), value);
        }
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    /// New request one hop below the current one, inheriting its routing:
    /// downloader family, serving agent, and policy.
    pub fn create_follow(&self, url: impl Into<String>) -> Request {
        Request::new(url)
            .with_downloader(self.request.downloader_type.clone())
            .with_agent(self.request.agent.clone())
            .with_policy(self.request.policy)
            .with_depth(self.request.depth + 1)
    }

    /// Queues a follow-up. Depth is floored at one hop below the parent so
    /// chains never go shallower.
    pub fn add_follow_request(&mut self, mut request: Request) {
        if request.depth <= self.request.depth {
            request.depth = self.request.depth + 1;
        }
        self.follow_requests.push(request);
    }

    pub fn follow_requests(&self) -> &[Request] {
        &self.follow_requests
    }

    pub fn take_follow_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.follow_requests)
    }
}

/// One stage of the response pipeline. Stages run sequentially in
/// registration order and may extract data into the context or queue
/// follow-up requests.
#[async_trait]
pub trait DataFlow: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn handle(&self, context: &mut DataContext) -> Result<()>;

    async fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Policy;

    fn context() -> DataContext {
        let request = Request::new("https://example.com/list")
            .with_agent("a7")
            .with_policy(Policy::Chained)
            .with_depth(2);
        let response = Response {
            request_hash: "h".to_string(),
            status_code: 200,
            agent: "a7".to_string(),
            elapsed_ms: 3,
            content: vec![],
        };
        DataContext::new(Arc::new(SpiderConfig::default()), request, response)
    }

    #[test]
    fn test_create_follow_inherits_routing() {
        let ctx = context();
        let follow = ctx.create_follow("https://example.com/item/1");
        assert_eq!(follow.agent, "a7");
        assert_eq!(follow.policy, Policy::Chained);
        assert_eq!(follow.depth, 3);
    }

    #[test]
    fn test_add_follow_request_floors_depth() {
        let mut ctx = context();
        ctx.add_follow_request(Request::new("https://example.com/item/2"));
        assert_eq!(ctx.follow_requests()[0].depth, 3);

        ctx.add_follow_request(Request::new("https://example.com/item/3").with_depth(9));
        assert_eq!(ctx.follow_requests()[1].depth, 9);
    }

    #[test]
    fn test_properties_round_trip() {
        let mut ctx = context();
        ctx.set_property("title", "hello");
        assert_eq!(ctx.property("title").unwrap(), "hello");
        assert!(ctx.property("missing").is_none());
    }
}
