use async_trait::async_trait;
use common::interface::{DataContext, DataFlow};
use common::model::SpiderConfig;
use errors::{Error, Result, StorageError};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

pub type StorageFactory = Arc<dyn Fn(&SpiderConfig) -> Result<Box<dyn DataFlow>> + Send + Sync>;

/// Maps the `storage` configuration key to a constructor the hosting
/// program registered at startup. Resolution failure is fatal at start.
pub struct StorageRegistry {
    factories: HashMap<String, StorageFactory>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        let mut registry = StorageRegistry {
            factories: HashMap::new(),
        };
        registry.register("console", |_| Ok(Box::new(ConsoleStorage)));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SpiderConfig) -> Result<Box<dyn DataFlow>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn create(&self, name: &str, config: &SpiderConfig) -> Result<Box<dyn DataFlow>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::unknown_storage(name))?;
        factory(config).map_err(|e| StorageError::FactoryFailed(name.to_string(), e.into()).into())
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        StorageRegistry::new()
    }
}

/// Sink of last resort: logs whatever the stages extracted.
pub struct ConsoleStorage;

#[async_trait]
impl DataFlow for ConsoleStorage {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle(&self, context: &mut DataContext) -> Result<()> {
        if !context.properties().is_empty() {
            info!(
                "{} -> {}",
                context.request.url,
                serde_json::to_string(context.properties()).unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Runs the stages sequentially in registration order. The first failure
/// wins and carries the failing stage's name.
pub async fn run_pipeline(stages: &[Box<dyn DataFlow>], context: &mut DataContext) -> Result<()> {
    for stage in stages {
        stage
            .handle(context)
            .await
            .map_err(|e| Error::stage_runtime_failed(stage.name(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::{Request, Response};

    fn context() -> DataContext {
        DataContext::new(
            Arc::new(SpiderConfig::default()),
            Request::new("https://example.com"),
            Response {
                request_hash: "h".to_string(),
                status_code: 200,
                agent: "A1".to_string(),
                elapsed_ms: 1,
                content: vec![],
            },
        )
    }

    struct FailingStage;

    #[async_trait]
    impl DataFlow for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _context: &mut DataContext) -> Result<()> {
            Err(Error::with_message(
                errors::ErrorKind::Stage,
                "boom".to_string(),
                None::<errors::BoxError>,
            ))
        }
    }

    #[tokio::test]
    async fn test_registry_resolves_console() {
        let registry = StorageRegistry::new();
        let stage = registry.create("console", &SpiderConfig::default()).unwrap();
        assert_eq!(stage.name(), "console");
    }

    #[tokio::test]
    async fn test_registry_rejects_unknown_name() {
        let registry = StorageRegistry::new();
        let err = match registry.create("warehouse", &SpiderConfig::default()) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.is_storage());
    }

    #[tokio::test]
    async fn test_registry_wraps_factory_failure() {
        let mut registry = StorageRegistry::new();
        registry.register("broken", |_| {
            Err(Error::with_message(
                errors::ErrorKind::Storage,
                "cannot build".to_string(),
                None::<errors::BoxError>,
            ))
        });
        let err = match registry.create("broken", &SpiderConfig::default()) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.is_storage());
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_failure() {
        let stages: Vec<Box<dyn DataFlow>> = vec![Box::new(ConsoleStorage), Box::new(FailingStage)];
        let err = run_pipeline(&stages, &mut context()).await.unwrap_err();
        assert!(err.is_stage());
        assert!(err.to_string().contains("failing"));
    }

    #[tokio::test]
    async fn test_console_storage_handles_empty_context() {
        let stages: Vec<Box<dyn DataFlow>> = vec![Box::new(ConsoleStorage)];
        run_pipeline(&stages, &mut context()).await.unwrap();
    }
}
