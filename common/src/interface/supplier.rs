use crate::model::Request;
use async_trait::async_trait;
use errors::Result;

/// Producer of seed requests, drained once at startup.
#[async_trait]
pub trait RequestSupplier: Send + Sync {
    async fn pull(&self) -> Result<Vec<Request>>;
}

/// Supplies a fixed URL list.
pub struct SeedSupplier {
    urls: Vec<String>,
}

impl SeedSupplier {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SeedSupplier {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RequestSupplier for SeedSupplier {
    async fn pull(&self) -> Result<Vec<Request>> {
        Ok(self.urls.iter().map(Request::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_supplier() {
        let supplier = SeedSupplier::from_urls(["https://example.com/a", "https://example.com/b"]);
        let seeds = supplier.pull().await.unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].url, "https://example.com/a");
        assert_eq!(seeds[0].requested_times, 0);
        assert_eq!(seeds[0].depth, 0);
    }
}
