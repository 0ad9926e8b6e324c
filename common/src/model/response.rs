use serde::{Deserialize, Serialize};

/// Outcome of a download reported back by an agent. Correlated with the
/// in-flight request through `request_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_hash: String,
    pub status_code: u16,
    /// Identifier of the agent that performed the download.
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub content: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
