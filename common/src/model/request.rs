use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utils::encrypt::md5_hex;

/// Topic used when a request carries no downloader tag.
pub const DEFAULT_DOWNLOADER: &str = "HttpClient";

/// Downloader tags containing this marker require a redial pattern header.
pub const ADSL_MARKER: &str = "ADSL";

/// Header consumed by ADSL agents to recognize the carrier's re-login page.
pub const REDIAL_PATTERN_HEADER: &str = "RedialRegExp";

/// How a follow-up request is routed once its parent has been served by a
/// concrete agent.
///
/// `Chained` pins the request to that agent, which keeps session state
/// (cookies, dial-up identity) on one box. `Random` rebalances across all
/// agents of the request's downloader type. `Unknown` is the catch-all for
/// foreign payloads carrying a policy this build does not understand; it is
/// rejected at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Policy {
    #[default]
    Random,
    Chained,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Stable fingerprint. Empty until the scheduler store assigns one; a
    /// caller-supplied value is honored verbatim.
    #[serde(default)]
    pub hash: String,
    pub url: String,
    /// Spider id, stamped on admission.
    #[serde(default)]
    pub owner: String,
    /// Downloader tag selecting the agent family; empty means the default.
    #[serde(default)]
    pub downloader_type: String,
    /// Identifier of the agent that served this request, empty before the
    /// first successful download.
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Admission attempts so far. Incremented exactly once per admission.
    #[serde(default)]
    pub requested_times: u32,
    /// Hop count from the seed requests.
    #[serde(default)]
    pub depth: u32,
    /// Unix milliseconds, stamped when the request is published.
    #[serde(default)]
    pub timestamp: i64,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Request {
            hash: String::new(),
            url: url.into(),
            owner: String::new(),
            downloader_type: String::new(),
            agent: String::new(),
            policy: Policy::default(),
            proxy: None,
            headers: BTreeMap::new(),
            requested_times: 0,
            depth: 0,
            timestamp: 0,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    pub fn with_downloader(mut self, downloader_type: impl Into<String>) -> Self {
        self.downloader_type = downloader_type.into();
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Identity digest over the routing-relevant fields. Retries of the same
    /// logical request always map to the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut canonical = String::with_capacity(self.url.len() + 32);
        canonical.push_str(&self.url);
        canonical.push('|');
        canonical.push_str(&self.downloader_type);
        for (key, value) in &self.headers {
            canonical.push('|');
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(value);
        }
        md5_hex(canonical.as_bytes())
    }

    pub fn is_adsl(&self) -> bool {
        self.downloader_type.contains(ADSL_MARKER)
    }

    /// The redial pattern header, if present and non-blank.
    pub fn redial_pattern(&self) -> Option<&str> {
        self.headers
            .get(REDIAL_PATTERN_HEADER)
            .map(String::as_str)
            .filter(|pattern| !pattern.trim().is_empty())
    }
}
