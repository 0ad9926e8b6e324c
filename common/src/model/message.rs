use crate::model::request::{DEFAULT_DOWNLOADER, Policy, Request};
use crate::model::response::Response;
use errors::Result;
use serde::{Deserialize, Serialize};

/// Asks the spider named by `id` to shut down. Other spiders sharing the bus
/// ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitMessage {
    pub id: String,
}

/// Frames consumed on a spider's control topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpiderMessage {
    Exit(ExitMessage),
    Response(Response),
}

/// Control topic a spider subscribes to: `Spider.<ID_UPPER>`.
pub fn control_topic(spider_id: &str) -> String {
    format!("Spider.{}", spider_id.to_uppercase())
}

/// Outbound topic for a request.
///
/// A request that has never been served goes to its downloader family's
/// topic. Once served, `Chained` pins it to the serving agent while `Random`
/// rebalances across the family again.
pub fn dispatch_topic(request: &Request) -> Result<String> {
    if request.agent.is_empty() {
        return Ok(downloader_topic(request));
    }
    match request.policy {
        Policy::Chained => Ok(request.agent.to_uppercase()),
        Policy::Random => Ok(downloader_topic(request)),
        Policy::Unknown => Err(errors::Error::unsupported_policy(request.url.clone())),
    }
}

fn downloader_topic(request: &Request) -> String {
    if request.downloader_type.is_empty() {
        DEFAULT_DOWNLOADER.to_string()
    } else {
        request.downloader_type.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_topic() {
        assert_eq!(control_topic("news-spider"), "Spider.NEWS-SPIDER");
    }

    #[test]
    fn test_dispatch_topic_defaults() {
        let request = Request::new("https://example.com");
        assert_eq!(dispatch_topic(&request).unwrap(), "HttpClient");

        let request = Request::new("https://example.com").with_downloader("ADSL-A");
        assert_eq!(dispatch_topic(&request).unwrap(), "ADSL-A");
    }

    #[test]
    fn test_chained_pins_to_uppercased_agent() {
        let request = Request::new("https://example.com")
            .with_agent("a7")
            .with_policy(Policy::Chained);
        assert_eq!(dispatch_topic(&request).unwrap(), "A7");
    }

    #[test]
    fn test_random_rebalances_served_request() {
        let request = Request::new("https://example.com")
            .with_agent("a7")
            .with_policy(Policy::Random);
        assert_eq!(dispatch_topic(&request).unwrap(), "HttpClient");
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let request = Request::new("https://example.com")
            .with_agent("a7")
            .with_policy(Policy::Unknown);
        let err = dispatch_topic(&request).unwrap_err();
        assert!(err.is_request());
    }

    #[test]
    fn test_message_round_trip() {
        let exit = SpiderMessage::Exit(ExitMessage {
            id: "news-spider".to_string(),
        });
        let bytes = serde_json::to_vec(&exit).unwrap();
        assert_eq!(serde_json::from_slice::<SpiderMessage>(&bytes).unwrap(), exit);

        let response = SpiderMessage::Response(Response {
            request_hash: "h1".to_string(),
            status_code: 200,
            agent: "A7".to_string(),
            elapsed_ms: 7,
            content: b"ok".to_vec(),
        });
        let bytes = serde_json::to_vec(&response).unwrap();
        assert_eq!(
            serde_json::from_slice::<SpiderMessage>(&bytes).unwrap(),
            response
        );
    }

    #[test]
    fn test_unknown_frame_fails_to_decode() {
        assert!(serde_json::from_slice::<SpiderMessage>(br#"{"type":"Bogus"}"#).is_err());
        assert!(serde_json::from_slice::<SpiderMessage>(b"not json").is_err());
    }
}
