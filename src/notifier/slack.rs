use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Delivery, Notifier};
use crate::job::Origin;

const API_URL: &str = "https://slack.com/api/chat.postMessage";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts answers as thread replies through Slack's Web API.
pub struct SlackNotifier {
    token: String,
    api_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(token, API_URL)
    }

    /// Point at a different endpoint (Slack-compatible gateways, tests).
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: api_url.into(),
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Give up on a post after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn try_post(&self, origin: &Origin, text: &str) -> Result<Delivery, reqwest::Error> {
        let body = PostMessage {
            channel: &origin.channel_id,
            thread_ts: &origin.thread_id,
            text,
        };
        let resp = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(Delivery::Rejected(format!("HTTP {}", resp.status())));
        }
        let reply: PostMessageReply = resp.json().await?;
        Ok(Self::interpret(reply))
    }

    fn interpret(reply: PostMessageReply) -> Delivery {
        if reply.ok {
            Delivery::Posted
        } else {
            Delivery::Rejected(reply.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, origin: &Origin, text: &str) -> Delivery {
        match self.try_post(origin, text).await {
            Ok(delivery) => {
                if delivery.is_posted() {
                    tracing::debug!(channel_id = %origin.channel_id, thread_id = %origin.thread_id, "posted to slack");
                }
                delivery
            }
            Err(e) => Delivery::Rejected(e.to_string()),
        }
    }
}

// --- API types ---

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    thread_ts: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct PostMessageReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_reply_is_posted() {
        let reply: PostMessageReply = serde_json::from_str(r#"{"ok":true,"ts":"1.2"}"#).unwrap();
        assert_eq!(SlackNotifier::interpret(reply), Delivery::Posted);
    }

    #[test]
    fn error_reply_is_rejected_with_reason() {
        let reply: PostMessageReply =
            serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        assert_eq!(
            SlackNotifier::interpret(reply),
            Delivery::Rejected("channel_not_found".to_string())
        );
    }

    #[test]
    fn request_body_threads_reply() {
        let body = PostMessage {
            channel: "C1",
            thread_ts: "1700000000.0001",
            text: "pong",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["channel"], "C1");
        assert_eq!(json["thread_ts"], "1700000000.0001");
        assert_eq!(json["text"], "pong");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_rejected_not_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let notifier = SlackNotifier::with_api_url("xoxb-test", "http://127.0.0.1:9/api");
        let delivery = notifier.post(&Origin::new("C1", "T1"), "pong").await;
        assert!(!delivery.is_posted());
    }

    #[tokio::test]
    async fn silent_endpoint_is_rejected_after_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let notifier = SlackNotifier::with_api_url("xoxb-test", format!("http://{addr}/api"))
            .with_timeout(Duration::from_millis(200));
        let delivery = notifier.post(&Origin::new("C1", "T1"), "pong").await;
        assert!(matches!(delivery, Delivery::Rejected(_)));
    }
}
