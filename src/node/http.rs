use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::envelope::EnvelopeBuilder;
use super::{NodeClient, NodeError, NodeMessage, job_inbox_name};

const CREATE_JOB_PATH: &str = "/v1/create_job";
const JOB_MESSAGE_PATH: &str = "/v1/job_message";
const LAST_MESSAGES_PATH: &str = "/v1/last_messages_from_inbox";
const HEALTH_PATH: &str = "/v1/shinkai_health";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`NodeClient`] speaking the node's HTTP API.
pub struct HttpNodeClient {
    base_url: String,
    client: reqwest::Client,
    envelopes: Box<dyn EnvelopeBuilder>,
    inbox_count: usize,
    timeout: Duration,
}

impl HttpNodeClient {
    pub fn new(
        base_url: impl Into<String>,
        envelopes: Box<dyn EnvelopeBuilder>,
        inbox_count: usize,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            envelopes,
            inbox_count,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Give up on any single request after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST an envelope and unwrap the node's `{status, data}` reply.
    /// Returns the payload on `success`, the error text otherwise.
    async fn post(&self, path: &str, body: &Value) -> Result<Result<Value, String>, NodeError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        tracing::trace!(path, %status, "node replied");
        Ok(Self::parse_reply(&text).map_err(|e| format!("{status}: {e}")))
    }

    fn parse_reply(text: &str) -> Result<Value, String> {
        let reply: NodeReply = match serde_json::from_str(text) {
            Ok(reply) => reply,
            Err(_) => return Err(format!("unexpected reply: {text}")),
        };
        if reply.status == "success" {
            Ok(reply.data)
        } else {
            Err(reply
                .error
                .or_else(|| reply.data.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("status {}", reply.status)))
        }
    }

    fn parse_job_id(data: &Value) -> Result<String, String> {
        match data {
            Value::String(id) if !id.is_empty() => Ok(id.clone()),
            Value::Object(obj) => obj
                .get("job_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("no job id in {data}")),
            other => Err(format!("no job id in {other}")),
        }
    }

    fn parse_inbox(data: &Value) -> Result<Vec<NodeMessage>, String> {
        let messages = data
            .as_array()
            .ok_or_else(|| format!("inbox is not a list: {data}"))?;
        Ok(messages.iter().map(NodeMessage::from_wire).collect())
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn create_job(&self, agent: &str) -> Result<String, NodeError> {
        let body = self.envelopes.job_creation(agent);
        let data = self
            .post(CREATE_JOB_PATH, &body)
            .await?
            .map_err(NodeError::JobCreation)?;
        Self::parse_job_id(&data).map_err(NodeError::JobCreation)
    }

    async fn send_message(&self, content: &str, job_id: &str) -> Result<(), NodeError> {
        let body = self.envelopes.job_message(job_id, content);
        self.post(JOB_MESSAGE_PATH, &body)
            .await?
            .map_err(NodeError::MessageSend)?;
        Ok(())
    }

    async fn fetch_inbox(&self, job_id: &str) -> Result<Vec<NodeMessage>, NodeError> {
        let body = self
            .envelopes
            .inbox_request(&job_inbox_name(job_id), self.inbox_count);
        let data = self
            .post(LAST_MESSAGES_PATH, &body)
            .await?
            .map_err(NodeError::Inbox)?;
        Self::parse_inbox(&data).map_err(NodeError::Inbox)
    }

    async fn health(&self) -> Result<(), NodeError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, HEALTH_PATH))
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NodeError::Health(format!("HTTP {}", resp.status())));
        }
        let body: Value = resp.json().await?;
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            other => Err(NodeError::Health(format!(
                "status {}",
                other.unwrap_or("missing")
            ))),
        }
    }
}

#[derive(Deserialize)]
struct NodeReply {
    status: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}
