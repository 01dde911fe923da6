//! The remote job-processing node, seen through the three calls the engine
//! needs: create a job, send a message into it, read its inbox.

pub mod envelope;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema tag the node puts on job messages, both the prompt we sent and
/// its answer.
pub const JOB_MESSAGE_SCHEMA: &str = "JobMessageSchema";

/// Errors surfaced by a [`NodeClient`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("job creation failed: {0}")]
    JobCreation(String),
    #[error("message send failed: {0}")]
    MessageSend(String),
    #[error("inbox fetch failed: {0}")]
    Inbox(String),
    #[error("node health check failed: {0}")]
    Health(String),
    #[error("node transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One message of a job inbox, reduced to the fields the matcher reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMessage {
    /// Content schema tag, e.g. [`JOB_MESSAGE_SCHEMA`].
    pub schema: String,
    /// Empty when the node itself authored the message.
    pub sender_subidentity: String,
    /// Raw message content, usually a JSON document.
    pub raw_content: String,
    /// Time the sender stamped on the message. Tells apart two messages
    /// with the same content.
    #[serde(default)]
    pub scheduled_time: String,
}

impl NodeMessage {
    /// A message written by the node (empty sender subidentity).
    pub fn from_node(schema: impl Into<String>, raw_content: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            sender_subidentity: String::new(),
            raw_content: raw_content.into(),
            scheduled_time: String::new(),
        }
    }

    /// A message sent on behalf of a profile, as echoed back in the inbox.
    pub fn from_profile(
        profile: impl Into<String>,
        schema: impl Into<String>,
        raw_content: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            sender_subidentity: profile.into(),
            raw_content: raw_content.into(),
            scheduled_time: String::new(),
        }
    }

    /// Read a message out of the node's wire format. Missing fields (e.g. an
    /// encrypted body) come back empty, which the matcher treats as "not an
    /// answer".
    pub fn from_wire(value: &Value) -> Self {
        let text = |pointer: &str| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            schema: text("/body/unencrypted/message_data/unencrypted/message_content_schema"),
            sender_subidentity: text("/body/unencrypted/internal_metadata/sender_subidentity"),
            raw_content: text("/body/unencrypted/message_data/unencrypted/message_raw_content"),
            scheduled_time: text("/external_metadata/scheduled_time"),
        }
    }
}

/// Name of the inbox the node keeps for a job.
pub fn job_inbox_name(job_id: &str) -> String {
    format!("job_inbox::{job_id}::false")
}

/// Request/response access to the node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Create a job for `agent`, returning the node-issued job id.
    async fn create_job(&self, agent: &str) -> Result<String, NodeError>;

    /// Post `content` into an existing job.
    async fn send_message(&self, content: &str, job_id: &str) -> Result<(), NodeError>;

    /// Latest messages of the job inbox, oldest first.
    async fn fetch_inbox(&self, job_id: &str) -> Result<Vec<NodeMessage>, NodeError>;

    /// Liveness probe.
    async fn health(&self) -> Result<(), NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_wire_reads_nested_fields() {
        let wire = json!({
            "body": {
                "unencrypted": {
                    "message_data": {
                        "unencrypted": {
                            "message_raw_content": "{\"content\":\"pong\"}",
                            "message_content_schema": "JobMessageSchema"
                        }
                    },
                    "internal_metadata": {
                        "sender_subidentity": "",
                        "recipient_subidentity": "main"
                    }
                }
            },
            "external_metadata": { "scheduled_time": "2024-01-01T00:00:00Z" }
        });

        let message = NodeMessage::from_wire(&wire);
        assert_eq!(message.schema, JOB_MESSAGE_SCHEMA);
        assert_eq!(message.sender_subidentity, "");
        assert_eq!(message.raw_content, "{\"content\":\"pong\"}");
        assert_eq!(message.scheduled_time, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn from_wire_tolerates_encrypted_body() {
        let wire = json!({ "body": { "encrypted": { "content": "deadbeef" } } });
        let message = NodeMessage::from_wire(&wire);
        assert!(message.schema.is_empty());
        assert!(message.raw_content.is_empty());
    }

    #[test]
    fn inbox_name_format() {
        assert_eq!(job_inbox_name("jobid_42"), "job_inbox::jobid_42::false");
    }
}
