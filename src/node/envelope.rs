//! Construction of the message envelopes the node accepts.
//!
//! Signing and encryption belong to an external message-building library;
//! it plugs in through [`EnvelopeBuilder`]. [`PlainEnvelopeBuilder`] emits
//! unsigned, unencrypted envelopes for nodes running without identity
//! checks (local development, tests).

use chrono::Utc;
use serde_json::{Value, json};

use super::{JOB_MESSAGE_SCHEMA, job_inbox_name};

const JOB_CREATION_SCHEMA: &str = "JobCreationSchema";
const INBOX_REQUEST_SCHEMA: &str = "APIGetMessagesFromInboxRequest";

/// Builds the JSON bodies posted to the node.
pub trait EnvelopeBuilder: Send + Sync {
    fn job_creation(&self, agent: &str) -> Value;
    fn job_message(&self, job_id: &str, content: &str) -> Value;
    fn inbox_request(&self, inbox: &str, count: usize) -> Value;
}

/// Identity the envelopes are addressed from/to.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Node identity name, e.g. `@@localhost.shinkai`.
    pub node_name: String,
    /// Profile the jobs belong to.
    pub profile: String,
}

pub struct PlainEnvelopeBuilder {
    identity: Identity,
}

impl PlainEnvelopeBuilder {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    fn envelope(
        &self,
        schema: &str,
        raw_content: String,
        recipient_subidentity: &str,
        inbox: &str,
    ) -> Value {
        json!({
            "body": {
                "unencrypted": {
                    "message_data": {
                        "unencrypted": {
                            "message_raw_content": raw_content,
                            "message_content_schema": schema
                        }
                    },
                    "internal_metadata": {
                        "sender_subidentity": self.identity.profile,
                        "recipient_subidentity": recipient_subidentity,
                        "inbox": inbox,
                        "signature": "",
                        "encryption": "None"
                    }
                }
            },
            "external_metadata": {
                "sender": self.identity.node_name,
                "recipient": self.identity.node_name,
                "scheduled_time": Utc::now().to_rfc3339(),
                "signature": "",
                "intra_sender": self.identity.profile,
                "other": ""
            },
            "encryption": "None",
            "version": "V1_0"
        })
    }
}

impl EnvelopeBuilder for PlainEnvelopeBuilder {
    fn job_creation(&self, agent: &str) -> Value {
        let scope = json!({ "scope": { "local": [], "vector_fs": [] } });
        self.envelope(JOB_CREATION_SCHEMA, scope.to_string(), agent, "")
    }

    fn job_message(&self, job_id: &str, content: &str) -> Value {
        let message = json!({
            "job_id": job_id,
            "content": content,
            "files_inbox": "",
            "parent": ""
        });
        self.envelope(
            JOB_MESSAGE_SCHEMA,
            message.to_string(),
            "",
            &job_inbox_name(job_id),
        )
    }

    fn inbox_request(&self, inbox: &str, count: usize) -> Value {
        let request = json!({ "inbox": inbox, "count": count, "offset": null });
        self.envelope(INBOX_REQUEST_SCHEMA, request.to_string(), "", inbox)
    }
}
