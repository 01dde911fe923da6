//! Decides whether a job inbox holds a genuine answer from the node.

use serde_json::Value;

use crate::node::{JOB_MESSAGE_SCHEMA, NodeMessage};

/// Inspect a job inbox (oldest first) and return the answer text, if the
/// node has replied.
///
/// Only the most recent message is considered. It is an answer when it is
/// a job message and its sender subidentity is empty, i.e. the node wrote
/// it rather than echoing our own prompt back. An inbox holding just the
/// outbound prompt has no answer yet.
///
/// Pure and deterministic: the same inbox always yields the same result,
/// which is what makes redelivery after a failed post safe.
pub fn match_answer(messages: &[NodeMessage]) -> Option<String> {
    if messages.len() <= 1 {
        return None;
    }

    let latest = messages.last()?;
    if latest.schema != JOB_MESSAGE_SCHEMA || !latest.sender_subidentity.is_empty() {
        return None;
    }

    let text = extract_content(&latest.raw_content);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The answer lives in the `content` field of the JSON payload. Payloads
/// that are not JSON objects are taken verbatim.
fn extract_content(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(obj)) => match obj.get("content") {
            Some(Value::String(content)) => content.clone(),
            Some(Value::Null) | None => raw.to_string(),
            Some(other) => other.to_string(),
        },
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(text: &str) -> NodeMessage {
        NodeMessage::from_profile(
            "main",
            JOB_MESSAGE_SCHEMA,
            format!(r#"{{"job_id":"J1","content":"{text}"}}"#),
        )
    }

    fn answer(text: &str) -> NodeMessage {
        NodeMessage::from_node(JOB_MESSAGE_SCHEMA, format!(r#"{{"content":"{text}"}}"#))
    }

    #[test]
    fn empty_inbox_has_no_answer() {
        assert_eq!(match_answer(&[]), None);
    }

    #[test]
    fn prompt_only_has_no_answer() {
        assert_eq!(match_answer(&[prompt("ping")]), None);
    }

    #[test]
    fn single_node_message_is_not_enough() {
        assert_eq!(match_answer(&[answer("pong")]), None);
    }

    #[test]
    fn node_reply_after_prompt_matches() {
        assert_eq!(
            match_answer(&[prompt("ping"), answer("pong")]),
            Some("pong".to_string())
        );
    }

    #[test]
    fn echoed_prompt_is_rejected() {
        assert_eq!(match_answer(&[prompt("ping"), prompt("ping again")]), None);
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let other = NodeMessage::from_node("TextContent", r#"{"content":"pong"}"#);
        assert_eq!(match_answer(&[prompt("ping"), other]), None);
    }

    #[test]
    fn only_latest_message_counts() {
        // An older answer followed by a new prompt: still waiting.
        let inbox = [prompt("ping"), answer("pong"), prompt("again")];
        assert_eq!(match_answer(&inbox), None);

        let inbox = [prompt("ping"), answer("pong"), prompt("again"), answer("second")];
        assert_eq!(match_answer(&inbox), Some("second".to_string()));
    }

    #[test]
    fn matching_is_idempotent() {
        let inbox = [prompt("ping"), answer("pong")];
        assert_eq!(match_answer(&inbox), match_answer(&inbox));
    }

    #[test]
    fn non_json_content_taken_verbatim() {
        let inbox = [prompt("ping"), NodeMessage::from_node(JOB_MESSAGE_SCHEMA, "plain pong")];
        assert_eq!(match_answer(&inbox), Some("plain pong".to_string()));
    }

    #[test]
    fn empty_content_is_not_an_answer() {
        let inbox = [prompt("ping"), answer("")];
        assert_eq!(match_answer(&inbox), None);
    }

    #[test]
    fn json_without_content_field_taken_verbatim() {
        let raw = r#"{"text":"pong"}"#;
        let inbox = [prompt("ping"), NodeMessage::from_node(JOB_MESSAGE_SCHEMA, raw)];
        assert_eq!(match_answer(&inbox), Some(raw.to_string()));
    }
}
