use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{JOB_MESSAGE_SCHEMA, NodeClient, NodeError, NodeMessage};

/// An in-process node for tests.
///
/// Sent messages are echoed into the job inbox under the `profile`
/// subidentity, like the real node does. Answers are injected with
/// [`MockNode::reply`].
pub struct MockNode {
    profile: String,
    next_id: AtomicUsize,
    next_seq: AtomicUsize,
    created: AtomicUsize,
    fail_create: AtomicBool,
    fail_send: AtomicBool,
    inboxes: Mutex<HashMap<String, Vec<NodeMessage>>>,
    broken_inboxes: Mutex<HashSet<String>>,
    stalled_inboxes: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new("main")
    }
}

impl MockNode {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            next_id: AtomicUsize::new(1),
            next_seq: AtomicUsize::new(1),
            created: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            inboxes: Mutex::new(HashMap::new()),
            broken_inboxes: Mutex::new(HashSet::new()),
            stalled_inboxes: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent `create_job` fail (or succeed again).
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `send_message` fail (or succeed again).
    pub fn fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Make `fetch_inbox` for this job fail (or succeed again).
    pub async fn break_inbox(&self, job_id: &str, broken: bool) {
        let mut broken_inboxes = self.broken_inboxes.lock().await;
        if broken {
            broken_inboxes.insert(job_id.to_string());
        } else {
            broken_inboxes.remove(job_id);
        }
    }

    /// Make `fetch_inbox` for this job never return (or return again).
    pub async fn stall_inbox(&self, job_id: &str, stalled: bool) {
        let mut stalled_inboxes = self.stalled_inboxes.lock().await;
        if stalled {
            stalled_inboxes.insert(job_id.to_string());
        } else {
            stalled_inboxes.remove(job_id);
        }
    }

    /// Append the node's answer to a job inbox.
    pub async fn reply(&self, job_id: &str, answer: &str) {
        let content = json!({ "content": answer }).to_string();
        self.push(job_id, NodeMessage::from_node(JOB_MESSAGE_SCHEMA, content))
            .await;
    }

    /// Append an arbitrary message to a job inbox. Messages without a
    /// timestamp get a sequence number in its place.
    pub async fn push(&self, job_id: &str, mut message: NodeMessage) {
        if message.scheduled_time.is_empty() {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            message.scheduled_time = format!("{seq:08}");
        }
        self.inboxes
            .lock()
            .await
            .entry(job_id.to_string())
            .or_default()
            .push(message);
    }

    /// Number of jobs created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Every `(job_id, content)` pair sent so far, in order.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn create_job(&self, _agent: &str) -> Result<String, NodeError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(NodeError::JobCreation("mock node refused".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        let job_id = format!("jobid_{id}");
        self.inboxes.lock().await.insert(job_id.clone(), Vec::new());
        Ok(job_id)
    }

    async fn send_message(&self, content: &str, job_id: &str) -> Result<(), NodeError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(NodeError::MessageSend("mock node refused".to_string()));
        }
        self.sent
            .lock()
            .await
            .push((job_id.to_string(), content.to_string()));
        let echo = json!({ "job_id": job_id, "content": content }).to_string();
        self.push(
            job_id,
            NodeMessage::from_profile(&self.profile, JOB_MESSAGE_SCHEMA, echo),
        )
        .await;
        Ok(())
    }

    async fn fetch_inbox(&self, job_id: &str) -> Result<Vec<NodeMessage>, NodeError> {
        let stalled = self.stalled_inboxes.lock().await.contains(job_id);
        if stalled {
            std::future::pending::<()>().await;
        }
        if self.broken_inboxes.lock().await.contains(job_id) {
            return Err(NodeError::Inbox(format!("mock inbox {job_id} unavailable")));
        }
        Ok(self
            .inboxes
            .lock()
            .await
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn health(&self) -> Result<(), NodeError> {
        Ok(())
    }
}
