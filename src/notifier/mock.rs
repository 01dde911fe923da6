use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{Delivery, Notifier};
use crate::job::Origin;

/// Records posts for tests. Can be told to reject the next `n` posts, or
/// to hang on every post.
#[derive(Default)]
pub struct MockNotifier {
    failures_left: AtomicUsize,
    stalled: AtomicBool,
    attempts: AtomicUsize,
    posted: Mutex<Vec<(Origin, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` posts.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Make every subsequent post never return (or return again).
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Successful posts, in order.
    pub async fn posted(&self) -> Vec<(Origin, String)> {
        self.posted.lock().await.clone()
    }

    /// Every post attempt, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn post(&self, origin: &Origin, text: &str) -> Delivery {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Delivery::Rejected("mock notifier refused".to_string());
        }
        self.posted
            .lock()
            .await
            .push((origin.clone(), text.to_string()));
        Delivery::Posted
    }
}
