//! Delivery of answers back into the chat thread they came from.

pub mod console;
pub mod mock;
pub mod slack;

use async_trait::async_trait;

use crate::job::Origin;

/// What happened to a post. Ordinary failures are values, not errors, so
/// the reconciler can keep the job and retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Posted,
    Rejected(String),
}

impl Delivery {
    pub fn is_posted(&self) -> bool {
        matches!(self, Delivery::Posted)
    }
}

/// Something that can post text into a conversation thread.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, origin: &Origin, text: &str) -> Delivery;
}
