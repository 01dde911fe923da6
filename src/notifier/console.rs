use async_trait::async_trait;

use super::{Delivery, Notifier};
use crate::job::Origin;

/// Prints answers to stdout. Used when no chat platform is configured.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn post(&self, origin: &Origin, text: &str) -> Delivery {
        println!("\n[{origin}] {text}");
        Delivery::Posted
    }
}
