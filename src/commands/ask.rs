use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::job::Origin;

/// Dispatch a prompt as if it arrived in a chat thread.
pub struct AskCommand;

fn parse(args: &str) -> Option<(Origin, &str)> {
    let mut parts = args.splitn(3, char::is_whitespace);
    let channel = parts.next().filter(|s| !s.is_empty())?;
    let thread = parts.next().filter(|s| !s.is_empty())?;
    let prompt = parts.next().map(str::trim).filter(|s| !s.is_empty())?;
    Some((Origin::new(channel, thread), prompt))
}

#[async_trait]
impl Command for AskCommand {
    fn name(&self) -> &str {
        "/ask"
    }

    fn usage(&self) -> &str {
        "<channel> <thread> <prompt>"
    }

    fn description(&self) -> &str {
        "send a prompt on behalf of a chat thread"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let Some((origin, prompt)) = parse(args) else {
            println!("usage: /ask {}", self.usage());
            return CommandResult::Failed("missing arguments".to_string());
        };

        match info
            .courier
            .dispatcher
            .dispatch_in_thread(prompt, origin.clone())
            .await
        {
            Ok(job_id) => {
                println!("  job {job_id} dispatched for {origin}");
                CommandResult::Handled
            }
            Err(e) => {
                println!("  error: {e}");
                CommandResult::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::TestSession;

    #[test]
    fn parse_splits_channel_thread_prompt() {
        let (origin, prompt) = parse("C1 1700.01 what is a carrot?").unwrap();
        assert_eq!(origin, Origin::new("C1", "1700.01"));
        assert_eq!(prompt, "what is a carrot?");
    }

    #[test]
    fn parse_requires_all_parts() {
        assert!(parse("").is_none());
        assert!(parse("C1").is_none());
        assert!(parse("C1 T1").is_none());
        assert!(parse("C1 T1   ").is_none());
    }

    #[tokio::test]
    async fn dispatches_and_binds_thread() {
        let session = TestSession::new();
        let result = AskCommand.execute("C1 T1 ping", &session.info()).await;

        assert_eq!(result, CommandResult::Handled);
        assert!(session.courier.threads.get("T1").is_some());
        assert_eq!(session.courier.registry.len().await, 1);
    }

    #[tokio::test]
    async fn reports_creation_failure() {
        let session = TestSession::new();
        session.node.fail_create(true);

        let result = AskCommand.execute("C1 T1 ping", &session.info()).await;
        assert!(matches!(result, CommandResult::Failed(_)));
        assert!(session.courier.registry.is_empty().await);
    }

    #[tokio::test]
    async fn missing_arguments_fail() {
        let session = TestSession::new();
        assert!(matches!(
            AskCommand.execute("C1", &session.info()).await,
            CommandResult::Failed(_)
        ));
    }
}
