use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct JobsCommand;

#[async_trait]
impl Command for JobsCommand {
    fn name(&self) -> &str {
        "/jobs"
    }

    fn description(&self) -> &str {
        "list jobs awaiting an answer"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let mut jobs = info.courier.registry.snapshot().await;
        if jobs.is_empty() {
            println!("  (no outstanding jobs)");
            return CommandResult::Handled;
        }
        jobs.sort_by_key(|job| job.dispatched_at);
        for job in jobs {
            println!(
                "  {}  {:<9}  {}  since {}  {:?}",
                job.job_id,
                job.status.to_string(),
                job.origin,
                job.dispatched_at.format("%H:%M:%S"),
                job.prompt
            );
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::TestSession;
    use crate::job::Origin;

    #[tokio::test]
    async fn handles_empty_registry() {
        let session = TestSession::new();
        assert_eq!(
            JobsCommand.execute("", &session.info()).await,
            CommandResult::Handled
        );
    }

    #[tokio::test]
    async fn handles_outstanding_jobs() {
        let session = TestSession::new();
        session
            .courier
            .dispatcher
            .dispatch_in_thread("ping", Origin::new("C1", "T1"))
            .await
            .unwrap();
        assert_eq!(
            JobsCommand.execute("", &session.info()).await,
            CommandResult::Handled
        );
    }
}
