use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct ThreadsCommand;

#[async_trait]
impl Command for ThreadsCommand {
    fn name(&self) -> &str {
        "/threads"
    }

    fn description(&self) -> &str {
        "list thread to job bindings"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let entries = info.courier.threads.entries();
        if entries.is_empty() {
            println!("  (no threads bound)");
        }
        for (thread_id, job_id) in entries {
            println!("  {thread_id}  →  {job_id}");
        }
        let unsaved = info.courier.threads.unsaved();
        if unsaved > 0 {
            println!("  ({unsaved} binding(s) not yet persisted)");
        }
        CommandResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::TestSession;

    #[tokio::test]
    async fn lists_bindings() {
        let session = TestSession::new();
        session.courier.threads.put("T1", "jobid_1");
        assert_eq!(
            ThreadsCommand.execute("", &session.info()).await,
            CommandResult::Handled
        );
    }
}
