use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct HealthCommand;

#[async_trait]
impl Command for HealthCommand {
    fn name(&self) -> &str {
        "/health"
    }

    fn description(&self) -> &str {
        "check that the node is reachable"
    }

    async fn execute(&self, _args: &str, info: &SessionInfo<'_>) -> CommandResult {
        match info.node.health().await {
            Ok(()) => {
                println!("  node is healthy");
                CommandResult::Handled
            }
            Err(e) => {
                println!("  {e}");
                CommandResult::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::TestSession;

    #[tokio::test]
    async fn healthy_mock_node() {
        let session = TestSession::new();
        assert_eq!(
            HealthCommand.execute("", &session.info()).await,
            CommandResult::Handled
        );
    }
}
