use async_trait::async_trait;
use std::path::Path;

use super::{Command, CommandResult, SessionInfo};

pub struct ArchiveCommand;

#[async_trait]
impl Command for ArchiveCommand {
    fn name(&self) -> &str {
        "/archive"
    }

    fn usage(&self) -> &str {
        "[path]"
    }

    fn description(&self) -> &str {
        "write delivered-job analytics as JSON"
    }

    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult {
        let path = if args.is_empty() {
            match info.archive_path {
                Some(path) => path,
                None => {
                    println!("usage: /archive [path] (no default archive path configured)");
                    return CommandResult::Failed("no archive path".to_string());
                }
            }
        } else {
            Path::new(args)
        };

        let archive = &info.courier.archive;
        match archive.write_snapshot(path) {
            Ok(()) => {
                println!("  {} record(s) written to {}", archive.len(), path.display());
                CommandResult::Handled
            }
            Err(e) => {
                println!("  error: {e:#}");
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
    async fn writes_to_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");
        let session = TestSession::new();

        let result = ArchiveCommand
            .execute(path.to_str().unwrap(), &session.info())
            .await;
        assert_eq!(result, CommandResult::Handled);
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn falls_back_to_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.json");
        let session = TestSession::new();
        let info = SessionInfo {
            archive_path: Some(path.as_path()),
            ..session.info()
        };

        assert_eq!(ArchiveCommand.execute("", &info).await, CommandResult::Handled);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn fails_without_any_path() {
        let session = TestSession::new();
        assert!(matches!(
            ArchiveCommand.execute("", &session.info()).await,
            CommandResult::Failed(_)
        ));
    }
}
