//! Operator console commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`]. The registry handles dispatch, alias resolution,
//! and dynamic help generation. Anything typed without a leading `/` is
//! not a command and is treated as a prompt by the console.

mod archive;
mod ask;
mod health;
mod jobs;
mod quit;
mod threads;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::engine::Courier;
use crate::node::NodeClient;

/// Service state available to commands during execution.
pub struct SessionInfo<'a> {
    pub courier: &'a Courier,
    pub node: &'a dyn NodeClient,
    /// Where `/archive` writes when called without a path.
    pub archive_path: Option<&'a Path>,
}

/// What the console should do after a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Not a command; the console treats the input as a prompt.
    NotACommand,
    /// Command handled, continue the console loop.
    Handled,
    /// Command ran but failed; the message has been printed.
    Failed(String),
    /// Exit the console.
    Quit,
}

/// A console command. Implement this trait to add new commands.
#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/jobs"`.
    fn name(&self) -> &str;

    /// Alternative names, e.g. `&["/h", "/?"]`.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Argument synopsis for `/help`, e.g. `"<channel> <thread> <prompt>"`.
    fn usage(&self) -> &str {
        ""
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    /// Run the command with whatever followed its name.
    async fn execute(&self, args: &str, info: &SessionInfo<'_>) -> CommandResult;
}

struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "/help"
    }

    fn aliases(&self) -> &[&str] {
        &["/h", "/?"]
    }

    fn description(&self) -> &str {
        "list available commands"
    }

    // The registry answers /help itself; this only exists for listing.
    async fn execute(&self, _args: &str, _info: &SessionInfo<'_>) -> CommandResult {
        CommandResult::Handled
    }
}

/// Holds registered commands.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(HelpCommand),
            Arc::new(ask::AskCommand),
            Arc::new(jobs::JobsCommand),
            Arc::new(threads::ThreadsCommand),
            Arc::new(archive::ArchiveCommand),
            Arc::new(health::HealthCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    /// Register an additional command.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Dispatch input to a matching command, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let input = input.trim();
        let (cmd, args) = match input.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (input, ""),
        };

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                // /help is special: it needs the registry to list all commands
                if command.name() == "/help" {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(args, info).await;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    /// Generate help text from all registered commands.
    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.usage(), c.aliases()), c.description()))
            .collect();

        let max_width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        let mut out = String::new();
        for (label, desc) in &entries {
            out.push_str(&format!("  {label:<max_width$}  {desc}\n"));
        }
        out
    }

    /// All registered command names (for testing).
    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// All registered names and aliases (for duplicate detection).
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, usage: &str, aliases: &[&str]) -> String {
    let mut label = name.to_string();
    if !usage.is_empty() {
        label.push(' ');
        label.push_str(usage);
    }
    if !aliases.is_empty() {
        label.push_str(&format!(" ({})", aliases.join(", ")));
    }
    label
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::LoopConfig;
    use crate::node::mock::MockNode;
    use crate::notifier::mock::MockNotifier;
    use crate::store::ThreadStore;

    pub(crate) struct TestSession {
        pub courier: Courier,
        pub node: Arc<MockNode>,
    }

    impl TestSession {
        pub fn new() -> Self {
            let node = Arc::new(MockNode::default());
            let courier = Courier::new(
                node.clone(),
                Arc::new(MockNotifier::new()),
                ThreadStore::open(":memory:").unwrap(),
                "main/agent/my_gpt",
                LoopConfig::default(),
            );
            Self { courier, node }
        }

        pub fn info(&self) -> SessionInfo<'_> {
            SessionInfo {
                courier: &self.courier,
                node: self.node.as_ref(),
                archive_path: None,
            }
        }
    }

    #[test]
    fn all_builtins_registered() {
        let reg = CommandRegistry::new();
        let names = reg.names();
        for name in ["/help", "/ask", "/jobs", "/threads", "/archive", "/health", "/quit"] {
            assert!(names.contains(&name), "missing: {name}");
        }
    }

    #[test]
    fn no_duplicate_triggers() {
        let reg = CommandRegistry::new();
        let triggers = reg.all_triggers();
        let mut seen = Vec::new();
        for t in &triggers {
            assert!(!seen.contains(t), "duplicate trigger: {t}");
            seen.push(t);
        }
    }

    #[test]
    fn help_text_includes_all_commands() {
        let reg = CommandRegistry::new();
        let text = reg.help_text();
        for name in reg.names() {
            assert!(text.contains(name), "help missing: {name}");
        }
        assert!(text.contains("<channel> <thread> <prompt>"));
        assert!(text.contains("/h"));
    }

    #[tokio::test]
    async fn unknown_slash_command_is_handled() {
        let session = TestSession::new();
        let reg = CommandRegistry::new();
        assert_eq!(
            reg.dispatch("/foobar", &session.info()).await,
            CommandResult::Handled
        );
    }

    #[tokio::test]
    async fn non_command_passes_through() {
        let session = TestSession::new();
        let reg = CommandRegistry::new();
        assert_eq!(
            reg.dispatch("what is a potato?", &session.info()).await,
            CommandResult::NotACommand
        );
    }

    #[tokio::test]
    async fn arguments_reach_the_command() {
        let session = TestSession::new();
        let reg = CommandRegistry::new();
        assert_eq!(
            reg.dispatch("/ask C1 T1 what is a potato?", &session.info())
                .await,
            CommandResult::Handled
        );
        assert_eq!(
            session.node.sent().await[0].1,
            "what is a potato?".to_string()
        );
    }

    #[test]
    fn format_label_variants() {
        assert_eq!(format_label("/jobs", "", &[]), "/jobs");
        assert_eq!(format_label("/help", "", &["/h", "/?"]), "/help (/h, /?)");
        assert_eq!(format_label("/archive", "[path]", &[]), "/archive [path]");
    }
}
