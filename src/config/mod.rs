//! Runtime settings, from command-line flags or the environment.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::consts::{
    DEFAULT_AGENT, DEFAULT_DEVICE, DEFAULT_INBOX_COUNT, DEFAULT_NODE_NAME, DEFAULT_NODE_URL,
    DEFAULT_PROFILE, default_db_path,
};
use crate::engine::LoopConfig;
use crate::node::envelope::Identity;

/// Everything the service needs to start. Every flag can also be set
/// through the environment variable named next to it.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Base URL of the node API
    #[arg(long, env = "NODE_URL", default_value = DEFAULT_NODE_URL)]
    pub node_url: String,

    /// Node identity name
    #[arg(long, env = "NODE_NAME", default_value = DEFAULT_NODE_NAME)]
    pub node_name: String,

    /// Profile jobs are created under
    #[arg(long, env = "PROFILE_NAME", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Device name registered with the node
    #[arg(long, env = "DEVICE_NAME", default_value = DEFAULT_DEVICE)]
    pub device: String,

    /// Agent that answers new jobs
    #[arg(long, env = "NODE_AGENT", default_value = DEFAULT_AGENT)]
    pub agent: String,

    /// Slack bot token; answers are printed to the console when unset
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// SQLite database for thread bindings (use :memory: for ephemeral)
    #[arg(long, env = "COURIER_DB")]
    pub db: Option<String>,

    /// Sleep between checks while no job is outstanding, in milliseconds
    #[arg(long, env = "COURIER_IDLE_MS", default_value_t = 1000)]
    pub idle_interval_ms: u64,

    /// Sleep between reconciliation cycles, in milliseconds
    #[arg(long, env = "COURIER_CYCLE_MS", default_value_t = 1000)]
    pub cycle_delay_ms: u64,

    /// Deadline for a single node or chat call, in milliseconds
    #[arg(long, env = "COURIER_CALL_TIMEOUT_MS", default_value_t = 30_000)]
    pub call_timeout_ms: u64,

    /// Inbox messages fetched per poll
    #[arg(long, env = "COURIER_INBOX_COUNT", default_value_t = DEFAULT_INBOX_COUNT)]
    pub inbox_count: usize,

    /// Write the analytics archive here on shutdown
    #[arg(long, env = "COURIER_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, env = "COURIER_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Settings {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            cycle_delay: Duration::from_millis(self.cycle_delay_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            node_name: self.node_name.clone(),
            profile: self.profile.clone(),
        }
    }

    /// Database path, creating its parent directory when it is the default.
    pub fn db_path(&self) -> std::io::Result<String> {
        if let Some(db) = &self.db {
            return Ok(db.clone());
        }
        let path = default_db_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path.to_string_lossy().into_owned())
    }
}
