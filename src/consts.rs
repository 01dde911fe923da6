//! Project-wide constants.

use std::path::PathBuf;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Node API address when none is configured.
pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:9550";

/// Identity of a locally running node.
pub const DEFAULT_NODE_NAME: &str = "@@localhost.shinkai";

pub const DEFAULT_PROFILE: &str = "main";

pub const DEFAULT_DEVICE: &str = "main_device";

/// Agent new jobs are created for.
pub const DEFAULT_AGENT: &str = "main/agent/my_gpt";

/// How many inbox messages to fetch per poll.
pub const DEFAULT_INBOX_COUNT: usize = 10;

/// Default database path: `~/.courier/courier.db`.
/// Falls back to the working directory when there is no home directory.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".courier"))
        .unwrap_or_default()
        .join("courier.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_are_non_empty() {
        assert!(!AUTHOR.is_empty());
        assert!(!HOMEPAGE.is_empty());
        assert!(!REPO.is_empty());
        assert!(!DEFAULT_AGENT.is_empty());
    }

    #[test]
    fn consts_from_cargo_toml() {
        assert!(REPO.contains("courier"));
    }

    #[test]
    fn default_db_path_ends_with_file_name() {
        assert!(default_db_path().ends_with("courier.db"));
    }

    #[test]
    fn default_node_url_has_no_trailing_slash() {
        assert!(!DEFAULT_NODE_URL.ends_with('/'));
    }
}
