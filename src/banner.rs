//! Startup banner and session summary display.

use crate::consts::{AUTHOR, HOMEPAGE, REPO};

/// Session configuration for display in the startup banner.
pub struct BannerInfo<'a> {
    pub node_url: &'a str,
    pub node_name: &'a str,
    pub agent: &'a str,
    pub profile: &'a str,
    pub device: &'a str,
    pub delivery: &'a str,
    pub db: &'a str,
    pub threads: usize,
}

/// Print the startup banner with session info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║            C O U R I E R              ║
   ║    every answer finds its thread      ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   node      {} ({})
   agent     {}
   profile   {} on {}
   delivery  {}
   threads   {} ({} known)
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.node_url,
        info.node_name,
        info.agent,
        info.profile,
        info.device,
        info.delivery,
        storage_label(info.db),
        info.threads,
    );
}

fn storage_label(db: &str) -> &str {
    if db == ":memory:" { "ephemeral" } else { db }
}

/// What happened during a session, for the farewell line.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub dispatched: usize,
    pub delivered: usize,
    pub outstanding: usize,
}

/// Print the session summary (delivery counts + farewell).
pub fn print_session_summary(summary: SessionSummary) {
    if summary.dispatched > 0 || summary.delivered > 0 || summary.outstanding > 0 {
        println!(
            "session: {} dispatched, {} delivered, {} still waiting",
            summary.dispatched, summary.delivered, summary.outstanding,
        );
    }
    println!("goodbye.");
}
