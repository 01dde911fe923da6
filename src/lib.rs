pub mod archive;
pub mod banner;
pub mod clock;
pub mod commands;
pub mod config;
pub mod consts;
pub mod engine;
pub mod events;
pub mod job;
pub mod matcher;
pub mod node;
pub mod notifier;
pub mod store;
pub mod telemetry;
