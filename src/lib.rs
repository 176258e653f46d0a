//! Lateral-thinking puzzle (海龟汤) corpus tooling.
//!
//! Each subcommand of the `haigui` binary is a short batch job over JSON
//! files in the configured data directory. The modules here hold the
//! testable logic; `main.rs` only parses arguments and dispatches.

pub mod answers;
pub mod cli;
pub mod config;
pub mod endings;
pub mod error;
pub mod followups;
pub mod game;
pub mod llm;
pub mod logger;
pub mod logprob;
pub mod prompt;
pub mod puzzle;
pub mod scrape;
pub mod stats;
pub mod store;
