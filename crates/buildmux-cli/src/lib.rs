//! Library surface behind the `buildmux` binary: command-line parsing,
//! config-file loading, the exit-code mapping of spec §6, and a minimal
//! in-process [`buildmux_core::TargetBuilder`] used to drive the engine
//! end to end without a real project evaluator.

// `run.rs` renders the human-readable build summary and `config` dump
// directly; everything else goes through `tracing`.
#![allow(clippy::print_stdout, clippy::print_stderr)]

pub mod cli;
pub mod config;
pub mod demo_target_builder;
pub mod exit;
pub mod run;
pub mod tracing_setup;

pub use cli::{Cli, Command};
pub use config::BuildmuxConfig;
pub use exit::{EXIT_INTERNAL_ERROR, EXIT_OK, EXIT_USER_FAILURE, exit_code_for};
