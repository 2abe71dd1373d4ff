//! `buildmux` CLI binary.

// CLI binary needs to output its result and error text to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use buildmux_cli::cli::Cli;
use buildmux_cli::tracing_setup::{self, LogFormat};
use clap::Parser;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("buildmux panicked: {panic_info}");
    }));

    tracing_setup::init(LogFormat::Compact);
    let cli = Cli::parse();
    let exit_code = buildmux_cli::run::run(cli).await;
    std::process::exit(exit_code);
}
