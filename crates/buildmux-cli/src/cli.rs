//! Command-line surface for `buildmux`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A build-request scheduling and results-caching core, driven from the
/// command line against an in-process demo target builder.
#[derive(Parser, Debug)]
#[command(name = "buildmux", version, about)]
pub struct Cli {
    /// Path to a `buildmux.toml` config file; falls back to discovery in
    /// the current directory, then environment variables and defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one or more targets against a project configuration.
    Build {
        /// Path to the project file. Normalized but not required to exist
        /// on disk: the demo target builder does not evaluate project text.
        project: PathBuf,

        /// Target names to build, in order.
        #[arg(required = true)]
        targets: Vec<String>,

        /// Global property as `name=value`; may be repeated.
        #[arg(short = 'p', long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,

        /// Tools version to build with.
        #[arg(long, default_value = "current")]
        tools_version: String,

        /// Maximum concurrent request builders on the central node.
        #[arg(long)]
        max_cpu_count: Option<usize>,

        /// Request the post-build project state snapshot be materialized.
        #[arg(long)]
        provide_project_state: bool,
    },

    /// Print the resolved configuration and exit.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_with_repeated_properties() {
        let cli = Cli::parse_from([
            "buildmux",
            "build",
            "app.proj",
            "Build",
            "Test",
            "-p",
            "Configuration=Release",
            "-p",
            "Platform=x64",
        ]);
        let Command::Build { targets, properties, .. } = cli.command else {
            panic!("expected Build command");
        };
        assert_eq!(targets, vec!["Build", "Test"]);
        assert_eq!(properties, vec!["Configuration=Release", "Platform=x64"]);
    }
}
