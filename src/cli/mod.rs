//! CLI module for deepdive
//!
//! Provides command-line interface parsing and handling for the deepdive binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// deepdive - Deep Research Pipeline
///
/// Plans a research question, splits the plan into subtasks, researches each
/// subtask with a tool-using sub-agent and writes one synthesized report.
#[derive(Parser, Debug)]
#[command(
    name = "deepdive",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "deepdive - Deep Research Pipeline",
    long_about = "Plans a research question, splits the plan into independent subtasks,\n\
                  researches each subtask with a tool-using sub-agent and synthesizes\n\
                  a single markdown report.\n\n\
                  Run without arguments to be prompted for a query, or use 'init' to create a config file.",
    after_help = "EXAMPLES:\n    \
                  deepdive init                          # Write a default deepdive.toml\n    \
                  deepdive research \"ESG trends 2024\"    # Research a query\n    \
                  deepdive                               # Prompt for a query\n    \
                  deepdive --config my.toml config       # Show the resolved configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "deepdive.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Research a query and write the report to a file
    Research {
        /// The research question (read from stdin when omitted)
        query: Option<String>,

        /// Where to write the report (defaults to [output].path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the plan only once it is complete instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Write a default deepdive.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files without prompting
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

impl Commands {
    /// What running `deepdive` without a subcommand does
    pub fn interactive() -> Self {
        Commands::Research {
            query: None,
            output: None,
            no_stream: false,
        }
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_research_arguments() {
        let cli = Cli::try_parse_from([
            "deepdive",
            "--no-color",
            "research",
            "ESG trends 2024",
            "--output",
            "esg.md",
            "--no-stream",
        ])
        .unwrap();

        assert!(cli.no_color);
        assert_eq!(
            cli.command,
            Some(Commands::Research {
                query: Some("ESG trends 2024".to_string()),
                output: Some(PathBuf::from("esg.md")),
                no_stream: true,
            })
        );
    }

    #[test]
    fn test_defaults_without_subcommand() {
        let cli = Cli::try_parse_from(["deepdive"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("deepdive.toml"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["deepdive", "config", "--validate", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert_eq!(cli.command, Some(Commands::Config { validate: true }));
    }

    #[test]
    fn test_init_defaults() {
        let cli = Cli::try_parse_from(["deepdive", "init"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Init {
                path: PathBuf::from("."),
                force: false
            })
        );
    }
}
