//! CLI - Command-line argument parsing
//!
//! `ask-nix <words...>` handles one request. With no words and no subcommand
//! it starts the interactive prompt.

use clap::{ArgAction, Parser, Subcommand};
use luminous_common::Personality;
use std::path::PathBuf;

/// Luminous Nix CLI
#[derive(Parser, Debug)]
#[command(name = "ask-nix")]
#[command(about = "Manage NixOS in plain English", long_about = None)]
#[command(version = env!("LUMINOUS_VERSION"))]
#[command(disable_help_subcommand = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// What you want, e.g. "install firefox" or "search for text editors"
    pub query: Vec<String>,

    /// Only show what would happen (overrides the config)
    #[arg(long, global = true, conflicts_with = "execute")]
    pub dry_run: bool,

    /// Really run the commands
    #[arg(long, global = true)]
    pub execute: bool,

    /// Response style: friendly, minimal, technical, encouraging, symbiotic
    #[arg(long, short = 'p', global = true)]
    pub personality: Option<Personality>,

    /// Print the response as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (overrides $LUMINOUS_NIX_CONFIG and the XDG default)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show NixOS version, channels and current generation
    Status,

    /// Interactive prompt, one request per line
    Interactive,

    /// Show the effective configuration
    Config {
        /// Print the effective settings as TOML (default)
        #[arg(long, conflicts_with = "path")]
        show: bool,

        /// Print only the config file path
        #[arg(long)]
        path: bool,
    },
}

impl Cli {
    /// Query words joined back into one request
    pub fn query_text(&self) -> Option<String> {
        let text = self.query.join(" ");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Dry-run flag after command-line overrides
    pub fn dry_run(&self, configured: bool) -> bool {
        if self.execute {
            false
        } else if self.dry_run {
            true
        } else {
            configured
        }
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
    fn test_query_words_and_flags() {
        let cli = Cli::parse_from(["ask-nix", "install", "firefox", "--execute", "-p", "minimal"]);
        assert_eq!(cli.query_text().as_deref(), Some("install firefox"));
        assert!(!cli.dry_run(true));
        assert_eq!(cli.personality, Some(Personality::Minimal));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_subcommand() {
        let cli = Cli::parse_from(["ask-nix", "config", "--path"]);
        assert!(matches!(cli.command, Some(Commands::Config { path: true, .. })));
        assert!(cli.query_text().is_none());
    }

    #[test]
    fn test_status_after_a_word_is_a_query() {
        let cli = Cli::parse_from(["ask-nix", "system", "status"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.query_text().as_deref(), Some("system status"));
    }

    #[test]
    fn test_dry_run_defaults_to_config() {
        let cli = Cli::parse_from(["ask-nix", "rollback"]);
        assert!(cli.dry_run(true));
        assert!(!cli.dry_run(false));
        let cli = Cli::parse_from(["ask-nix", "--dry-run", "rollback"]);
        assert!(cli.dry_run(false));
    }

    #[test]
    fn test_dry_run_conflicts_with_execute() {
        assert!(Cli::try_parse_from(["ask-nix", "--dry-run", "--execute", "rollback"]).is_err());
    }
}
