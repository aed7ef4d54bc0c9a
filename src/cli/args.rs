//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Live stylesheet injection for running Electron applications
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config directory holding restyle.toml, styles/ and scripts/
    #[arg(short = 'C', long, global = true, default_value = "~/.restyle", value_hint = clap::ValueHint::DirPath)]
    pub config_dir: String,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch for configured applications and inject into them as they start
    #[command(visible_alias = "r")]
    Run,

    /// List configured applications and their style/script files
    #[command(visible_alias = "a")]
    Apps,

    /// Validate the configuration and report problems
    #[command(visible_alias = "c")]
    Check,

    /// Inject into an already running process, then keep serving styles
    #[command(visible_alias = "i")]
    Inject {
        /// Process id of the target
        pid: u32,

        /// Executable name the target is configured under
        #[arg(short, long)]
        exe: String,
    },
}

impl Cli {
    /// Config directory with `~` expanded.
    pub fn config_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.config_dir).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inject() {
        let cli = Cli::parse_from(["restyle", "inject", "4242", "--exe", "Discord.exe"]);
        match cli.command {
            Commands::Inject { pid, exe } => {
                assert_eq!(pid, 4242);
                assert_eq!(exe, "Discord.exe");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["restyle", "check", "--verbose", "-C", "/tmp/rs"]);
        assert!(matches!(cli.command, Commands::Check));
        assert!(cli.verbose);
        assert_eq!(cli.config_dir(), PathBuf::from("/tmp/rs"));
    }

    #[test]
    fn test_short_verbose_and_version_coexist() {
        let cli = Cli::parse_from(["restyle", "-v", "run"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run));

        let err = Cli::try_parse_from(["restyle", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_config_dir_expands_tilde() {
        let cli = Cli::parse_from(["restyle", "apps"]);
        assert!(!cli.config_dir().starts_with("~"));
        assert!(cli.config_dir().ends_with(".restyle"));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
