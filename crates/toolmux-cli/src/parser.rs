//! Root CLI structure and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Manage tool servers and call their tools.
#[derive(Parser)]
#[command(name = "toolmux")]
#[command(about = "Register, install, connect and call tool servers")]
#[command(version)]
pub struct Cli {
    /// Directory holding servers.json and settings.json
    #[arg(long = "data-dir", env = "TOOLMUX_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["toolmux", "--json", "--data-dir", "/tmp/toolmux", "servers"]);
        assert!(cli.json);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/toolmux")));
        assert!(matches!(cli.command, Some(Commands::Servers { category: None })));
    }
}
