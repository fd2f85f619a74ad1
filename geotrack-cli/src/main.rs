//! geotrack CLI - Command-line interface
//!
//! Runs the geotrack tracking state machine against a simulated device and
//! manages the `~/.geotrack/config.ini` configuration file.

mod commands;
mod error;
mod prompt;
mod simulation;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::track::TrackArgs;

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(version)]
#[command(about = "Continuous location tracking with push delivery and a polling watchdog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a simulated device and print every delivered sample
    Track(TrackArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Track(args) => commands::track::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from(["geotrack", "track", "--permission", "deny"]).unwrap();
        assert!(matches!(cli.command, Commands::Track(_)));

        let cli = Cli::try_parse_from(["geotrack", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Init { force: true, .. }
            }
        ));

        assert!(Cli::try_parse_from(["geotrack"]).is_err());
    }
}
