//! Configuration management CLI commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use geotrack::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Config file to write (default: ~/.geotrack/config.ini)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show {
        /// Config file to read (default: ~/.geotrack/config.ini)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force, path } => {
            let path = path.unwrap_or_else(config_file_path);
            if init_at(&path, force)? {
                println!("Created {}", path.display());
            } else {
                println!(
                    "{} already exists. Use --force to overwrite it.",
                    path.display()
                );
            }
            Ok(())
        }
        ConfigCommands::Show { path } => {
            let path = path.unwrap_or_else(config_file_path);
            let config = ConfigFile::load_from(&path)?;
            if path.exists() {
                println!("; {}", path.display());
            } else {
                println!("; {} (not found, showing defaults)", path.display());
            }
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
    }
}

/// Write the default config to `path`. Returns false if it exists and `force` is off.
fn init_at(path: &Path, force: bool) -> Result<bool, CliError> {
    if path.exists() && !force {
        return Ok(false);
    }
    ConfigFile::default().save_to(path)?;
    Ok(true)
}
