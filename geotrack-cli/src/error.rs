//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and exit codes.

use std::fmt;
use std::process;

use geotrack::config::ConfigFileError;
use geotrack::tracking::TrackingError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid command-line configuration
    Config(String),
    /// Config file could not be read or written
    ConfigFile(ConfigFileError),
    /// Failed to build the async runtime
    RuntimeCreation(std::io::Error),
    /// Failed to install the Ctrl-C handler
    SignalHandler(String),
    /// Tracking could not start
    Tracking(TrackingError),
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Tracking(TrackingError::PermissionDenied) => {
                eprintln!();
                eprintln!("Location permission is required. Either:");
                eprintln!("  1. Answer yes at the permission prompt (--permission ask)");
                eprintln!("  2. Script the answer with --permission grant");
            }
            CliError::Tracking(TrackingError::SettingsUnresolvable(_)) => {
                eprintln!();
                eprintln!("Device settings could not satisfy the request. Either:");
                eprintln!("  1. Accept the resolution prompt (--resolution accept)");
                eprintln!("  2. Lower the request with --accuracy balanced or low-power");
            }
            CliError::ConfigFile(_) => {
                eprintln!();
                eprintln!("Check the config file, or regenerate it with:");
                eprintln!("  geotrack config init --force");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::RuntimeCreation(e) => write!(f, "Failed to create async runtime: {}", e),
            CliError::SignalHandler(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Tracking(e) => write!(f, "Tracking failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::RuntimeCreation(e) => Some(e),
            CliError::Tracking(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<TrackingError> for CliError {
    fn from(e: TrackingError) -> Self {
        CliError::Tracking(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack::tracking::SettingsError;
    use std::error::Error;

    #[test]
    fn test_display() {
        assert_eq!(
            CliError::Config("bad".to_string()).to_string(),
            "Configuration error: bad"
        );
        assert!(CliError::Tracking(TrackingError::PermissionDenied)
            .to_string()
            .starts_with("Tracking failed: "));
    }

    #[test]
    fn test_source_chain() {
        let err: CliError =
            TrackingError::SettingsUnresolvable(SettingsError::ResolutionDeclined).into();
        let source = err.source().unwrap();
        assert_eq!(
            source.to_string(),
            TrackingError::SettingsUnresolvable(SettingsError::ResolutionDeclined).to_string()
        );
        assert!(CliError::LoggingInit("x".to_string()).source().is_none());
    }
}
