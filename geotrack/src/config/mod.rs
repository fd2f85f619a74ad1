//! User configuration (`~/.geotrack/config.ini`).
//!
//! ```ini
//! [tracking]
//! interval = 10s
//! min_distance = 10
//! accuracy = high_accuracy
//! wait_for_accurate = true
//! granularity = permission_level
//!
//! [logging]
//! directory = ~/.geotrack/logs
//! file = geotrack.log
//! ```

mod duration;
mod file;
mod parser;
mod writer;

pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError, LoggingSettings};
