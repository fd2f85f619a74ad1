//! INI parsing: `Ini` -> `ConfigFile`.
//!
//! The single place where INI key names map to struct fields.

use std::path::PathBuf;

use ini::Ini;

use crate::tracking::MAX_UPDATE_INTERVAL;

use super::duration::{format_duration, parse_duration};
use super::file::{ConfigFile, ConfigFileError};

fn invalid(key: &str, section: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an `Ini` into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        if let Some(v) = section.get("interval") {
            let interval = parse_duration(v).map_err(|_| {
                invalid("interval", "tracking", v, "expected format like '10s' or '500ms'")
            })?;
            if interval.is_zero() {
                return Err(invalid("interval", "tracking", v, "must be greater than zero"));
            }
            if interval > MAX_UPDATE_INTERVAL {
                let reason = format!("must be at most {}", format_duration(MAX_UPDATE_INTERVAL));
                return Err(invalid("interval", "tracking", v, &reason));
            }
            config.tracking.interval = interval;
        }
        if let Some(v) = section.get("min_distance") {
            config.tracking.min_distance_meters = v
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| {
                    invalid("min_distance", "tracking", v, "must be a non-negative number (meters)")
                })?;
        }
        if let Some(v) = section.get("accuracy") {
            config.tracking.accuracy = v.parse().map_err(|_| {
                invalid(
                    "accuracy",
                    "tracking",
                    v,
                    "must be one of: high_accuracy, balanced, low_power",
                )
            })?;
        }
        if let Some(v) = section.get("wait_for_accurate") {
            config.tracking.wait_for_accurate_fix = parse_bool(v)
                .ok_or_else(|| invalid("wait_for_accurate", "tracking", v, "must be true or false"))?;
        }
        if let Some(v) = section.get("granularity") {
            config.tracking.granularity = v.parse().map_err(|_| {
                invalid(
                    "granularity",
                    "tracking",
                    v,
                    "must be one of: permission_level, coarse, fine",
                )
            })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() || v.contains(['/', '\\']) {
                return Err(invalid("file", "logging", v, "must be a plain file name"));
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
