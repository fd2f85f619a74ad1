//! Tracking configuration.
//!
//! [`TrackingConfig`] is created once at startup and handed to the
//! [`LocationTracker`](super::LocationTracker), which owns it for the lifetime
//! of the tracker. The same values drive the settings check, the push
//! subscription and the watchdog period, so they can never disagree.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::error::TrackingError;

/// Default update interval (10 seconds).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Longest accepted update interval (one day).
pub const MAX_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default minimum distance between push updates (10 meters).
pub const DEFAULT_MIN_DISTANCE_METERS: f32 = 10.0;

/// Error returned when parsing an accuracy tier or granularity from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Accuracy tier requested from the provider.
///
/// Higher tiers cost more power. The tier is embedded in both the settings
/// check and the subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccuracyTier {
    /// GPS-level accuracy.
    #[default]
    HighAccuracy,
    /// Block-level accuracy (~100m).
    Balanced,
    /// City-level accuracy (~10km).
    LowPower,
}

impl AccuracyTier {
    /// Stable lowercase name used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighAccuracy => "high_accuracy",
            Self::Balanced => "balanced",
            Self::LowPower => "low_power",
        }
    }
}

impl fmt::Display for AccuracyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccuracyTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "high" | "high_accuracy" => Ok(Self::HighAccuracy),
            "balanced" => Ok(Self::Balanced),
            "low" | "low_power" => Ok(Self::LowPower),
            _ => Err(ParseEnumError {
                kind: "accuracy tier",
                value: s.to_string(),
            }),
        }
    }
}

/// Granularity of delivered positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// Match whatever the granted permissions allow.
    #[default]
    PermissionLevel,
    /// Coarse positions only, even with fine permission.
    Coarse,
    /// Fine positions; requires fine permission.
    Fine,
}

impl Granularity {
    /// Stable lowercase name used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionLevel => "permission_level",
            Self::Coarse => "coarse",
            Self::Fine => "fine",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "permission" | "permission_level" => Ok(Self::PermissionLevel),
            "coarse" => Ok(Self::Coarse),
            "fine" => Ok(Self::Fine),
            _ => Err(ParseEnumError {
                kind: "granularity",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Push update interval, also used as the watchdog poll period.
    pub interval: Duration,

    /// Minimum distance (meters) between consecutive push updates.
    pub min_distance_meters: f32,

    /// Requested accuracy tier.
    pub accuracy: AccuracyTier,

    /// Hold back the first push update until an accurate fix is available.
    pub wait_for_accurate_fix: bool,

    /// Granularity of delivered positions.
    pub granularity: Granularity,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_UPDATE_INTERVAL,
            min_distance_meters: DEFAULT_MIN_DISTANCE_METERS,
            accuracy: AccuracyTier::HighAccuracy,
            wait_for_accurate_fix: true,
            granularity: Granularity::PermissionLevel,
        }
    }
}

impl TrackingConfig {
    /// Create a config with the given interval and defaults for everything else.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Set the minimum distance filter.
    pub fn with_min_distance(mut self, meters: f32) -> Self {
        self.min_distance_meters = meters;
        self
    }

    /// Set the accuracy tier.
    pub fn with_accuracy(mut self, accuracy: AccuracyTier) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Set the wait-for-accurate-fix flag.
    pub fn with_wait_for_accurate_fix(mut self, wait: bool) -> Self {
        self.wait_for_accurate_fix = wait;
        self
    }

    /// Set the granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Check the config can drive a session.
    ///
    /// The interval doubles as a timer period, so it must be non-zero and
    /// at most [`MAX_UPDATE_INTERVAL`].
    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.interval.is_zero() {
            return Err(TrackingError::InvalidConfig(
                "update interval must be greater than zero".to_string(),
            ));
        }
        if self.interval > MAX_UPDATE_INTERVAL {
            return Err(TrackingError::InvalidConfig(format!(
                "update interval must be at most {}s, got {}s",
                MAX_UPDATE_INTERVAL.as_secs(),
                self.interval.as_secs()
            )));
        }
        if !self.min_distance_meters.is_finite() || self.min_distance_meters < 0.0 {
            return Err(TrackingError::InvalidConfig(format!(
                "minimum distance must be a non-negative number of meters, got {}",
                self.min_distance_meters
            )));
        }
        Ok(())
    }
}
