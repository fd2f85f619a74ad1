//! Position values.
//!
//! - [`PositionFix`] - raw position as reported by the provider
//! - [`SampleSource`] - which delivery path produced a sample
//! - [`LocationSample`] - what the consumer receives

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A raw position reported by the location provider.
///
/// Fixes carry no source tag; the delivery path tags them when it turns
/// them into [`LocationSample`]s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionFix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_meters: f32,
    /// When the provider measured this position.
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    /// Create a fix measured now.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f32) -> Self {
        Self::with_timestamp(latitude, longitude, accuracy_meters, Utc::now())
    }

    /// Create a fix with an explicit measurement time.
    pub fn with_timestamp(
        latitude: f64,
        longitude: f64,
        accuracy_meters: f32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            timestamp,
        }
    }
}

/// Delivery path that produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    /// Continuous provider subscription.
    Push,
    /// Watchdog "last known position" poll.
    Poll,
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Poll => write!(f, "poll"),
        }
    }
}

/// A position delivered to the registered listener.
///
/// Samples from the push and poll paths are not ordered relative to each
/// other; consumers should rely on `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationSample {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_meters: f32,
    /// When the provider measured this position.
    pub timestamp: DateTime<Utc>,
    /// Path that delivered the sample.
    pub source: SampleSource,
}

impl LocationSample {
    /// Tag a provider fix with the path delivering it.
    pub fn from_fix(fix: PositionFix, source: SampleSource) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy_meters: fix.accuracy_meters,
            timestamp: fix.timestamp,
            source,
        }
    }

    /// Position as (lat, lon).
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fix_keeps_measurement() {
        let timestamp = Utc::now() - chrono::Duration::seconds(30);
        let fix = PositionFix::with_timestamp(53.5, 10.0, 4.5, timestamp);

        let sample = LocationSample::from_fix(fix, SampleSource::Poll);

        assert_eq!(sample.position(), (53.5, 10.0));
        assert_eq!(sample.accuracy_meters, 4.5);
        assert_eq!(sample.timestamp, timestamp);
        assert_eq!(sample.source, SampleSource::Poll);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(SampleSource::Push.to_string(), "push");
        assert_eq!(SampleSource::Poll.to_string(), "poll");
    }

    #[test]
    fn test_sample_serializes_source_lowercase() {
        let fix = PositionFix::new(43.6, 1.4, 8.0);
        let sample = LocationSample::from_fix(fix, SampleSource::Push);

        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(json["source"], "push");
        assert_eq!(json["latitude"], 43.6);
    }
}
