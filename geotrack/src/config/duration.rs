//! Duration strings (`10s`, `500ms`, `2m`).

use std::time::Duration;

use thiserror::Error;

/// A duration string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration '{0}'")]
pub struct DurationParseError(String);

/// Parse a duration. A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let s = input.trim().to_lowercase();
    let err = || DurationParseError(input.to_string());

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: u64 = number.parse().map_err(|_| err())?;

    match unit.trim() {
        "" | "s" | "sec" | "secs" => Ok(Duration::from_secs(value)),
        "ms" => Ok(Duration::from_millis(value)),
        "m" | "min" | "mins" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(err),
        _ => Err(err()),
    }
}

/// Format a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units() {
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration(" 15 "), Ok(Duration::from_secs(15)));
        assert_eq!(parse_duration("30 SEC"), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10h").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("1.5s").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::from_secs(10)), "10s");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2500ms");
    }
}
