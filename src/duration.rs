//! Parsing for human-readable durations like "10m", "24h".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string such as "14d", "24h", "30m", or "60s".
///
/// Units are days, hours, minutes, and seconds. Input is case-insensitive
/// and surrounding whitespace is ignored.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let Some(unit) = s.chars().last().filter(|c| "dhms".contains(*c)) else {
        anyhow::bail!("Duration must end with d, h, m, or s");
    };

    let num: u64 = s[..s.len() - 1]
        .parse()
        .context("Invalid number in duration")?;

    let per_unit = match unit {
        'd' => 24 * 60 * 60,
        'h' => 60 * 60,
        'm' => 60,
        _ => 1,
    };
    let secs = num.checked_mul(per_unit).context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86400));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(24 * 3600));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn case_and_whitespace_are_forgiven() {
        assert_eq!(parse_duration(" 5M ").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("\t1D\n").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("1w").is_err());
        assert!(parse_duration("-1d").is_err());
        assert!(parse_duration("1.5h").is_err());
        assert!(parse_duration(&format!("{}d", u64::MAX)).is_err());
    }

    #[test]
    fn deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "deserialize_duration")]
            ttl: Duration,
        }

        let probe: Probe = toml::from_str(r#"ttl = "5m""#).unwrap();
        assert_eq!(probe.ttl, Duration::from_secs(300));
    }
}
