//! Configuration types for chaindex buckets.
//!
//! Configuration is loaded from TOML files or built in code. All config
//! structs validate their values at construction time via fallible builders.
//! Post-deserialization validation is available via the `validate()` method.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Maximum number of retries per durable write.
const MAX_WRITE_RETRY_LIMIT: u32 = 32;

/// Minimum inter-attempt delay.
const MIN_WRITE_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Maximum inter-attempt delay.
const MAX_WRITE_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Per-bucket engine configuration.
///
/// # Validation Rules
///
/// - `write_retry_limit` must be <= 32
/// - `write_retry_delay` must be between 1 ms and 10 s
///
/// # Example
///
/// ```no_run
/// # use chaindex_types::BucketConfig;
/// # use std::time::Duration;
/// let config = BucketConfig::builder()
///     .write_retry_limit(5)
///     .write_retry_delay(Duration::from_millis(50))
///     .build()
///     .expect("valid bucket config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Number of retries after a failed durable write before the commit is
    /// declared fatal.
    #[serde(default = "default_write_retry_limit")]
    pub write_retry_limit: u32,
    /// Delay between write attempts.
    #[serde(default = "default_write_retry_delay")]
    #[serde(with = "humantime_serde")]
    pub write_retry_delay: Duration,
}

#[bon::bon]
impl BucketConfig {
    /// Creates a new bucket configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if:
    /// - `write_retry_limit` > 32
    /// - `write_retry_delay` outside 1 ms - 10 s
    #[builder]
    pub fn new(
        #[builder(default = default_write_retry_limit())] write_retry_limit: u32,
        #[builder(default = default_write_retry_delay())] write_retry_delay: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self { write_retry_limit, write_retry_delay };
        config.validate()?;
        Ok(config)
    }
}

impl BucketConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_retry_limit > MAX_WRITE_RETRY_LIMIT {
            return Err(ConfigError::Validation {
                message: format!(
                    "write_retry_limit must be <= {}, got {}",
                    MAX_WRITE_RETRY_LIMIT, self.write_retry_limit
                ),
            });
        }
        if self.write_retry_delay < MIN_WRITE_RETRY_DELAY
            || self.write_retry_delay > MAX_WRITE_RETRY_DELAY
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "write_retry_delay must be between {:?} and {:?}, got {:?}",
                    MIN_WRITE_RETRY_DELAY, MAX_WRITE_RETRY_DELAY, self.write_retry_delay
                ),
            });
        }
        Ok(())
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            write_retry_limit: default_write_retry_limit(),
            write_retry_delay: default_write_retry_delay(),
        }
    }
}

fn default_write_retry_limit() -> u32 {
    3
}

fn default_write_retry_delay() -> Duration {
    Duration::from_millis(100)
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BucketConfig::default();
        config.validate().expect("defaults should be valid");
        assert_eq!(config.write_retry_limit, 3);
        assert_eq!(config.write_retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_builder_with_custom_values() {
        let config = BucketConfig::builder()
            .write_retry_limit(5)
            .write_retry_delay(Duration::from_millis(20))
            .build()
            .expect("valid custom config");
        assert_eq!(config.write_retry_limit, 5);
        assert_eq!(config.write_retry_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_retry_limit_maximum() {
        let result = BucketConfig::builder().write_retry_limit(32).build();
        assert!(result.is_ok());

        let result = BucketConfig::builder().write_retry_limit(33).build();
        let err = result.expect_err("should reject");
        assert!(err.to_string().contains("write_retry_limit"));
    }

    #[test]
    fn test_retry_delay_range() {
        let result = BucketConfig::builder().write_retry_delay(Duration::ZERO).build();
        assert!(result.is_err());

        let result = BucketConfig::builder().write_retry_delay(Duration::from_secs(11)).build();
        assert!(result.is_err());

        let result = BucketConfig::builder().write_retry_delay(Duration::from_secs(10)).build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_zero_retries_is_valid() {
        let config =
            BucketConfig::builder().write_retry_limit(0).build().expect("zero retries valid");
        assert_eq!(config.write_retry_limit, 0);
    }
}
