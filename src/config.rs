//! Engine configuration.
//!
//! [`CallbackOptions`] is plain serde data, loadable from JSON or YAML with
//! human-readable duration strings, so embedders can ship it inside their
//! own configuration files.

use crate::constants;
use crate::error::Error;
use crate::retry::RetryConfig;
use crate::worker;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Options governing queueing, dispatch, and request assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackOptions {
    /// Bounded queue capacity; producers block when full.
    pub queue_capacity: usize,
    /// Maximum concurrent in-flight deliveries.
    pub max_concurrency: usize,
    /// Optional requests-per-second quota.
    pub rate_limit: Option<u32>,
    /// Per-attempt HTTP timeout.
    #[serde(with = "crate::duration::serde_duration")]
    pub default_timeout: Duration,
    pub retry: RetryConfig,
    /// Static headers merged into every request; the mandatory callback
    /// headers always win on collision.
    pub static_headers: HashMap<String, String>,
    /// Key id recorded on requests when HMAC signing is configured.
    pub signature_key_id: Option<String>,
}

impl Default for CallbackOptions {
    fn default() -> Self {
        Self {
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            max_concurrency: worker::default_max_concurrency(),
            rate_limit: None,
            default_timeout: Duration::from_millis(constants::DEFAULT_TIMEOUT_MS),
            retry: RetryConfig::default(),
            static_headers: HashMap::new(),
            signature_key_id: None,
        }
    }
}

impl CallbackOptions {
    /// Parses options from JSON or YAML text.
    ///
    /// # Errors
    ///
    /// Returns a parse error when the text matches neither format, or a
    /// validation error for out-of-range values.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let options = if let Ok(options) = serde_json::from_str::<Self>(content) {
            options
        } else {
            serde_yaml::from_str::<Self>(content)
                .map_err(|e| Error::from(e).with_context("Failed to parse callback options"))?
        };
        options.validate()?;
        Ok(options)
    }

    /// Reads and parses an options file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Checks option invariants.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for zero capacities, zero attempt
    /// budgets, or inverted delay bounds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.queue_capacity == 0 {
            return Err(Error::invalid_config("queue_capacity must be at least 1"));
        }
        if self.max_concurrency == 0 {
            return Err(Error::invalid_config("max_concurrency must be at least 1"));
        }
        if self.rate_limit == Some(0) {
            return Err(Error::invalid_config("rate_limit must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_config("retry.max_attempts must be at least 1"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(Error::invalid_config(
                "retry.base_delay must not exceed retry.max_delay",
            ));
        }
        if self.default_timeout.is_zero() {
            return Err(Error::invalid_config("default_timeout must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let options = CallbackOptions::default();
        assert_eq!(options.queue_capacity, 10_000);
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.retry.base_delay, Duration::from_secs(2));
        assert_eq!(options.retry.max_delay, Duration::from_secs(30));
        assert_eq!(options.default_timeout, Duration::from_secs(30));
        assert!(options.rate_limit.is_none());
        options.validate().unwrap();
    }

    #[test]
    fn parses_yaml_with_duration_strings() {
        let options = CallbackOptions::parse(
            r#"
queue_capacity: 64
default_timeout: 5s
retry:
  max_attempts: 5
  base_delay: 250ms
  max_delay: 10s
  jitter: false
static_headers:
  X-Env: staging
"#,
        )
        .unwrap();

        assert_eq!(options.queue_capacity, 64);
        assert_eq!(options.default_timeout, Duration::from_secs(5));
        assert_eq!(options.retry.max_attempts, 5);
        assert_eq!(options.retry.base_delay, Duration::from_millis(250));
        assert!(!options.retry.jitter);
        assert_eq!(
            options.static_headers.get("X-Env").map(String::as_str),
            Some("staging")
        );
    }

    #[test]
    fn parses_json() {
        let options =
            CallbackOptions::parse(r#"{"default_timeout":"1s","retry":{"base_delay":"100ms"}}"#)
                .unwrap();
        assert_eq!(options.default_timeout, Duration::from_secs(1));
        assert_eq!(options.retry.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let err = CallbackOptions::parse(
            r#"
retry:
  base_delay: 60s
  max_delay: 1s
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("base_delay"), "got: {err}");
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(CallbackOptions::parse("queue_capacity: 0").is_err());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"queue_capacity: 7\n").unwrap();
        file.flush().unwrap();

        let options = CallbackOptions::load(file.path()).await.unwrap();
        assert_eq!(options.queue_capacity, 7);
    }
}
