//! Retry policy: a pure decision function from the most recent attempt.
//!
//! The default policy is exponential backoff with jitter, capped at a
//! maximum delay and bounded by a maximum attempt count. When the receiver
//! sent a `Retry-After` header the server-specified delay wins if longer,
//! still capped at the maximum delay.

use crate::constants;
use crate::request::{CallbackErrorType, CallbackRequest, CallbackResult};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "crate::duration::serde_duration")]
    pub base_delay: Duration,
    #[serde(with = "crate::duration::serde_duration")]
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(constants::DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_MAX_DELAY_MS),
            jitter: true,
        }
    }
}

/// Outcome of evaluating one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        next_at: DateTime<Utc>,
        delay: Duration,
        reason: String,
    },
    Stop {
        reason: String,
    },
}

/// Pure decision function from `(request, result)`.
pub trait RetryPolicy: Send + Sync {
    fn evaluate(&self, request: &CallbackRequest, result: &CallbackResult) -> RetryDecision;
}

/// Default policy: exponential backoff with jitter, `Retry-After` aware.
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoffPolicy {
    config: RetryConfig,
}

impl ExponentialBackoffPolicy {
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn evaluate(&self, request: &CallbackRequest, result: &CallbackResult) -> RetryDecision {
        if request.attempt + 1 >= self.config.max_attempts {
            return RetryDecision::Stop {
                reason: constants::STOP_REASON_MAX_ATTEMPTS.to_string(),
            };
        }

        let Some(error_type) = result.error_type else {
            return RetryDecision::Stop {
                reason: "no_error".to_string(),
            };
        };

        if !is_transient(error_type, result.status_code) {
            return RetryDecision::Stop {
                reason: constants::STOP_REASON_NON_RETRYABLE_STATUS.to_string(),
            };
        }

        let delay = calculate_retry_delay(&self.config, request.attempt, result.retry_after);
        let next_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        RetryDecision::Retry {
            next_at,
            delay,
            reason: result.classification().to_string(),
        }
    }
}

/// Whether an attempt outcome is worth retrying.
///
/// Transport faults and timeouts are transient. HTTP errors are transient
/// only for the retryable status set. Handler exceptions are retried by
/// default: a sender bug can be load-induced.
#[must_use]
pub const fn is_transient(error_type: CallbackErrorType, status_code: Option<u16>) -> bool {
    match error_type {
        CallbackErrorType::Timeout
        | CallbackErrorType::Dns
        | CallbackErrorType::Tls
        | CallbackErrorType::HttpRequestException
        | CallbackErrorType::HandlerException => true,
        CallbackErrorType::HttpError => match status_code {
            Some(code) => is_retryable_status(code),
            None => false,
        },
    }
}

/// Determines if an HTTP status code is retryable.
///
/// Retryable status codes:
/// - 408 Request Timeout
/// - 425 Too Early
/// - 429 Too Many Requests
/// - 500, 502, 503, 504
#[must_use]
pub const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500 | 502 | 503 | 504)
}

/// Calculates the delay for a given attempt with exponential backoff,
/// respecting an optional `Retry-After` duration.
///
/// The computed delay is `min(max_delay, base_delay * 2^attempt)`, scaled
/// by `(0.5 + rand())` when jitter is enabled. A server-specified delay is
/// used if longer, capped at `max_delay`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_retry_delay(
    config: &RetryConfig,
    attempt: u32,
    retry_after: Option<Duration>,
) -> Duration {
    let base_ms = config.base_delay.as_millis() as f64;
    let exponent = attempt.min(30) as i32; // Cap attempt to prevent overflow
    let max_ms = config.max_delay.as_millis() as f64;
    let capped_ms = (base_ms * 2f64.powi(exponent)).min(max_ms);

    let jittered_ms = if config.jitter {
        capped_ms * (0.5 + fastrand::f64())
    } else {
        capped_ms
    };

    let calculated = Duration::from_millis(jittered_ms as u64);
    retry_after.map_or(calculated, |server_delay| {
        calculated.max(server_delay).min(config.max_delay)
    })
}

/// Parses the `Retry-After` HTTP header and returns the delay duration.
///
/// Supports both formats:
/// - Delay in seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`
///
/// Returns `None` if the header is absent, malformed, or represents a time
/// in the past.
#[must_use]
pub fn parse_retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    let retry_after = headers.get(constants::HEADER_RETRY_AFTER)?;
    let value = retry_after.to_str().ok()?;
    parse_retry_after_value(value)
}

/// Parses a `Retry-After` header value string.
#[must_use]
pub fn parse_retry_after_value(value: &str) -> Option<Duration> {
    // Seconds form first (most common)
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // HTTP-date form (RFC 7231): "Wed, 21 Oct 2015 07:28:00 GMT"
    if let Ok(date) = httpdate::parse_http_date(value) {
        let now = SystemTime::now();
        if let Ok(duration) = date.duration_since(now) {
            return Some(duration);
        }
        // Date is in the past
        return None;
    }

    None
}
