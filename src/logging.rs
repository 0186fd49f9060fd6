//! Dispatch logging utilities with automatic secret redaction.
//!
//! Header values for authorization-style headers (including `X-Signature`)
//! never reach the log output. The module also provides the
//! tracing-subscriber initialization embedders call once at startup.

use crate::constants;
use crate::request::{CallbackRequest, CallbackResult};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const REDACTED: &str = "[REDACTED]";

/// Renders request headers for logging, redacting sensitive values.
#[must_use]
pub fn redacted_headers(request: &CallbackRequest) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| {
            if constants::is_auth_header(name) {
                (name.to_string(), REDACTED.to_string())
            } else {
                (name.to_string(), value.to_string())
            }
        })
        .collect();
    headers.sort();
    headers
}

/// Logs one outgoing attempt at debug level.
pub fn log_attempt(request: &CallbackRequest) {
    debug!(
        callback_id = %request.callback_id,
        operation_id = %request.operation_id,
        correlation_id = %request.correlation_id,
        attempt = request.attempt,
        method = %request.method,
        url = %request.target_url,
        headers = ?redacted_headers(request),
        "dispatching callback"
    );
}

/// Logs a permanently failed delivery at warning level.
pub fn log_permanent_failure(request: &CallbackRequest, result: &CallbackResult, reason: &str) {
    warn!(
        callback_id = %request.callback_id,
        operation_id = %request.operation_id,
        correlation_id = %request.correlation_id,
        attempts = request.attempt + 1,
        classification = result.classification(),
        status = result.status_code,
        error = result.error_message.as_deref().unwrap_or_default(),
        reason,
        "callback delivery failed permanently"
    );
}

/// Initialize tracing-subscriber for dispatch logging.
///
/// `KESTRUN_CALLBACKS_LOG` selects the filter (`error` by default);
/// `KESTRUN_CALLBACKS_LOG_FORMAT` selects `text` or `json` output.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = std::env::var("KESTRUN_CALLBACKS_LOG").unwrap_or_else(|_| "error".to_string());
    let env_filter = EnvFilter::try_new(&filter)
        .or_else(|_| EnvFilter::try_new("error"))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    let log_format = std::env::var("KESTRUN_CALLBACKS_LOG_FORMAT")
        .map_or_else(|_| "text".to_string(), |s| s.to_lowercase());

    if log_format == "json" {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(false)
            .with_target(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }
}
