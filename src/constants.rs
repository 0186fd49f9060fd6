//! Centralized string constants for the callback dispatch engine
//!
//! This module contains commonly used string literals to:
//! - Reduce string duplication
//! - Improve maintainability
//! - Ensure consistency across the codebase

// Mandatory callback headers
pub const HEADER_CORRELATION_ID: &str = "X-Correlation-Id";
pub const HEADER_IDEMPOTENCY_KEY: &str = "Idempotency-Key";
pub const HEADER_CALLBACK_ID: &str = "X-Kestrun-CallbackId";

// Optional callback headers
pub const HEADER_SIGNATURE: &str = "X-Signature";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

// Signature format
pub const SIGNATURE_PREFIX: &str = "sha256=";

// Content Types
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Parameter Locations
pub const PARAM_LOCATION_PATH: &str = "path";

// Default Values
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// Retry decision reasons
pub const STOP_REASON_MAX_ATTEMPTS: &str = "max_attempts";
pub const STOP_REASON_NON_RETRYABLE_STATUS: &str = "non_retryable_status";

// Error Context Messages
pub const ERR_MISSING_PAYLOAD: &str =
    "Runtime body expressions require the incoming request to carry a body.";
pub const ERR_POINTER: &str =
    "Check the JSON Pointer in the callback URL template against the request body shape.";
pub const ERR_MISSING_TOKEN: &str =
    "Provide a value for this placeholder via path parameters or resolved request variables.";
pub const ERR_UNRESOLVABLE: &str =
    "Relative callback URLs require a default base URI on the runtime context.";

/// Check if a header name is authentication-related
#[must_use]
pub fn is_auth_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "authorization"
            | "proxy-authorization"
            | "x-api-key"
            | "x-api-token"
            | "x-auth-token"
            | "x-signature"
            | "api-key"
            | "token"
            | "bearer"
            | "cookie"
    )
}
