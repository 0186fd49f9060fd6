//! Error handling module for the callback dispatch engine
//!
//! This module provides a consolidated error handling system that categorizes
//! all engine errors into distinct kinds. The design follows these principles:
//!
//! 1. **Error Consolidation**: All errors are mapped to one `ErrorKind` category
//! 2. **Structured Context**: Each error can include structured JSON details and suggestions
//! 3. **Builder Pattern**: `ErrorContext` provides fluent builder methods for error construction
//!
//! Delivery failures are not errors: they are materialized as
//! [`crate::request::CallbackResult`] values so the retry policy governs them.
//! Only configuration, resolution, storage, and runtime faults surface here.

use crate::constants;
use serde_json::json;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Keep essential external errors that can't be consolidated
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // Consolidated error variant
    #[error("{kind}: {message}")]
    Internal {
        kind: ErrorKind,
        message: Cow<'static, str>,
        context: Option<ErrorContext>,
    },
}

/// Error categories for consolidated error handling
///
/// All internal errors are mapped to one of these categories to provide
/// consistent error handling and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Callback plan compilation and lookup errors
    Specification,
    /// URL template and runtime expression resolution errors
    Resolution,
    /// Input validation and configuration errors
    Validation,
    /// Header processing errors
    Headers,
    /// Network connectivity and transport errors
    Network,
    /// HTTP request/response errors
    HttpRequest,
    /// Request signing errors
    Signing,
    /// Callback store errors (invalid transitions, persistence faults)
    Storage,
    /// Runtime operation errors
    Runtime,
    /// Cooperative cancellation (non-error terminal for in-flight work)
    Canceled,
}

/// Additional context for consolidated errors
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Structured details for programmatic access
    pub details: Option<serde_json::Value>,
    /// Human-readable suggestion for resolving the error
    pub suggestion: Option<Cow<'static, str>>,
}

impl ErrorContext {
    /// Create a new error context with details and suggestion
    #[must_use]
    pub const fn new(
        details: Option<serde_json::Value>,
        suggestion: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            details,
            suggestion,
        }
    }

    /// Create error context with only a suggestion
    #[must_use]
    pub const fn with_suggestion(suggestion: Cow<'static, str>) -> Self {
        Self {
            details: None,
            suggestion: Some(suggestion),
        }
    }

    /// Builder method to add a single detail field
    #[must_use]
    pub fn with_detail(key: &str, value: impl serde::Serialize) -> Self {
        Self {
            details: Some(json!({ key: value })),
            suggestion: None,
        }
    }

    /// Add suggestion to existing context
    #[must_use]
    pub fn and_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(Cow::Owned(suggestion.into()));
        self
    }
}

impl ErrorKind {
    /// Get the string identifier for this error kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Specification => "Specification",
            Self::Resolution => "Resolution",
            Self::Validation => "Validation",
            Self::Headers => "Headers",
            Self::Network => "Network",
            Self::HttpRequest => "HttpError",
            Self::Signing => "Signing",
            Self::Storage => "Storage",
            Self::Runtime => "Runtime",
            Self::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// The kind of a consolidated error, if any
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Internal { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this error represents cooperative cancellation
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.kind() == Some(ErrorKind::Canceled)
    }

    /// Whether this error is a URL/template resolution failure
    #[must_use]
    pub fn is_resolution(&self) -> bool {
        self.kind() == Some(ErrorKind::Resolution)
    }

    /// Add context to an error for better messaging
    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::Internal {
                kind,
                message,
                context: ctx,
            } => Self::Internal {
                kind,
                message: Cow::Owned(format!("{context}: {message}")),
                context: ctx,
            },
            _ => self,
        }
    }

    // ---- Specification Errors ----

    /// Create a callback not found error
    pub fn callback_not_found(callback_id: impl Into<String>) -> Self {
        let callback_id = callback_id.into();
        Self::Internal {
            kind: ErrorKind::Specification,
            message: Cow::Owned(format!("Callback '{callback_id}' not found")),
            context: Some(
                ErrorContext::with_detail("callback_id", &callback_id)
                    .and_suggestion("Check the compiled plans registered with the service."),
            ),
        }
    }

    /// Create an operation not found error
    pub fn operation_not_found(operation_id: impl Into<String>) -> Self {
        let operation_id = operation_id.into();
        Self::Internal {
            kind: ErrorKind::Specification,
            message: Cow::Owned(format!("Callback operation '{operation_id}' not found")),
            context: Some(ErrorContext::with_detail("operation_id", &operation_id)),
        }
    }

    /// Create an empty URL template error
    pub fn empty_url_template(callback_id: impl Into<String>) -> Self {
        let callback_id = callback_id.into();
        Self::Internal {
            kind: ErrorKind::Specification,
            message: Cow::Owned(format!(
                "Callback '{callback_id}' declares an empty URL template"
            )),
            context: Some(ErrorContext::with_detail("callback_id", &callback_id)),
        }
    }

    // ---- Resolution Errors ----

    /// Create a missing payload error for a runtime body expression
    pub fn missing_payload(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "Runtime expression '{expression}' requires a request body, but none is present"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "expression": expression, "reason": "MissingPayload" })),
                Some(Cow::Borrowed(constants::ERR_MISSING_PAYLOAD)),
            )),
        }
    }

    /// Create a pointer not found error
    pub fn pointer_not_found(pointer: impl Into<String>, segment: impl Into<String>) -> Self {
        let pointer = pointer.into();
        let segment = segment.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "JSON Pointer '{pointer}' does not resolve: segment '{segment}' not found"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "pointer": pointer, "segment": segment, "reason": "PointerNotFound" })),
                Some(Cow::Borrowed(constants::ERR_POINTER)),
            )),
        }
    }

    /// Create a pointer type error (traversal crossed a scalar)
    pub fn pointer_type_error(pointer: impl Into<String>, segment: impl Into<String>) -> Self {
        let pointer = pointer.into();
        let segment = segment.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "JSON Pointer '{pointer}' traverses a scalar at segment '{segment}'"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "pointer": pointer, "segment": segment, "reason": "PointerTypeError" })),
                Some(Cow::Borrowed(constants::ERR_POINTER)),
            )),
        }
    }

    /// Create a missing token error for a `{name}` placeholder
    pub fn missing_token(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "URL template placeholder '{{{name}}}' has no value"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "token": name, "reason": "MissingToken" })),
                Some(Cow::Borrowed(constants::ERR_MISSING_TOKEN)),
            )),
        }
    }

    /// Create an unresolvable URL error (relative with no base)
    pub fn unresolvable_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "Callback URL '{url}' is relative and no default base URI is configured"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "url": url, "reason": "Unresolvable" })),
                Some(Cow::Borrowed(constants::ERR_UNRESOLVABLE)),
            )),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        let url = url.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!("Invalid callback URL '{url}': {reason}")),
            context: Some(ErrorContext::new(
                Some(json!({ "url": url, "reason": reason })),
                None,
            )),
        }
    }

    /// Create a missing body parameter error
    pub fn missing_body_parameter(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Internal {
            kind: ErrorKind::Resolution,
            message: Cow::Owned(format!(
                "Body parameter '{name}' is not present in the execution plan parameters"
            )),
            context: Some(ErrorContext::with_detail("parameter_name", &name)),
        }
    }

    // ---- Validation Errors ----

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Validation,
            message: Cow::Owned(format!("Invalid configuration: {reason}")),
            context: Some(
                ErrorContext::with_detail("reason", &reason)
                    .and_suggestion("Check the configuration values and structure."),
            ),
        }
    }

    /// Create an invalid duration string error
    pub fn invalid_duration(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::Internal {
            kind: ErrorKind::Validation,
            message: Cow::Owned(format!("Invalid duration '{value}'")),
            context: Some(ErrorContext::new(
                Some(json!({ "value": value })),
                Some(Cow::Borrowed(
                    "Use a number with an optional unit suffix: '500ms', '30s', or '5m'.",
                )),
            )),
        }
    }

    /// Create an invalid HTTP method error
    pub fn invalid_http_method(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::Internal {
            kind: ErrorKind::Validation,
            message: Cow::Owned(format!("Invalid HTTP method: {method}")),
            context: Some(ErrorContext::new(
                Some(json!({ "method": method })),
                Some(Cow::Borrowed(
                    "Valid HTTP methods are: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS.",
                )),
            )),
        }
    }

    // ---- Header Errors ----

    /// Create an invalid header name error
    pub fn invalid_header_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        let reason = reason.into();
        Self::Internal {
            kind: ErrorKind::Headers,
            message: Cow::Owned(format!("Invalid header name '{name}': {reason}")),
            context: Some(ErrorContext::new(
                Some(json!({ "header_name": name, "reason": reason })),
                Some(Cow::Borrowed(
                    "Header names must contain only valid HTTP header characters.",
                )),
            )),
        }
    }

    // ---- Signing Errors ----

    /// Create an error for signing a request without a body
    #[must_use]
    pub const fn signing_requires_body() -> Self {
        Self::Internal {
            kind: ErrorKind::Signing,
            message: Cow::Borrowed("Cannot sign a callback request with no body"),
            context: Some(ErrorContext::with_suggestion(Cow::Borrowed(
                "Only callbacks that carry a body can be signed.",
            ))),
        }
    }

    // ---- Storage Errors ----

    /// Create an invalid state transition error
    pub fn invalid_state_transition(
        request_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let request_id = request_id.into();
        let from = from.into();
        let to = to.into();
        Self::Internal {
            kind: ErrorKind::Storage,
            message: Cow::Owned(format!(
                "Invalid callback state transition {from} -> {to} for request '{request_id}'"
            )),
            context: Some(ErrorContext::new(
                Some(json!({ "request_id": request_id, "from": from, "to": to })),
                None,
            )),
        }
    }

    /// Create an unknown request error
    pub fn request_not_tracked(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        Self::Internal {
            kind: ErrorKind::Storage,
            message: Cow::Owned(format!(
                "Callback request '{request_id}' is not tracked by the store"
            )),
            context: Some(ErrorContext::with_detail("request_id", &request_id)),
        }
    }

    // ---- Runtime Errors ----

    /// Create a closed queue error
    #[must_use]
    pub const fn queue_closed() -> Self {
        Self::Internal {
            kind: ErrorKind::Runtime,
            message: Cow::Borrowed("Callback queue is closed"),
            context: Some(ErrorContext::with_suggestion(Cow::Borrowed(
                "The dispatcher has shut down; no further callbacks can be enqueued.",
            ))),
        }
    }

    /// Create a cooperative cancellation marker
    #[must_use]
    pub const fn dispatch_canceled() -> Self {
        Self::Internal {
            kind: ErrorKind::Canceled,
            message: Cow::Borrowed("Callback dispatch canceled"),
            context: None,
        }
    }
}
