//! Callback request assembly and attempt outcomes.
//!
//! [`RequestFactory::from_plan`] turns an execution plan plus runtime
//! context into a dispatchable [`CallbackRequest`]: target URL resolution,
//! body serialization, idempotency key derivation, and the mandatory
//! header set. [`CallbackResult`] is the materialized outcome of one HTTP
//! attempt; delivery failures never surface as errors.

use crate::body::{BodySerializer, SerializedBody};
use crate::constants;
use crate::context::CallbackRuntimeContext;
use crate::error::Error;
use crate::plan::CallbackExecutionPlan;
use crate::resolve::UrlResolver;
use crate::vars::HeaderMap;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One outbound callback delivery, mutable across attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackRequest {
    /// Unique id of this delivery, used as the store key.
    pub id: String,
    pub callback_id: String,
    pub operation_id: String,
    #[serde(with = "serde_url")]
    pub target_url: Url,
    /// Uppercase HTTP method.
    pub method: String,
    pub headers: HeaderMap,
    pub content_type: String,
    pub body: Option<Vec<u8>>,
    pub correlation_id: String,
    pub idempotency_key: String,
    /// Zero-based attempt counter; incremented on each retry decision.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(with = "crate::duration::serde_duration")]
    pub timeout: Duration,
    pub signature_key_id: Option<String>,
}

/// Classified failure cause of one HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackErrorType {
    Timeout,
    Dns,
    Tls,
    HttpError,
    HttpRequestException,
    HandlerException,
}

impl CallbackErrorType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Dns => "Dns",
            Self::Tls => "Tls",
            Self::HttpError => "HttpError",
            Self::HttpRequestException => "HttpRequestException",
            Self::HandlerException => "HandlerException",
        }
    }
}

impl std::fmt::Display for CallbackErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error_type: Option<CallbackErrorType>,
    pub error_message: Option<String>,
    /// Parsed `Retry-After` response header, when the receiver sent one.
    pub retry_after: Option<Duration>,
    pub completed_at: DateTime<Utc>,
}

impl CallbackResult {
    #[must_use]
    pub fn succeeded(status_code: u16) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            error_type: None,
            error_message: None,
            retry_after: None,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn http_error(
        status_code: u16,
        reason: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            success: false,
            status_code: Some(status_code),
            error_type: Some(CallbackErrorType::HttpError),
            error_message: Some(reason.into()),
            retry_after,
            completed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn transport(error_type: CallbackErrorType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            error_type: Some(error_type),
            error_message: Some(message.into()),
            retry_after: None,
            completed_at: Utc::now(),
        }
    }

    /// Wraps an exception escaping the sender so the retry policy governs
    /// it.
    #[must_use]
    pub fn handler_exception(message: impl Into<String>) -> Self {
        Self::transport(CallbackErrorType::HandlerException, message)
    }

    /// Short classification used in log lines.
    #[must_use]
    pub fn classification(&self) -> &'static str {
        self.error_type.map_or("Success", |e| e.as_str())
    }
}

/// Options consumed by the request factory.
#[derive(Debug, Clone)]
pub struct FactoryOptions {
    pub default_timeout: Duration,
    /// Static per-service headers merged into every request. The mandatory
    /// callback headers are written afterwards and always win.
    pub static_headers: HeaderMap,
    pub signature_key_id: Option<String>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(constants::DEFAULT_TIMEOUT_MS),
            static_headers: HeaderMap::new(),
            signature_key_id: None,
        }
    }
}

/// Assembles [`CallbackRequest`] values from execution plans.
pub struct RequestFactory {
    resolver: UrlResolver,
    serializer: BodySerializer,
    options: FactoryOptions,
}

impl RequestFactory {
    #[must_use]
    pub fn new(options: FactoryOptions) -> Self {
        Self {
            resolver: UrlResolver::new(),
            serializer: BodySerializer::new(),
            options,
        }
    }

    /// Builds a dispatchable request from an execution plan and context.
    ///
    /// Plan parameters override request-derived variables on key collision;
    /// the idempotency seed is re-derived from the plan's URL template over
    /// the merged variables.
    ///
    /// # Errors
    ///
    /// Returns a `Resolution` error when the URL template cannot be
    /// resolved (the callback must not be enqueued) and a `Validation`
    /// error for invalid HTTP methods.
    pub fn from_plan(
        &self,
        execution: &CallbackExecutionPlan,
        ctx: &CallbackRuntimeContext,
    ) -> Result<CallbackRequest, Error> {
        let plan = &execution.plan;

        let mut merged = ctx.vars.clone();
        merged.merge_from(&execution.parameters);
        let rt = ctx.with_vars_for_template(merged, &plan.url_template);

        let idempotency_key = format!(
            "{}:{}:{}",
            rt.idempotency_seed, plan.callback_id, plan.operation_id
        );

        let target_url = self.resolver.resolve(&plan.url_template, &rt)?;
        let body = self.serialize_body(execution, &rt)?;

        let method = reqwest::Method::from_bytes(plan.method.to_uppercase().as_bytes())
            .map_err(|_| Error::invalid_http_method(&plan.method))?;

        let mut headers = self.options.static_headers.clone();
        headers.insert(constants::HEADER_CORRELATION_ID, rt.correlation_id.clone());
        headers.insert(constants::HEADER_IDEMPOTENCY_KEY, idempotency_key.clone());
        headers.insert(constants::HEADER_CALLBACK_ID, plan.callback_id.clone());

        let created_at = Utc::now();
        Ok(CallbackRequest {
            id: uuid::Uuid::new_v4().to_string(),
            callback_id: plan.callback_id.clone(),
            operation_id: plan.operation_id.clone(),
            target_url,
            method: method.as_str().to_string(),
            headers,
            content_type: body.content_type,
            body: if body.bytes.is_empty() {
                None
            } else {
                Some(body.bytes)
            },
            correlation_id: rt.correlation_id.clone(),
            idempotency_key,
            attempt: 0,
            created_at,
            next_attempt_at: created_at,
            timeout: self.options.default_timeout,
            signature_key_id: self.options.signature_key_id.clone(),
        })
    }

    fn serialize_body(
        &self,
        execution: &CallbackExecutionPlan,
        rt: &CallbackRuntimeContext,
    ) -> Result<SerializedBody, Error> {
        let plan = &execution.plan;
        if let Some(name) = &execution.body_parameter_name {
            let value = rt
                .vars
                .get(name)
                .ok_or_else(|| Error::missing_body_parameter(name))?
                .clone();
            let content_type = plan
                .body
                .as_ref()
                .map_or(constants::CONTENT_TYPE_JSON, |b| b.media_type.as_str());
            return self.serializer.serialize_value(content_type, &value);
        }
        self.serializer.serialize(plan, rt)
    }
}

mod serde_url {
    use reqwest::Url;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
        url.as_str().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Url, D::Error> {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}
