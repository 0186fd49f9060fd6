//! HTTP sender: one attempt per call, no retry logic.
//!
//! The sender builds a single request message from a [`CallbackRequest`],
//! enforces the per-request timeout, invokes the optional signer after
//! headers and body are finalized, and classifies the outcome into a
//! [`CallbackResult`]. Cooperative cancellation via the caller's token is
//! the only way an attempt surfaces as an error.

use crate::constants;
use crate::error::Error;
use crate::logging;
use crate::request::{CallbackErrorType, CallbackRequest, CallbackResult};
use crate::retry;
use crate::signer::CallbackSigner;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Performs one HTTP attempt.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    /// # Errors
    ///
    /// Returns `Canceled` when the caller's token fires mid-attempt.
    /// Delivery failures are classified into the returned result, never
    /// into errors.
    async fn send(
        &self,
        request: &CallbackRequest,
        cancel: &CancellationToken,
    ) -> Result<CallbackResult, Error>;
}

/// reqwest-backed sender with optional HMAC signing.
pub struct HttpCallbackSender {
    client: reqwest::Client,
    signer: Option<Arc<dyn CallbackSigner>>,
}

impl HttpCallbackSender {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, Error> {
        #[cfg(not(windows))]
        let _ = rustls::crypto::ring::default_provider().install_default();
        #[cfg(windows)]
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                Error::invalid_config(format!("Failed to create callback HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            signer: None,
        })
    }

    /// Attaches a signer invoked on every attempt that carries a body.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn CallbackSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Builds the wire header map, skipping names or values reqwest cannot
    /// represent (best-effort, matching receiver expectations over strict
    /// failure).
    fn build_headers(request: &CallbackRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in request.headers.iter() {
            let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
                debug!(header = name, "skipping illegal callback header name");
                continue;
            };
            let Ok(header_value) = HeaderValue::from_str(value) else {
                debug!(header = name, "skipping illegal callback header value");
                continue;
            };
            headers.insert(header_name, header_value);
        }

        debug_assert!(
            headers.contains_key(constants::HEADER_CORRELATION_ID),
            "factory must set the correlation header"
        );
        debug_assert!(
            headers.contains_key(constants::HEADER_IDEMPOTENCY_KEY),
            "factory must set the idempotency header"
        );

        headers
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn send(
        &self,
        request: &CallbackRequest,
        cancel: &CancellationToken,
    ) -> Result<CallbackResult, Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::invalid_http_method(&request.method))?;

        let mut builder = self
            .client
            .request(method, request.target_url.clone())
            .headers(Self::build_headers(request));

        if let Some(body) = &request.body {
            builder = builder
                .header(constants::HEADER_CONTENT_TYPE, &request.content_type)
                .body(body.clone());

            // Headers and body are final; the signature covers the exact
            // bytes on the wire.
            if let Some(signer) = &self.signer {
                builder = builder.header(constants::HEADER_SIGNATURE, signer.sign(request)?);
            }
        }

        logging::log_attempt(request);

        let attempt = builder.send();
        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(Error::dispatch_canceled()),
            outcome = tokio::time::timeout(request.timeout, attempt) => outcome,
        };

        match outcome {
            Err(_elapsed) => Ok(CallbackResult::transport(
                CallbackErrorType::Timeout,
                format!("attempt timed out after {:?}", request.timeout),
            )),
            Ok(Ok(response)) => Ok(classify_response(&response)),
            Ok(Err(error)) => Ok(classify_transport_error(&error)),
        }
    }
}

fn classify_response(response: &reqwest::Response) -> CallbackResult {
    let status = response.status();
    if status.is_success() {
        return CallbackResult::succeeded(status.as_u16());
    }

    let retry_after = retry::parse_retry_after_header(response.headers());
    CallbackResult::http_error(
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown status"),
        retry_after,
    )
}

/// Classifies a transport fault by inspecting the error chain.
fn classify_transport_error(error: &reqwest::Error) -> CallbackResult {
    if error.is_timeout() {
        return CallbackResult::transport(CallbackErrorType::Timeout, error.to_string());
    }

    let mut cause: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = cause {
        let text = err.to_string().to_lowercase();
        if text.contains("dns") || text.contains("resolve") || text.contains("name or service") {
            return CallbackResult::transport(CallbackErrorType::Dns, error.to_string());
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return CallbackResult::transport(CallbackErrorType::Tls, error.to_string());
        }
        cause = err.source();
    }

    CallbackResult::transport(CallbackErrorType::HttpRequestException, error.to_string())
}
