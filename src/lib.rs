//! Outbound callback dispatch engine for an embedded HTTP server host.
//!
//! OpenAPI callback declarations are compiled into immutable plans at
//! startup. Incoming requests trigger zero or more outbound callbacks whose
//! URLs and bodies are resolved from request context via `{token}`
//! placeholders and `{$request.body#/ptr}` runtime expressions, then
//! enqueued, dispatched with exponential backoff, and either acknowledged
//! or dead-lettered through an optional durable store.
//!
//! The typical wiring:
//!
//! ```no_run
//! use kestrun_callbacks::config::CallbackOptions;
//! use kestrun_callbacks::context::CallbackRuntimeContext;
//! use kestrun_callbacks::plan::loader;
//! use kestrun_callbacks::service::CallbackService;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), kestrun_callbacks::error::Error> {
//! let document = loader::load_document("openapi.yaml".as_ref()).await?;
//! let (service, dispatcher) = CallbackService::builder(CallbackOptions::default())
//!     .compile_document(&document)
//!     .build()?;
//!
//! let ctx = CallbackRuntimeContext::builder("trace-1")
//!     .with_var("paymentId", serde_json::json!("p-42"))
//!     .with_payload(serde_json::json!({"status": "OK"}))
//!     .build();
//! service
//!     .enqueue_operation("paymentStatus__post__status", &ctx, &CancellationToken::new())
//!     .await?;
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod config;
pub mod constants;
pub mod context;
pub mod duration;
pub mod error;
pub mod logging;
pub mod plan;
pub mod queue;
pub mod request;
pub mod resolve;
pub mod retry;
pub mod sender;
pub mod service;
pub mod signer;
pub mod store;
pub mod vars;
pub mod worker;

pub use config::CallbackOptions;
pub use context::CallbackRuntimeContext;
pub use error::{Error, ErrorKind};
pub use plan::{CallbackExecutionPlan, CallbackPlan, PlanCompiler};
pub use request::{CallbackErrorType, CallbackRequest, CallbackResult};
pub use retry::{ExponentialBackoffPolicy, RetryConfig, RetryDecision, RetryPolicy};
pub use sender::{CallbackSender, HttpCallbackSender};
pub use service::CallbackService;
pub use signer::{CallbackSigner, HmacSha256CallbackSigner};
pub use store::{CallbackState, CallbackStore, InMemoryCallbackStore};
pub use worker::{CallbackDispatcher, DispatcherHandle};
