//! Optional durable persistence for callback state transitions.
//!
//! The store is a passive recorder: the dispatcher worker exclusively
//! drives transitions, so implementations need to be safe for concurrent
//! calls but never serialize transitions for one request themselves.

pub mod memory;

use crate::error::Error;
use crate::request::{CallbackRequest, CallbackResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryCallbackStore;

/// Lifecycle state of one tracked callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackState {
    New,
    InFlight,
    Succeeded,
    RetryScheduled,
    FailedPermanent,
}

impl CallbackState {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedPermanent)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::InFlight => "InFlight",
            Self::Succeeded => "Succeeded",
            Self::RetryScheduled => "RetryScheduled",
            Self::FailedPermanent => "FailedPermanent",
        }
    }
}

impl std::fmt::Display for CallbackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pluggable persistence for callback state transitions.
#[async_trait]
pub trait CallbackStore: Send + Sync {
    /// Records a freshly enqueued request in the `New` state.
    async fn record_new(&self, request: &CallbackRequest) -> Result<(), Error>;

    /// Marks a request as picked up by the worker.
    async fn mark_in_flight(&self, request: &CallbackRequest) -> Result<(), Error>;

    /// Marks a request as delivered; terminal.
    async fn mark_succeeded(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error>;

    /// Marks a request as scheduled for a later attempt.
    async fn mark_retry_scheduled(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error>;

    /// Marks a request as permanently failed; terminal.
    async fn mark_failed_permanent(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error>;

    /// Recovery read: at most `max` non-terminal, non-in-flight requests
    /// whose `next_attempt_at` is due, in FIFO order (ties broken by
    /// insertion order). State is not transitioned; the worker owns
    /// sequencing.
    async fn dequeue_due(&self, max: usize) -> Result<Vec<CallbackRequest>, Error>;
}
