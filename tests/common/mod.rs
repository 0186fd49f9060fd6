//! Shared test doubles for integration tests.

use async_trait::async_trait;
use kestrun_callbacks::error::Error;
use kestrun_callbacks::request::{CallbackRequest, CallbackResult};
use kestrun_callbacks::store::{CallbackStore, InMemoryCallbackStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Store double that records every transition while delegating to the
/// in-memory store.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryCallbackStore,
    transitions: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inner(&self) -> &InMemoryCallbackStore {
        &self.inner
    }

    pub async fn transitions_for(&self, request_id: &str) -> Vec<String> {
        self.transitions
            .lock()
            .await
            .iter()
            .filter(|(_, id)| id == request_id)
            .map(|(transition, _)| transition.clone())
            .collect()
    }

    pub async fn count(&self, request_id: &str, transition: &str) -> usize {
        self.transitions_for(request_id)
            .await
            .iter()
            .filter(|t| *t == transition)
            .count()
    }

    async fn record(&self, transition: &str, request_id: &str) {
        self.transitions
            .lock()
            .await
            .push((transition.to_string(), request_id.to_string()));
    }
}

#[async_trait]
impl CallbackStore for RecordingStore {
    async fn record_new(&self, request: &CallbackRequest) -> Result<(), Error> {
        self.record("new", &request.id).await;
        self.inner.record_new(request).await
    }

    async fn mark_in_flight(&self, request: &CallbackRequest) -> Result<(), Error> {
        self.record("in_flight", &request.id).await;
        self.inner.mark_in_flight(request).await
    }

    async fn mark_succeeded(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.record("succeeded", &request.id).await;
        self.inner.mark_succeeded(request, result).await
    }

    async fn mark_retry_scheduled(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.record("retry_scheduled", &request.id).await;
        self.inner.mark_retry_scheduled(request, result).await
    }

    async fn mark_failed_permanent(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.record("failed_permanent", &request.id).await;
        self.inner.mark_failed_permanent(request, result).await
    }

    async fn dequeue_due(&self, max: usize) -> Result<Vec<CallbackRequest>, Error> {
        self.inner.dequeue_due(max).await
    }
}

/// Polls the store until the request reaches a terminal state.
pub async fn wait_for_terminal(
    store: &RecordingStore,
    request_id: &str,
) -> kestrun_callbacks::store::CallbackState {
    for _ in 0..400 {
        if let Some(state) = store.inner().state_of(request_id).await {
            if state.is_terminal() {
                return state;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request '{request_id}' never reached a terminal state");
}
