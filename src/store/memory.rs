//! In-memory reference implementation of the callback store.
//!
//! Keeps every tracked request in a mutex-guarded map with a monotonic
//! insertion sequence for FIFO recovery ordering. Invalid transitions
//! (anything out of a terminal state) are rejected so worker sequencing
//! bugs become visible.

use crate::error::Error;
use crate::request::{CallbackRequest, CallbackResult};
use crate::store::{CallbackState, CallbackStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct TrackedCallback {
    request: CallbackRequest,
    state: CallbackState,
    last_result: Option<CallbackResult>,
    sequence: u64,
}

/// Mutex-backed store suitable for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct InMemoryCallbackStore {
    entries: Mutex<HashMap<String, TrackedCallback>>,
    sequence: AtomicU64,
}

impl InMemoryCallbackStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a tracked request.
    pub async fn state_of(&self, request_id: &str) -> Option<CallbackState> {
        self.entries
            .lock()
            .await
            .get(request_id)
            .map(|entry| entry.state)
    }

    /// Last recorded attempt outcome of a tracked request.
    pub async fn last_result_of(&self, request_id: &str) -> Option<CallbackResult> {
        self.entries
            .lock()
            .await
            .get(request_id)
            .and_then(|entry| entry.last_result.clone())
    }

    async fn transition(
        &self,
        request: &CallbackRequest,
        to: CallbackState,
        result: Option<&CallbackResult>,
    ) -> Result<(), Error> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(&request.id)
            .ok_or_else(|| Error::request_not_tracked(&request.id))?;

        if entry.state.is_terminal() {
            return Err(Error::invalid_state_transition(
                &request.id,
                entry.state.as_str(),
                to.as_str(),
            ));
        }

        entry.state = to;
        entry.request = request.clone();
        if let Some(result) = result {
            entry.last_result = Some(result.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl CallbackStore for InMemoryCallbackStore {
    async fn record_new(&self, request: &CallbackRequest) -> Result<(), Error> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().await;
        entries.insert(
            request.id.clone(),
            TrackedCallback {
                request: request.clone(),
                state: CallbackState::New,
                last_result: None,
                sequence,
            },
        );
        Ok(())
    }

    async fn mark_in_flight(&self, request: &CallbackRequest) -> Result<(), Error> {
        self.transition(request, CallbackState::InFlight, None).await
    }

    async fn mark_succeeded(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.transition(request, CallbackState::Succeeded, Some(result))
            .await
    }

    async fn mark_retry_scheduled(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.transition(request, CallbackState::RetryScheduled, Some(result))
            .await
    }

    async fn mark_failed_permanent(
        &self,
        request: &CallbackRequest,
        result: &CallbackResult,
    ) -> Result<(), Error> {
        self.transition(request, CallbackState::FailedPermanent, Some(result))
            .await
    }

    async fn dequeue_due(&self, max: usize) -> Result<Vec<CallbackRequest>, Error> {
        let now = Utc::now();
        let entries = self.entries.lock().await;

        let mut due: Vec<&TrackedCallback> = entries
            .values()
            .filter(|entry| {
                matches!(
                    entry.state,
                    CallbackState::New | CallbackState::RetryScheduled
                ) && entry.request.next_attempt_at <= now
            })
            .collect();

        due.sort_by_key(|entry| (entry.request.next_attempt_at, entry.sequence));
        Ok(due
            .into_iter()
            .take(max)
            .map(|entry| entry.request.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::HeaderMap;
    use chrono::Duration as ChronoDuration;
    use reqwest::Url;
    use std::time::Duration;

    fn request(id: &str) -> CallbackRequest {
        let now = Utc::now();
        CallbackRequest {
            id: id.into(),
            callback_id: "cb".into(),
            operation_id: "cb__post".into(),
            target_url: Url::parse("https://rx.example/hook").unwrap(),
            method: "POST".into(),
            headers: HeaderMap::new(),
            content_type: "application/json".into(),
            body: None,
            correlation_id: "t".into(),
            idempotency_key: "t:cb:cb__post".into(),
            attempt: 0,
            created_at: now,
            next_attempt_at: now,
            timeout: Duration::from_secs(30),
            signature_key_id: None,
        }
    }

    #[tokio::test]
    async fn happy_path_reaches_succeeded() {
        let store = InMemoryCallbackStore::new();
        let req = request("r-1");

        store.record_new(&req).await.unwrap();
        assert_eq!(store.state_of("r-1").await, Some(CallbackState::New));

        store.mark_in_flight(&req).await.unwrap();
        store
            .mark_succeeded(&req, &CallbackResult::succeeded(200))
            .await
            .unwrap();
        assert_eq!(store.state_of("r-1").await, Some(CallbackState::Succeeded));
    }

    #[tokio::test]
    async fn terminal_states_reject_further_transitions() {
        let store = InMemoryCallbackStore::new();
        let req = request("r-1");
        store.record_new(&req).await.unwrap();
        store.mark_in_flight(&req).await.unwrap();
        store
            .mark_failed_permanent(&req, &CallbackResult::http_error(400, "Bad Request", None))
            .await
            .unwrap();

        let err = store
            .mark_succeeded(&req, &CallbackResult::succeeded(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FailedPermanent"), "got: {err}");
        assert_eq!(
            store.state_of("r-1").await,
            Some(CallbackState::FailedPermanent)
        );
    }

    #[tokio::test]
    async fn untracked_requests_are_rejected() {
        let store = InMemoryCallbackStore::new();
        assert!(store.mark_in_flight(&request("ghost")).await.is_err());
    }

    #[tokio::test]
    async fn dequeue_due_returns_fifo_and_respects_max() {
        let store = InMemoryCallbackStore::new();
        let past = Utc::now() - ChronoDuration::seconds(5);

        for id in ["a", "b", "c"] {
            let mut req = request(id);
            req.next_attempt_at = past;
            store.record_new(&req).await.unwrap();
        }

        let due = store.dequeue_due(2).await.unwrap();
        let ids: Vec<_> = due.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn dequeue_due_orders_by_next_attempt_then_insertion() {
        let store = InMemoryCallbackStore::new();
        let now = Utc::now();

        let mut late = request("late");
        late.next_attempt_at = now - ChronoDuration::seconds(1);
        let mut early = request("early");
        early.next_attempt_at = now - ChronoDuration::seconds(10);

        store.record_new(&late).await.unwrap();
        store.record_new(&early).await.unwrap();

        let due = store.dequeue_due(10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn dequeue_due_skips_in_flight_terminal_and_future() {
        let store = InMemoryCallbackStore::new();
        let past = Utc::now() - ChronoDuration::seconds(5);

        let mut flying = request("flying");
        flying.next_attempt_at = past;
        store.record_new(&flying).await.unwrap();
        store.mark_in_flight(&flying).await.unwrap();

        let mut done = request("done");
        done.next_attempt_at = past;
        store.record_new(&done).await.unwrap();
        store.mark_in_flight(&done).await.unwrap();
        store
            .mark_succeeded(&done, &CallbackResult::succeeded(200))
            .await
            .unwrap();

        let mut future = request("future");
        future.next_attempt_at = Utc::now() + ChronoDuration::seconds(60);
        store.record_new(&future).await.unwrap();

        let mut scheduled = request("scheduled");
        scheduled.next_attempt_at = past;
        store.record_new(&scheduled).await.unwrap();
        store.mark_in_flight(&scheduled).await.unwrap();
        store
            .mark_retry_scheduled(
                &scheduled,
                &CallbackResult::http_error(503, "Service Unavailable", None),
            )
            .await
            .unwrap();

        let due = store.dequeue_due(10).await.unwrap();
        let ids: Vec<_> = due.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["scheduled"]);
    }
}
