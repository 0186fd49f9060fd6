//! Bounded FIFO handoff between the enqueue entry point and the dispatcher.
//!
//! Producers block (await) when the queue is full; consumers receive items
//! in enqueue order. The queue is the only shared mutable structure on the
//! fast path and is internally synchronized by the channel.

use crate::error::Error;
use crate::request::CallbackRequest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Producer half of the callback queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CallbackQueue {
    sender: mpsc::Sender<CallbackRequest>,
}

/// Consumer half, owned by the dispatcher worker.
#[derive(Debug)]
pub struct CallbackQueueReceiver {
    receiver: mpsc::Receiver<CallbackRequest>,
}

/// Creates a bounded queue with the given capacity.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn bounded(capacity: usize) -> (CallbackQueue, CallbackQueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        CallbackQueue { sender },
        CallbackQueueReceiver { receiver },
    )
}

impl CallbackQueue {
    /// Enqueues a request, waiting for capacity when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `Canceled` when the token fires while waiting and
    /// `Runtime` when the queue has been closed by the consumer.
    pub async fn enqueue(
        &self,
        request: CallbackRequest,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        tokio::select! {
            () = cancel.cancelled() => Err(Error::dispatch_canceled()),
            sent = self.sender.send(request) => sent.map_err(|_| Error::queue_closed()),
        }
    }

    /// Number of requests currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CallbackQueueReceiver {
    /// Receives the next request in enqueue order; `None` when every
    /// producer has been dropped.
    pub async fn recv(&mut self) -> Option<CallbackRequest> {
        self.receiver.recv().await
    }

    /// Closes the queue: producers observe `queue_closed` on enqueue.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::HeaderMap;
    use chrono::Utc;
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
    async fn preserves_fifo_order() {
        let (queue, mut receiver) = bounded(8);
        let cancel = CancellationToken::new();

        for id in ["a", "b", "c"] {
            queue.enqueue(request(id), &cancel).await.unwrap();
        }

        assert_eq!(receiver.recv().await.unwrap().id, "a");
        assert_eq!(receiver.recv().await.unwrap().id, "b");
        assert_eq!(receiver.recv().await.unwrap().id, "c");
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (queue, mut receiver) = bounded(1);
        let cancel = CancellationToken::new();
        queue.enqueue(request("first"), &cancel).await.unwrap();
        assert_eq!(queue.len(), 1);

        let blocked = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.enqueue(request("second"), &cancel).await })
        };

        // The producer cannot finish until a slot frees up.
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        assert_eq!(receiver.recv().await.unwrap().id, "first");
        blocked.await.unwrap().unwrap();
        assert_eq!(receiver.recv().await.unwrap().id, "second");
    }

    #[tokio::test]
    async fn cancellation_interrupts_blocked_enqueue() {
        let (queue, _receiver) = bounded(1);
        let cancel = CancellationToken::new();
        queue.enqueue(request("fill"), &cancel).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.enqueue(request("waiting"), &cancel).await })
        };

        cancel.cancel();
        let err = blocked.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn closed_queue_rejects_enqueue() {
        let (queue, mut receiver) = bounded(1);
        receiver.close();
        let err = queue
            .enqueue(request("late"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(!err.is_cancellation());
        assert!(err.to_string().contains("closed"), "got: {err}");
    }
}
