//! Dispatcher worker: drains the queue and drives deliveries to a terminal
//! outcome.
//!
//! The worker is a long-running task. Each queue item is dispatched on its
//! own spawned task gated by a semaphore permit, so one slow receiver never
//! stalls the read loop. Retries are scheduled as delayed re-enqueues; a
//! retried item may be dispatched after later first-time items, so there is
//! no ordering guarantee across attempts.

use crate::logging;
use crate::queue::{CallbackQueue, CallbackQueueReceiver};
use crate::request::{CallbackRequest, CallbackResult};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::sender::CallbackSender;
use crate::store::CallbackStore;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Concurrency shape of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of concurrent in-flight deliveries.
    pub max_concurrency: usize,
    /// Optional requests-per-second quota across all deliveries.
    pub rate_limit: Option<u32>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            rate_limit: None,
        }
    }
}

/// Default concurrency bound: a small multiple of the CPU count.
#[must_use]
pub fn default_max_concurrency() -> usize {
    std::thread::available_parallelism().map_or(8, |n| n.get() * 2)
}

/// Background worker draining the callback queue.
pub struct CallbackDispatcher {
    receiver: CallbackQueueReceiver,
    queue: CallbackQueue,
    sender: Arc<dyn CallbackSender>,
    store: Option<Arc<dyn CallbackStore>>,
    policy: Arc<dyn RetryPolicy>,
    semaphore: Arc<Semaphore>,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
    shutdown: CancellationToken,
}

impl CallbackDispatcher {
    /// # Panics
    ///
    /// Panics if `config.rate_limit` is configured as 0 (which would be
    /// invalid).
    #[must_use]
    pub fn new(
        receiver: CallbackQueueReceiver,
        queue: CallbackQueue,
        sender: Arc<dyn CallbackSender>,
        store: Option<Arc<dyn CallbackStore>>,
        policy: Arc<dyn RetryPolicy>,
        config: &DispatcherConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let rate_limiter = config.rate_limit.map(|limit| {
            Arc::new(RateLimiter::direct(Quota::per_second(
                NonZeroU32::new(limit).unwrap_or(NonZeroU32::new(1).expect("1 is non-zero")),
            )))
        });

        Self {
            receiver,
            queue,
            sender,
            store,
            policy,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            rate_limiter,
            shutdown,
        }
    }

    /// Starts the worker as a background task.
    #[must_use]
    pub fn spawn(self) -> DispatcherHandle {
        let shutdown = self.shutdown.clone();
        let join = tokio::spawn(self.run());
        DispatcherHandle { shutdown, join }
    }

    async fn run(mut self) {
        debug!("callback dispatcher started");
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                item = self.receiver.recv() => {
                    let Some(request) = item else { break };
                    self.dispatch(request);
                }
            }
        }
        debug!("callback dispatcher stopped");
    }

    /// Launches one delivery as an independent in-flight task.
    fn dispatch(&self, request: CallbackRequest) {
        let sender = Arc::clone(&self.sender);
        let store = self.store.clone();
        let policy = Arc::clone(&self.policy);
        let queue = self.queue.clone();
        let semaphore = Arc::clone(&self.semaphore);
        let rate_limiter = self.rate_limiter.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if let Some(limiter) = &rate_limiter {
                limiter.until_ready().await;
            }
            deliver(request, &sender, store.as_deref(), &*policy, &queue, &shutdown).await;
        });
    }
}

/// Handle to a spawned dispatcher.
pub struct DispatcherHandle {
    shutdown: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl DispatcherHandle {
    /// Token propagated to in-flight sends and retry timers.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Requests graceful shutdown and waits for the read loop to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "callback dispatcher task failed");
        }
    }
}

/// Drives one request through a single attempt and its retry decision.
async fn deliver(
    mut request: CallbackRequest,
    sender: &Arc<dyn CallbackSender>,
    store: Option<&dyn CallbackStore>,
    policy: &dyn RetryPolicy,
    queue: &CallbackQueue,
    shutdown: &CancellationToken,
) {
    if let Some(store) = store {
        if let Err(e) = store.mark_in_flight(&request).await {
            warn!(request_id = %request.id, error = %e, "failed to record in-flight transition");
        }
    }

    let result = match sender.send(&request, shutdown).await {
        Ok(result) => result,
        Err(e) if e.is_cancellation() => {
            debug!(
                callback_id = %request.callback_id,
                "attempt canceled during shutdown"
            );
            return;
        }
        Err(e) => CallbackResult::handler_exception(e.to_string()),
    };

    if result.success {
        debug!(
            callback_id = %request.callback_id,
            operation_id = %request.operation_id,
            status = result.status_code,
            attempt = request.attempt,
            "callback delivered"
        );
        if let Some(store) = store {
            if let Err(e) = store.mark_succeeded(&request, &result).await {
                warn!(request_id = %request.id, error = %e, "failed to record success");
            }
        }
        return;
    }

    match policy.evaluate(&request, &result) {
        RetryDecision::Retry {
            next_at,
            delay,
            reason,
        } => {
            request.attempt += 1;
            request.next_attempt_at = next_at;
            if let Some(store) = store {
                if let Err(e) = store.mark_retry_scheduled(&request, &result).await {
                    warn!(request_id = %request.id, error = %e, "failed to record retry");
                }
            }
            debug!(
                callback_id = %request.callback_id,
                attempt = request.attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                reason = %reason,
                "scheduling callback retry"
            );

            // The timer runs outside the delivery task so the concurrency
            // permit only bounds actual sends.
            let queue = queue.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!(
                            callback_id = %request.callback_id,
                            "shutdown requested, abandoning scheduled retry"
                        );
                    }
                    () = tokio::time::sleep(delay) => {
                        if let Err(e) = queue.enqueue(request, &shutdown).await {
                            if e.is_cancellation() {
                                debug!("shutdown requested, abandoning scheduled retry");
                            } else {
                                warn!(error = %e, "failed to re-enqueue scheduled retry");
                            }
                        }
                    }
                }
            });
        }
        RetryDecision::Stop { reason } => {
            if let Some(store) = store {
                if let Err(e) = store.mark_failed_permanent(&request, &result).await {
                    warn!(request_id = %request.id, error = %e, "failed to record permanent failure");
                }
            }
            logging::log_permanent_failure(&request, &result, &reason);
        }
    }
}
