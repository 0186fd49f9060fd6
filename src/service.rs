//! Service composition: the enqueue entry point over a compiled plan
//! registry, plus the builder that wires queue, sender, store, and worker
//! together.

use crate::config::CallbackOptions;
use crate::context::CallbackRuntimeContext;
use crate::error::Error;
use crate::plan::{CallbackExecutionPlan, CallbackPlan, PlanCompiler};
use crate::queue::{self, CallbackQueue};
use crate::request::{FactoryOptions, RequestFactory};
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};
use crate::sender::{CallbackSender, HttpCallbackSender};
use crate::signer::CallbackSigner;
use crate::store::CallbackStore;
use crate::vars::HeaderMap;
use crate::worker::{CallbackDispatcher, DispatcherConfig, DispatcherHandle};
use indexmap::IndexMap;
use openapiv3::OpenAPI;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The outbound callback engine's public entry point.
///
/// Holds the compiled plan registry and the producer half of the queue.
/// The paired [`DispatcherHandle`] owns the background worker.
pub struct CallbackService {
    plans: IndexMap<String, CallbackPlan>,
    factory: RequestFactory,
    queue: CallbackQueue,
    store: Option<Arc<dyn CallbackStore>>,
}

impl CallbackService {
    #[must_use]
    pub fn builder(options: CallbackOptions) -> CallbackServiceBuilder {
        CallbackServiceBuilder {
            options,
            plans: Vec::new(),
            store: None,
            signer: None,
            policy: None,
            sender: None,
        }
    }

    /// Compiled plans in registration order.
    pub fn plans(&self) -> impl Iterator<Item = &CallbackPlan> {
        self.plans.values()
    }

    /// Looks up a plan by operation id.
    #[must_use]
    pub fn plan(&self, operation_id: &str) -> Option<&CallbackPlan> {
        self.plans.get(operation_id)
    }

    /// All plans declared under one callback id, in registration order.
    pub fn plans_for_callback<'a>(
        &'a self,
        callback_id: &'a str,
    ) -> impl Iterator<Item = &'a CallbackPlan> {
        self.plans
            .values()
            .filter(move |plan| plan.callback_id == callback_id)
    }

    /// Number of requests currently buffered in the queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Resolves, assembles, and enqueues one callback.
    ///
    /// Returns the delivery's request id. On a resolution failure the
    /// callback is not enqueued and the queue is untouched.
    ///
    /// # Errors
    ///
    /// Returns `Resolution` errors from URL/body assembly, `Storage`
    /// errors from the store, `Canceled` when the token fires while the
    /// queue is full, and `Runtime` when the dispatcher has shut down.
    pub async fn enqueue(
        &self,
        execution: &CallbackExecutionPlan,
        ctx: &CallbackRuntimeContext,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let request = self.factory.from_plan(execution, ctx)?;

        if let Some(store) = &self.store {
            store.record_new(&request).await?;
        }

        let request_id = request.id.clone();
        debug!(
            request_id = %request_id,
            callback_id = %execution.plan.callback_id,
            operation_id = %execution.plan.operation_id,
            "enqueuing callback"
        );
        self.queue.enqueue(request, cancel).await?;
        Ok(request_id)
    }

    /// Enqueues a registered operation with no per-request parameter
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns `Specification` when the operation id is unknown, plus the
    /// error cases of [`Self::enqueue`].
    pub async fn enqueue_operation(
        &self,
        operation_id: &str,
        ctx: &CallbackRuntimeContext,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let plan = self
            .plan(operation_id)
            .ok_or_else(|| Error::operation_not_found(operation_id))?
            .clone();
        self.enqueue(&CallbackExecutionPlan::new(plan), ctx, cancel)
            .await
    }

    /// Drains due requests from the store back into the queue, up to `max`.
    ///
    /// Intended to run at startup before live traffic so a durable store
    /// survives a restart. Returns the number of requests re-enqueued.
    ///
    /// # Errors
    ///
    /// Returns `Storage` errors from the store and `Canceled`/`Runtime`
    /// errors from the queue.
    pub async fn recover(&self, max: usize, cancel: &CancellationToken) -> Result<usize, Error> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let due = store.dequeue_due(max).await?;
        let count = due.len();
        for request in due {
            debug!(request_id = %request.id, "re-enqueuing recovered callback");
            self.queue.enqueue(request, cancel).await?;
        }
        Ok(count)
    }
}

/// Builder wiring plans, store, signer, policy, and worker together.
pub struct CallbackServiceBuilder {
    options: CallbackOptions,
    plans: Vec<CallbackPlan>,
    store: Option<Arc<dyn CallbackStore>>,
    signer: Option<Arc<dyn CallbackSigner>>,
    policy: Option<Arc<dyn RetryPolicy>>,
    sender: Option<Arc<dyn CallbackSender>>,
}

impl CallbackServiceBuilder {
    /// Compiles every callback declaration of an OpenAPI document.
    #[must_use]
    pub fn compile_document(mut self, document: &OpenAPI) -> Self {
        self.plans.extend(PlanCompiler::new().compile(document));
        self
    }

    /// Registers a single plan.
    #[must_use]
    pub fn register_plan(mut self, plan: CallbackPlan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Plugs in durable persistence for state transitions.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CallbackStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enables request signing on the default HTTP sender.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn CallbackSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Replaces the default exponential backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Replaces the HTTP sender, mainly for tests and alternative
    /// transports. A configured signer is ignored in that case.
    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn CallbackSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Validates options and plans, then starts the dispatcher.
    ///
    /// Must be called from within a Tokio runtime: the dispatcher is
    /// spawned as a background task.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid options, `Specification` for
    /// invalid plans, and client construction errors from the sender.
    pub fn build(self) -> Result<(CallbackService, DispatcherHandle), Error> {
        self.options.validate()?;

        let mut plans = IndexMap::with_capacity(self.plans.len());
        for plan in self.plans {
            plan.validate()?;
            if let Some(previous) = plans.insert(plan.operation_id.clone(), plan) {
                debug!(
                    operation_id = %previous.operation_id,
                    "duplicate callback operation id, later registration wins"
                );
            }
        }

        let sender: Arc<dyn CallbackSender> = match self.sender {
            Some(sender) => sender,
            None => {
                let mut http = HttpCallbackSender::new()?;
                if let Some(signer) = self.signer {
                    http = http.with_signer(signer);
                }
                Arc::new(http)
            }
        };

        let policy: Arc<dyn RetryPolicy> = self.policy.unwrap_or_else(|| {
            Arc::new(ExponentialBackoffPolicy::new(self.options.retry.clone()))
        });

        let mut static_headers = HeaderMap::new();
        for (name, value) in &self.options.static_headers {
            static_headers.insert(name.clone(), value.clone());
        }

        let factory = RequestFactory::new(FactoryOptions {
            default_timeout: self.options.default_timeout,
            static_headers,
            signature_key_id: self.options.signature_key_id.clone(),
        });

        let (queue, receiver) = queue::bounded(self.options.queue_capacity);
        let shutdown = CancellationToken::new();
        let dispatcher = CallbackDispatcher::new(
            receiver,
            queue.clone(),
            sender,
            self.store.clone(),
            policy,
            &DispatcherConfig {
                max_concurrency: self.options.max_concurrency,
                rate_limit: self.options.rate_limit,
            },
            shutdown,
        );
        let handle = dispatcher.spawn();

        let service = CallbackService {
            plans,
            factory,
            queue,
            store: self.store,
        };
        Ok((service, handle))
    }
}
