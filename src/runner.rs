//! Mutation Runner
//!
//! Wraps one remote mutation and exposes a trigger plus the latest observable
//! state. Triggers may overlap freely; every call is stamped with a token from
//! the runner's sequence counter and only the call holding the current token
//! may write state when it settles. Older calls still run their callbacks.

use crate::client::{ClientHandle, MutationRequest, MutationResponse, RefetchQuery, UpdateFn};
use crate::document::{Document, DocumentClassifier, OperationKind, SourceClassifier};
use crate::error::{OperationFailure, RunnerError};
use crate::state::{CallToken, MutationResult, MutationState, SequenceCounter};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Success callback. Receives the data of the call that settled.
pub type CompletedFn = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// Failure callback. Receives the failure of the call that settled.
pub type ErrorFn = Arc<dyn Fn(&OperationFailure) + Send + Sync>;

/// Per-render description of the operation.
#[derive(Clone)]
pub struct MutationConfig {
    pub document: Document,
    pub variables: Value,
    pub optimistic_response: Option<Value>,
    pub refetch_queries: Vec<RefetchQuery>,
    pub await_refetch_queries: bool,
    pub update: Option<UpdateFn>,
    pub on_completed: Option<CompletedFn>,
    pub on_error: Option<ErrorFn>,
    /// Skip loading/data writes; callbacks still fire.
    pub ignore_results: bool,
    pub context: Map<String, Value>,
}

impl MutationConfig {
    pub fn new(document: impl Into<Document>) -> Self {
        Self {
            document: document.into(),
            variables: Value::Object(Map::new()),
            optimistic_response: None,
            refetch_queries: Vec::new(),
            await_refetch_queries: false,
            update: None,
            on_completed: None,
            on_error: None,
            ignore_results: false,
            context: Map::new(),
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_optimistic_response(mut self, optimistic: Value) -> Self {
        self.optimistic_response = Some(optimistic);
        self
    }

    pub fn with_refetch_queries(mut self, queries: Vec<RefetchQuery>) -> Self {
        self.refetch_queries = queries;
        self
    }

    pub fn with_update(mut self, update: impl Fn(&MutationResponse) + Send + Sync + 'static) -> Self {
        self.update = Some(Arc::new(update));
        self
    }

    pub fn on_completed(mut self, callback: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&OperationFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn ignore_results(mut self, ignore: bool) -> Self {
        self.ignore_results = ignore;
        self
    }

    /// Assemble the request for one call. Options replace, never merge.
    fn request(&self, options: MutationOptions) -> MutationRequest {
        MutationRequest {
            document: self.document.clone(),
            variables: options.variables.unwrap_or_else(|| self.variables.clone()),
            optimistic_response: options
                .optimistic_response
                .or_else(|| self.optimistic_response.clone()),
            refetch_queries: options
                .refetch_queries
                .unwrap_or_else(|| self.refetch_queries.clone()),
            await_refetch_queries: options
                .await_refetch_queries
                .unwrap_or(self.await_refetch_queries),
            update: options.update.or_else(|| self.update.clone()),
            context: options.context.unwrap_or_else(|| self.context.clone()),
        }
    }
}

impl fmt::Debug for MutationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationConfig")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .field("optimistic_response", &self.optimistic_response)
            .field("refetch_queries", &self.refetch_queries)
            .field("await_refetch_queries", &self.await_refetch_queries)
            .field("has_update", &self.update.is_some())
            .field("has_on_completed", &self.on_completed.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .field("ignore_results", &self.ignore_results)
            .field("context", &self.context)
            .finish()
    }
}

/// Overrides for a single trigger call. Unset fields fall back to the config.
#[derive(Clone, Default)]
pub struct MutationOptions {
    pub variables: Option<Value>,
    pub optimistic_response: Option<Value>,
    pub refetch_queries: Option<Vec<RefetchQuery>>,
    pub await_refetch_queries: Option<bool>,
    pub update: Option<UpdateFn>,
    pub context: Option<Map<String, Value>>,
}

impl MutationOptions {
    pub fn with_variables(variables: Value) -> Self {
        Self {
            variables: Some(variables),
            ..Self::default()
        }
    }
}

struct Shared {
    config: MutationConfig,
    client: ClientHandle,
    counter: SequenceCounter,
    state: MutationState,
    torn_down: bool,
}

struct Inner {
    shared: Mutex<Shared>,
    state_tx: watch::Sender<MutationState>,
    classifier: Arc<dyn DocumentClassifier>,
    runtime: Handle,
}

impl Inner {
    /// Record a new state and notify subscribers. Caller holds the lock.
    fn publish(&self, shared: &mut Shared, state: MutationState) {
        shared.state = state.clone();
        self.state_tx.send_replace(state);
    }

    fn issue(self: &Arc<Self>, options: MutationOptions) {
        let (token, request, client) = {
            let mut shared = self.shared.lock();
            if shared.torn_down {
                debug!("Trigger ignored after teardown");
                return;
            }

            if !shared.state.loading && !shared.config.ignore_results {
                self.publish(&mut shared, MutationState::pending());
            }

            let token = shared.counter.next();
            let request = shared.config.request(options);
            (token, request, shared.client.clone())
        };

        debug!(epoch = token.epoch, seq = token.seq, "Mutation issued");

        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let outcome = client.execute(request).await;
            match weak.upgrade() {
                Some(inner) => inner.settle(token, outcome),
                None => debug!(
                    epoch = token.epoch,
                    seq = token.seq,
                    "Mutation settled after runner was dropped"
                ),
            }
        });
    }

    fn settle(&self, token: CallToken, outcome: Result<MutationResponse, OperationFailure>) {
        let mut shared = self.shared.lock();
        if shared.torn_down {
            debug!(epoch = token.epoch, seq = token.seq, "Mutation settled after teardown");
            return;
        }

        let current = shared.counter.is_current(token);
        if !current {
            debug!(
                epoch = token.epoch,
                seq = token.seq,
                latest = shared.counter.current().seq,
                "Stale mutation result suppressed from state"
            );
        }

        match outcome {
            Ok(response) => {
                let callback = shared.config.on_completed.clone();
                if current {
                    if !shared.config.ignore_results {
                        let state = MutationState {
                            called: true,
                            loading: false,
                            data: response.data.clone(),
                            error: None,
                        };
                        self.publish(&mut shared, state);
                    } else if shared.state.loading {
                        let state = MutationState {
                            loading: false,
                            ..shared.state.clone()
                        };
                        self.publish(&mut shared, state);
                    }
                    debug!(epoch = token.epoch, seq = token.seq, "Mutation succeeded");
                }
                drop(shared);

                if let Some(callback) = callback {
                    callback(response.data.as_ref());
                }
            }
            Err(failure) => {
                let callback = shared.config.on_error.clone();
                if current {
                    let state = MutationState {
                        called: true,
                        loading: false,
                        data: None,
                        error: Some(failure.clone()),
                    };
                    self.publish(&mut shared, state);
                    debug!(epoch = token.epoch, seq = token.seq, error = %failure, "Mutation failed");
                }
                drop(shared);

                match callback {
                    Some(callback) => callback(&failure),
                    None => warn!(error = %failure, "Mutation failed with no error callback"),
                }
            }
        }
    }
}

/// Cloneable trigger handed to renderers. Inert once the runner is gone.
#[derive(Clone)]
pub struct Trigger {
    inner: Weak<Inner>,
}

impl Trigger {
    pub fn call(&self) {
        self.call_with(MutationOptions::default());
    }

    pub fn call_with(&self, options: MutationOptions) {
        if let Some(inner) = self.inner.upgrade() {
            inner.issue(options);
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("live", &(self.inner.strong_count() > 0))
            .finish()
    }
}

pub struct MutationRunner {
    inner: Arc<Inner>,
}

impl MutationRunner {
    /// Build a runner with the default document classifier on the current
    /// tokio runtime.
    pub fn new(config: MutationConfig, client: Option<ClientHandle>) -> Result<Self, RunnerError> {
        Self::with_classifier(config, client, Arc::new(SourceClassifier))
    }

    pub fn with_classifier(
        config: MutationConfig,
        client: Option<ClientHandle>,
        classifier: Arc<dyn DocumentClassifier>,
    ) -> Result<Self, RunnerError> {
        let runtime = Handle::try_current().map_err(|e| {
            RunnerError::ConfigError(format!("No async runtime available: {}", e))
        })?;
        Self::with_runtime(config, client, classifier, runtime)
    }

    pub fn with_runtime(
        config: MutationConfig,
        client: Option<ClientHandle>,
        classifier: Arc<dyn DocumentClassifier>,
        runtime: Handle,
    ) -> Result<Self, RunnerError> {
        let client = client.ok_or(RunnerError::MissingClient)?;
        verify_is_mutation(classifier.as_ref(), &config.document)?;

        let initial = MutationState::default();
        let (state_tx, _) = watch::channel(initial.clone());
        let shared = Shared {
            config,
            client,
            counter: SequenceCounter::default(),
            state: initial,
            torn_down: false,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(shared),
                state_tx,
                classifier,
                runtime,
            }),
        })
    }

    /// Fire the mutation with the current configuration.
    pub fn trigger(&self) {
        self.inner.issue(MutationOptions::default());
    }

    pub fn trigger_with(&self, options: MutationOptions) {
        self.inner.issue(options);
    }

    pub fn trigger_handle(&self) -> Trigger {
        Trigger {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn state(&self) -> MutationState {
        self.inner.shared.lock().state.clone()
    }

    pub fn result(&self) -> Option<MutationResult> {
        self.inner.shared.lock().state.result()
    }

    /// Receiver that sees every state write.
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.inner.state_tx.subscribe()
    }

    /// Run a render pass: `render` is invoked synchronously with a trigger and
    /// the current result, or `None` before the first call.
    pub fn render<R>(&self, render: impl FnOnce(Trigger, Option<MutationResult>) -> R) -> R {
        let result = self.result();
        render(self.trigger_handle(), result)
    }

    /// Apply new props and client from the host.
    ///
    /// A changed document is re-validated before anything is applied. A
    /// different client resets the state to not-called and starts a new token
    /// epoch; calls in flight against the old client become stale.
    pub fn reconfigure(
        &mut self,
        config: MutationConfig,
        client: Option<ClientHandle>,
    ) -> Result<(), RunnerError> {
        let client = client.ok_or(RunnerError::MissingClient)?;
        let mut shared = self.inner.shared.lock();

        if config.document != shared.config.document {
            verify_is_mutation(self.inner.classifier.as_ref(), &config.document)?;
        }

        if !shared.client.same_client(&client) {
            info!("Executing client changed, resetting mutation state");
            shared.client = client;
            shared.counter.reset();
            self.inner.publish(&mut shared, MutationState::default());
        }

        shared.config = config;
        Ok(())
    }

    /// Tear the runner down. Calls still in flight settle as no-ops.
    pub fn teardown(self) {}
}

impl Drop for MutationRunner {
    fn drop(&mut self) {
        self.inner.shared.lock().torn_down = true;
    }
}

impl fmt::Debug for MutationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("MutationRunner")
            .field("config", &shared.config)
            .field("state", &shared.state)
            .field("token", &shared.counter.current())
            .finish()
    }
}

fn verify_is_mutation(
    classifier: &dyn DocumentClassifier,
    document: &Document,
) -> Result<(), RunnerError> {
    match classifier.classify(document)? {
        OperationKind::Mutation => Ok(()),
        kind => Err(RunnerError::WrongOperationKind { kind }),
    }
}
