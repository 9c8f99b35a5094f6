//! Remote client boundary
//!
//! The runner hands a fully assembled [`MutationRequest`] to a
//! [`MutationClient`] and awaits the outcome. It never retries, batches or
//! reshapes the call; the client owns transport and caching.

use crate::document::Document;
use crate::error::OperationFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Merge callback handed through to the client, which invokes it with the
/// raw result once the operation lands in its store.
pub type UpdateFn = Arc<dyn Fn(&MutationResponse) + Send + Sync>;

/// A query to refresh after the mutation completes.
#[derive(Debug, Clone, PartialEq)]
pub enum RefetchQuery {
    /// Refresh an already active query by operation name.
    Named(String),
    /// Run a query document with explicit variables.
    Document { document: Document, variables: Value },
}

impl RefetchQuery {
    pub fn named(name: impl Into<String>) -> Self {
        RefetchQuery::Named(name.into())
    }

    pub fn document(document: Document, variables: Value) -> Self {
        RefetchQuery::Document {
            document,
            variables,
        }
    }
}

/// Everything the client needs to perform one operation.
#[derive(Clone)]
pub struct MutationRequest {
    pub document: Document,
    pub variables: Value,
    pub optimistic_response: Option<Value>,
    pub refetch_queries: Vec<RefetchQuery>,
    pub await_refetch_queries: bool,
    pub update: Option<UpdateFn>,
    pub context: Map<String, Value>,
}

impl fmt::Debug for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("document", &self.document)
            .field("variables", &self.variables)
            .field("optimistic_response", &self.optimistic_response)
            .field("refetch_queries", &self.refetch_queries)
            .field("await_refetch_queries", &self.await_refetch_queries)
            .field("update", &self.update.as_ref().map(|_| "<fn>"))
            .field("context", &self.context)
            .finish()
    }
}

/// Successful outcome of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub data: Option<Value>,
}

impl MutationResponse {
    pub fn new(data: Value) -> Self {
        Self { data: Some(data) }
    }
}

#[async_trait]
pub trait MutationClient: Send + Sync {
    async fn execute(&self, request: MutationRequest) -> Result<MutationResponse, OperationFailure>;
}

/// Shared handle to the executing client.
///
/// Equality is identity: two handles are equal only if they point at the
/// same client instance.
#[derive(Clone)]
pub struct ClientHandle(Arc<dyn MutationClient>);

impl ClientHandle {
    pub fn new<C: MutationClient + 'static>(client: C) -> Self {
        Self(Arc::new(client))
    }

    pub fn from_arc(client: Arc<dyn MutationClient>) -> Self {
        Self(client)
    }

    pub fn same_client(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) async fn execute(
        &self,
        request: MutationRequest,
    ) -> Result<MutationResponse, OperationFailure> {
        self.0.execute(request).await
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_client(other)
    }
}

impl Eq for ClientHandle {}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientHandle")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}
