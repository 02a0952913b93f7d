//! Deferred RPC call engine.
//!
//! The modem daemon answers light calls synchronously and parks heavy ones
//! behind a deferred id: the immediate reply carries `deferred`, and the
//! caller polls `getDeferredResult` on the same object until the result is
//! ready, errors, or the daemon evicts it. [`RpcClient::call`] hides that
//! whole dance behind one future and keeps the shared busy indicator
//! accurate while any deferred operation is in flight.
//!
//! ARCHITECTURE
//! ============
//! call() ── transport.invoke(object, method, params + async flag)
//!   ├─ immediate error   → Err(Backend)
//!   ├─ immediate payload → Ok(payload)
//!   └─ deferred id       → busy guard + poll task in the scheduler
//!        tick: getDeferredResult {id}
//!          ├─ pending  → stay registered
//!          ├─ ready    → payload or Err(Backend), task removes itself
//!          ├─ expired  → Err(DeferredExpired), task removes itself
//!          └─ transport error → Err(Transport), task removes itself

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::busy::{BusyGuard, BusyState};
use crate::error::RpcError;
use crate::poll::{PollControl, PollTask, Poller};
use crate::transport::RpcTransport;
use crate::wire::{self, CallReply, PollReply};

/// ubus namespace the daemon registers one object per modem interface under.
pub const DEFAULT_NAMESPACE: &str = "usbmodem";

const METHOD_GET_DEFERRED_RESULT: &str = "getDeferredResult";
const KEY_ASYNC: &str = "async";
const KEY_ID: &str = "id";

// =============================================================================
// CLIENT
// =============================================================================

/// Client for one daemon namespace. Cheap to clone; clones share the
/// transport, scheduler and busy state.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    poller: Poller,
    busy: BusyState,
    namespace: String,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>, poller: Poller, busy: BusyState) -> Self {
        Self { transport, poller, busy, namespace: DEFAULT_NAMESPACE.to_owned() }
    }

    /// Address objects under a different namespace. Only useful against
    /// daemons registered somewhere other than `usbmodem.*`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn busy(&self) -> &BusyState {
        &self.busy
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// Call `method` on the modem behind `interface`, transparently waiting
    /// out a deferred result if the daemon issues one.
    ///
    /// The daemon is told the caller handles deferral (`async: true`);
    /// without it, heavy methods would block the daemon's main loop until
    /// completion. There is no client-side deadline: a deferred id that the
    /// daemon keeps alive is polled until it resolves or expires, so callers
    /// needing a bound should wrap this future in `tokio::time::timeout`.
    ///
    /// # Errors
    ///
    /// [`RpcError::Backend`] for daemon-reported failures,
    /// [`RpcError::DeferredExpired`] when the daemon evicted the result,
    /// [`RpcError::Transport`] when the request layer failed, and
    /// [`RpcError::Interrupted`] if a scheduler tick was cancelled mid-poll,
    /// discarding the pending result.
    pub async fn call(
        &self,
        interface: &str,
        method: &str,
        mut params: Map<String, Value>,
    ) -> Result<Value, RpcError> {
        let object = format!("{}.{}", self.namespace, interface);
        params.insert(KEY_ASYNC.to_owned(), Value::Bool(true));

        let reply = self.transport.invoke(&object, method, params).await?;
        match wire::decode_call(reply) {
            CallReply::Failed(message) => Err(RpcError::Backend { message }),
            CallReply::Done(payload) => Ok(payload),
            CallReply::Deferred(id) => self.wait_deferred(object, id).await,
        }
    }

    /// Park the caller on a oneshot and let the scheduler poll the daemon.
    async fn wait_deferred(&self, object: String, id: String) -> Result<Value, RpcError> {
        tracing::debug!(object = %object, deferred = %id, "result deferred, polling");

        let (reply_tx, reply_rx) = oneshot::channel();
        let task = DeferredPollTask {
            transport: Arc::clone(&self.transport),
            object,
            id,
            reply: Some(reply_tx),
            _busy: self.busy.acquire(),
        };
        self.poller.register(Box::new(task));
        self.poller.ensure_running();

        reply_rx.await.unwrap_or(Err(RpcError::Interrupted))
    }
}

// =============================================================================
// POLL TASK
// =============================================================================

/// Scheduler task polling one deferred id. Holds the busy guard for exactly
/// the lifetime of the poll protocol.
struct DeferredPollTask {
    transport: Arc<dyn RpcTransport>,
    object: String,
    id: String,
    reply: Option<oneshot::Sender<Result<Value, RpcError>>>,
    _busy: BusyGuard,
}

#[async_trait::async_trait]
impl PollTask for DeferredPollTask {
    async fn poll(&mut self) -> PollControl {
        let mut args = Map::new();
        args.insert(KEY_ID.to_owned(), Value::String(self.id.clone()));

        let invoked = self.transport.invoke(&self.object, METHOD_GET_DEFERRED_RESULT, args).await;
        let outcome = match invoked {
            Ok(reply) => match wire::decode_poll(reply) {
                PollReply::Pending => return PollControl::Continue,
                PollReply::Ready(Ok(payload)) => Ok(payload),
                PollReply::Ready(Err(message)) => Err(RpcError::Backend { message }),
                PollReply::Expired => Err(RpcError::DeferredExpired),
            },
            Err(e) => Err(RpcError::Transport(e)),
        };

        if let Err(e) = &outcome {
            tracing::debug!(deferred = %self.id, error = %e, "deferred poll settled with error");
        }
        self.settle(outcome);
        PollControl::Remove
    }
}

impl DeferredPollTask {
    fn settle(&mut self, outcome: Result<Value, RpcError>) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        if reply.send(outcome).is_err() {
            tracing::debug!(deferred = %self.id, "caller stopped waiting for deferred result");
        }
    }
}

#[cfg(test)]
#[path = "rpc_test.rs"]
mod tests;
