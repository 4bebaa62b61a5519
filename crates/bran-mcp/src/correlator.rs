//! Matches asynchronous responses to the caller waiting for them.
//!
//! The correlator owns a registry of outstanding request ids. Callers
//! register interest with [`Correlator::begin_wait`] before sending, the
//! transport's read path feeds decoded responses through
//! [`Correlator::offer`], and the caller suspends on
//! [`PendingWait::wait`] until resolution or deadline. The correlator does
//! no I/O of its own, which keeps timeout and cancellation behavior
//! identical across transports and testable with synthetic responses.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcResponse, RequestId};

type Registry = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<JsonRpcResponse>>>>>;

/// Registry of pending request correlations.
///
/// Cheap to clone; clones share the same registry. One mutex guards all
/// registry mutation: `offer` runs on the I/O path while `begin_wait` and
/// timeouts run on caller tasks, and the expected volume is tens of
/// outstanding ids.
#[derive(Clone, Default)]
pub struct Correlator {
    pending: Registry,
}

/// Handle for one registered wait. Consumed by [`PendingWait::wait`].
#[derive(Debug)]
pub struct PendingWait {
    id: RequestId,
    rx: oneshot::Receiver<Result<JsonRpcResponse>>,
    pending: Registry,
    registered_at: tokio::time::Instant,
}

impl Correlator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for `id`.
    ///
    /// Exactly one wait may exist per outstanding id; a second registration
    /// before the first resolves is a caller error.
    pub fn begin_wait(&self, id: impl Into<RequestId>) -> Result<PendingWait> {
        let id = id.into();
        let mut pending = self.pending.lock();
        if pending.contains_key(&id) {
            return Err(McpError::DuplicateWait { id });
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id.clone(), tx);
        Ok(PendingWait {
            id,
            rx,
            pending: Arc::clone(&self.pending),
            registered_at: tokio::time::Instant::now(),
        })
    }

    /// Offer a decoded response for correlation.
    ///
    /// Resolves and removes the matching registration if one exists.
    /// Returns false if nothing was waiting for this id; expected for
    /// late or duplicate arrivals after a timeout already fired.
    pub fn offer(&self, response: JsonRpcResponse) -> bool {
        let entry = self.pending.lock().remove(&response.id);
        match entry {
            Some(tx) => {
                // The receiver may have just timed out; a failed send is
                // the same silent drop as an unknown id.
                let _ = tx.send(Ok(response));
                true
            }
            None => {
                tracing::debug!(id = %response.id, "no pending wait for response, dropping");
                false
            }
        }
    }

    /// Drop the registration for `id` without resolving it.
    ///
    /// Used when a send fails after the wait was registered.
    pub fn forget(&self, id: &RequestId) {
        self.pending.lock().remove(id);
    }

    /// Fail every outstanding wait with a connection-closed error and clear
    /// the registry. Safe to call when nothing is pending.
    pub fn cancel_all(&self, reason: &str) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), reason, "cancelling pending waits");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(McpError::connection_closed(reason)));
        }
    }

    /// Number of outstanding registrations.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl PendingWait {
    /// The request id this wait is registered for.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Suspend until the matching response is offered or the deadline
    /// elapses, whichever comes first.
    ///
    /// The deadline is wall-clock measured from registration (not from
    /// this call), independent of byte arrival. On timeout the
    /// registration is removed so a later stray response cannot
    /// resurrect it.
    pub async fn wait(self, timeout: Duration) -> Result<JsonRpcResponse> {
        let PendingWait {
            id,
            rx,
            pending,
            registered_at,
        } = self;
        match tokio::time::timeout_at(registered_at + timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without resolving: the correlator itself went
            // away, which only happens when the transport is torn down.
            Ok(Err(_)) => Err(McpError::connection_closed("correlator dropped")),
            Err(_) => {
                pending.lock().remove(&id);
                Err(McpError::Timeout { id, timeout })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(id: &str) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({}))
    }

    #[tokio::test]
    async fn offer_resolves_matching_wait() {
        let correlator = Correlator::new();
        let wait = correlator.begin_wait("a").unwrap();

        assert!(correlator.offer(response("a")));
        let resolved = wait.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(resolved.id, RequestId::from("a"));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_wait_is_rejected() {
        let correlator = Correlator::new();
        let _first = correlator.begin_wait("a").unwrap();
        let err = correlator.begin_wait("a").unwrap_err();
        assert!(matches!(err, McpError::DuplicateWait { .. }));
    }

    #[tokio::test]
    async fn offer_without_registration_is_dropped() {
        let correlator = Correlator::new();
        assert!(!correlator.offer(response("stray")));
    }

    #[tokio::test]
    async fn multiple_ids_resolve_independently() {
        let correlator = Correlator::new();
        let wait_a = correlator.begin_wait("a").unwrap();
        let wait_b = correlator.begin_wait("b").unwrap();

        // Resolve in reverse registration order.
        assert!(correlator.offer(response("b")));
        assert!(correlator.offer(response("a")));

        assert_eq!(
            wait_a.wait(Duration::from_secs(1)).await.unwrap().id,
            RequestId::from("a")
        );
        assert_eq!(
            wait_b.wait(Duration::from_secs(1)).await.unwrap().id,
            RequestId::from("b")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_at_the_deadline() {
        let correlator = Correlator::new();
        let wait = correlator.begin_wait("a").unwrap();

        let start = tokio::time::Instant::now();
        let err = wait.wait(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        match err {
            McpError::Timeout { id, timeout } => {
                assert_eq!(id, RequestId::from("a"));
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_timeout_has_no_effect() {
        let correlator = Correlator::new();
        let wait = correlator.begin_wait("a").unwrap();
        let _ = wait.wait(Duration::from_millis(10)).await.unwrap_err();

        // Stale arrival: silently dropped, registry untouched.
        assert!(!correlator.offer(response("a")));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_response_inside_deadline_is_accepted() {
        let correlator = Correlator::new();
        let wait = correlator.begin_wait("a").unwrap();

        let offerer = correlator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            offerer.offer(response("a"));
        });

        let resolved = wait.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(resolved.id, RequestId::from("a"));
    }

    #[tokio::test]
    async fn cancel_all_fails_every_pending_wait() {
        let correlator = Correlator::new();
        let wait_a = correlator.begin_wait("a").unwrap();
        let wait_b = correlator.begin_wait("b").unwrap();

        correlator.cancel_all("server stdout closed");
        assert_eq!(correlator.pending_count(), 0);

        for wait in [wait_a, wait_b] {
            let err = wait.wait(Duration::from_secs(1)).await.unwrap_err();
            match err {
                McpError::ConnectionClosed { reason } => {
                    assert_eq!(reason, "server stdout closed");
                }
                other => panic!("expected connection closed, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn cancel_all_on_empty_registry_is_safe() {
        let correlator = Correlator::new();
        correlator.cancel_all("nothing pending");
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn forget_clears_registration_without_resolving() {
        let correlator = Correlator::new();
        let wait = correlator.begin_wait("a").unwrap();
        correlator.forget(wait.id());
        assert_eq!(correlator.pending_count(), 0);
        // The id is free again.
        let _ = correlator.begin_wait("a").unwrap();
    }
}
