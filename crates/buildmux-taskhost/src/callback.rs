//! Correlation of task-host callbacks with their coordinator responses.
//!
//! A task host suspends the call site that issued a callback until a
//! response packet carrying the same `request_id` arrives. `request_id` is
//! an atomically-incremented counter; [`PendingCallbacks`] is the
//! thread-safe `request_id -> pending completion` map the coordinator side
//! maintains, mirroring the correlation-id pattern `cuenv`'s coordinator
//! protocol uses for producer/consumer message matching.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Generates strictly increasing, globally unique `request_id` values.
///
/// Uniqueness under concurrent callers is the testable property from spec
/// §8/S8: `N` concurrent calls to [`Self::next`] produce `N` pairwise
/// distinct ids.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// A generator whose first id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next `request_id`.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Thread-safe map from outstanding `request_id` to the `oneshot` sender
/// that will wake the suspended call site once a matching response arrives.
#[derive(Default)]
pub struct PendingCallbacks<T> {
    ids: RequestIdGenerator,
    pending: Mutex<HashMap<u64, oneshot::Sender<T>>>,
}

impl<T> PendingCallbacks<T> {
    /// An empty correlation map, ids starting at `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: RequestIdGenerator::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new outstanding callback, returning its `request_id` and
    /// the receiver the call site should await.
    pub fn register(&self) -> (u64, oneshot::Receiver<T>) {
        let request_id = self.ids.next();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(request_id, tx);
        (request_id, rx)
    }

    /// Atomically remove and fulfill the completion for `request_id`.
    ///
    /// An unmatched id is not an error at the transport layer — the caller
    /// logs a warning and drops the response — but is surfaced here as
    /// [`Error::UnknownRequestId`] so the caller can decide how to log it.
    pub fn complete(&self, request_id: u64, response: T) -> Result<()> {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&request_id);
        match sender {
            Some(sender) => {
                // The receiver may already have been dropped (cancellation);
                // that is not this map's concern once the entry is removed.
                let _ = sender.send(response);
                Ok(())
            }
            None => Err(Error::UnknownRequestId { request_id }),
        }
    }

    /// Number of callbacks currently awaiting a response.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

/// Guards a callback attempt behind the coordinator's advertised handshake
/// support, per spec §4.5 "Callback opt-in".
#[derive(Debug, Clone, Copy)]
pub struct CallbackGate {
    supported: bool,
}

impl CallbackGate {
    /// Construct a gate from a node's advertised `supports_callbacks` flag.
    #[must_use]
    pub fn new(supported: bool) -> Self {
        Self { supported }
    }

    /// Whether callbacks are permitted at all.
    #[must_use]
    pub fn is_supported(self) -> bool {
        self.supported
    }

    /// Require callback support, logging `E-CALLBACK-UNSUPPORTED` and
    /// returning the error variant if the coordinator never advertised it.
    pub fn require(self) -> Result<()> {
        if self.supported {
            Ok(())
        } else {
            tracing::error!(
                target: "buildmux::taskhost",
                error_code = "E-CALLBACK-UNSUPPORTED",
                "task attempted a coordinator callback but callbacks are unsupported",
            );
            Err(Error::CallbackUnsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn request_ids_are_unique_under_concurrency() {
        let generator = Arc::new(RequestIdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            handles.push(std::thread::spawn(move || {
                (0..125).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }
        let mut ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        let before_dedup = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before_dedup, "every id must be pairwise distinct");
        assert_eq!(ids.len(), 1000);
    }

    #[tokio::test]
    async fn each_continuation_observes_only_its_own_response() {
        let callbacks: Arc<PendingCallbacks<String>> = Arc::new(PendingCallbacks::new());
        let mut receivers = Vec::new();
        for i in 0..5 {
            let (id, rx) = callbacks.register();
            receivers.push((id, rx, format!("response-{i}")));
        }

        // Resolve in shuffled order.
        let order = [3usize, 0, 4, 1, 2];
        for &idx in &order {
            let (id, _, expected) = &receivers[idx];
            callbacks.complete(*id, expected.clone()).unwrap();
        }

        for (_, rx, expected) in receivers {
            assert_eq!(rx.await.unwrap(), expected);
        }
    }

    #[test]
    fn completing_an_unknown_id_is_reported() {
        let callbacks: PendingCallbacks<u32> = PendingCallbacks::new();
        assert!(matches!(
            callbacks.complete(999, 1),
            Err(Error::UnknownRequestId { request_id: 999 })
        ));
    }

    #[test]
    fn gate_rejects_callbacks_without_advertised_support() {
        let gate = CallbackGate::new(false);
        assert!(gate.require().is_err());
        assert!(CallbackGate::new(true).require().is_ok());
    }
}
