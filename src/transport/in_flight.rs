//! Bookkeeping for requests that have been written but not yet answered.
//!
//! Capacity is a semaphore; each pending entry owns its permit, so removing
//! the entry from the map is the only way a slot is released. Completion,
//! the timeout sweep and write failures all go through the same removal,
//! and whichever of them takes the entry out resolves it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::RpcConfig;
use crate::domains::envelope::Envelope;
use crate::error::{Result, RpcError};

/// Resolves with the response envelope, or with the error that ended the
/// exchange (write failure, timeout, table dropped).
#[derive(Debug)]
pub struct ResponseFuture {
    request_id: i32,
    rx: oneshot::Receiver<Result<Envelope>>,
}

impl ResponseFuture {
    pub fn request_id(&self) -> i32 {
        self.request_id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Envelope>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RpcError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct PendingRequest {
    responder: oneshot::Sender<Result<Envelope>>,
    created_at: Instant,
    _slot: OwnedSemaphorePermit,
}

impl PendingRequest {
    fn resolve(self, result: Result<Envelope>) {
        // The caller may have stopped waiting; the slot is still released here.
        let _ = self.responder.send(result);
    }
}

struct Shared {
    pending: Mutex<HashMap<i32, PendingRequest>>,
    slots: Arc<Semaphore>,
    capacity: usize,
    acquire_timeout: Duration,
    request_timeout: Duration,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<i32, PendingRequest>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take(&self, request_id: i32) -> Option<PendingRequest> {
        self.pending().remove(&request_id)
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(i32, PendingRequest)> = {
            let mut pending = self.pending();
            let ids: Vec<i32> = pending
                .iter()
                .filter(|(_, entry)| now.duration_since(entry.created_at) > self.request_timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let reclaimed = expired.len();
        for (request_id, entry) in expired {
            entry.resolve(Err(RpcError::Timeout(request_id)));
        }
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "timed out in-flight requests");
        }
        reclaimed
    }
}

pub struct InFlightRequests {
    shared: Arc<Shared>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl InFlightRequests {
    /// Builds the table and starts its periodic sweep. Must be called from
    /// within a tokio runtime.
    pub fn new(config: &RpcConfig) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(config.max_in_flight)),
            capacity: config.max_in_flight,
            acquire_timeout: config.acquire_timeout(),
            request_timeout: config.request_timeout(),
        });
        let sweeper = tokio::spawn(run_sweeper(
            Arc::downgrade(&shared),
            config.sweep_interval(),
        ));
        Self {
            shared,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Waits up to the acquire timeout for a free slot, then records the
    /// request. Nothing may be written for `request_id` before this returns.
    pub async fn register(&self, request_id: i32) -> Result<ResponseFuture> {
        let acquire = self.shared.slots.clone().acquire_owned();
        let slot = match tokio::time::timeout(self.shared.acquire_timeout, acquire).await {
            Ok(Ok(slot)) => slot,
            Ok(Err(_)) => return Err(RpcError::ConnectionClosed),
            Err(_) => return Err(RpcError::BackpressureTimeout(self.shared.acquire_timeout)),
        };

        let (responder, rx) = oneshot::channel();
        let mut pending = self.shared.pending();
        if pending.contains_key(&request_id) {
            return Err(RpcError::DuplicateRequestId(request_id));
        }
        pending.insert(
            request_id,
            PendingRequest {
                responder,
                created_at: Instant::now(),
                _slot: slot,
            },
        );
        Ok(ResponseFuture { request_id, rx })
    }

    /// Resolves the request with its response. Returns false when the id is
    /// no longer pending, e.g. the sweep already timed it out.
    pub fn complete(&self, request_id: i32, response: Envelope) -> bool {
        match self.shared.take(request_id) {
            Some(entry) => {
                entry.resolve(Ok(response));
                true
            }
            None => false,
        }
    }

    pub fn fail(&self, request_id: i32, error: RpcError) -> bool {
        match self.shared.take(request_id) {
            Some(entry) => {
                entry.resolve(Err(error));
                true
            }
            None => false,
        }
    }

    /// Times out every entry older than the request timeout. Returns how
    /// many were reclaimed.
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }

    /// Stops the periodic sweep. Pending entries are left as they are.
    pub fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub fn contains(&self, request_id: i32) -> bool {
        self.shared.pending().contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.shared.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn available_slots(&self) -> usize {
        self.shared.slots.available_permits()
    }
}

impl Drop for InFlightRequests {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_sweeper(shared: Weak<Shared>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.sweep();
    }
}
