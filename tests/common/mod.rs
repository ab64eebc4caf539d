#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use rpc_core::domains::envelope::{Envelope, RequestHeader, PROTOCOL_VERSION};
use rpc_core::error::{Result, RpcError};
use rpc_core::interfaces::handler::RequestHandler;
use rpc_core::interfaces::transport::{Connection, WriteCompletion};
use rpc_core::services::dispatcher::{DispatchOutcome, RequestDispatcher};
use rpc_core::{InFlightRequests, RpcConfig};

pub fn config(max_in_flight: usize, acquire_secs: u64, timeout_secs: u64) -> RpcConfig {
    RpcConfig {
        max_in_flight,
        acquire_timeout_secs: acquire_secs,
        request_timeout_secs: timeout_secs,
        sweep_interval_secs: timeout_secs,
        ..RpcConfig::default()
    }
}

pub fn request(request_type: i32, request_id: i32, payload: &'static [u8]) -> Envelope {
    Envelope::request(
        RequestHeader::new(request_type, PROTOCOL_VERSION, request_id),
        Bytes::from_static(payload),
    )
}

pub fn response(request_id: i32, payload: &'static [u8]) -> Envelope {
    let header = RequestHeader::new(0, PROTOCOL_VERSION, request_id);
    Envelope::success_for(&header, Bytes::from_static(payload))
}

/// Records every write; optionally reports each one as failed.
pub struct RecordingConnection {
    writes: Mutex<Vec<Envelope>>,
    fail_writes: bool,
    open: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_writes: false,
            open: AtomicBool::new(true),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn writes(&self) -> Vec<Envelope> {
        self.writes.lock().unwrap().clone()
    }
}

impl Connection for RecordingConnection {
    fn write(&self, envelope: Envelope) -> WriteCompletion {
        self.writes.lock().unwrap().push(envelope);
        if self.fail_writes {
            WriteCompletion::ready(Err(RpcError::TransportWrite("broken pipe".to_string())))
        } else {
            WriteCompletion::ready(Ok(()))
        }
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Hands every written request straight to a dispatcher and feeds the
/// response back into the in-flight table, as a remote peer would.
pub struct LoopbackConnection {
    dispatcher: RequestDispatcher,
    in_flight: Arc<InFlightRequests>,
    open: Arc<AtomicBool>,
}

impl LoopbackConnection {
    pub fn new(dispatcher: RequestDispatcher, in_flight: Arc<InFlightRequests>) -> Self {
        Self {
            dispatcher,
            in_flight,
            open: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Connection for LoopbackConnection {
    fn write(&self, envelope: Envelope) -> WriteCompletion {
        let dispatcher = self.dispatcher.clone();
        let in_flight = self.in_flight.clone();
        let open = self.open.clone();
        tokio::spawn(async move {
            match dispatcher.dispatch(envelope).await {
                DispatchOutcome::Respond(response) => {
                    in_flight.complete(response.request_id(), response);
                }
                DispatchOutcome::Close(_) => open.store(false, Ordering::SeqCst),
            }
        });
        WriteCompletion::ready(Ok(()))
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Answers every request of its type with a fixed payload.
pub struct StaticHandler {
    pub request_type: i32,
    pub payload: &'static [u8],
}

#[async_trait]
impl RequestHandler for StaticHandler {
    fn request_type(&self) -> i32 {
        self.request_type
    }

    async fn handle(&self, request: Envelope) -> Result<Envelope> {
        let header = request.request_header().copied().unwrap();
        Ok(Envelope::success_for(&header, Bytes::from_static(self.payload)))
    }
}

pub struct FaultyHandler {
    pub request_type: i32,
}

#[async_trait]
impl RequestHandler for FaultyHandler {
    fn request_type(&self) -> i32 {
        self.request_type
    }

    async fn handle(&self, _request: Envelope) -> Result<Envelope> {
        Err(RpcError::Handler("handler exploded".to_string()))
    }
}
