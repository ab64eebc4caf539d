use std::sync::Arc;

use crate::domains::envelope::{Code, Envelope};
use crate::error::RpcError;
use crate::interfaces::transport::Connection;
use crate::plugins::registry::HandlerRegistry;

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Write this envelope back to the caller.
    Respond(Envelope),
    /// The connection can no longer be trusted and must be closed.
    Close(RpcError),
}

/// Routes inbound requests to their handler by request type. Holds nothing
/// but the read-only handler registry, so one instance can serve any number
/// of connections.
#[derive(Clone)]
pub struct RequestDispatcher {
    handlers: Arc<HandlerRegistry>,
}

impl RequestDispatcher {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub async fn dispatch(&self, request: Envelope) -> DispatchOutcome {
        let Some(header) = request.request_header().copied() else {
            return DispatchOutcome::Close(RpcError::Protocol(format!(
                "expected a request, got a response for id {}",
                request.request_id()
            )));
        };

        let Some(handler) = self.handlers.get(header.request_type) else {
            let err = RpcError::Dispatch(header.request_type);
            tracing::warn!(
                request_type = header.request_type,
                request_id = header.request_id,
                "no handler for request"
            );
            return DispatchOutcome::Respond(Envelope::failure_for(
                &header,
                Code::NoHandler,
                err.to_string(),
            ));
        };

        match handler.handle(request).await {
            Ok(response) => DispatchOutcome::Respond(response),
            Err(err) => {
                tracing::warn!(
                    request_type = header.request_type,
                    request_id = header.request_id,
                    error = %err,
                    "handler failed"
                );
                DispatchOutcome::Close(match err {
                    RpcError::Handler(_) => err,
                    other => RpcError::Handler(other.to_string()),
                })
            }
        }
    }

    /// Dispatches one request and writes the response on `connection`.
    /// Handler faults and failed response writes close the connection.
    pub async fn serve(&self, connection: &dyn Connection, request: Envelope) {
        let request_id = request.request_id();
        match self.dispatch(request).await {
            DispatchOutcome::Respond(response) => {
                if let Err(err) = connection.write(response).await {
                    tracing::warn!(request_id, error = %err, "write response failed");
                    connection.close();
                }
            }
            DispatchOutcome::Close(err) => {
                tracing::warn!(request_id, error = %err, "closing connection");
                connection.close();
            }
        }
    }
}
