use std::sync::Arc;

use async_trait::async_trait;

use crate::domains::envelope::Envelope;
use crate::error::{Result, RpcError};
use crate::interfaces::transport::{Connection, Transport};
use crate::transport::in_flight::{InFlightRequests, ResponseFuture};

/// Request/response correlation over one connection.
pub struct RpcTransport {
    connection: Arc<dyn Connection>,
    in_flight: Arc<InFlightRequests>,
}

impl RpcTransport {
    pub fn new(connection: Arc<dyn Connection>, in_flight: Arc<InFlightRequests>) -> Self {
        Self {
            connection,
            in_flight,
        }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn in_flight(&self) -> &Arc<InFlightRequests> {
        &self.in_flight
    }

    /// Inbound path for a response read off the connection.
    pub fn on_response(&self, response: Envelope) -> bool {
        deliver_response(&self.in_flight, response)
    }
}

/// Hands a response to whoever is waiting on its request id. Late or
/// unknown responses are dropped.
pub fn deliver_response(in_flight: &InFlightRequests, response: Envelope) -> bool {
    let request_id = response.request_id();
    let delivered = in_flight.complete(request_id, response);
    if !delivered {
        tracing::debug!(request_id, "dropping response for request that is no longer pending");
    }
    delivered
}

#[async_trait]
impl Transport for RpcTransport {
    async fn send(&self, request: Envelope) -> Result<ResponseFuture> {
        if !self.connection.is_open() {
            return Err(RpcError::ConnectionClosed);
        }
        let request_id = request.request_id();
        let response = self.in_flight.register(request_id).await?;

        let completion = self.connection.write(request);
        let in_flight = self.in_flight.clone();
        let connection = self.connection.clone();
        tokio::spawn(async move {
            if let Err(err) = completion.await {
                tracing::warn!(request_id, error = %err, "request write failed, closing connection");
                let err = match err {
                    RpcError::TransportWrite(_) => err,
                    other => RpcError::TransportWrite(other.to_string()),
                };
                in_flight.fail(request_id, err);
                connection.close();
            }
        });

        Ok(response)
    }
}
