use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;

use crate::domains::envelope::{
    Code, Envelope, Header, RequestHeader, PROTOCOL_VERSION, TYPE_RPC_REQUEST,
};
use crate::domains::rpc_request::RpcRequest;
use crate::error::{Result, RpcError};
use crate::interfaces::service::RpcMethod;
use crate::interfaces::transport::Transport;
use crate::serialize::SerializerRegistry;
use crate::transport::request_id::RequestIds;

/// Call façade used by stubs: one request out, one payload back.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    serializers: Arc<SerializerRegistry>,
    ids: Arc<RequestIds>,
}

impl RpcClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        serializers: Arc<SerializerRegistry>,
        ids: Arc<RequestIds>,
    ) -> Self {
        Self {
            transport,
            serializers,
            ids,
        }
    }

    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        &self.serializers
    }

    /// Sends `payload` as a `TYPE_RPC_REQUEST` and returns the raw response
    /// payload. Decoding it is the stub's job.
    pub async fn invoke<T: Any + Sync>(&self, payload: &T) -> Result<Bytes> {
        self.invoke_as(TYPE_RPC_REQUEST, payload).await
    }

    pub async fn invoke_as<T: Any + Sync>(&self, request_type: i32, payload: &T) -> Result<Bytes> {
        let header = RequestHeader::new(request_type, PROTOCOL_VERSION, self.ids.next_id());
        let payload = self.serializers.serialize(payload)?;
        let response = self
            .transport
            .send(Envelope::request(header, payload))
            .await?
            .await?;
        into_payload(response)
    }

    /// Blocks the current thread until the call finishes. Must not be called
    /// from inside an async task.
    pub fn invoke_blocking<T: Any + Sync>(&self, runtime: &Handle, payload: &T) -> Result<Bytes> {
        runtime.block_on(self.invoke(payload))
    }

    /// Typed call through the statically declared method `M`.
    pub async fn call<M: RpcMethod>(&self, argument: &M::Request) -> Result<M::Response> {
        let request = RpcRequest::new(M::SERVICE, M::METHOD, self.serializers.serialize(argument)?);
        let payload = self.invoke(&request).await?;
        self.serializers.deserialize::<M::Response>(&payload)
    }
}

fn into_payload(response: Envelope) -> Result<Bytes> {
    let (header, payload) = response.into_parts();
    match header {
        Header::Response(header) if header.is_success() => Ok(payload),
        // The server had no handler for the type; the header echoes it back.
        Header::Response(header) if Code::from_i32(header.code) == Some(Code::NoHandler) => {
            Err(RpcError::Dispatch(header.request_type))
        }
        Header::Response(header) => Err(RpcError::RemoteApplication {
            code: header.code,
            message: header.error.unwrap_or_default(),
        }),
        Header::Request(header) => Err(RpcError::Protocol(format!(
            "request {} answered with a request header",
            header.request_id
        ))),
    }
}
