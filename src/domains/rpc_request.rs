use bytes::Bytes;

/// Payload of a `TYPE_RPC_REQUEST` call: which provider method to run and
/// its argument, already encoded through the serializer registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRequest {
    pub service: String,
    pub method: String,
    pub argument: Bytes,
}

impl RpcRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>, argument: Bytes) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            argument,
        }
    }
}
