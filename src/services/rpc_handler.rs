use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::domains::envelope::{Code, Envelope, TYPE_RPC_REQUEST};
use crate::domains::rpc_request::RpcRequest;
use crate::error::{Result, RpcError};
use crate::interfaces::handler::RequestHandler;
use crate::interfaces::service::RpcMethod;
use crate::serialize::SerializerRegistry;

type Provider = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<Bytes>> + Send + Sync>;

/// Serves `TYPE_RPC_REQUEST` by looking up a provider for the request's
/// service and method.
pub struct RpcRequestHandler {
    serializers: Arc<SerializerRegistry>,
    providers: HashMap<(String, String), Provider>,
}

impl RpcRequestHandler {
    pub fn new(serializers: Arc<SerializerRegistry>) -> Self {
        Self {
            serializers,
            providers: HashMap::new(),
        }
    }

    /// Returns false if the method already has a provider.
    pub fn provide<M, F, Fut>(&mut self, provider: F) -> bool
    where
        M: RpcMethod,
        F: Fn(M::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<M::Response>> + Send + 'static,
    {
        let key = (M::SERVICE.to_string(), M::METHOD.to_string());
        if self.providers.contains_key(&key) {
            return false;
        }
        let serializers = self.serializers.clone();
        let provider: Provider = Arc::new(move |argument: Bytes| {
            let call = serializers
                .deserialize::<M::Request>(&argument)
                .map(|request| provider(request));
            let serializers = serializers.clone();
            async move {
                let response = call?.await?;
                serializers.serialize(&response)
            }
            .boxed()
        });
        self.providers.insert(key, provider);
        true
    }

    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self
            .providers
            .keys()
            .map(|(service, method)| format!("{service}.{method}"))
            .collect();
        methods.sort();
        methods
    }
}

#[async_trait]
impl RequestHandler for RpcRequestHandler {
    fn request_type(&self) -> i32 {
        TYPE_RPC_REQUEST
    }

    async fn handle(&self, request: Envelope) -> Result<Envelope> {
        let header = *request
            .request_header()
            .ok_or_else(|| RpcError::Protocol("rpc handler received a response".to_string()))?;

        let call: RpcRequest = match self.serializers.deserialize(request.payload()) {
            Ok(call) => call,
            Err(err) => {
                return Ok(Envelope::failure_for(&header, Code::UnknownError, err.to_string()))
            }
        };

        let provider = self
            .providers
            .get(&(call.service.clone(), call.method.clone()))
            .cloned();
        let Some(provider) = provider else {
            return Ok(Envelope::failure_for(
                &header,
                Code::NoProvider,
                format!("No provider for {}.{}", call.service, call.method),
            ));
        };

        match provider(call.argument).await {
            Ok(payload) => Ok(Envelope::success_for(&header, payload)),
            Err(err) => Ok(Envelope::failure_for(&header, Code::UnknownError, err.to_string())),
        }
    }
}
