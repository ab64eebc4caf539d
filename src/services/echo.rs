use crate::interfaces::service::RpcMethod;
use crate::services::rpc_handler::RpcRequestHandler;

pub struct Echo;

impl RpcMethod for Echo {
    const SERVICE: &'static str = "rpc_core.EchoService";
    const METHOD: &'static str = "echo";
    type Request = String;
    type Response = String;
}

pub fn register(handler: &mut RpcRequestHandler) -> bool {
    handler.provide::<Echo, _, _>(|text: String| async move { Ok(text) })
}
