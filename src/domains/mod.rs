pub mod envelope;
pub mod rpc_request;
