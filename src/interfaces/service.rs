use std::any::Any;

/// Static description of one remote method: where it lives and what it
/// takes and returns. Stubs and providers are both keyed by this.
pub trait RpcMethod: Send + Sync + 'static {
    const SERVICE: &'static str;
    const METHOD: &'static str;
    type Request: Any + Send + Sync;
    type Response: Any + Send + Sync;
}
