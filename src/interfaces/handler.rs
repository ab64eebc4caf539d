use async_trait::async_trait;

use crate::domains::envelope::Envelope;
use crate::error::Result;

/// Serves one request type. Application failures should be shaped into the
/// returned response's code; an `Err` is treated as a connection fault.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn request_type(&self) -> i32;
    async fn handle(&self, request: Envelope) -> Result<Envelope>;
}
