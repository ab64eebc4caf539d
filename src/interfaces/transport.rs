use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domains::envelope::Envelope;
use crate::error::{Result, RpcError};
use crate::transport::in_flight::ResponseFuture;

/// Resolves exactly once with the outcome of one write.
pub struct WriteCompletion {
    rx: oneshot::Receiver<Result<()>>,
}

pub struct WriteNotifier {
    tx: oneshot::Sender<Result<()>>,
}

pub fn write_completion() -> (WriteNotifier, WriteCompletion) {
    let (tx, rx) = oneshot::channel();
    (WriteNotifier { tx }, WriteCompletion { rx })
}

impl WriteNotifier {
    pub fn notify(self, result: Result<()>) {
        let _ = self.tx.send(result);
    }
}

impl WriteCompletion {
    pub fn ready(result: Result<()>) -> Self {
        let (notifier, completion) = write_completion();
        notifier.notify(result);
        completion
    }
}

impl Future for WriteCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RpcError::TransportWrite(
                "connection dropped the write".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A bidirectional connection that already frames envelopes. Inbound
/// envelopes are delivered by the implementation, not pulled through here.
pub trait Connection: Send + Sync {
    /// Queue the envelope for writing. Must not block.
    fn write(&self, envelope: Envelope) -> WriteCompletion;
    fn close(&self);
    fn is_open(&self) -> bool;
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Registers the request and writes it. An `Err` means nothing was
    /// written; every later failure arrives through the returned future.
    async fn send(&self, request: Envelope) -> Result<ResponseFuture>;
}
