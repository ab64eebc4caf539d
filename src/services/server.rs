use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use crate::config::RpcConfig;
use crate::error::Result;
use crate::services::connection::FramedConnection;
use crate::services::dispatcher::RequestDispatcher;

pub struct RpcServer {
    listener: TcpListener,
    dispatcher: RequestDispatcher,
    max_frame_size: usize,
}

impl RpcServer {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        dispatcher: RequestDispatcher,
        config: &RpcConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
            max_frame_size: config.max_frame_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the listener fails.
    pub async fn serve(self) -> Result<()> {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "rpc server listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            if let Err(err) = stream.set_nodelay(true) {
                tracing::warn!(%peer, error = %err, "failed to set TCP_NODELAY");
            }
            tracing::debug!(%peer, "accepted connection");
            FramedConnection::server(
                stream,
                Some(peer),
                self.dispatcher.clone(),
                self.max_frame_size,
            );
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.serve())
    }
}
