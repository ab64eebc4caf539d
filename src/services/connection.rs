//! Framed envelope connection over any byte stream.
//!
//! A writer task drains queued envelopes and reports each write's outcome
//! once. A reader task decodes frames and hands them to the connection's
//! role: a client completes in-flight requests, a server dispatches them.
//! Any read, decode or write failure closes the connection.
//!
//! The tasks only share [`LinkState`], never the handle itself, so dropping
//! the last client handle closes the link and the socket with it. A server
//! connection is owned by its reader task and lives until the peer leaves.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Notify};

use crate::config::RpcConfig;
use crate::domains::envelope::Envelope;
use crate::error::{Result, RpcError};
use crate::interfaces::transport::{write_completion, Connection, WriteCompletion, WriteNotifier};
use crate::services::dispatcher::RequestDispatcher;
use crate::services::transport::deliver_response;
use crate::transport::codec;
use crate::transport::in_flight::InFlightRequests;

type Outbound = (Envelope, WriteNotifier);

enum Role {
    Client(Arc<InFlightRequests>),
    Server(RequestDispatcher),
}

enum Inbound {
    Client(Arc<InFlightRequests>),
    Server {
        dispatcher: RequestDispatcher,
        connection: Arc<FramedConnection>,
    },
}

struct LinkState {
    open: AtomicBool,
    closed: Notify,
    peer: Option<SocketAddr>,
}

impl LinkState {
    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!(peer = ?self.peer, "connection closed");
        }
        self.closed.notify_waiters();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn closed(&self) {
        loop {
            let notified = self.closed.notified();
            if !self.is_open() {
                return;
            }
            notified.await;
        }
    }
}

pub struct FramedConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    link: Arc<LinkState>,
}

impl FramedConnection {
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        in_flight: Arc<InFlightRequests>,
        config: &RpcConfig,
    ) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr().ok();
        Ok(Self::start(
            stream,
            peer,
            Role::Client(in_flight),
            config.max_frame_size,
        ))
    }

    /// Client side over an already-established stream.
    pub fn client<S>(stream: S, in_flight: Arc<InFlightRequests>, max_frame_size: usize) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(stream, None, Role::Client(in_flight), max_frame_size)
    }

    /// Server side over an already-established stream.
    pub fn server<S>(
        stream: S,
        peer: Option<SocketAddr>,
        dispatcher: RequestDispatcher,
        max_frame_size: usize,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(stream, peer, Role::Server(dispatcher), max_frame_size)
    }

    fn start<S>(stream: S, peer: Option<SocketAddr>, role: Role, max_frame_size: usize) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState {
            open: AtomicBool::new(true),
            closed: Notify::new(),
            peer,
        });
        let connection = Arc::new(Self {
            outbound,
            link: link.clone(),
        });
        let inbound = match role {
            Role::Client(in_flight) => Inbound::Client(in_flight),
            Role::Server(dispatcher) => Inbound::Server {
                dispatcher,
                connection: connection.clone(),
            },
        };
        tokio::spawn(write_loop(writer, rx, link.clone()));
        tokio::spawn(read_loop(reader, link, inbound, max_frame_size));
        connection
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.peer
    }

    /// Resolves once the connection has been closed from either side.
    pub async fn closed(&self) {
        self.link.closed().await
    }
}

impl Drop for FramedConnection {
    fn drop(&mut self) {
        self.link.close();
    }
}

impl Connection for FramedConnection {
    fn write(&self, envelope: Envelope) -> WriteCompletion {
        if !self.is_open() {
            return WriteCompletion::ready(Err(RpcError::TransportWrite(
                "connection closed".to_string(),
            )));
        }
        let (notifier, completion) = write_completion();
        if let Err(mpsc::error::SendError((_, notifier))) = self.outbound.send((envelope, notifier)) {
            notifier.notify(Err(RpcError::TransportWrite(
                "connection writer stopped".to_string(),
            )));
        }
        completion
    }

    fn close(&self) {
        self.link.close();
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    link: Arc<LinkState>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = link.closed() => None,
            next = rx.recv() => next,
        };
        let Some((envelope, notifier)) = next else {
            break;
        };
        match codec::write_envelope(&mut writer, &envelope).await {
            Ok(()) => notifier.notify(Ok(())),
            Err(err) => {
                tracing::warn!(peer = ?link.peer, error = %err, "write failed");
                notifier.notify(Err(RpcError::TransportWrite(err.to_string())));
                link.close();
                break;
            }
        }
    }

    rx.close();
    while let Ok((_, notifier)) = rx.try_recv() {
        notifier.notify(Err(RpcError::TransportWrite(
            "connection closed before write".to_string(),
        )));
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R>(mut reader: R, link: Arc<LinkState>, inbound: Inbound, max_frame_size: usize)
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = link.closed() => break,
            frame = codec::read_frame(&mut reader, max_frame_size) => frame,
        };
        let result = match frame {
            Ok(Some(frame)) => deliver(&inbound, frame),
            Ok(None) => {
                tracing::debug!(peer = ?link.peer, "peer closed connection");
                link.close();
                break;
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!(peer = ?link.peer, error = %err, "inbound failure, closing connection");
            link.close();
            break;
        }
    }
}

fn deliver(inbound: &Inbound, frame: Bytes) -> Result<()> {
    match inbound {
        Inbound::Client(in_flight) => {
            deliver_response(in_flight, codec::decode_response(frame)?);
        }
        Inbound::Server {
            dispatcher,
            connection,
        } => {
            let request = codec::decode_request(frame)?;
            let dispatcher = dispatcher.clone();
            let connection = connection.clone();
            tokio::spawn(async move {
                dispatcher.serve(&*connection, request).await;
            });
        }
    }
    Ok(())
}
