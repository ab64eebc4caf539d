pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod plugins;
pub mod serialize;
pub mod services;
pub mod transport;

pub use crate::client::RpcClient;
pub use crate::config::RpcConfig;
pub use crate::domains::envelope::{Code, Envelope, Header, RequestHeader, ResponseHeader};
pub use crate::error::{Result, RpcError};
pub use crate::serialize::SerializerRegistry;
pub use crate::services::dispatcher::RequestDispatcher;
pub use crate::services::transport::RpcTransport;
pub use crate::transport::in_flight::{InFlightRequests, ResponseFuture};
