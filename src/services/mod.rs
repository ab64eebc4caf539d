pub mod connection;
pub mod dispatcher;
pub mod echo;
pub mod rpc_handler;
pub mod server;
pub mod transport;
