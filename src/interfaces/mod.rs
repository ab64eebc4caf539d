pub mod handler;
pub mod serializer;
pub mod service;
pub mod transport;
