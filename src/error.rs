use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no serializer registered for type {0}")]
    UnknownType(&'static str),
    #[error("no serializer registered for wire tag {0}")]
    UnknownTag(u8),
    #[error("type mismatch: wire tag {tag} decodes to {actual}, expected {expected}")]
    TypeMismatch {
        tag: u8,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("wire tag {tag} claimed by both {existing} and {duplicate}")]
    DuplicateWireTag {
        tag: u8,
        existing: &'static str,
        duplicate: &'static str,
    },
    #[error("type {0} has more than one serializer")]
    DuplicateType(&'static str),
    #[error("no in-flight slot available after {0:?}")]
    BackpressureTimeout(Duration),
    #[error("request {0} is already in flight")]
    DuplicateRequestId(i32),
    #[error("transport write failed: {0}")]
    TransportWrite(String),
    #[error("request {0} timed out waiting for a response")]
    Timeout(i32),
    #[error("remote error (code {code}): {message}")]
    RemoteApplication { code: i32, message: String },
    #[error("no handler for request with type: {0}")]
    Dispatch(i32),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// True for failures where the request never reached the wire.
    pub fn is_not_sent(&self) -> bool {
        matches!(
            self,
            RpcError::BackpressureTimeout(_) | RpcError::DuplicateRequestId(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = RpcError::RemoteApplication {
            code: -2,
            message: "no provider".to_string(),
        };
        assert_eq!(format!("{err}"), "remote error (code -2): no provider");

        let err = RpcError::Dispatch(99);
        assert!(format!("{err}").contains("99"));

        assert!(RpcError::BackpressureTimeout(Duration::from_secs(10)).is_not_sent());
        assert!(!RpcError::Timeout(1).is_not_sent());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: RpcError = io.into();
        assert!(matches!(err, RpcError::Io(_)));
    }
}
