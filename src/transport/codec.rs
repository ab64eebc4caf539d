//! Envelope framing.
//!
//! Frame: `[length:4][type:4][version:4][request id:4]` followed, for
//! responses, by `[code:4][error length:4][error:N]`, then the payload. All
//! integers are big-endian; `length` counts every byte after itself. Which
//! header form a frame carries is implied by the side reading it: servers
//! read requests, clients read responses.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domains::envelope::{Envelope, Header, RequestHeader, ResponseHeader};
use crate::error::{Result, RpcError};

const REQUEST_HEADER_LEN: usize = 12;
const RESPONSE_HEADER_MIN_LEN: usize = REQUEST_HEADER_LEN + 8;

pub fn encode(envelope: &Envelope) -> Result<Bytes> {
    let header_len = match envelope.header() {
        Header::Request(_) => REQUEST_HEADER_LEN,
        Header::Response(header) => {
            RESPONSE_HEADER_MIN_LEN + header.error.as_deref().map_or(0, str::len)
        }
    };
    let body_len = header_len + envelope.payload().len();
    let length = u32::try_from(body_len)
        .map_err(|_| RpcError::Protocol(format!("frame of {body_len} bytes")))?;

    let mut buf = BytesMut::with_capacity(4 + body_len);
    buf.put_u32(length);
    match envelope.header() {
        Header::Request(header) => {
            buf.put_i32(header.request_type);
            buf.put_i32(header.version);
            buf.put_i32(header.request_id);
        }
        Header::Response(header) => {
            buf.put_i32(header.request_type);
            buf.put_i32(header.version);
            buf.put_i32(header.request_id);
            buf.put_i32(header.code);
            let error = header.error.as_deref().unwrap_or_default();
            buf.put_u32(error.len() as u32);
            buf.put_slice(error.as_bytes());
        }
    }
    buf.put_slice(envelope.payload());
    Ok(buf.freeze())
}

pub fn decode_request(mut frame: Bytes) -> Result<Envelope> {
    if frame.len() < REQUEST_HEADER_LEN {
        return Err(truncated("request header", REQUEST_HEADER_LEN, frame.len()));
    }
    let header = RequestHeader {
        request_type: frame.get_i32(),
        version: frame.get_i32(),
        request_id: frame.get_i32(),
    };
    Ok(Envelope::request(header, frame))
}

pub fn decode_response(mut frame: Bytes) -> Result<Envelope> {
    if frame.len() < RESPONSE_HEADER_MIN_LEN {
        return Err(truncated("response header", RESPONSE_HEADER_MIN_LEN, frame.len()));
    }
    let request_type = frame.get_i32();
    let version = frame.get_i32();
    let request_id = frame.get_i32();
    let code = frame.get_i32();
    let error_len = frame.get_u32() as usize;
    if frame.len() < error_len {
        return Err(truncated("response error", error_len, frame.len()));
    }
    let error = match error_len {
        0 => None,
        _ => Some(
            String::from_utf8(frame.split_to(error_len).to_vec())
                .map_err(|e| RpcError::Protocol(e.to_string()))?,
        ),
    };
    let header = ResponseHeader {
        request_type,
        version,
        request_id,
        code,
        error,
    };
    Ok(Envelope::response(header, frame))
}

fn truncated(what: &str, needed: usize, have: usize) -> RpcError {
    RpcError::Protocol(format!("{what} needs {needed} bytes, frame has {have}"))
}

/// Reads one frame body. `Ok(None)` means the peer closed cleanly between
/// frames; a stream that ends inside the length prefix is a protocol error.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let first = reader.read(&mut prefix).await?;
    if first == 0 {
        return Ok(None);
    }
    if let Err(err) = reader.read_exact(&mut prefix[first..]).await {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(RpcError::Protocol(
                "stream ended inside a frame length prefix".to_string(),
            ));
        }
        return Err(err.into());
    }
    let length = u32::from_be_bytes(prefix) as usize;
    if length > max_frame_size {
        return Err(RpcError::Protocol(format!(
            "frame of {length} bytes exceeds limit of {max_frame_size}"
        )));
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(Bytes::from(body)))
}

pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(envelope)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::envelope::{Code, PROTOCOL_VERSION};

    #[tokio::test]
    async fn response_frame_survives_a_stream() {
        let request = RequestHeader::new(3, PROTOCOL_VERSION, 41);
        let response = Envelope::failure_for(&request, Code::NoHandler, "no handler");

        let (mut client, mut server) = tokio::io::duplex(256);
        write_envelope(&mut client, &response).await.unwrap();
        drop(client);

        let frame = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(decode_response(frame).unwrap(), response);
        assert!(read_frame(&mut server, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let request = Envelope::request(RequestHeader::new(0, 1, 1), vec![0u8; 64]);
        let (mut client, mut server) = tokio::io::duplex(256);
        write_envelope(&mut client, &request).await.unwrap();

        let err = read_frame(&mut server, 16).await.unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[tokio::test]
    async fn partial_length_prefix_is_a_protocol_error() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(&[0, 0]).await.unwrap();
        drop(client);

        let err = read_frame(&mut server, 1024).await.unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[tokio::test]
    async fn prefix_split_across_reads_is_reassembled() {
        let request = Envelope::request(RequestHeader::new(2, 1, 5), Bytes::from_static(b"ok"));
        let frame = encode(&request).unwrap();
        let (mut client, mut server) = tokio::io::duplex(256);

        let reading = tokio::spawn(async move { read_frame(&mut server, 1024).await });
        client.write_all(&frame[..1]).await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(&frame[1..]).await.unwrap();

        let body = reading.await.unwrap().unwrap().unwrap();
        assert_eq!(decode_request(body).unwrap(), request);
    }

    #[test]
    fn short_request_frame_is_a_protocol_error() {
        let err = decode_request(Bytes::from_static(&[0, 0, 0, 1])).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn request_payload_follows_header() {
        let request = Envelope::request(RequestHeader::new(7, 1, 9), Bytes::from_static(b"hi"));
        let mut frame = encode(&request).unwrap();
        assert_eq!(frame.get_u32() as usize, frame.len());
        assert_eq!(decode_request(frame).unwrap(), request);
    }
}
