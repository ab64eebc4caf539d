use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domains::rpc_request::RpcRequest;
use crate::error::{Result, RpcError};
use crate::interfaces::serializer::{plugin, Serializer, SerializerPlugin};

pub const TAG_STRING: u8 = 0;
pub const TAG_RPC_REQUEST: u8 = 101;

/// The plugin set every process starts with.
pub fn default_plugins() -> Vec<Box<dyn SerializerPlugin>> {
    vec![
        plugin::<String, _>(StringSerializer),
        plugin::<RpcRequest, _>(RpcRequestSerializer),
    ]
}

pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn wire_tag(&self) -> u8 {
        TAG_STRING
    }

    fn encoded_size(&self, value: &String) -> usize {
        value.len()
    }

    fn encode(&self, value: &String, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(value.as_bytes());
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| RpcError::Serialization(e.to_string()))
    }
}

/// `[service len:4][service][method len:4][method][argument]`, lengths big-endian.
pub struct RpcRequestSerializer;

impl Serializer<RpcRequest> for RpcRequestSerializer {
    fn wire_tag(&self) -> u8 {
        TAG_RPC_REQUEST
    }

    fn encoded_size(&self, value: &RpcRequest) -> usize {
        4 + value.service.len() + 4 + value.method.len() + value.argument.len()
    }

    fn encode(&self, value: &RpcRequest, buf: &mut BytesMut) -> Result<()> {
        put_string(buf, &value.service)?;
        put_string(buf, &value.method)?;
        buf.put_slice(&value.argument);
        Ok(())
    }

    fn decode(&self, mut bytes: &[u8]) -> Result<RpcRequest> {
        let service = get_string(&mut bytes)?;
        let method = get_string(&mut bytes)?;
        Ok(RpcRequest {
            service,
            method,
            argument: Bytes::copy_from_slice(bytes),
        })
    }
}

pub(crate) fn put_string(buf: &mut BytesMut, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| RpcError::Serialization(format!("string of {} bytes", value.len())))?;
    buf.put_u32(len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

pub(crate) fn get_string(bytes: &mut &[u8]) -> Result<String> {
    if bytes.remaining() < 4 {
        return Err(RpcError::Serialization("truncated string length".to_string()));
    }
    let len = bytes.get_u32() as usize;
    if bytes.remaining() < len {
        return Err(RpcError::Serialization(format!(
            "string needs {len} bytes, {} left",
            bytes.remaining()
        )));
    }
    let value = String::from_utf8(bytes[..len].to_vec())
        .map_err(|e| RpcError::Serialization(e.to_string()))?;
    bytes.advance(len);
    Ok(value)
}

/// JSON body for any serde type, under a caller-chosen tag.
pub struct JsonSerializer<T> {
    tag: u8,
    _target: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new(tag: u8) -> Self {
        Self {
            tag,
            _target: PhantomData,
        }
    }
}

impl<T> Serializer<T> for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn wire_tag(&self) -> u8 {
        self.tag
    }

    /// Capacity hint only; the JSON text length is not known until encoding.
    fn encoded_size(&self, value: &T) -> usize {
        std::mem::size_of_val(value)
    }

    fn encode(&self, value: &T, buf: &mut BytesMut) -> Result<()> {
        serde_json::to_writer(BufMut::writer(buf), value).map_err(|e| RpcError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| RpcError::Serialization(e.to_string()))
    }
}
