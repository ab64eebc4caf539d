use std::any::{type_name, Any, TypeId};
use std::marker::PhantomData;

use bytes::BytesMut;

use crate::error::{Result, RpcError};

/// Type-specific body encoding. The registry adds the one-byte wire tag; a
/// serializer only ever sees the bytes after it.
pub trait Serializer<T>: Send + Sync + 'static {
    fn wire_tag(&self) -> u8;
    fn encoded_size(&self, value: &T) -> usize;
    fn encode(&self, value: &T, buf: &mut BytesMut) -> Result<()>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Type-erased serializer as held by the registry.
pub trait SerializerPlugin: Send + Sync {
    fn wire_tag(&self) -> u8;
    fn target_type(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn encoded_size(&self, value: &dyn Any) -> Result<usize>;
    fn encode(&self, value: &dyn Any, buf: &mut BytesMut) -> Result<()>;
    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>>;
}

struct TypedPlugin<T, S> {
    serializer: S,
    _target: PhantomData<fn() -> T>,
}

impl<T, S> TypedPlugin<T, S>
where
    T: Any + Send,
    S: Serializer<T>,
{
    fn downcast<'a>(&self, value: &'a dyn Any) -> Result<&'a T> {
        value
            .downcast_ref::<T>()
            .ok_or(RpcError::TypeMismatch {
                tag: self.serializer.wire_tag(),
                expected: type_name::<T>(),
                actual: "<unknown>",
            })
    }
}

impl<T, S> SerializerPlugin for TypedPlugin<T, S>
where
    T: Any + Send,
    S: Serializer<T>,
{
    fn wire_tag(&self) -> u8 {
        self.serializer.wire_tag()
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn encoded_size(&self, value: &dyn Any) -> Result<usize> {
        Ok(self.serializer.encoded_size(self.downcast(value)?))
    }

    fn encode(&self, value: &dyn Any, buf: &mut BytesMut) -> Result<()> {
        self.serializer.encode(self.downcast(value)?, buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Any + Send>> {
        Ok(Box::new(self.serializer.decode(bytes)?))
    }
}

pub fn plugin<T, S>(serializer: S) -> Box<dyn SerializerPlugin>
where
    T: Any + Send,
    S: Serializer<T>,
{
    Box::new(TypedPlugin {
        serializer,
        _target: PhantomData,
    })
}
