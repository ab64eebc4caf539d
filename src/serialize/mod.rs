//! Type-tagged payload serialization.
//!
//! Every serialized payload is `[wire tag:1][body:N]`. The tag is the only
//! self-describing byte; the body is interpreted by whichever serializer owns
//! the tag. The registry is assembled once through [`SerializerRegistryBuilder`]
//! and is read-only afterwards, so it can be shared behind an `Arc` without
//! locking.

pub mod builtin;

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, RpcError};
use crate::interfaces::serializer::{plugin, Serializer, SerializerPlugin};

pub struct SerializerRegistry {
    by_type: HashMap<TypeId, Arc<dyn SerializerPlugin>>,
    by_tag: HashMap<u8, Arc<dyn SerializerPlugin>>,
}

impl SerializerRegistry {
    pub fn builder() -> SerializerRegistryBuilder {
        SerializerRegistryBuilder::default()
    }

    /// Registry holding the built-in plugin set.
    pub fn with_defaults() -> Result<Self> {
        Self::builder().plugins(builtin::default_plugins()).build()
    }

    pub fn serialize<T: Any>(&self, value: &T) -> Result<Bytes> {
        let serializer = self
            .by_type
            .get(&TypeId::of::<T>())
            .ok_or(RpcError::UnknownType(type_name::<T>()))?;
        let mut buf = BytesMut::with_capacity(1 + serializer.encoded_size(value)?);
        buf.put_u8(serializer.wire_tag());
        serializer.encode(value, &mut buf)?;
        Ok(buf.freeze())
    }

    pub fn deserialize<T: Any>(&self, bytes: &[u8]) -> Result<T> {
        let (tag, body) = split_tag(bytes)?;
        let serializer = self.by_tag.get(&tag).ok_or(RpcError::UnknownTag(tag))?;
        if serializer.target_type() != TypeId::of::<T>() {
            return Err(RpcError::TypeMismatch {
                tag,
                expected: type_name::<T>(),
                actual: serializer.type_name(),
            });
        }
        serializer
            .decode(body)?
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| RpcError::TypeMismatch {
                tag,
                expected: type_name::<T>(),
                actual: serializer.type_name(),
            })
    }

    /// Decode without knowing the target type up front.
    pub fn deserialize_any(&self, bytes: &[u8]) -> Result<(u8, Box<dyn Any + Send>)> {
        let (tag, body) = split_tag(bytes)?;
        let serializer = self.by_tag.get(&tag).ok_or(RpcError::UnknownTag(tag))?;
        Ok((tag, serializer.decode(body)?))
    }

    pub fn wire_tag_of<T: Any>(&self) -> Option<u8> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|serializer| serializer.wire_tag())
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

fn split_tag(bytes: &[u8]) -> Result<(u8, &[u8])> {
    match bytes.split_first() {
        Some((tag, body)) => Ok((*tag, body)),
        None => Err(RpcError::Serialization(
            "payload is empty, missing wire tag".to_string(),
        )),
    }
}

#[derive(Default)]
pub struct SerializerRegistryBuilder {
    plugins: Vec<Box<dyn SerializerPlugin>>,
}

impl SerializerRegistryBuilder {
    pub fn plugin(mut self, plugin: Box<dyn SerializerPlugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins<I>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn SerializerPlugin>>,
    {
        self.plugins.extend(plugins);
        self
    }

    pub fn serializer<T, S>(self, serializer: S) -> Self
    where
        T: Any + Send,
        S: Serializer<T>,
    {
        self.plugin(plugin::<T, S>(serializer))
    }

    /// Fails on the first tag or type claimed twice; an ambiguous registry is
    /// never handed out.
    pub fn build(self) -> Result<SerializerRegistry> {
        let mut by_type: HashMap<TypeId, Arc<dyn SerializerPlugin>> = HashMap::new();
        let mut by_tag: HashMap<u8, Arc<dyn SerializerPlugin>> = HashMap::new();

        for plugin in self.plugins {
            let plugin: Arc<dyn SerializerPlugin> = Arc::from(plugin);
            if let Some(existing) = by_tag.get(&plugin.wire_tag()) {
                return Err(RpcError::DuplicateWireTag {
                    tag: plugin.wire_tag(),
                    existing: existing.type_name(),
                    duplicate: plugin.type_name(),
                });
            }
            if by_type.contains_key(&plugin.target_type()) {
                return Err(RpcError::DuplicateType(plugin.type_name()));
            }
            tracing::info!(
                wire_tag = plugin.wire_tag(),
                serializer_type = plugin.type_name(),
                "registered serializer"
            );
            by_tag.insert(plugin.wire_tag(), plugin.clone());
            by_type.insert(plugin.target_type(), plugin);
        }

        Ok(SerializerRegistry { by_type, by_tag })
    }
}
