//! The type-descriptor-driven codec tree (§4.2).
//!
//! A [`Codec`] is built by interpreting one descriptor from the server; its
//! `encode`/`decode` recurse into sibling codecs via a [`CodecRegistry`]
//! lookup by type id, rather than inlining every composite type's shape.

pub mod descriptor;
pub mod registry;
pub mod scalars;
pub mod value;

use uuid::Uuid;

use crate::buffer::{FlatReadBuffer, WriteBuffer};
use crate::error::ProtocolError;
use value::Value;

pub use registry::CodecRegistry;

/// Bit flags on an object-shape field (§4.2.1).
pub mod object_flags {
    pub const IMPLICIT: u8 = 0b001;
    pub const LINK_PROPERTY: u8 = 0b010;
    pub const LINK: u8 = 0b100;
}

/// One node of the codec tree. Composite variants hold only the *type ids*
/// of their children; the actual child [`Codec`] is looked up in the
/// registry at encode/decode time, the same indirection a descriptor stream
/// uses to let later descriptors reference earlier ones.
#[derive(Debug, Clone)]
pub enum Codec {
    Scalar(Uuid),
    Tuple(Vec<Uuid>),
    NamedTuple(Vec<(String, Uuid)>),
    Array { element: Uuid, dimensions: u16 },
    Set { element: Uuid },
    Enum(Vec<String>),
    Object(Vec<(u8, String, Uuid)>),
}

impl Codec {
    /// Encodes `value` as this codec's generic value-frame: an `i32` length
    /// prefix followed by the type-specific body. `-1` length denotes a null.
    pub fn encode(
        &self,
        registry: &CodecRegistry,
        buf: &mut WriteBuffer,
        value: &Value,
    ) -> Result<(), ProtocolError> {
        if matches!(value, Value::Null) {
            buf.write_i32(-1);
            return Ok(());
        }
        // Scalar codecs write their own length + payload frame directly;
        // composites get a generic wrapper since their body length isn't
        // known until every nested element has been encoded.
        if let Codec::Scalar(id) = self {
            return scalars::encode(*id, buf, value);
        }
        let start = buf.position();
        buf.write_i32(0); // placeholder
        let body_start = buf.position();
        self.encode_body(registry, buf, value)?;
        let body_len = buf.position() - body_start;
        buf.patch(start, &(body_len as i32).to_be_bytes());
        Ok(())
    }

    fn encode_body(
        &self,
        registry: &CodecRegistry,
        buf: &mut WriteBuffer,
        value: &Value,
    ) -> Result<(), ProtocolError> {
        match self {
            Codec::Scalar(id) => scalars::encode(*id, buf, value),
            Codec::Tuple(elements) => {
                let values = match value {
                    Value::Tuple(v) => v,
                    other => {
                        return Err(ProtocolError::MalformedDescriptor(format!(
                            "expected a tuple value, got {other:?}"
                        )))
                    }
                };
                if values.len() != elements.len() {
                    return Err(ProtocolError::MalformedDescriptor(format!(
                        "tuple arity mismatch: codec expects {}, value has {}",
                        elements.len(),
                        values.len()
                    )));
                }
                buf.write_i32(elements.len() as i32);
                for (type_id, element_value) in elements.iter().zip(values) {
                    let codec = registry.get(*type_id)?;
                    codec.encode(registry, buf, element_value)?;
                }
                Ok(())
            }
            Codec::NamedTuple(fields) => {
                let values = match value {
                    Value::NamedTuple(v) => v,
                    other => {
                        return Err(ProtocolError::MalformedDescriptor(format!(
                            "expected a named tuple value, got {other:?}"
                        )))
                    }
                };
                buf.write_i32(fields.len() as i32);
                for (name, type_id) in fields {
                    let (_, field_value) = values
                        .iter()
                        .find(|(n, _)| n == name)
                        .ok_or_else(|| ProtocolError::MalformedDescriptor(format!(
                            "missing named tuple field {name:?}"
                        )))?;
                    let codec = registry.get(*type_id)?;
                    codec.encode(registry, buf, field_value)?;
                }
                Ok(())
            }
            Codec::Object(fields) => {
                let values = match value {
                    Value::Object(v) => v,
                    other => {
                        return Err(ProtocolError::MalformedDescriptor(format!(
                            "expected an object value, got {other:?}"
                        )))
                    }
                };
                buf.write_i32(fields.len() as i32);
                for (_flags, name, type_id) in fields {
                    let field_value = values.get(name).ok_or_else(|| {
                        ProtocolError::MalformedDescriptor(format!("missing object field {name:?}"))
                    })?;
                    let codec = registry.get(*type_id)?;
                    codec.encode(registry, buf, field_value)?;
                }
                Ok(())
            }
            Codec::Array { element, .. } | Codec::Set { element } => {
                let values = match value {
                    Value::Array(v) | Value::Set(v) => v,
                    other => {
                        return Err(ProtocolError::MalformedDescriptor(format!(
                            "expected an array/set value, got {other:?}"
                        )))
                    }
                };
                buf.write_i32(values.len() as i32);
                let codec = registry.get(*element)?;
                for element_value in values {
                    codec.encode(registry, buf, element_value)?;
                }
                Ok(())
            }
            Codec::Enum(members) => {
                let member = match value {
                    Value::Enum(s) => s,
                    other => {
                        return Err(ProtocolError::MalformedDescriptor(format!(
                            "expected an enum value, got {other:?}"
                        )))
                    }
                };
                if !members.contains(member) {
                    return Err(ProtocolError::MalformedDescriptor(format!(
                        "{member:?} is not a member of this enum"
                    )));
                }
                buf.write_bytes(member.as_bytes());
                Ok(())
            }
        }
    }

    /// Decodes a value whose generic `i32` length prefix has already been
    /// consumed by the caller, given the body's exact byte length and a
    /// reader narrowed to it.
    fn decode_body(
        &self,
        registry: &CodecRegistry,
        len: usize,
        buf: &mut FlatReadBuffer,
    ) -> Result<Value, ProtocolError> {
        match self {
            Codec::Scalar(id) => {
                scalars::decode(*id, len, buf).map_err(|_| ProtocolError::MalformedDescriptor(
                    format!("truncated scalar value for type {id}"),
                ))
            }
            Codec::Tuple(elements) => {
                let count = read_count(buf)?;
                let mut values = Vec::with_capacity(count);
                for type_id in elements.iter().take(count) {
                    values.push(decode_value(*type_id, registry, buf)?);
                }
                Ok(Value::Tuple(values))
            }
            Codec::NamedTuple(fields) => {
                let count = read_count(buf)?;
                let mut values = Vec::with_capacity(count);
                for (name, type_id) in fields.iter().take(count) {
                    values.push((name.clone(), decode_value(*type_id, registry, buf)?));
                }
                Ok(Value::NamedTuple(values))
            }
            Codec::Object(fields) => {
                let count = read_count(buf)?;
                let mut map = std::collections::BTreeMap::new();
                for (_flags, name, type_id) in fields.iter().take(count) {
                    map.insert(name.clone(), decode_value(*type_id, registry, buf)?);
                }
                Ok(Value::Object(map))
            }
            Codec::Array { element, .. } => {
                let count = read_count(buf)?;
                let codec = registry.get(*element)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(decode_one(&codec, registry, buf)?);
                }
                Ok(Value::Array(values))
            }
            Codec::Set { element } => {
                let count = read_count(buf)?;
                let codec = registry.get(*element)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(decode_one(&codec, registry, buf)?);
                }
                Ok(Value::Set(values))
            }
            Codec::Enum(_) => Ok(Value::Enum(buf.consume_as_string().map_err(|_| {
                ProtocolError::MalformedDescriptor("truncated enum member name".into())
            })?)),
        }
    }
}

fn read_count(buf: &mut FlatReadBuffer) -> Result<usize, ProtocolError> {
    buf.read_i32()
        .map(|n| n.max(0) as usize)
        .map_err(|_| ProtocolError::MalformedDescriptor("truncated element count".into()))
}

/// Reads one more nested value-frame (length prefix + body) directly off
/// `buf` for a codec already looked up by the caller.
fn decode_one(
    codec: &Codec,
    registry: &CodecRegistry,
    buf: &mut FlatReadBuffer,
) -> Result<Value, ProtocolError> {
    let len = buf
        .read_i32()
        .map_err(|_| ProtocolError::MalformedDescriptor("truncated value length".into()))?;
    if scalars::is_null(len) {
        return Ok(Value::Null);
    }
    let body = buf
        .consume_as_bytes(len as usize)
        .map_err(|_| ProtocolError::MalformedDescriptor("truncated value body".into()))?;
    let mut sub = FlatReadBuffer::new(body);
    codec.decode_body(registry, len as usize, &mut sub)
}

/// Decodes a value by type id: reads the generic length prefix, then
/// dispatches to the registered codec's body decoder.
pub fn decode_value(
    type_id: Uuid,
    registry: &CodecRegistry,
    buf: &mut FlatReadBuffer,
) -> Result<Value, ProtocolError> {
    let codec = registry.get(type_id)?;
    decode_one(&codec, registry, buf)
}
