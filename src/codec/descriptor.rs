//! Parses the server's type-descriptor blob (§4.2.1) into a sequence of
//! self-delimited descriptors, each keyed by the UUID it defines.
//!
//! The wire format is a flat list rather than a tree: later descriptors
//! reference earlier ones by UUID rather than nesting them inline.

use uuid::Uuid;

use crate::buffer::FlatReadBuffer;
use crate::codec::Codec;
use crate::error::ProtocolError;

mod kind {
    pub const SET: u8 = 0x00;
    pub const OBJECT_SHAPE: u8 = 0x01;
    pub const BASE_SCALAR: u8 = 0x02;
    pub const SCALAR: u8 = 0x03;
    pub const TUPLE: u8 = 0x04;
    pub const NAMED_TUPLE: u8 = 0x05;
    pub const ARRAY: u8 = 0x06;
    pub const ENUM: u8 = 0x07;
}

#[derive(Debug, Clone)]
pub struct ParsedDescriptor {
    pub id: Uuid,
    pub codec: Codec,
}

/// Reads every descriptor out of a type-descriptor blob, in wire order. The
/// last entry is the top-level codec for the query's input or output.
pub fn parse_descriptors(bytes: &[u8]) -> Result<Vec<ParsedDescriptor>, ProtocolError> {
    let mut reader = FlatReadBuffer::new(bytes.to_vec().into());
    let mut descriptors = Vec::new();

    while !reader.is_empty() {
        let tag = reader
            .read_u8()
            .map_err(|_| ProtocolError::MalformedDescriptor("truncated descriptor kind".into()))?;
        let id = reader
            .read_uuid()
            .map_err(|_| ProtocolError::MalformedDescriptor("truncated descriptor id".into()))?;

        let codec = match tag {
            kind::BASE_SCALAR => Codec::Scalar(id),
            kind::SCALAR => {
                let base_id = reader.read_uuid().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated scalar base type".into())
                })?;
                Codec::Scalar(base_id)
            }
            kind::SET => {
                let element = reader.read_uuid().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated set element type".into())
                })?;
                Codec::Set { element }
            }
            kind::ARRAY => {
                let element = reader.read_uuid().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated array element type".into())
                })?;
                let dimensions = reader.read_u16().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated array dimension count".into())
                })?;
                Codec::Array { element, dimensions }
            }
            kind::TUPLE => {
                let count = reader.read_u16().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated tuple element count".into())
                })?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(reader.read_uuid().map_err(|_| {
                        ProtocolError::MalformedDescriptor("truncated tuple element".into())
                    })?);
                }
                Codec::Tuple(elements)
            }
            kind::NAMED_TUPLE => {
                let count = reader.read_u16().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated named tuple field count".into())
                })?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = read_name(&mut reader)?;
                    let type_id = reader.read_uuid().map_err(|_| {
                        ProtocolError::MalformedDescriptor("truncated named tuple field type".into())
                    })?;
                    fields.push((name, type_id));
                }
                Codec::NamedTuple(fields)
            }
            kind::OBJECT_SHAPE => {
                let count = reader.read_u16().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated object field count".into())
                })?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let flags = reader.read_u8().map_err(|_| {
                        ProtocolError::MalformedDescriptor("truncated object field flags".into())
                    })?;
                    let name = read_name(&mut reader)?;
                    let type_id = reader.read_uuid().map_err(|_| {
                        ProtocolError::MalformedDescriptor("truncated object field type".into())
                    })?;
                    fields.push((flags, name, type_id));
                }
                Codec::Object(fields)
            }
            kind::ENUM => {
                let count = reader.read_u16().map_err(|_| {
                    ProtocolError::MalformedDescriptor("truncated enum member count".into())
                })?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    members.push(read_name(&mut reader)?);
                }
                Codec::Enum(members)
            }
            other => {
                return Err(ProtocolError::MalformedDescriptor(format!(
                    "unknown descriptor kind {other:#04x}"
                )))
            }
        };

        descriptors.push(ParsedDescriptor { id, codec });
    }

    Ok(descriptors)
}

fn read_name(reader: &mut FlatReadBuffer) -> Result<String, ProtocolError> {
    let len = reader
        .read_u16()
        .map_err(|_| ProtocolError::MalformedDescriptor("truncated name length".into()))?;
    let bytes = reader
        .consume_as_bytes(len as usize)
        .map_err(|_| ProtocolError::MalformedDescriptor("truncated name bytes".into()))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ProtocolError::MalformedDescriptor("name was not valid utf-8".into()))
}
