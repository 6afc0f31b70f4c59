use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

use crate::codec::descriptor::parse_descriptors;
use crate::codec::{scalars, Codec};
use crate::error::ProtocolError;

/// Per-connection `UUID -> Codec` cache (§4.2.2). Entries are never evicted
/// for the lifetime of a connection; append-only, keyed by the type id the
/// server assigned it.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: RefCell<HashMap<Uuid, Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        let codecs = scalars::ALL
            .iter()
            .map(|id| (*id, Codec::Scalar(*id)))
            .collect();
        Self {
            codecs: RefCell::new(codecs),
        }
    }

    pub fn register(&self, id: Uuid, codec: Codec) {
        self.codecs.borrow_mut().insert(id, codec);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.codecs.borrow().contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Result<Codec, ProtocolError> {
        self.codecs
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(ProtocolError::UnknownTypeId(id))
    }

    /// Parses a type-descriptor blob, registering every descriptor it
    /// contains, and returns the id of the last one — the top-level codec
    /// for the query's input or output (§4.2.2 rule 2).
    pub fn build_from_descriptors(&self, bytes: &[u8]) -> Result<Uuid, ProtocolError> {
        let parsed = parse_descriptors(bytes)?;
        if parsed.is_empty() {
            return Err(ProtocolError::MissingTypeDescriptors);
        }
        let mut last = None;
        for entry in parsed {
            self.register(entry.id, entry.codec);
            last = Some(entry.id);
        }
        Ok(last.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_scalars_are_preregistered() {
        let registry = CodecRegistry::new();
        assert!(registry.contains(scalars::INT32));
        assert!(registry.contains(scalars::STR));
    }

    #[test]
    fn unknown_id_is_an_error() {
        let registry = CodecRegistry::new();
        assert!(matches!(
            registry.get(Uuid::new_v4()),
            Err(ProtocolError::UnknownTypeId(_))
        ));
    }

    #[test]
    fn build_from_descriptors_registers_and_returns_last() {
        use crate::buffer::WriteBuffer;

        let registry = CodecRegistry::new();
        let tuple_id = Uuid::new_v4();

        let mut buf = WriteBuffer::new();
        buf.write_u8(0x04); // tuple kind, matches descriptor::kind::TUPLE
        buf.write_uuid(&tuple_id);
        buf.write_u16(1);
        buf.write_uuid(&scalars::INT32);
        let bytes = buf.unwrap().to_vec();

        let top = registry.build_from_descriptors(&bytes).unwrap();
        assert_eq!(top, tuple_id);
        assert!(registry.contains(tuple_id));
    }
}
