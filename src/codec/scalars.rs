//! Built-in scalar codecs, pre-registered under well-known type ids the
//! server is assumed to reuse whenever a query touches a primitive type.
//!
//! Each scalar writes its length prefix then its bytes, big-endian. Decode
//! is handed a [`FlatReadBuffer`] already narrowed to the value's byte range
//! (the length prefix has already been consumed by the composite decoder or
//! the top-level caller).

use uuid::{uuid, Uuid};

use crate::buffer::{FlatReadBuffer, WriteBuffer};
use crate::codec::value::Value;
use crate::error::{BufferError, ProtocolError};

macro_rules! base_scalar_id {
    ($name:ident, $id:expr) => {
        pub const $name: Uuid = uuid!($id);
    };
}

base_scalar_id!(BOOL, "00000000-0000-0000-0000-000000000001");
base_scalar_id!(INT16, "00000000-0000-0000-0000-000000000002");
base_scalar_id!(INT32, "00000000-0000-0000-0000-000000000003");
base_scalar_id!(INT64, "00000000-0000-0000-0000-000000000004");
base_scalar_id!(FLOAT32, "00000000-0000-0000-0000-000000000005");
base_scalar_id!(FLOAT64, "00000000-0000-0000-0000-000000000006");
base_scalar_id!(STR, "00000000-0000-0000-0000-000000000007");
base_scalar_id!(BYTES, "00000000-0000-0000-0000-000000000008");
base_scalar_id!(UUID, "00000000-0000-0000-0000-000000000009");
base_scalar_id!(DATETIME, "00000000-0000-0000-0000-00000000000a");
base_scalar_id!(BIGINT, "00000000-0000-0000-0000-00000000000b");
base_scalar_id!(DECIMAL, "00000000-0000-0000-0000-00000000000c");
base_scalar_id!(JSON, "00000000-0000-0000-0000-00000000000d");
base_scalar_id!(LOCAL_DATETIME, "00000000-0000-0000-0000-00000000000e");
base_scalar_id!(LOCAL_DATE, "00000000-0000-0000-0000-00000000000f");
base_scalar_id!(LOCAL_TIME, "00000000-0000-0000-0000-000000000010");
base_scalar_id!(DURATION, "00000000-0000-0000-0000-000000000011");

/// All ids the registry treats as built-in (never require a descriptor).
pub const ALL: &[Uuid] = &[
    BOOL, INT16, INT32, INT64, FLOAT32, FLOAT64, STR, BYTES, UUID, DATETIME, BIGINT, DECIMAL, JSON,
    LOCAL_DATETIME, LOCAL_DATE, LOCAL_TIME, DURATION,
];

pub fn encode(id: Uuid, buf: &mut WriteBuffer, value: &Value) -> Result<(), ProtocolError> {
    match (id, value) {
        (id, Value::Null) if ALL.contains(&id) => {
            buf.write_i32(-1);
        }
        (id, Value::Bool(b)) if id == BOOL => {
            buf.write_i32(1);
            buf.write_u8(if *b { 1 } else { 0 });
        }
        (id, Value::Int16(v)) if id == INT16 => {
            buf.write_i32(2);
            buf.write_bytes(&v.to_be_bytes());
        }
        (id, Value::Int32(v)) if id == INT32 => {
            buf.write_i32(4);
            buf.write_bytes(&v.to_be_bytes());
        }
        (id, Value::Int64(v)) if id == INT64 => {
            buf.write_i32(8);
            buf.write_bytes(&v.to_be_bytes());
        }
        (id, Value::Float32(v)) if id == FLOAT32 => {
            buf.write_i32(4);
            buf.write_bytes(&v.to_be_bytes());
        }
        (id, Value::Float64(v)) if id == FLOAT64 => {
            buf.write_i32(8);
            buf.write_bytes(&v.to_be_bytes());
        }
        (id, Value::Str(s)) if id == STR || id == JSON => {
            buf.write_i32(s.len() as i32);
            buf.write_bytes(s.as_bytes());
        }
        (id, Value::Bytes(b)) if id == BYTES => {
            buf.write_i32(b.len() as i32);
            buf.write_bytes(b);
        }
        (id, Value::Uuid(u)) if id == UUID => {
            buf.write_i32(16);
            buf.write_uuid(u);
        }
        (id, Value::DateTime(micros)) if id == DATETIME => {
            buf.write_i32(8);
            buf.write_bytes(&micros.to_be_bytes());
        }
        (id, Value::BigInt(s)) if id == BIGINT => {
            buf.write_i32(s.len() as i32);
            buf.write_bytes(s.as_bytes());
        }
        (id, Value::Decimal(s)) if id == DECIMAL => {
            buf.write_i32(s.len() as i32);
            buf.write_bytes(s.as_bytes());
        }
        (id, Value::LocalDateTime(micros)) if id == LOCAL_DATETIME => {
            buf.write_i32(8);
            buf.write_bytes(&micros.to_be_bytes());
        }
        (id, Value::LocalDate(days)) if id == LOCAL_DATE => {
            buf.write_i32(4);
            buf.write_bytes(&days.to_be_bytes());
        }
        (id, Value::LocalTime(micros)) if id == LOCAL_TIME => {
            buf.write_i32(8);
            buf.write_bytes(&micros.to_be_bytes());
        }
        (id, Value::Duration(micros)) if id == DURATION => {
            buf.write_i32(8);
            buf.write_bytes(&micros.to_be_bytes());
        }
        (id, value) => {
            return Err(ProtocolError::MalformedDescriptor(format!(
                "value {value:?} does not match scalar type id {id}"
            )))
        }
    }
    Ok(())
}

pub fn decode(id: Uuid, len: usize, buf: &mut FlatReadBuffer) -> Result<Value, BufferError> {
    if len == 0 && id != STR && id != JSON && id != BYTES && id != BIGINT && id != DECIMAL {
        // Zero-length non-string/bytes scalars are never legal; fall through
        // to the type-specific reads below, which will raise Overread.
    }
    let value = match id {
        id if id == BOOL => Value::Bool(buf.read_u8()? != 0),
        id if id == INT16 => Value::Int16(buf.read_i16()?),
        id if id == INT32 => Value::Int32(buf.read_i32()?),
        id if id == INT64 => Value::Int64(buf.read_i64()?),
        id if id == FLOAT32 => Value::Float32(buf.read_f32()?),
        id if id == FLOAT64 => Value::Float64(buf.read_f64()?),
        id if id == STR => Value::Str(buf.consume_as_string()?),
        id if id == JSON => Value::Json(buf.consume_as_string()?),
        id if id == BYTES => Value::Bytes(buf.consume_as_bytes(len)?.to_vec()),
        id if id == UUID => Value::Uuid(buf.read_uuid()?),
        id if id == DATETIME => Value::DateTime(buf.read_i64()?),
        id if id == BIGINT => Value::BigInt(buf.consume_as_string()?),
        id if id == DECIMAL => Value::Decimal(buf.consume_as_string()?),
        id if id == LOCAL_DATETIME => Value::LocalDateTime(buf.read_i64()?),
        id if id == LOCAL_DATE => Value::LocalDate(buf.read_i32()?),
        id if id == LOCAL_TIME => Value::LocalTime(buf.read_i64()?),
        id if id == DURATION => Value::Duration(buf.read_i64()?),
        _ => {
            return Err(BufferError::Overread {
                needed: len,
                available: buf.remaining(),
            })
        }
    };
    Ok(value)
}

pub fn is_null(len: i32) -> bool {
    len < 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_round_trips() {
        let mut buf = WriteBuffer::new();
        encode(INT32, &mut buf, &Value::Int32(-123456)).unwrap();
        let bytes = buf.unwrap();
        assert_eq!(&bytes[0..4], &4i32.to_be_bytes());
        assert_eq!(&bytes[4..8], &(-123456i32).to_be_bytes());

        let mut reader = FlatReadBuffer::new(bytes.freeze().slice(4..));
        assert_eq!(decode(INT32, 4, &mut reader).unwrap(), Value::Int32(-123456));
    }

    #[test]
    fn str_round_trips() {
        let mut buf = WriteBuffer::new();
        encode(STR, &mut buf, &Value::Str("hi".into())).unwrap();
        let bytes = buf.unwrap().freeze();
        let mut reader = FlatReadBuffer::new(bytes.slice(4..));
        assert_eq!(decode(STR, 2, &mut reader).unwrap(), Value::Str("hi".into()));
    }

    #[test]
    fn local_date_round_trips() {
        let mut buf = WriteBuffer::new();
        encode(LOCAL_DATE, &mut buf, &Value::LocalDate(12345)).unwrap();
        let bytes = buf.unwrap().freeze();
        let mut reader = FlatReadBuffer::new(bytes.slice(4..));
        assert_eq!(decode(LOCAL_DATE, 4, &mut reader).unwrap(), Value::LocalDate(12345));
    }

    #[test]
    fn duration_round_trips() {
        let mut buf = WriteBuffer::new();
        encode(DURATION, &mut buf, &Value::Duration(-987654321)).unwrap();
        let bytes = buf.unwrap().freeze();
        let mut reader = FlatReadBuffer::new(bytes.slice(4..));
        assert_eq!(decode(DURATION, 8, &mut reader).unwrap(), Value::Duration(-987654321));
    }

    #[test]
    fn mismatched_value_rejected() {
        let mut buf = WriteBuffer::new();
        let err = encode(INT32, &mut buf, &Value::Str("oops".into())).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedDescriptor(_)));
    }
}
