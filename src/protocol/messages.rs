//! Typed wrappers over the frames this client sends and receives.
//!
//! Each `encode_*` function assumes the caller has not yet opened a message
//! on the [`WriteMessageBuffer`]; each `decode_*` function assumes
//! `take_message()` has already confirmed a complete frame is present and
//! the tag has been matched by the caller.

use uuid::Uuid;

use crate::buffer::{ReadMessageBuffer, WriteMessageBuffer};
use crate::error::{BufferError, ProtocolError, ServerError};
use crate::protocol::constants::*;

pub type Headers = Vec<(u16, Vec<u8>)>;

fn write_headers(buf: &mut WriteMessageBuffer, headers: &Headers) -> Result<(), BufferError> {
    buf.write_u16(headers.len() as u16)?;
    for (key, value) in headers {
        buf.write_u16(*key)?;
        buf.write_i32(value.len() as i32)?;
        buf.write_bytes(value)?;
    }
    Ok(())
}

fn read_headers(buf: &mut ReadMessageBuffer) -> Result<Headers, BufferError> {
    let count = buf.read_u16()?;
    let mut headers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = buf.read_u16()?;
        let value = buf.read_len_prefixed_bytes()?.to_vec();
        headers.push((key, value));
    }
    Ok(headers)
}

/// Transaction status reported by every `ReadyForCommand` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    Active,
    InTransaction,
    InError,
    Unknown(u8),
}

impl From<u8> for TransactionStatus {
    fn from(byte: u8) -> Self {
        match byte {
            b'I' => TransactionStatus::Idle,
            b'A' => TransactionStatus::Active,
            b'T' => TransactionStatus::InTransaction,
            b'E' => TransactionStatus::InError,
            other => TransactionStatus::Unknown(other),
        }
    }
}

impl From<TransactionStatus> for u8 {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Idle => b'I',
            TransactionStatus::Active => b'A',
            TransactionStatus::InTransaction => b'T',
            TransactionStatus::InError => b'E',
            TransactionStatus::Unknown(b) => b,
        }
    }
}

pub fn encode_client_handshake(buf: &mut WriteMessageBuffer) -> Result<(), BufferError> {
    buf.begin_message(client_tag::CLIENT_HANDSHAKE)?;
    buf.write_u16(PROTOCOL_VERSION_MAJOR)?;
    buf.write_u16(PROTOCOL_VERSION_MINOR)?;
    write_headers(buf, &Vec::new())?; // extension headers, none used by the core
    buf.write_u16(0)?; // param count
    buf.end_message()
}

pub fn encode_authentication_request(
    buf: &mut WriteMessageBuffer,
    user: &str,
    database: &str,
) -> Result<(), BufferError> {
    buf.begin_message(client_tag::AUTHENTICATION_REQUEST)?;
    buf.write_string(user)?;
    buf.write_string(database)?;
    buf.end_message()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshake {
    pub major: u16,
    pub minor: u16,
}

pub fn decode_server_handshake(buf: &mut ReadMessageBuffer) -> Result<ServerHandshake, BufferError> {
    let major = buf.read_u16()?;
    let minor = buf.read_u16()?;
    let _extensions = read_headers(buf)?;
    buf.finish_message();
    Ok(ServerHandshake { major, minor })
}

pub fn decode_server_key_data(buf: &mut ReadMessageBuffer) -> Result<[u8; 32], BufferError> {
    let mut key = [0u8; 32];
    for byte in &mut key {
        *byte = buf.read_u8()?;
    }
    buf.finish_message();
    Ok(key)
}

#[derive(Debug, Clone)]
pub enum Authentication {
    Ok,
    SaslContinue { sasl_data: Vec<u8> },
    SaslFinal { sasl_data: Vec<u8> },
    Unsupported(u32),
}

pub fn decode_authentication(buf: &mut ReadMessageBuffer) -> Result<Authentication, BufferError> {
    let status = buf.read_u32()?;
    let auth = match status {
        auth_status::OK => Authentication::Ok,
        auth_status::SASL_CONTINUE => {
            let sasl_data = buf.read_len_prefixed_bytes()?.to_vec();
            Authentication::SaslContinue { sasl_data }
        }
        auth_status::SASL_FINAL => {
            let sasl_data = buf.read_len_prefixed_bytes()?.to_vec();
            Authentication::SaslFinal { sasl_data }
        }
        other => Authentication::Unsupported(other),
    };
    buf.finish_message();
    Ok(auth)
}

#[derive(Debug, Clone)]
pub struct ParameterStatus {
    pub name: String,
    pub value: Vec<u8>,
}

pub fn decode_parameter_status(buf: &mut ReadMessageBuffer) -> Result<ParameterStatus, BufferError> {
    let name = buf.read_string()?;
    let value = buf.read_len_prefixed_bytes()?.to_vec();
    buf.finish_message();
    Ok(ParameterStatus { name, value })
}

#[derive(Debug, Clone)]
pub struct LogMessage {
    pub severity: u8,
    pub code: u32,
    pub message: String,
}

pub fn decode_log_message(buf: &mut ReadMessageBuffer) -> Result<LogMessage, BufferError> {
    let severity = buf.read_u8()?;
    let code = buf.read_u32()?;
    let message = buf.read_string()?;
    let _attrs = read_headers(buf)?;
    buf.finish_message();
    Ok(LogMessage {
        severity,
        code,
        message,
    })
}

pub fn decode_error_response(buf: &mut ReadMessageBuffer) -> Result<ServerError, BufferError> {
    let severity = buf.read_u8()?;
    let code = buf.read_u32()?;
    let message = buf.read_string()?;
    let attr_headers = read_headers(buf)?;
    buf.finish_message();
    let attributes = attr_headers
        .into_iter()
        .map(|(key, value)| (key, String::from_utf8_lossy(&value).into_owned()))
        .collect();
    Ok(ServerError {
        severity,
        code,
        message,
        attributes,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ReadyForCommand {
    pub transaction_status: TransactionStatus,
}

pub fn decode_ready_for_command(buf: &mut ReadMessageBuffer) -> Result<ReadyForCommand, BufferError> {
    let _headers = read_headers(buf)?;
    let status = buf.read_u8()?;
    buf.finish_message();
    Ok(ReadyForCommand {
        transaction_status: status.into(),
    })
}

pub fn encode_parse(
    buf: &mut WriteMessageBuffer,
    query: &str,
    json_mode: bool,
    expect_one: bool,
) -> Result<(), BufferError> {
    buf.begin_message(client_tag::PARSE)?;
    write_headers(buf, &Vec::new())?;
    buf.write_u8(if json_mode {
        io_format::JSON
    } else {
        io_format::BINARY
    })?;
    buf.write_u8(if expect_one {
        cardinality::ONE
    } else {
        cardinality::MANY
    })?;
    buf.write_string("")?; // statement name, always anonymous
    buf.write_string(query)?;
    buf.end_message()
}

#[derive(Debug, Clone, Copy)]
pub enum Cardinality {
    NoResult,
    AtMostOne,
    Many,
}

impl From<u8> for Cardinality {
    fn from(byte: u8) -> Self {
        match byte {
            b'o' => Cardinality::AtMostOne,
            b'n' => Cardinality::NoResult,
            _ => Cardinality::Many,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrepareComplete {
    pub cardinality: Cardinality,
    pub input_type_id: Uuid,
    pub output_type_id: Uuid,
}

pub fn decode_prepare_complete(buf: &mut ReadMessageBuffer) -> Result<PrepareComplete, BufferError> {
    let _headers = read_headers(buf)?;
    let cardinality = buf.read_u8()?.into();
    let input_type_id = buf.read_uuid()?;
    let output_type_id = buf.read_uuid()?;
    buf.finish_message();
    Ok(PrepareComplete {
        cardinality,
        input_type_id,
        output_type_id,
    })
}

pub fn encode_describe_statement(buf: &mut WriteMessageBuffer) -> Result<(), BufferError> {
    buf.begin_message(client_tag::DESCRIBE_STATEMENT)?;
    write_headers(buf, &Vec::new())?;
    buf.write_u8(DESCRIBE_STATEMENT_ASPECT)?;
    buf.write_string("")?; // anonymous statement
    buf.end_message()
}

#[derive(Debug, Clone)]
pub struct CommandDataDescription {
    pub cardinality: Cardinality,
    pub input_type_id: Uuid,
    pub input_descriptor: Vec<u8>,
    pub output_type_id: Uuid,
    pub output_descriptor: Vec<u8>,
}

pub fn decode_command_data_description(
    buf: &mut ReadMessageBuffer,
) -> Result<CommandDataDescription, BufferError> {
    let _headers = read_headers(buf)?;
    let cardinality = buf.read_u8()?.into();
    let input_type_id = buf.read_uuid()?;
    let input_descriptor = buf.read_len_prefixed_bytes()?.to_vec();
    let output_type_id = buf.read_uuid()?;
    let output_descriptor = buf.read_len_prefixed_bytes()?.to_vec();
    buf.finish_message();
    Ok(CommandDataDescription {
        cardinality,
        input_type_id,
        input_descriptor,
        output_type_id,
        output_descriptor,
    })
}

/// Begins an `Execute` frame; the caller writes the encoded argument tuple
/// and then calls `end_message`.
pub fn begin_execute(buf: &mut WriteMessageBuffer) -> Result<(), BufferError> {
    buf.begin_message(client_tag::EXECUTE)?;
    write_headers(buf, &Vec::new())?;
    buf.write_string("")
}

#[derive(Debug, Clone)]
pub struct CommandComplete {
    pub status: String,
}

pub fn decode_command_complete(buf: &mut ReadMessageBuffer) -> Result<CommandComplete, BufferError> {
    let _headers = read_headers(buf)?;
    let status = buf.read_string()?;
    buf.finish_message();
    Ok(CommandComplete { status })
}

/// A `Data` frame carries exactly one element (the encoded row), itself a
/// length-prefixed tuple. This strips the element-count and tuple-length
/// prefix and hands back a reader positioned at the row's bytes.
pub fn decode_data_row_bytes(buf: &mut ReadMessageBuffer) -> Result<bytes::Bytes, BufferError> {
    let element_count = buf.read_u16()?;
    if element_count != 1 {
        return Err(BufferError::Overread {
            needed: 1,
            available: element_count as usize,
        });
    }
    let tuple_bytes = buf.read_len_prefixed_bytes()?;
    buf.finish_message();
    Ok(tuple_bytes)
}

/// Dispatches a frame with an unrecognized tag to the shared fallthrough
/// handler: `ParameterStatus` and `LogMessage` are absorbed quietly;
/// anything else is a protocol error fatal to the connection.
pub fn handle_fallthrough(
    tag: u8,
    buf: &mut ReadMessageBuffer,
) -> Result<FallthroughOutcome, ProtocolError> {
    match tag {
        t if t == server_tag::PARAMETER_STATUS => {
            let status = decode_parameter_status(buf).map_err(|_| ProtocolError::MalformedDescriptor(
                "truncated ParameterStatus frame".into(),
            ))?;
            Ok(FallthroughOutcome::ParameterStatus(status))
        }
        t if t == server_tag::LOG_MESSAGE => {
            let log = decode_log_message(buf).map_err(|_| {
                ProtocolError::MalformedDescriptor("truncated LogMessage frame".into())
            })?;
            Ok(FallthroughOutcome::LogMessage(log))
        }
        other => Err(ProtocolError::UnexpectedFrame {
            expected: "S or L",
            actual: other,
        }),
    }
}

pub enum FallthroughOutcome {
    ParameterStatus(ParameterStatus),
    LogMessage(LogMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_handshake_round_trips_through_read_buffer() {
        let mut write = WriteMessageBuffer::new();
        encode_client_handshake(&mut write).unwrap();
        let bytes = write.unwrap().unwrap();

        let mut read = ReadMessageBuffer::new();
        read.feed(bytes);
        assert!(read.take_message_type(client_tag::CLIENT_HANDSHAKE));
        // Hand-decode since this is a client->server frame with no decoder.
        assert_eq!(read.read_u16().unwrap(), PROTOCOL_VERSION_MAJOR);
        assert_eq!(read.read_u16().unwrap(), PROTOCOL_VERSION_MINOR);
    }

    #[test]
    fn ready_for_command_carries_transaction_status() {
        let mut write = WriteMessageBuffer::new();
        write.begin_message(server_tag::READY_FOR_COMMAND).unwrap();
        write.write_u16(0).unwrap(); // no headers
        write.write_u8(b'I').unwrap();
        write.end_message().unwrap();
        let bytes = write.unwrap().unwrap();

        let mut read = ReadMessageBuffer::new();
        read.feed(bytes);
        assert!(read.take_message_type(server_tag::READY_FOR_COMMAND));
        let ready = decode_ready_for_command(&mut read).unwrap();
        assert_eq!(ready.transaction_status, TransactionStatus::Idle);
    }

    #[test]
    fn parse_frame_encodes_cardinality_and_format() {
        let mut write = WriteMessageBuffer::new();
        encode_parse(&mut write, "select 1", true, true).unwrap();
        let bytes = write.unwrap().unwrap();
        // tag + length(4) + headers(2) + format(1) + cardinality(1)
        assert_eq!(bytes[0], client_tag::PARSE);
        assert_eq!(bytes[7], io_format::JSON);
        assert_eq!(bytes[8], cardinality::ONE);
    }
}
