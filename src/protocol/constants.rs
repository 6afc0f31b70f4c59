//! Frame tags and scalar type ids for the wire protocol. Each frame is
//! identified by a single tag byte rather than a multi-byte command code.

/// Client -> server frame tags.
pub mod client_tag {
    pub const CLIENT_HANDSHAKE: u8 = b'V';
    pub const AUTHENTICATION_REQUEST: u8 = b'0';
    pub const PARSE: u8 = b'P';
    pub const DESCRIBE_STATEMENT: u8 = b'D';
    pub const EXECUTE: u8 = b'E';
    pub const SYNC: u8 = b'S';
    pub const FLUSH: u8 = b'H';
    pub const TERMINATE: u8 = b'X';
}

/// Server -> client frame tags.
pub mod server_tag {
    pub const SERVER_HANDSHAKE: u8 = b'v';
    pub const SERVER_KEY_DATA: u8 = b'K';
    pub const AUTHENTICATION: u8 = b'R';
    pub const PARAMETER_STATUS: u8 = b'S';
    pub const LOG_MESSAGE: u8 = b'L';
    pub const ERROR_RESPONSE: u8 = b'E';
    pub const READY_FOR_COMMAND: u8 = b'Z';
    pub const PREPARE_COMPLETE: u8 = b'1';
    pub const COMMAND_DATA_DESCRIPTION: u8 = b'T';
    pub const DATA: u8 = b'D';
    pub const COMMAND_COMPLETE: u8 = b'C';
}

/// `Describe` sub-command byte.
pub const DESCRIBE_STATEMENT_ASPECT: u8 = b'T';

/// `Authentication` status codes (§4.3.2).
pub mod auth_status {
    pub const OK: u32 = 0;
    pub const SASL_CONTINUE: u32 = 11;
    pub const SASL_FINAL: u32 = 12;
}

/// I/O format byte sent with `Parse`.
pub mod io_format {
    pub const JSON: u8 = b'j';
    pub const BINARY: u8 = b'b';
}

/// Cardinality byte sent with `Parse`/returned with `PrepareComplete`.
pub mod cardinality {
    pub const ONE: u8 = b'o';
    pub const MANY: u8 = b'm';
}

/// Negotiated protocol version.
pub const PROTOCOL_VERSION_MAJOR: u16 = 1;
pub const PROTOCOL_VERSION_MINOR: u16 = 0;

/// ALPN protocol name negotiated over TLS.
pub const ALPN_PROTOCOL: &[u8] = b"edgedb-binary";

/// Maximum size of a single frame's payload.
pub const MAX_PDU_SIZE: usize = crate::buffer::MAX_MESSAGE_SIZE;
