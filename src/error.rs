use std::io;
use thiserror::Error;

/// Errors raised while assembling or emitting frames from the byte buffer layer.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("read past the end of the current message: needed {needed} bytes, {available} available")]
    Overread { needed: usize, available: usize },

    #[error("attempted to write a field while no message is open")]
    NoMessageOpen,

    #[error("attempted to begin a message while another message is still open")]
    MessageAlreadyOpen,

    #[error("message body exceeds the maximum frame size ({0} bytes)")]
    MessageTooLarge(usize),

    #[error("inbound chunk ring is full; transport must apply backpressure")]
    RingFull,
}

/// Errors raised while interpreting a server-sent type descriptor or invoking a codec.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected frame tag {actual:#04x}, expected one of {expected}")]
    UnexpectedFrame { expected: &'static str, actual: u8 },

    #[error("unsupported protocol version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unsupported authentication method (status code {0})")]
    UnsupportedAuth(u32),

    #[error("server did not supply type descriptors for the query")]
    MissingTypeDescriptors,

    #[error("type descriptor referenced unknown type id {0}")]
    UnknownTypeId(uuid::Uuid),

    #[error("codec descriptor stream was malformed: {0}")]
    MalformedDescriptor(String),

    #[error("connection is in phase {actual:?}, operation requires {expected:?}")]
    WrongPhase {
        expected: &'static str,
        actual: &'static str,
    },
}

/// The payload of an `ErrorResponse` frame, surfaced verbatim to the caller.
#[derive(Debug, Clone, Error)]
#[error("server error {code:#010x}: {message}")]
pub struct ServerError {
    pub severity: u8,
    pub code: u32,
    pub message: String,
    pub attributes: Vec<(u16, String)>,
}

/// Errors raised while resolving connection options from args, env, and project files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no 'edgedb.toml' found and no connection options were provided")]
    NoProjectConfig,

    #[error("cannot have more than one of dsn, instance name, credentials file, or host/port at the same priority level")]
    CompoundOptions,

    #[error("invalid host {0:?}: must be non-empty and must not contain '/' or ','")]
    InvalidHost(String),

    #[error("invalid port {0}: must be in range 1..=65535")]
    InvalidPort(i64),

    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    #[error("credentials file is malformed: {0}")]
    InvalidCredentials(#[from] serde_json::Error),

    #[error("database and user must be non-empty")]
    EmptyIdentifier,

    #[error("duplicate query parameter {0:?} in DSN")]
    DuplicateParameter(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors raised by the underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("connection closed by peer")]
    ClosedByPeer,
}

/// The crate-wide error type. Every layer's error enum is a variant here,
/// matching the taxonomy of the wire protocol this client speaks.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(TransportError::Io(err))
    }
}

/// A specialized `Result` type for connection operations.
pub type Result<T> = std::result::Result<T, Error>;
