//! A binary-protocol database client: byte-buffer framing, a
//! type-descriptor-driven codec tree, a handshake/query connection state
//! machine, and a configuration resolver that merges explicit options,
//! environment variables, and project-linked instances.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;

pub use client::{connect, Client};
pub use codec::value::Value;
pub use config::ConnectOptions;
pub use error::{Error, Result};
