//! Wire-level frame tags and message (de)serialization.

pub mod constants;
mod messages;

pub use messages::*;
