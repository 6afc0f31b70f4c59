//! Zero-copy byte-buffer layer: a grow-on-demand writer for outbound frames
//! and a ring-backed reader that assembles inbound chunks into logical
//! messages without per-message allocation.

mod flat_read;
mod read_message;
mod write;
mod write_message;

pub use flat_read::FlatReadBuffer;
pub use read_message::ReadMessageBuffer;
pub use write::WriteBuffer;
pub use write_message::{WriteMessageBuffer, MAX_MESSAGE_SIZE};
