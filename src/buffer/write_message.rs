use super::write::WriteBuffer;
use crate::error::BufferError;

/// Maximum size of a single outbound frame, payload plus header.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Precomputed single-frame messages with empty payloads.
const SYNC_MESSAGE: [u8; 5] = [b'S', 0, 0, 0, 4];
const FLUSH_MESSAGE: [u8; 5] = [b'H', 0, 0, 0, 4];

/// Wraps a [`WriteBuffer`] with frame bookkeeping: `begin_message`/`end_message`
/// back-patch the length prefix the way every length-prefixed message on this
/// wire requires.
#[derive(Debug, Default)]
pub struct WriteMessageBuffer {
    buf: WriteBuffer,
    open_at: Option<usize>,
}

impl WriteMessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_message(&mut self, tag: u8) -> Result<(), BufferError> {
        if self.open_at.is_some() {
            return Err(BufferError::MessageAlreadyOpen);
        }
        self.buf.write_u8(tag);
        self.open_at = Some(self.buf.position());
        self.buf.write_i32(0); // placeholder length
        Ok(())
    }

    fn require_open(&self) -> Result<(), BufferError> {
        if self.open_at.is_none() {
            return Err(BufferError::NoMessageOpen);
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_u8(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_u16(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_i32(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_u32(value);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_bytes(bytes);
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_string(value);
        Ok(())
    }

    pub fn write_uuid(&mut self, value: &uuid::Uuid) -> Result<(), BufferError> {
        self.require_open()?;
        self.buf.write_uuid(value);
        Ok(())
    }

    /// Back-patches the length field and closes the current message.
    /// Length counts everything after the tag, including the length field itself.
    pub fn end_message(&mut self) -> Result<(), BufferError> {
        let start = self.open_at.take().ok_or(BufferError::NoMessageOpen)?;
        let length = self.buf.position() - start;
        if length > MAX_MESSAGE_SIZE {
            return Err(BufferError::MessageTooLarge(length));
        }
        self.buf.patch(start, &(length as u32).to_be_bytes());
        Ok(())
    }

    pub fn write_sync(&mut self) -> Result<(), BufferError> {
        if self.open_at.is_some() {
            return Err(BufferError::MessageAlreadyOpen);
        }
        self.buf.write_bytes(&SYNC_MESSAGE);
        Ok(())
    }

    pub fn write_flush(&mut self) -> Result<(), BufferError> {
        if self.open_at.is_some() {
            return Err(BufferError::MessageAlreadyOpen);
        }
        self.buf.write_bytes(&FLUSH_MESSAGE);
        Ok(())
    }

    pub fn unwrap(self) -> Result<bytes::BytesMut, BufferError> {
        if self.open_at.is_some() {
            return Err(BufferError::NoMessageOpen);
        }
        Ok(self.buf.unwrap())
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_covers_itself_but_not_tag() {
        let mut buf = WriteMessageBuffer::new();
        buf.begin_message(b'P').unwrap();
        buf.write_bytes(b"0123456789").unwrap();
        buf.end_message().unwrap();

        let bytes = buf.unwrap().freeze();
        assert_eq!(bytes[0], b'P');
        let len = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        assert_eq!(len as usize, bytes.len() - 1);
    }

    #[test]
    fn cannot_write_without_open_message() {
        let mut buf = WriteMessageBuffer::new();
        assert!(matches!(buf.write_u8(1), Err(BufferError::NoMessageOpen)));
    }

    #[test]
    fn cannot_nest_messages() {
        let mut buf = WriteMessageBuffer::new();
        buf.begin_message(b'P').unwrap();
        assert!(matches!(
            buf.begin_message(b'Q'),
            Err(BufferError::MessageAlreadyOpen)
        ));
    }

    #[test]
    fn sync_and_flush_require_no_open_message() {
        let mut buf = WriteMessageBuffer::new();
        buf.begin_message(b'P').unwrap();
        assert!(matches!(
            buf.write_sync(),
            Err(BufferError::MessageAlreadyOpen)
        ));
    }
}
