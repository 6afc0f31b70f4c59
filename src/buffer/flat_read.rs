use bytes::Bytes;

use crate::error::BufferError;

/// A single-chunk, non-growing reader over a value's byte range. Codecs are
/// handed one of these already narrowed to the value being decoded; it shares
/// the underlying bytes with its parent (no copy).
#[derive(Debug, Clone)]
pub struct FlatReadBuffer {
    data: Bytes,
    pos: usize,
}

impl FlatReadBuffer {
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&[u8], BufferError> {
        if n > self.remaining() {
            return Err(BufferError::Overread {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_uuid(&mut self) -> Result<uuid::Uuid, BufferError> {
        Ok(uuid::Uuid::from_slice(self.take(16)?).expect("take(16) guarantees 16 bytes"))
    }

    pub fn discard(&mut self, n: usize) -> Result<(), BufferError> {
        self.take(n).map(|_| ())
    }

    /// Returns the remaining bytes as a borrowed slice without consuming them.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn consume_as_bytes(&mut self, n: usize) -> Result<Bytes, BufferError> {
        if n > self.remaining() {
            return Err(BufferError::Overread {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    pub fn consume_as_string(&mut self) -> Result<String, BufferError> {
        let remaining = self.remaining();
        let bytes = self.take(remaining)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_drain_in_order() {
        let mut buf = FlatReadBuffer::new(Bytes::from_static(&[0, 0, 0, 42, b'h', b'i']));
        assert_eq!(buf.read_i32().unwrap(), 42);
        assert_eq!(buf.consume_as_string().unwrap(), "hi");
    }

    #[test]
    fn overread_fails_cleanly() {
        let mut buf = FlatReadBuffer::new(Bytes::from_static(&[1, 2]));
        assert!(buf.read_i32().is_err());
    }
}
