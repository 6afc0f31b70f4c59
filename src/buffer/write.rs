use bytes::{BufMut, BytesMut};

/// Minimum amount a [`WriteBuffer`] grows by whenever it runs out of room.
const GROWTH_INCREMENT: usize = 4096;

/// A grow-on-demand scratch buffer for assembling outbound frame payloads.
///
/// Unlike `BytesMut`'s own reallocation policy, growth here is driven
/// explicitly in [`GROWTH_INCREMENT`]-sized steps so callers can reason about
/// when a copy happens. The buffer never shrinks.
#[derive(Debug)]
pub struct WriteBuffer {
    inner: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self {
            inner: BytesMut::with_capacity(GROWTH_INCREMENT),
        }
    }

    pub fn position(&self) -> usize {
        self.inner.len()
    }

    fn reserve_for(&mut self, additional: usize) {
        if self.inner.capacity() - self.inner.len() < additional {
            let grow_by = additional.max(GROWTH_INCREMENT);
            self.inner.reserve(grow_by);
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.reserve_for(1);
        self.inner.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.reserve_for(2);
        self.inner.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.reserve_for(2);
        self.inner.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.reserve_for(4);
        self.inner.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.reserve_for(4);
        self.inner.put_i32(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve_for(bytes.len());
        self.inner.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed UTF-8 string (`i32` byte length followed by the bytes).
    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.write_bytes(value.as_bytes());
    }

    pub fn write_uuid(&mut self, value: &uuid::Uuid) {
        self.write_bytes(value.as_bytes());
    }

    /// Overwrites `len` bytes at `at` with `bytes`. Used to back-patch a
    /// length prefix once the size of what follows it is known.
    pub fn patch(&mut self, at: usize, bytes: &[u8]) {
        self.inner[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn reset(&mut self) {
        self.inner.clear();
    }

    /// Consumes the buffer, returning everything written so far.
    pub fn unwrap(self) -> BytesMut {
        self.inner
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_initial_capacity() {
        let mut buf = WriteBuffer::new();
        buf.write_bytes(&vec![0u8; GROWTH_INCREMENT + 10]);
        assert_eq!(buf.position(), GROWTH_INCREMENT + 10);
    }

    #[test]
    fn patch_rewrites_in_place() {
        let mut buf = WriteBuffer::new();
        let at = buf.position();
        buf.write_i32(0);
        buf.write_bytes(b"hello");
        buf.patch(at, &5i32.to_be_bytes());
        assert_eq!(&buf.as_slice()[0..4], &5i32.to_be_bytes());
    }

    #[test]
    fn write_string_is_length_prefixed() {
        let mut buf = WriteBuffer::new();
        buf.write_string("hi");
        assert_eq!(buf.as_slice(), &[0, 0, 0, 2, b'h', b'i']);
    }
}
