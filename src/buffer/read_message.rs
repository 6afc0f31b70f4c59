use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::BufferError;

/// Ring capacity, in chunks, before `feed` reports backpressure.
const RING_CAPACITY: usize = 1024;

/// Tracks progress through the current logical frame: the tag and length
/// fields once known, how much of the payload remains unread, and whether a
/// complete frame is sitting in the buffer.
#[derive(Debug, Default, Clone, Copy)]
struct MessageCursor {
    tag: Option<u8>,
    length: Option<u32>,
    unread: usize,
    ready: bool,
    header_consumed: bool,
}

/// Accumulates arbitrary TCP chunks and exposes a cursor over the logical
/// message stream without copying bytes until a message is actually
/// extracted. `take_message` never mutates the ring: the same "does a
/// complete frame exist" check can be called any number of times, driven by
/// however the caller's transport happens to split reads into chunks.
#[derive(Debug, Default)]
pub struct ReadMessageBuffer {
    chunks: VecDeque<Bytes>,
    len: usize,
    cursor: MessageCursor,
}

impl ReadMessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a chunk received from the transport. Returns `true` when the
    /// ring has reached capacity and the caller should apply backpressure.
    pub fn feed(&mut self, chunk: impl Into<Bytes>) -> bool {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_back(chunk);
        }
        self.chunks.len() >= RING_CAPACITY
    }

    /// Peeks `n` bytes starting at `offset` from the front of the ring,
    /// without consuming anything. Returns `None` if not enough data exists.
    fn peek(&self, offset: usize, n: usize) -> Option<Vec<u8>> {
        if offset + n > self.len {
            return None;
        }
        let mut out = Vec::with_capacity(n);
        let mut skip = offset;
        for chunk in &self.chunks {
            if out.len() == n {
                break;
            }
            if skip >= chunk.len() {
                skip -= chunk.len();
                continue;
            }
            let start = skip;
            let take = (chunk.len() - start).min(n - out.len());
            out.extend_from_slice(&chunk[start..start + take]);
            skip = 0;
        }
        Some(out)
    }

    /// Physically removes `n` bytes from the front of the ring, coalescing
    /// across chunk boundaries. Panics if `n > self.len` (callers must check).
    fn advance(&mut self, n: usize) -> Bytes {
        debug_assert!(n <= self.len);
        if n == 0 {
            return Bytes::new();
        }
        // Fast path: entirely within the front chunk.
        if let Some(front) = self.chunks.front() {
            if front.len() >= n {
                let out = front.slice(0..n);
                if front.len() == n {
                    self.chunks.pop_front();
                } else {
                    let remainder = front.slice(n..);
                    self.chunks[0] = remainder;
                }
                self.len -= n;
                return out;
            }
        }
        // Slow path: spans multiple chunks, requires a copy.
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let front = self.chunks.front_mut().expect("len invariant violated");
            let take = front.len().min(remaining);
            out.extend_from_slice(&front[..take]);
            if take == front.len() {
                self.chunks.pop_front();
            } else {
                *front = front.slice(take..);
            }
            remaining -= take;
        }
        self.len -= n;
        Bytes::from(out)
    }

    fn discard(&mut self, n: usize) {
        let _ = self.advance(n);
    }

    /// Attempts to advance the cursor's knowledge of the current frame.
    /// Returns `true` only when a complete frame is present in the buffer.
    pub fn take_message(&mut self) -> bool {
        if self.cursor.ready {
            return true;
        }
        if self.cursor.tag.is_none() {
            match self.peek(0, 1) {
                Some(bytes) => self.cursor.tag = Some(bytes[0]),
                None => return false,
            }
        }
        if self.cursor.length.is_none() {
            match self.peek(1, 4) {
                Some(bytes) => {
                    let length = u32::from_be_bytes(bytes.try_into().unwrap());
                    self.cursor.length = Some(length);
                    self.cursor.unread = (length as usize).saturating_sub(4);
                }
                None => return false,
            }
        }
        let total_needed = 5 + self.cursor.unread;
        if self.len >= total_needed {
            self.cursor.ready = true;
            true
        } else {
            false
        }
    }

    /// Peeks whether the next complete frame has the given tag.
    pub fn take_message_type(&mut self, tag: u8) -> bool {
        self.take_message() && self.cursor.tag == Some(tag)
    }

    pub fn get_message_type(&self) -> Option<u8> {
        self.cursor.tag
    }

    /// Undoes the "ready" determination so a subsequent `take_message` call
    /// recomputes it. Cheap: tag/length stay cached, so the next call
    /// re-confirms readiness immediately rather than re-peeking from scratch.
    pub fn put_message(&mut self) {
        self.cursor.ready = false;
    }

    fn ensure_header_consumed(&mut self) {
        if !self.cursor.header_consumed {
            self.discard(5);
            self.cursor.header_consumed = true;
        }
    }

    /// Skips the remainder of the current message's payload and resets the cursor.
    pub fn discard_message(&mut self) {
        self.ensure_header_consumed();
        self.discard(self.cursor.unread);
        self.finish_message();
    }

    /// Extracts the entire remaining payload as a single contiguous buffer,
    /// zero-copy when it lies within one chunk, and resets the cursor.
    pub fn consume_message(&mut self) -> Bytes {
        self.ensure_header_consumed();
        let payload = self.advance(self.cursor.unread);
        self.cursor.unread = 0;
        self.finish_message();
        payload
    }

    /// Resets cursor state for the next message, discarding any payload
    /// bytes the caller didn't read so the ring stays in sync.
    pub fn finish_message(&mut self) {
        self.ensure_header_consumed();
        if self.cursor.unread > 0 {
            self.discard(self.cursor.unread);
        }
        self.cursor = MessageCursor::default();
    }

    fn read_exact(&mut self, n: usize) -> Result<Bytes, BufferError> {
        self.ensure_header_consumed();
        if n > self.cursor.unread {
            return Err(BufferError::Overread {
                needed: n,
                available: self.cursor.unread,
            });
        }
        let out = self.advance(n);
        self.cursor.unread -= n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, BufferError> {
        let b = self.read_exact(2)?;
        Ok(i16::from_be_bytes(b.as_ref().try_into().unwrap()))
    }

    pub fn read_u16(&mut self) -> Result<u16, BufferError> {
        let b = self.read_exact(2)?;
        Ok(u16::from_be_bytes(b.as_ref().try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, BufferError> {
        let b = self.read_exact(4)?;
        Ok(i32::from_be_bytes(b.as_ref().try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        let b = self.read_exact(4)?;
        Ok(u32::from_be_bytes(b.as_ref().try_into().unwrap()))
    }

    pub fn read_string(&mut self) -> Result<String, BufferError> {
        let len = self.read_i32()? as usize;
        let bytes = self.read_exact(len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn read_uuid(&mut self) -> Result<uuid::Uuid, BufferError> {
        let bytes = self.read_exact(16)?;
        Ok(uuid::Uuid::from_slice(&bytes).expect("read_exact guarantees 16 bytes"))
    }

    pub fn read_len_prefixed_bytes(&mut self) -> Result<Bytes, BufferError> {
        let len = self.read_i32()? as usize;
        self.read_exact(len)
    }

    /// Bytes still owed before the current message is fully consumed.
    pub fn unread(&self) -> usize {
        self.cursor.unread
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(&((payload.len() + 4) as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn assembles_frame_fed_in_one_chunk() {
        let frame = build_frame(b'P', b"0123456789");
        let mut buf = ReadMessageBuffer::new();
        buf.feed(frame);
        assert!(buf.take_message());
        assert_eq!(buf.get_message_type(), Some(b'P'));
        let payload = buf.consume_message();
        assert_eq!(&payload[..], b"0123456789");
    }

    #[test]
    fn assembles_frame_split_across_arbitrary_chunks() {
        let frame = build_frame(b'P', b"0123456789");
        let splits = [1, 2, 7, 5];
        let mut buf = ReadMessageBuffer::new();
        let mut offset = 0;
        let mut results = Vec::new();
        for size in splits {
            buf.feed(frame[offset..offset + size].to_vec());
            offset += size;
            results.push(buf.take_message());
        }
        assert_eq!(results, vec![false, false, false, true]);
        let payload = buf.consume_message();
        assert_eq!(&payload[..], b"0123456789");
    }

    #[test]
    fn typed_reads_drain_payload_in_order() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&42i32.to_be_bytes());
        payload.extend_from_slice(b"hi");
        let frame = build_frame(b'D', &payload);

        let mut buf = ReadMessageBuffer::new();
        buf.feed(frame);
        assert!(buf.take_message());
        assert_eq!(buf.read_i32().unwrap(), 42);
        assert_eq!(buf.read_u8().unwrap(), b'h');
        assert_eq!(buf.read_u8().unwrap(), b'i');
        buf.finish_message();
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn overread_is_rejected_without_advancing() {
        let frame = build_frame(b'D', &[1, 2]);
        let mut buf = ReadMessageBuffer::new();
        buf.feed(frame);
        assert!(buf.take_message());
        let err = buf.read_i32().unwrap_err();
        assert!(matches!(err, BufferError::Overread { .. }));
    }

    #[test]
    fn finish_message_discards_unread_trailer() {
        let frame = build_frame(b'Z', &[1, 2, 3, 4]);
        let mut buf = ReadMessageBuffer::new();
        buf.feed(frame);
        assert!(buf.take_message());
        let _ = buf.read_u8().unwrap();
        buf.finish_message();
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn take_message_type_matches_tag() {
        let frame = build_frame(b'Z', &[]);
        let mut buf = ReadMessageBuffer::new();
        buf.feed(frame);
        assert!(!buf.take_message_type(b'Q'));
        assert!(buf.take_message_type(b'Z'));
    }

    #[test]
    fn ring_reports_full_at_capacity() {
        let mut buf = ReadMessageBuffer::new();
        let mut full = false;
        for _ in 0..RING_CAPACITY {
            full = buf.feed(vec![0u8]);
        }
        assert!(full);
    }

    #[test]
    fn consecutive_messages_do_not_leak_state() {
        let mut stream = Vec::new();
        stream.extend(build_frame(b'A', b"x"));
        stream.extend(build_frame(b'B', b"yy"));
        let mut buf = ReadMessageBuffer::new();
        buf.feed(stream);

        assert!(buf.take_message());
        assert_eq!(buf.get_message_type(), Some(b'A'));
        assert_eq!(&buf.consume_message()[..], b"x");

        assert!(buf.take_message());
        assert_eq!(buf.get_message_type(), Some(b'B'));
        assert_eq!(&buf.consume_message()[..], b"yy");
    }
}
