//! Circular byte buffer used for socket reads and writes.
//!
//! The buffer keeps two cursors into a `Vec<u8>`: `read` points at the first
//! unread byte and `write` at the first free byte. One slot is always left
//! unused so that the two cursor states stay distinguishable:
//!
//! - empty: `read == write`
//! - full: `(write + 1) % capacity == read`
//!
//! Because of the sacrificed slot `readable() + writable() + 1 == capacity()`
//! holds at all times.
//!
//! # Layout
//!
//! The readable bytes are contiguous in logical order but may wrap around the
//! end of the backing array; [`RingBuffer::peek`] exposes them as up to two
//! slices that, when concatenated, yield the bytes in order. The writable
//! region is split the same way and is filled by a single scatter read in
//! [`RingBuffer::read_from`].
//!
//! # Growth
//!
//! The buffer grows on demand (doubling, bounded by `max_capacity`) and never
//! shrinks. Growing first rotates the unread bytes to offset 0, so after a
//! growth `read == 0`.

use std::borrow::Cow;
use std::io::{IoSlice, IoSliceMut, Read, Write};

use memchr::memmem;
use tracing::{debug, trace};

use crate::ensure;
use crate::protocol::BufferError;

/// Initial capacity of a connection buffer.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Hard limit a single connection buffer may grow to.
pub const DEFAULT_MAX_CAPACITY: usize = 1024 * 1024;

/// Size of the on-stack scratch area used by [`RingBuffer::read_from`].
const SCRATCH_SIZE: usize = 64 * 1024;

const CRLF: &[u8] = b"\r\n";

/// A growable circular byte buffer with separate read and write cursors.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<u8>,
    read: usize,
    write: usize,
    max_capacity: usize,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }
}

impl RingBuffer {
    /// Creates an empty buffer with [`DEFAULT_INITIAL_CAPACITY`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer of `capacity` bytes which may grow up to
    /// [`DEFAULT_MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limit(capacity, DEFAULT_MAX_CAPACITY)
    }

    /// Creates an empty buffer of `capacity` bytes which may grow up to `max_capacity`.
    ///
    /// The capacity is at least 2 (one usable byte plus the sacrificed slot) and
    /// `max_capacity` is never below the initial capacity.
    pub fn with_limit(capacity: usize, max_capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self { buf: vec![0; capacity], read: 0, write: 0, max_capacity: max_capacity.max(capacity) }
    }

    /// Size of the backing array, including the sacrificed slot.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of bytes written but not yet consumed.
    #[inline]
    pub fn readable(&self) -> usize {
        if self.write >= self.read { self.write - self.read } else { self.capacity() - self.read + self.write }
    }

    /// Number of bytes that can be written without growing.
    #[inline]
    pub fn writable(&self) -> usize {
        if self.read > self.write { self.read - self.write - 1 } else { self.capacity() - self.write + self.read - 1 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        (self.write + 1) % self.capacity() == self.read
    }

    /// Returns the readable bytes as up to two slices in logical order.
    ///
    /// The second slice is empty unless the readable region wraps around the
    /// end of the backing array.
    pub fn peek(&self) -> (&[u8], &[u8]) {
        if self.read <= self.write {
            (&self.buf[self.read..self.write], &[])
        } else {
            (&self.buf[self.read..], &self.buf[..self.write])
        }
    }

    /// Returns the readable bytes as one slice, copying only when the region wraps.
    pub fn peek_contiguous(&self) -> Cow<'_, [u8]> {
        self.peek_prefix(self.readable())
    }

    /// Returns the first `len` readable bytes as one slice, copying only when
    /// they straddle the end of the backing array.
    ///
    /// `len` is clamped to `readable()`.
    pub fn peek_prefix(&self, len: usize) -> Cow<'_, [u8]> {
        let len = len.min(self.readable());
        let (first, second) = self.peek();
        if len <= first.len() {
            Cow::Borrowed(&first[..len])
        } else {
            let mut joined = Vec::with_capacity(len);
            joined.extend_from_slice(first);
            joined.extend_from_slice(&second[..len - first.len()]);
            Cow::Owned(joined)
        }
    }

    /// Returns the readable region as io slices, ready for a vectored write.
    pub fn as_io_slices(&self) -> [IoSlice<'_>; 2] {
        let (first, second) = self.peek();
        [IoSlice::new(first), IoSlice::new(second)]
    }

    /// Finds the next CRLF inside the readable region.
    ///
    /// The search runs over the segment up to the end of the backing array
    /// first, then over the wrapped segment; a terminator split across the seam
    /// is found as well. The returned offset is relative to the read cursor and
    /// points at the `\r`.
    pub fn find_crlf(&self) -> Option<usize> {
        let (first, second) = self.peek();
        if let Some(pos) = memmem::find(first, CRLF) {
            return Some(pos);
        }

        if first.last() == Some(&b'\r') && second.first() == Some(&b'\n') {
            return Some(first.len() - 1);
        }

        memmem::find(second, CRLF).map(|pos| first.len() + pos)
    }

    /// Retires `len` readable bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::OutOfRange`] if `len` exceeds `readable()`.
    pub fn consume(&mut self, len: usize) -> Result<(), BufferError> {
        let readable = self.readable();
        ensure!(len <= readable, BufferError::out_of_range(len, readable));
        self.read = (self.read + len) % self.capacity();
        Ok(())
    }

    /// Drops every readable byte and rewinds both cursors.
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Removes and returns every readable byte.
    pub fn take_all(&mut self) -> Vec<u8> {
        let bytes = self.peek_contiguous().into_owned();
        self.clear();
        bytes
    }

    /// Appends `data`, growing the buffer if the writable region is too small.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::CapacityExceeded`] if growing would pass `max_capacity`.
    pub fn append(&mut self, data: &[u8]) -> Result<(), BufferError> {
        self.ensure_writable(data.len())?;

        let len = data.len();
        let first = len.min(self.capacity() - self.write);
        self.buf[self.write..self.write + first].copy_from_slice(&data[..first]);
        if first < len {
            self.buf[..len - first].copy_from_slice(&data[first..]);
        }

        self.advance_write(len);
        Ok(())
    }

    /// Makes sure at least `len` bytes can be written.
    ///
    /// The writable space of a ring does not depend on where the cursors sit, so
    /// when it is short the only remedy is growing. Growing first compacts the
    /// unread bytes to the start of the array and then extends the array, which
    /// keeps their order intact even when they wrap.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::CapacityExceeded`] if the required capacity is above
    /// `max_capacity`.
    pub fn ensure_writable(&mut self, len: usize) -> Result<(), BufferError> {
        if self.writable() >= len {
            return Ok(());
        }

        let required = self.readable() + len + 1;
        ensure!(required <= self.max_capacity, BufferError::capacity_exceeded(required, self.max_capacity));

        let new_capacity = required.max(self.capacity() * 2).min(self.max_capacity);
        debug!(from = self.capacity(), to = new_capacity, "grow ring buffer");

        self.compact();
        self.buf.resize(new_capacity, 0);
        Ok(())
    }

    /// Scatter-reads from `reader` into the writable region, spilling any surplus
    /// into a 64 KiB stack scratch area that is then appended (growing the buffer).
    ///
    /// The scratch area is cut to the room left below `max_capacity`, so a read
    /// never takes more than the buffer can hold and the rest stays in the reader.
    ///
    /// Returns the number of bytes read; `Ok(0)` means the peer reached EOF.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Io`] with the reader's error, use
    /// [`BufferError::is_would_block`] to tell "try again later" from fatal errors.
    /// Returns [`BufferError::CapacityExceeded`] without reading if the buffer
    /// is full and already at `max_capacity`.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<usize, BufferError> {
        let writable = self.writable();
        let headroom = (self.max_capacity - self.capacity()).min(SCRATCH_SIZE);
        ensure!(
            writable + headroom > 0,
            BufferError::capacity_exceeded(self.readable() + 2, self.max_capacity)
        );
        let mut scratch = [0u8; SCRATCH_SIZE];

        let len = {
            let (first, second) = self.writable_segments_mut();
            let mut slices =
                [IoSliceMut::new(first), IoSliceMut::new(second), IoSliceMut::new(&mut scratch[..headroom])];
            reader.read_vectored(&mut slices)?
        };

        if len <= writable {
            self.advance_write(len);
        } else {
            self.advance_write(writable);
            trace!(surplus = len - writable, "read more than writable, append from scratch");
            self.append(&scratch[..len - writable])?;
        }

        Ok(len)
    }

    /// Writes the readable region to `writer` with one vectored write and
    /// consumes exactly the bytes that were accepted.
    ///
    /// This is the path for responses without a file body; a mapped file is
    /// written behind the buffered head by the connection itself.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Io`] with the writer's error; nothing is consumed then.
    pub fn write_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<usize, BufferError> {
        if self.is_empty() {
            return Ok(0);
        }

        let len = writer.write_vectored(&self.as_io_slices())?;
        self.consume(len)?;
        Ok(len)
    }

    fn advance_write(&mut self, len: usize) {
        debug_assert!(len <= self.writable());
        self.write = (self.write + len) % self.capacity();
    }

    /// The writable region as two slices whose total length is `writable()`.
    fn writable_segments_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        let capacity = self.capacity();
        if self.read > self.write {
            (&mut self.buf[self.write..self.read - 1], &mut [])
        } else if self.read == 0 {
            (&mut self.buf[self.write..capacity - 1], &mut [])
        } else {
            let (head, tail) = self.buf.split_at_mut(self.write);
            (tail, &mut head[..self.read - 1])
        }
    }

    /// Moves the unread bytes to the start of the backing array.
    fn compact(&mut self) {
        let readable = self.readable();
        if self.read <= self.write {
            self.buf.copy_within(self.read..self.write, 0);
        } else {
            // [read, capacity) followed by [0, write) becomes [0, readable)
            self.buf.rotate_left(self.read);
        }
        self.read = 0;
        self.write = readable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn assert_invariant(buffer: &RingBuffer) {
        assert_eq!(buffer.readable() + buffer.writable() + 1, buffer.capacity());
    }

    fn contents(buffer: &RingBuffer) -> Vec<u8> {
        buffer.peek_contiguous().into_owned()
    }

    /// Reader that only ever fails with the given error kind.
    struct FailingReader(io::ErrorKind);

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(self.0))
        }
    }

    /// Writer that accepts at most `limit` bytes per call.
    struct ShortWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let len = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..len]);
            Ok(len)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn new_buffer_is_empty() {
        let buffer = RingBuffer::with_capacity(8);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.readable(), 0);
        assert_eq!(buffer.writable(), 7);
        assert_invariant(&buffer);
    }

    #[test]
    fn invariant_holds_for_appends_and_consumes() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        let steps: &[(usize, usize)] = &[(3, 2), (4, 1), (2, 5), (6, 3), (1, 4), (5, 5), (6, 7)];

        for (append, consume) in steps {
            buffer.append(&vec![b'x'; *append]).unwrap();
            assert_invariant(&buffer);
            buffer.consume(*consume).unwrap();
            assert_invariant(&buffer);
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn round_trip_across_the_end_of_the_array() {
        let mut buffer = RingBuffer::with_limit(8, 8);

        buffer.append(b"abcde").unwrap();
        buffer.consume(4).unwrap();
        assert_eq!(contents(&buffer), b"e");

        // write cursor sits at 5, so this straddles the end
        buffer.append(b"fghij").unwrap();
        let (first, second) = buffer.peek();
        assert_eq!(first, b"efgh");
        assert_eq!(second, b"ij");
        assert_eq!(contents(&buffer), b"efghij");
        assert!(matches!(buffer.peek_contiguous(), Cow::Owned(_)));

        buffer.consume(6).unwrap();
        assert!(buffer.is_empty());

        buffer.append(b"klmnopq").unwrap();
        assert!(buffer.is_full());
        assert_eq!(contents(&buffer), b"klmnopq");
        assert_invariant(&buffer);
    }

    #[test]
    fn consume_more_than_readable_fails() {
        let mut buffer = RingBuffer::with_capacity(8);
        buffer.append(b"abc").unwrap();

        let err = buffer.consume(4).unwrap_err();
        assert!(matches!(err, BufferError::OutOfRange { requested: 4, readable: 3 }));
        assert_eq!(contents(&buffer), b"abc");
    }

    #[test]
    fn ensure_writable_zero_keeps_content() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"abcdef").unwrap();
        buffer.consume(5).unwrap();
        buffer.append(b"ghij").unwrap();
        let before = contents(&buffer);
        let capacity = buffer.capacity();

        buffer.ensure_writable(0).unwrap();
        buffer.ensure_writable(0).unwrap();

        assert_eq!(contents(&buffer), before);
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn growth_preserves_wrapped_bytes() {
        let mut buffer = RingBuffer::with_capacity(8);
        buffer.append(b"abcdef").unwrap();
        buffer.consume(5).unwrap();
        buffer.append(b"ghij").unwrap();
        assert!(!buffer.peek().1.is_empty());

        buffer.append(b"klmnopqrstuvwxyz").unwrap();

        assert!(buffer.capacity() > 8);
        assert_eq!(contents(&buffer), b"fghijklmnopqrstuvwxyz");
        assert!(buffer.peek().1.is_empty());
        assert_invariant(&buffer);
    }

    #[test]
    fn growth_stops_at_the_limit() {
        let mut buffer = RingBuffer::with_limit(8, 16);
        buffer.append(b"0123456789").unwrap();
        assert_eq!(buffer.capacity(), 16);

        let err = buffer.append(b"abcdefgh").unwrap_err();
        assert!(matches!(err, BufferError::CapacityExceeded { required: 19, max_capacity: 16 }));
        assert_eq!(contents(&buffer), b"0123456789");
    }

    #[test]
    fn read_from_fills_both_segments() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"abcde").unwrap();
        buffer.consume(5).unwrap();

        let mut source: &[u8] = b"1234567";
        let len = buffer.read_from(&mut source).unwrap();

        assert_eq!(len, 7);
        assert!(buffer.is_full());
        assert_eq!(contents(&buffer), b"1234567");
    }

    #[test]
    fn read_from_spills_surplus_into_growth() {
        let mut buffer = RingBuffer::with_capacity(8);
        buffer.append(b"ab").unwrap();

        let payload: Vec<u8> = (0..100u8).collect();
        let mut source: &[u8] = &payload;
        let len = buffer.read_from(&mut source).unwrap();

        assert_eq!(len, 100);
        let mut expected = b"ab".to_vec();
        expected.extend_from_slice(&payload);
        assert_eq!(contents(&buffer), expected);
        assert_invariant(&buffer);
    }

    #[test]
    fn read_from_stops_at_the_limit() {
        let mut buffer = RingBuffer::with_limit(8, 16);

        let payload: Vec<u8> = (0..40u8).collect();
        let mut source: &[u8] = &payload;
        let len = buffer.read_from(&mut source).unwrap();

        assert_eq!(len, 15);
        assert!(buffer.is_full());
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(contents(&buffer), &payload[..15]);
        assert_eq!(source.len(), 25);

        let err = buffer.read_from(&mut source).unwrap_err();
        assert!(matches!(err, BufferError::CapacityExceeded { max_capacity: 16, .. }));
        assert_eq!(source.len(), 25);

        buffer.consume(10).unwrap();
        assert_eq!(buffer.read_from(&mut source).unwrap(), 10);
        assert_eq!(contents(&buffer), &payload[10..25]);
        assert_invariant(&buffer);
    }

    #[test]
    fn read_from_reports_eof_and_errors() {
        let mut buffer = RingBuffer::with_capacity(8);

        let mut empty: &[u8] = b"";
        assert_eq!(buffer.read_from(&mut empty).unwrap(), 0);

        let err = buffer.read_from(&mut FailingReader(io::ErrorKind::WouldBlock)).unwrap_err();
        assert!(err.is_would_block());

        let err = buffer.read_from(&mut FailingReader(io::ErrorKind::ConnectionReset)).unwrap_err();
        assert!(!err.is_would_block());
        assert!(buffer.is_empty());
    }

    #[test]
    fn write_to_consumes_only_what_was_written() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"abcde").unwrap();
        buffer.consume(4).unwrap();
        buffer.append(b"fghij").unwrap();

        let mut writer = ShortWriter { written: Vec::new(), limit: 2 };
        assert_eq!(buffer.write_to(&mut writer).unwrap(), 2);
        assert_eq!(contents(&buffer), b"ghij");

        let mut sink = Vec::new();
        assert_eq!(buffer.write_to(&mut sink).unwrap(), 4);
        assert_eq!(sink, b"ghij");
        assert!(buffer.is_empty());
        assert_eq!(buffer.write_to(&mut sink).unwrap(), 0);
    }

    #[test]
    fn find_crlf_in_both_passes() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"ab\r\nc").unwrap();
        assert_eq!(buffer.find_crlf(), Some(2));

        buffer.consume(4).unwrap();
        assert_eq!(buffer.find_crlf(), None);

        // "c" at 4, "def" at 5..8, wrapped "\r\n" at 0..2
        buffer.append(b"def\r\n").unwrap();
        assert_eq!(buffer.peek(), (&b"cdef"[..], &b"\r\n"[..]));
        assert_eq!(buffer.find_crlf(), Some(4));
    }

    #[test]
    fn find_crlf_split_across_the_seam() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"xxxx").unwrap();
        buffer.consume(4).unwrap();

        buffer.append(b"abc\r\nz").unwrap();
        let (first, second) = buffer.peek();
        assert_eq!(first, b"abc\r");
        assert_eq!(second, b"\nz");
        assert_eq!(buffer.find_crlf(), Some(3));
        assert_eq!(&*buffer.peek_prefix(3), b"abc");
    }

    #[test]
    fn take_all_returns_everything_and_rewinds() {
        let mut buffer = RingBuffer::with_limit(8, 8);
        buffer.append(b"abcdef").unwrap();
        buffer.consume(5).unwrap();
        buffer.append(b"ghi").unwrap();

        assert_eq!(buffer.take_all(), b"fghi");
        assert!(buffer.is_empty());
        assert_eq!(buffer.writable(), 7);
    }
}
