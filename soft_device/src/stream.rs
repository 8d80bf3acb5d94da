//! Inter-stage streams: a bounded FIFO ring of packed records, and the
//! random-access buffer view the rasterizer takes over post-transform
//! vertices.

use thiserror::Error;

use crate::layout::{RecordLayout, RecordMut, RecordRef, SchemaError};
use crate::semantic::Semantic;
use crate::types::ScalarType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("push onto a full stream")]
    Overflow,
    #[error("pop from an empty stream")]
    Underflow,
}

/// Channel schema shared by every stream implementation. Channels are
/// resolved by semantic, never by position.
pub trait StreamChannels {
    fn num_channels(&self) -> usize;

    fn channel_index(&self, semantic: Semantic) -> Option<usize>;
}

/// A stream a stage drains. Only the head record is addressable.
pub trait InputStream: StreamChannels {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of `channel` within the head record. Must only be called while
    /// the stream is non-empty.
    fn front_channel(&self, channel: usize) -> &[u8];

    fn pop(&mut self) -> Result<(), StreamError>;
}

/// A stream a stage fills. Only the most recently claimed record is
/// addressable.
pub trait OutputStream: StreamChannels {
    fn is_full(&self) -> bool;

    /// Claims and zero-fills the next record slot.
    fn push(&mut self) -> Result<(), StreamError>;

    /// Bytes of `channel` within the record claimed by the last [`push`].
    ///
    /// [`push`]: OutputStream::push
    fn back_channel_mut(&mut self, channel: usize) -> &mut [u8];
}

/// Bounded single-producer single-consumer ring of fixed-size records.
///
/// One slot is sacrificed so that empty (`begin == end`) and full
/// (`(end + 1) % slots == begin`) stay distinguishable. Channels must all be
/// declared before [`set_capacity`]; changing the schema afterwards drops
/// the backing storage.
///
/// [`set_capacity`]: FifoStream::set_capacity
#[derive(Clone, Debug, Default)]
pub struct FifoStream {
    layout: RecordLayout,
    storage: Vec<u8>,
    slots: usize,
    begin: usize,
    end: usize,
}

impl FifoStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stream whose channels mirror `fields` in order, one channel
    /// per `(semantic, type)` pair.
    pub fn with_channels<I>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (Semantic, ScalarType)>,
    {
        let mut stream = Self::new();
        for (semantic, ty) in fields {
            stream.add_channel(semantic, ty)?;
        }
        Ok(stream)
    }

    pub fn add_channel(&mut self, semantic: Semantic, ty: ScalarType) -> Result<usize, SchemaError> {
        // A schema change invalidates any previously allocated ring.
        self.storage.clear();
        self.slots = 0;
        self.begin = 0;
        self.end = 0;

        self.layout.push(semantic, ty)
    }

    pub fn reset_channels(&mut self) {
        self.layout.reset();
        self.storage.clear();
        self.slots = 0;
        self.begin = 0;
        self.end = 0;
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// (Re)allocates storage for `max_records` records plus the sacrificial
    /// slot and resets the ring. Prior contents are lost.
    pub fn set_capacity(&mut self, max_records: usize) {
        self.slots = max_records + 1;
        self.storage.clear();
        self.storage.resize(self.slots * self.layout.size(), 0);
        self.begin = 0;
        self.end = 0;
    }

    pub fn capacity(&self) -> usize {
        self.slots.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        if self.slots == 0 {
            return 0;
        }
        (self.end + self.slots - self.begin) % self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn is_full(&self) -> bool {
        self.slots == 0 || (self.end + 1) % self.slots == self.begin
    }

    /// Claims the tail slot, zero-fills it and returns a view into it.
    pub fn push(&mut self) -> Result<RecordMut<'_>, StreamError> {
        if self.is_full() {
            return Err(StreamError::Overflow);
        }

        let stride = self.layout.size();
        let at = self.end * stride;
        self.end = (self.end + 1) % self.slots;

        let Self { layout, storage, .. } = self;
        let bytes = &mut storage[at..at + stride];
        bytes.fill(0);

        Ok(RecordMut::new(layout, bytes))
    }

    pub fn front(&self) -> Result<RecordRef<'_>, StreamError> {
        if self.is_empty() {
            return Err(StreamError::Underflow);
        }

        let stride = self.layout.size();
        let at = self.begin * stride;
        Ok(RecordRef::new(&self.layout, &self.storage[at..at + stride]))
    }

    pub fn pop_front(&mut self) -> Result<(), StreamError> {
        if self.is_empty() {
            return Err(StreamError::Underflow);
        }

        self.begin = (self.begin + 1) % self.slots;
        Ok(())
    }

    /// Consumes the stream into a randomly addressable buffer over the
    /// records pushed so far.
    ///
    /// Intended for streams that were filled once and never popped (the
    /// vertex shader output); the records then occupy a contiguous prefix
    /// of the storage.
    pub fn into_buffer(self) -> StreamBuffer {
        debug_assert_eq!(self.begin, 0);

        let len = self.len();
        StreamBuffer {
            layout: self.layout,
            storage: self.storage,
            len,
        }
    }
}

impl StreamChannels for FifoStream {
    fn num_channels(&self) -> usize {
        self.layout.num_fields()
    }

    fn channel_index(&self, semantic: Semantic) -> Option<usize> {
        self.layout.position(semantic)
    }
}

impl InputStream for FifoStream {
    fn len(&self) -> usize {
        FifoStream::len(self)
    }

    fn front_channel(&self, channel: usize) -> &[u8] {
        debug_assert!(!FifoStream::is_empty(self));

        let stride = self.layout.size();
        let at = self.begin * stride;
        let range = self.layout.field_range(channel);
        &self.storage[at + range.start..at + range.end]
    }

    fn pop(&mut self) -> Result<(), StreamError> {
        self.pop_front()
    }
}

impl OutputStream for FifoStream {
    fn is_full(&self) -> bool {
        FifoStream::is_full(self)
    }

    fn push(&mut self) -> Result<(), StreamError> {
        FifoStream::push(self).map(|_| ())
    }

    fn back_channel_mut(&mut self, channel: usize) -> &mut [u8] {
        debug_assert!(!FifoStream::is_empty(self));

        let stride = self.layout.size();
        let back = (self.end + self.slots - 1) % self.slots;
        let at = back * stride;
        let range = self.layout.field_range(channel);
        &mut self.storage[at + range.start..at + range.end]
    }
}

/// Owned random-access view over the records of a drained [`FifoStream`].
///
/// Taking the storage by value (instead of aliasing the ring) is what scopes
/// the rasterizer's vertex view to a single draw.
#[derive(Clone, Debug, Default)]
pub struct StreamBuffer {
    layout: RecordLayout,
    storage: Vec<u8>,
    len: usize,
}

impl StreamBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn get(&self, index: usize) -> Option<RecordRef<'_>> {
        if index >= self.len {
            return None;
        }

        let stride = self.layout.size();
        let at = index * stride;
        Some(RecordRef::new(&self.layout, &self.storage[at..at + stride]))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<RecordMut<'_>> {
        if index >= self.len {
            return None;
        }

        let stride = self.layout.size();
        let at = index * stride;
        let Self { layout, storage, .. } = self;
        Some(RecordMut::new(layout, &mut storage[at..at + stride]))
    }
}

#[cfg(test)]
mod tests {
    use super::{FifoStream, InputStream, OutputStream, StreamError};
    use crate::semantic::Semantic;
    use crate::types::ScalarType;

    fn index_stream(capacity: usize) -> FifoStream {
        let mut stream =
            FifoStream::with_channels([(Semantic::SV_VERTEX_INDEX, ScalarType::Uint)]).unwrap();
        stream.set_capacity(capacity);
        stream
    }

    #[test]
    fn ring_len_tracks_push_and_pop() {
        let mut stream = index_stream(3);
        assert!(stream.is_empty());
        assert!(!stream.is_full());

        for i in 0..3u32 {
            stream.push().unwrap().write(0, i).unwrap();
        }
        assert_eq!(stream.len(), 3);
        assert!(stream.is_full());
        assert!(!stream.is_empty());

        assert_eq!(stream.front().unwrap().read::<u32>(0).unwrap(), 0);
        stream.pop_front().unwrap();
        assert_eq!(stream.len(), 2);

        // The ring wraps; empty and full stay decidable.
        stream.push().unwrap().write(0, 3u32).unwrap();
        assert!(stream.is_full());
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn overflow_and_underflow_are_errors() {
        let mut stream = index_stream(1);
        stream.push().unwrap();
        assert_eq!(stream.push().map(|_| ()), Err(StreamError::Overflow));

        stream.pop_front().unwrap();
        assert_eq!(stream.pop_front(), Err(StreamError::Underflow));
        assert_eq!(stream.front().map(|_| ()), Err(StreamError::Underflow));
    }

    #[test]
    fn fifo_order_is_preserved_across_wrap() {
        let mut stream = index_stream(2);

        stream.push().unwrap().write(0, 1u32).unwrap();
        stream.push().unwrap().write(0, 2u32).unwrap();
        stream.pop_front().unwrap();
        stream.push().unwrap().write(0, 3u32).unwrap();

        assert_eq!(stream.front().unwrap().read::<u32>(0).unwrap(), 2);
        stream.pop_front().unwrap();
        assert_eq!(stream.front().unwrap().read::<u32>(0).unwrap(), 3);
    }

    #[test]
    fn claimed_slots_are_zeroed() {
        let mut stream = index_stream(1);
        stream.push().unwrap().write(0, u32::MAX).unwrap();
        stream.pop_front().unwrap();

        // The slot is reused; the stale payload must not leak through.
        stream.push().unwrap();
        assert_eq!(stream.front().unwrap().read::<u32>(0).unwrap(), 0);
    }

    #[test]
    fn into_buffer_exposes_records_by_index() {
        let mut stream = index_stream(4);
        for i in 0..4u32 {
            stream.push().unwrap().write(0, i * 10).unwrap();
        }

        let buffer = stream.into_buffer();
        assert_eq!(buffer.len(), 4);
        for i in 0..4 {
            let record = buffer.get(i).unwrap();
            assert_eq!(record.read::<u32>(0).unwrap(), i as u32 * 10);
        }
        assert!(buffer.get(4).is_none());
    }

    #[test]
    fn stream_channel_views() {
        let mut stream = index_stream(1);
        OutputStream::push(&mut stream).unwrap();
        stream.back_channel_mut(0).copy_from_slice(&7u32.to_le_bytes());

        assert_eq!(stream.front_channel(0), 7u32.to_le_bytes());
        InputStream::pop(&mut stream).unwrap();
        assert!(InputStream::is_empty(&stream));
    }
}
