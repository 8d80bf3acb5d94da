//! The input assembler owns the vertex and index buffer bindings supplied by
//! the host and presents them to the pipeline as drain-only streams.
//!
//! Host buffers are held as [`Bytes`] views, so a draw borrows nothing: the
//! adapters clone the cheap handle and walk it with a per-channel stride.

use bytes::Bytes;

use crate::semantic::Semantic;
use crate::stream::{InputStream, StreamChannels, StreamError};

#[derive(Clone, Debug)]
struct BufferChannel {
    semantic: Semantic,
    data: Bytes,
    stride: usize,
}

impl BufferChannel {
    /// Remainder of the buffer starting at element `index`. Clamped so a
    /// short host buffer surfaces as a size-mismatch at the port layer
    /// instead of a panic here.
    fn element_bytes(&self, index: usize) -> &[u8] {
        let at = (self.stride * index).min(self.data.len());
        &self.data[at..]
    }
}

#[derive(Clone, Debug)]
struct IndexBinding {
    data: Bytes,
    stride: usize,
    len: usize,
}

#[derive(Clone, Debug, Default)]
pub struct InputAssembler {
    vertex_channels: Vec<BufferChannel>,
    vertex_len: usize,
    index: Option<IndexBinding>,
}

impl InputAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds one vertex attribute channel. Re-binding an already present
    /// semantic replaces its buffer view.
    pub fn set_vertex_buffer_channel(
        &mut self,
        semantic: Semantic,
        data: Bytes,
        offset: usize,
        stride: usize,
    ) {
        let data = data.slice(offset.min(data.len())..);

        match self.vertex_channels.iter_mut().find(|c| c.semantic == semantic) {
            Some(channel) => {
                channel.data = data;
                channel.stride = stride;
            }
            None => self.vertex_channels.push(BufferChannel {
                semantic,
                data,
                stride,
            }),
        }
    }

    pub fn set_vertex_buffer_length(&mut self, len: usize) {
        self.vertex_len = len;
    }

    pub fn set_index_buffer(&mut self, data: Bytes, offset: usize, stride: usize, len: usize) {
        let data = data.slice(offset.min(data.len())..);
        self.index = Some(IndexBinding { data, stride, len });
    }

    pub fn vertex_len(&self) -> usize {
        self.vertex_len
    }

    pub fn index_len(&self) -> Option<usize> {
        self.index.as_ref().map(|i| i.len)
    }

    /// Builds the vertex stream for one draw; the cursor starts at zero.
    pub fn vertex_stream(&self) -> VertexStream {
        VertexStream {
            channels: self.vertex_channels.clone(),
            len: self.vertex_len,
            processed: 0,
        }
    }

    /// Builds the index stream over the whole index buffer.
    pub fn index_stream(&self) -> Option<IndexStream> {
        let index = self.index.as_ref()?;
        Some(IndexStream {
            data: index.data.clone(),
            stride: index.stride,
            len: index.len,
            processed: 0,
        })
    }

    /// Builds the index stream over `[start, start + count)`.
    pub fn index_stream_range(&self, start: usize, count: usize) -> Option<IndexStream> {
        let index = self.index.as_ref()?;
        if start + count > index.len {
            return None;
        }

        Some(IndexStream {
            data: index.data.slice((index.stride * start).min(index.data.len())..),
            stride: index.stride,
            len: count,
            processed: 0,
        })
    }
}

/// Drain-only stream over the bound vertex buffer channels, one channel per
/// attribute semantic.
#[derive(Clone, Debug)]
pub struct VertexStream {
    channels: Vec<BufferChannel>,
    len: usize,
    processed: usize,
}

impl StreamChannels for VertexStream {
    fn num_channels(&self) -> usize {
        self.channels.len()
    }

    fn channel_index(&self, semantic: Semantic) -> Option<usize> {
        self.channels.iter().position(|c| c.semantic == semantic)
    }
}

impl InputStream for VertexStream {
    fn len(&self) -> usize {
        self.len - self.processed
    }

    fn front_channel(&self, channel: usize) -> &[u8] {
        self.channels[channel].element_bytes(self.processed)
    }

    fn pop(&mut self) -> Result<(), StreamError> {
        if InputStream::is_empty(self) {
            return Err(StreamError::Underflow);
        }

        self.processed += 1;
        Ok(())
    }
}

/// Drain-only stream over the bound index buffer. Always exposes exactly one
/// channel, tagged [`Semantic::SV_VERTEX_INDEX`].
#[derive(Clone, Debug)]
pub struct IndexStream {
    data: Bytes,
    stride: usize,
    len: usize,
    processed: usize,
}

impl StreamChannels for IndexStream {
    fn num_channels(&self) -> usize {
        1
    }

    fn channel_index(&self, semantic: Semantic) -> Option<usize> {
        (semantic == Semantic::SV_VERTEX_INDEX).then_some(0)
    }
}

impl InputStream for IndexStream {
    fn len(&self) -> usize {
        self.len - self.processed
    }

    fn front_channel(&self, channel: usize) -> &[u8] {
        debug_assert_eq!(channel, 0);

        let at = (self.stride * self.processed).min(self.data.len());
        &self.data[at..]
    }

    fn pop(&mut self) -> Result<(), StreamError> {
        if InputStream::is_empty(self) {
            return Err(StreamError::Underflow);
        }

        self.processed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::cast_slice;
    use bytes::Bytes;
    use glam::Vec3;

    use super::InputAssembler;
    use crate::semantic::Semantic;
    use crate::stream::{InputStream, StreamChannels};

    fn vec3_bytes(data: &[Vec3]) -> Bytes {
        Bytes::copy_from_slice(cast_slice(data))
    }

    #[test]
    fn vertex_stream_walks_channels_by_stride() {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];

        let mut ia = InputAssembler::new();
        ia.set_vertex_buffer_channel(Semantic::POSITION0, vec3_bytes(&positions), 0, 12);
        ia.set_vertex_buffer_length(3);

        let mut stream = ia.vertex_stream();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.channel_index(Semantic::POSITION0), Some(0));
        assert_eq!(stream.channel_index(Semantic::COLOR0), None);

        stream.pop().unwrap();
        let bytes = stream.front_channel(0);
        assert_eq!(&bytes[..12], cast_slice::<f32, u8>(&[1.0, 0.0, 0.0]));
    }

    #[test]
    fn rebinding_a_channel_replaces_it() {
        let mut ia = InputAssembler::new();
        ia.set_vertex_buffer_channel(Semantic::POSITION0, Bytes::from_static(&[1; 24]), 0, 12);
        ia.set_vertex_buffer_channel(Semantic::POSITION0, Bytes::from_static(&[2; 24]), 0, 12);
        ia.set_vertex_buffer_length(2);

        let stream = ia.vertex_stream();
        assert_eq!(stream.num_channels(), 1);
        assert_eq!(stream.front_channel(0)[0], 2);
    }

    #[test]
    fn index_stream_exposes_the_vertex_index_channel() {
        let indices: [u32; 6] = [0, 1, 2, 2, 1, 3];
        let mut ia = InputAssembler::new();
        ia.set_index_buffer(Bytes::copy_from_slice(cast_slice(&indices)), 0, 4, 6);

        let mut stream = ia.index_stream().unwrap();
        assert_eq!(stream.channel_index(Semantic::SV_VERTEX_INDEX), Some(0));
        assert_eq!(stream.channel_index(Semantic::POSITION0), None);

        let mut drained = Vec::new();
        while !InputStream::is_empty(&stream) {
            let bytes = stream.front_channel(0);
            drained.push(u32::from_le_bytes(bytes[..4].try_into().unwrap()));
            stream.pop().unwrap();
        }
        assert_eq!(drained, indices);
    }

    #[test]
    fn ranged_index_stream_covers_a_sub_draw() {
        let indices: [u32; 6] = [0, 1, 2, 3, 4, 5];
        let mut ia = InputAssembler::new();
        ia.set_index_buffer(Bytes::copy_from_slice(cast_slice(&indices)), 0, 4, 6);

        let stream = ia.index_stream_range(3, 3).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(&stream.front_channel(0)[..4], 3u32.to_le_bytes());

        assert!(ia.index_stream_range(4, 3).is_none());
    }

    #[test]
    fn missing_index_buffer_yields_no_stream() {
        let ia = InputAssembler::new();
        assert!(ia.index_stream().is_none());
    }
}
