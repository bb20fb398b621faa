use super::base_stream::BaseStream;
use super::error::{SplitError, SplitResult};
use std::sync::Arc;

/// An in-memory byte stream.
///
/// This is the only concrete stream type: the splitter always works from a
/// fully loaded byte buffer. The data is stored in an `Arc`, so sub-streams
/// created for per-object parses share the allocation instead of copying.
pub struct Stream {
    /// The underlying byte buffer (shared via Arc)
    bytes: Arc<Vec<u8>>,
    /// Current read position (absolute offset into the buffer)
    pos: usize,
    /// Starting offset in the buffer
    start: usize,
    /// Length of accessible data from start
    length: usize,
}

impl Stream {
    /// Creates a new Stream covering `length` bytes from `start`.
    pub fn new(bytes: Vec<u8>, start: usize, length: usize) -> Self {
        let actual_length = if length == 0 {
            bytes.len().saturating_sub(start)
        } else {
            length
        };

        Stream {
            bytes: Arc::new(bytes),
            pos: start,
            start,
            length: actual_length,
        }
    }

    /// Creates a sub-stream view over an already shared buffer.
    fn from_arc(bytes: Arc<Vec<u8>>, start: usize, length: usize) -> Self {
        Stream {
            bytes,
            pos: start,
            start,
            length,
        }
    }

    /// Creates a new Stream covering a whole byte vector.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len();
        Self::new(bytes, 0, length)
    }
}

impl BaseStream for Stream {
    fn length(&self) -> usize {
        self.length
    }

    fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        (self.start + self.length).saturating_sub(self.pos)
    }

    fn set_pos(&mut self, pos: usize) -> SplitResult<()> {
        if pos > self.start + self.length {
            return Err(SplitError::InvalidPosition {
                pos,
                length: self.length,
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn get_byte(&mut self) -> SplitResult<u8> {
        if self.pos >= self.start + self.length {
            return Err(SplitError::UnexpectedEndOfStream);
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn get_bytes(&mut self, length: usize) -> SplitResult<Vec<u8>> {
        let end_pos = self.pos + length;
        let max_pos = self.start + self.length;

        if end_pos > max_pos {
            return Err(SplitError::UnexpectedEndOfStream);
        }

        let bytes = self.bytes[self.pos..end_pos].to_vec();
        self.pos = end_pos;
        Ok(bytes)
    }

    fn get_byte_range(&self, begin: usize, end: usize) -> SplitResult<Vec<u8>> {
        if begin >= end {
            return Err(SplitError::InvalidByteRange { begin, end });
        }

        let max_pos = self.start + self.length;
        if end > max_pos {
            return Err(SplitError::InvalidByteRange { begin, end });
        }

        Ok(self.bytes[begin..end].to_vec())
    }

    fn reset(&mut self) -> SplitResult<()> {
        self.pos = self.start;
        Ok(())
    }

    fn make_sub_stream(&self, start: usize, length: usize) -> SplitResult<Box<dyn BaseStream>> {
        if start + length > self.start + self.length {
            return Err(SplitError::InvalidByteRange {
                begin: start,
                end: start + length,
            });
        }

        // Share the Arc instead of cloning the data
        Ok(Box::new(Stream::from_arc(
            Arc::clone(&self.bytes),
            start,
            length,
        )))
    }
}
