use super::error::SplitResult;

/// Base trait for PDF byte sources.
///
/// This trait provides a uniform interface for reading raw bytes, so the
/// lexer and parser do not care whether they are looking at the whole file
/// or at a sub-range of it. Sub-streams created with `make_sub_stream`
/// share the underlying buffer, which keeps per-object parses cheap.
pub trait BaseStream {
    /// Returns the total length of the stream in bytes.
    fn length(&self) -> usize;

    /// Returns true if the stream contains no data.
    fn is_empty(&self) -> bool;

    /// Returns the current position in the stream.
    ///
    /// Positions are absolute offsets into the underlying buffer, so a
    /// sub-stream of a file reports positions in file coordinates. Error
    /// offsets rely on this.
    fn pos(&self) -> usize;

    /// Returns the number of unread bytes remaining.
    fn remaining(&self) -> usize;

    /// Sets the current position in the stream.
    fn set_pos(&mut self, pos: usize) -> SplitResult<()>;

    /// Reads and returns a single byte from the stream, advancing the position.
    ///
    /// Returns an error if the end of the stream is reached.
    fn get_byte(&mut self) -> SplitResult<u8>;

    /// Reads the specified number of bytes from the stream, advancing the position.
    fn get_bytes(&mut self, length: usize) -> SplitResult<Vec<u8>>;

    /// Returns a range of bytes from the stream without changing the current position.
    ///
    /// # Arguments
    /// * `begin` - Starting byte offset (inclusive)
    /// * `end` - Ending byte offset (exclusive)
    fn get_byte_range(&self, begin: usize, end: usize) -> SplitResult<Vec<u8>>;

    /// Resets the stream to its initial position.
    fn reset(&mut self) -> SplitResult<()>;

    /// Creates a sub-stream sharing this stream's underlying buffer.
    ///
    /// # Arguments
    /// * `start` - Starting offset for the sub-stream
    /// * `length` - Length of the sub-stream
    fn make_sub_stream(&self, start: usize, length: usize) -> SplitResult<Box<dyn BaseStream>>;

    /// Reads a single byte without advancing the position.
    fn peek_byte(&mut self) -> SplitResult<u8> {
        let current_pos = self.pos();
        let byte = self.get_byte()?;
        self.set_pos(current_pos)?;
        Ok(byte)
    }

    /// Skips `n` bytes in the stream by advancing the position.
    fn skip(&mut self, n: usize) -> SplitResult<()> {
        self.set_pos(self.pos() + n)
    }
}
