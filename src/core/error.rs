use std::fmt;

/// Universal error type for split operations.
///
/// Parse-time errors abort `Document::open` entirely; split-time errors
/// abort only the request that hit them and leave the document usable.
/// Structural variants carry the byte offset or object id needed to
/// diagnose the failure without re-parsing the file.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitError {
    /// End of stream reached unexpectedly
    UnexpectedEndOfStream,

    /// Invalid stream position
    InvalidPosition { pos: usize, length: usize },

    /// Invalid byte range requested
    InvalidByteRange { begin: usize, end: usize },

    /// Unparseable byte sequence at a position where a token or object
    /// was expected
    MalformedSyntax { offset: usize, message: String },

    /// A stream's declared /Length runs past the end of the input
    TruncatedStream {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The cross-reference chain cannot be walked
    CorruptXRef { offset: usize, message: String },

    /// A cycle in the page tree where none is allowed
    StructuralCycle { num: u32, generation: u32 },

    /// A requested page index exceeds the page count
    PageOutOfRange { requested: usize, count: usize },

    /// Encryption or another structural feature this crate does not handle
    UnsupportedFeature(String),

    /// File system error from the open/write glue
    Io(String),
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitError::UnexpectedEndOfStream => {
                write!(f, "Unexpected end of stream")
            }
            SplitError::InvalidPosition { pos, length } => {
                write!(f, "Invalid position {} for stream of length {}", pos, length)
            }
            SplitError::InvalidByteRange { begin, end } => {
                write!(f, "Invalid byte range: {}..{}", begin, end)
            }
            SplitError::MalformedSyntax { offset, message } => {
                write!(f, "Malformed syntax at byte {}: {}", offset, message)
            }
            SplitError::TruncatedStream {
                offset,
                declared,
                available,
            } => {
                write!(
                    f,
                    "Truncated stream at byte {}: /Length {} but only {} bytes available",
                    offset, declared, available
                )
            }
            SplitError::CorruptXRef { offset, message } => {
                write!(f, "Corrupt cross-reference at byte {}: {}", offset, message)
            }
            SplitError::StructuralCycle { num, generation } => {
                write!(f, "Cycle in page tree at object {} {}", num, generation)
            }
            SplitError::PageOutOfRange { requested, count } => {
                write!(
                    f,
                    "Page {} out of range for document with {} pages",
                    requested, count
                )
            }
            SplitError::UnsupportedFeature(feature) => {
                write!(f, "Unsupported feature: {}", feature)
            }
            SplitError::Io(msg) => {
                write!(f, "I/O error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SplitError {}

/// Result type alias for split operations
pub type SplitResult<T> = Result<T, SplitError>;
