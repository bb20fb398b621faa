pub mod core;

// Re-export main types for convenience
pub use core::{
    parse_ranges, BaseStream, Dict, Document, Lexer, Object, ObjectId, PageNode, Parser,
    SplitError, SplitResult, Stream, Token, XRef, XRefEntry,
};
