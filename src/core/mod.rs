pub mod base_stream;
pub mod collector;
pub mod decode;
pub mod document;
pub mod error;
pub mod lexer;
pub mod page_tree;
pub mod parser;
pub mod ranges;
pub mod stream;
pub mod writer;
pub mod xref;

pub use base_stream::BaseStream;
pub use document::Document;
pub use error::{SplitError, SplitResult};
pub use lexer::{Lexer, Token};
pub use page_tree::PageNode;
pub use parser::{Dict, Object, ObjectId, Parser};
pub use ranges::parse_ranges;
pub use stream::Stream;
pub use xref::{XRef, XRefEntry};
