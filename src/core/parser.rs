use super::error::{SplitError, SplitResult};
use super::lexer::{Lexer, Token};
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::{debug, warn};

/// Identity of an indirect object: object number and generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub num: u32,
    pub generation: u32,
}

impl ObjectId {
    pub const fn new(num: u32, generation: u32) -> Self {
        ObjectId { num, generation }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.num, self.generation)
    }
}

/// Dictionary type used throughout the crate.
///
/// FxHashMap hashes deterministically, so iterating a dictionary built by
/// the same sequence of inserts always yields the same order. Repeated
/// splits of the same document stay byte-identical because of this.
pub type Dict = FxHashMap<String, Object>;

/// PDF object values.
///
/// Indirect references are stored unresolved as `Reference`; resolution is
/// deferred to traversal time, which keeps cyclic object graphs from
/// recursing during parsing. Stream payloads hold the raw, still-encoded
/// bytes: the splitter never re-encodes content.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null value
    Null,

    /// Boolean value
    Boolean(bool),

    /// Integer value
    Integer(i64),

    /// Real (fractional) value
    Real(f64),

    /// String value (from literal strings like (hello))
    String(Vec<u8>),

    /// Hex string value (from hex strings like <48656c6c6f>)
    HexString(Vec<u8>),

    /// Name value (from /Name)
    Name(String),

    /// Array of objects
    Array(Vec<Object>),

    /// Dictionary (key-value pairs, keys without the leading slash)
    Dictionary(Dict),

    /// Stream object (dictionary + raw binary payload)
    Stream { dict: Dict, data: Vec<u8> },

    /// Unresolved indirect reference (like "5 0 R")
    Reference(ObjectId),
}

impl Object {
    /// Returns true if this object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Returns the integer value, tolerating integral reals.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(n) => Some(*n),
            Object::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    /// Returns the name value without its leading slash.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if this object is the given name.
    pub fn is_name(&self, name: &str) -> bool {
        matches!(self, Object::Name(n) if n == name)
    }

    /// Returns the array elements.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the dictionary, from either a plain dictionary or a stream.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Returns the reference target id.
    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

/// Parser building objects from lexer tokens.
///
/// Maintains a two-token lookahead, which is what makes indirect
/// references (`N G R`) and stream objects (dictionary followed by the
/// `stream` keyword) detectable without backtracking.
pub struct Parser {
    /// The lexer that provides tokens
    lexer: Lexer,

    /// First lookahead token
    buf1: Option<Token>,

    /// Second lookahead token
    buf2: Option<Token>,
}

impl Parser {
    /// Creates a new Parser from a Lexer.
    pub fn new(mut lexer: Lexer) -> SplitResult<Self> {
        // Fill the lookahead buffer
        let buf1 = Some(lexer.next_token()?);
        let buf2 = Some(lexer.next_token()?);

        Ok(Parser { lexer, buf1, buf2 })
    }

    /// Shifts the token buffer, advancing to the next token.
    fn shift(&mut self) -> SplitResult<()> {
        self.buf1 = self.buf2.take();
        self.buf2 = Some(self.lexer.next_token()?);
        Ok(())
    }

    fn take_buf1(&mut self) -> SplitResult<Token> {
        let token = self.buf1.take().ok_or(SplitError::UnexpectedEndOfStream)?;
        self.shift()?;
        Ok(token)
    }

    /// Consumes the next token, which must be an integer.
    pub fn expect_integer(&mut self) -> SplitResult<i64> {
        let offset = self.lexer.position();
        match self.take_buf1()? {
            Token::Integer(n) => Ok(n),
            other => Err(SplitError::MalformedSyntax {
                offset,
                message: format!("expected integer, got {:?}", other),
            }),
        }
    }

    /// Consumes the next token, which must be the given keyword.
    pub fn expect_keyword(&mut self, keyword: &str) -> SplitResult<()> {
        let offset = self.lexer.position();
        match self.take_buf1()? {
            Token::Keyword(k) if k == keyword => Ok(()),
            other => Err(SplitError::MalformedSyntax {
                offset,
                message: format!("expected '{}', got {:?}", keyword, other),
            }),
        }
    }

    /// Parses the next object value.
    ///
    /// Handles arrays, dictionaries (and their stream continuation),
    /// indirect references, and primitives.
    pub fn parse_object(&mut self) -> SplitResult<Object> {
        let offset = self.lexer.position();
        let token = self.take_buf1()?;

        match token {
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary(),

            Token::ArrayEnd => Err(SplitError::MalformedSyntax {
                offset,
                message: "unexpected ']'".to_string(),
            }),
            Token::DictEnd => Err(SplitError::MalformedSyntax {
                offset,
                message: "unexpected '>>'".to_string(),
            }),

            // A number could be the start of an indirect reference: N G R
            Token::Integer(n) => {
                if let (Some(Token::Integer(generation)), Some(Token::Keyword(cmd))) =
                    (&self.buf1, &self.buf2)
                {
                    if cmd == "R"
                        && (0..=u32::MAX as i64).contains(&n)
                        && (0..=u32::MAX as i64).contains(generation)
                    {
                        let id = ObjectId::new(n as u32, *generation as u32);
                        self.shift()?; // Consume generation number
                        self.shift()?; // Consume 'R'
                        return Ok(Object::Reference(id));
                    }
                }
                Ok(Object::Integer(n))
            }

            Token::Real(r) => Ok(Object::Real(r)),
            Token::Boolean(b) => Ok(Object::Boolean(b)),
            Token::Null => Ok(Object::Null),
            Token::String(s) => Ok(Object::String(s)),
            Token::HexString(s) => Ok(Object::HexString(s)),
            Token::Name(n) => Ok(Object::Name(n)),

            Token::Keyword(k) => Err(SplitError::MalformedSyntax {
                offset,
                message: format!("unexpected keyword '{}'", k),
            }),
            Token::Eof => Err(SplitError::MalformedSyntax {
                offset,
                message: "unexpected end of input".to_string(),
            }),
        }
    }

    /// Parses an array: [ obj1 obj2 ... ]
    fn parse_array(&mut self) -> SplitResult<Object> {
        let mut array = Vec::new();

        loop {
            if let Some(Token::ArrayEnd) = &self.buf1 {
                self.shift()?; // Consume the ']'
                break;
            }

            if let Some(Token::Eof) = &self.buf1 {
                return Err(SplitError::MalformedSyntax {
                    offset: self.lexer.position(),
                    message: "unterminated array (missing ']')".to_string(),
                });
            }

            array.push(self.parse_object()?);
        }

        Ok(Object::Array(array))
    }

    /// Parses a dictionary: << /Key1 value1 /Key2 value2 ... >>
    ///
    /// A dictionary immediately followed by the `stream` keyword continues
    /// as a stream object.
    fn parse_dictionary(&mut self) -> SplitResult<Object> {
        let mut dict = Dict::default();

        loop {
            if let Some(Token::DictEnd) = &self.buf1 {
                // Don't shift yet: buf2 must be checked for `stream` first
                break;
            }

            if let Some(Token::Eof) = &self.buf1 {
                return Err(SplitError::MalformedSyntax {
                    offset: self.lexer.position(),
                    message: "unterminated dictionary (missing '>>')".to_string(),
                });
            }

            let key = match &self.buf1 {
                Some(Token::Name(name)) => name.clone(),
                Some(other) => {
                    warn!(
                        offset = self.lexer.position(),
                        "skipping non-name dictionary key {:?}", other
                    );
                    self.shift()?;
                    continue;
                }
                None => return Err(SplitError::UnexpectedEndOfStream),
            };

            self.shift()?; // Consume the key

            if let Some(Token::Eof) = &self.buf1 {
                return Err(SplitError::MalformedSyntax {
                    offset: self.lexer.position(),
                    message: format!("unterminated dictionary (end of input after /{})", key),
                });
            }

            if let Some(Token::DictEnd) = &self.buf1 {
                // Key without a value
                dict.insert(key, Object::Null);
                break;
            }

            let value = self.parse_object()?;
            dict.insert(key, value);
        }

        // At this point buf1 = '>>' and buf2 is the next token. If that is
        // the `stream` keyword, the lexer sits right after it and the
        // payload follows.
        if matches!(&self.buf2, Some(Token::Keyword(cmd)) if cmd == "stream") {
            self.buf1 = None;
            self.buf2 = None;
            return self.parse_stream(dict);
        }

        self.shift()?; // Consume the '>>'
        Ok(Object::Dictionary(dict))
    }

    /// Parses a stream payload following its dictionary.
    ///
    /// A direct integer `/Length` is honored and the trailing `endstream`
    /// verified. When `/Length` is an indirect reference (not resolvable
    /// at parse time) or unusable, the payload is found by scanning for
    /// `endstream` instead, with a single framing EOL trimmed.
    fn parse_stream(&mut self, dict: Dict) -> SplitResult<Object> {
        // The lexer is positioned right after the `stream` keyword; an EOL
        // belongs to the framing, not the payload.
        let mut data_start = self.lexer.position();
        let end = data_start + self.lexer.remaining();
        if data_start < end {
            let head = self.lexer.byte_range(data_start, (data_start + 2).min(end))?;
            if head[0] == b'\r' {
                data_start += 1;
                if head.len() > 1 && head[1] == b'\n' {
                    data_start += 1;
                }
            } else if head[0] == b'\n' {
                data_start += 1;
            }
        }

        let declared = match dict.get("Length") {
            Some(Object::Integer(n)) if *n >= 0 => Some(*n as usize),
            Some(Object::Reference(id)) => {
                debug!(%id, "stream /Length is an indirect reference, scanning for endstream");
                None
            }
            Some(other) => {
                warn!("unusable stream /Length {:?}, scanning for endstream", other);
                None
            }
            None => {
                warn!(offset = data_start, "stream without /Length, scanning for endstream");
                None
            }
        };

        let data = if let Some(length) = declared {
            if data_start + length > end {
                return Err(SplitError::TruncatedStream {
                    offset: data_start,
                    declared: length,
                    available: end - data_start,
                });
            }
            let bytes = if length > 0 {
                self.lexer.byte_range(data_start, data_start + length)?
            } else {
                Vec::new()
            };
            self.lexer.seek(data_start + length)?;

            self.buf1 = Some(self.lexer.next_token()?);
            self.buf2 = Some(self.lexer.next_token()?);
            if !matches!(&self.buf1, Some(Token::Keyword(k)) if k == "endstream") {
                return Err(SplitError::MalformedSyntax {
                    offset: data_start + length,
                    message: "expected 'endstream' after stream data".to_string(),
                });
            }
            self.shift()?; // Consume 'endstream'
            bytes
        } else {
            if data_start >= end {
                return Err(SplitError::MalformedSyntax {
                    offset: data_start,
                    message: "unterminated stream (missing 'endstream')".to_string(),
                });
            }
            let rest = self.lexer.byte_range(data_start, end)?;
            let marker = b"endstream";
            let found = rest
                .windows(marker.len())
                .position(|window| window == marker)
                .ok_or_else(|| SplitError::MalformedSyntax {
                    offset: data_start,
                    message: "unterminated stream (missing 'endstream')".to_string(),
                })?;

            let mut bytes = rest[..found].to_vec();
            // One framing EOL before `endstream` is not part of the payload
            if bytes.ends_with(b"\r\n") {
                bytes.truncate(bytes.len() - 2);
            } else if bytes.ends_with(b"\n") || bytes.ends_with(b"\r") {
                bytes.truncate(bytes.len() - 1);
            }

            self.lexer.seek(data_start + found + marker.len())?;
            self.buf1 = Some(self.lexer.next_token()?);
            self.buf2 = Some(self.lexer.next_token()?);
            bytes
        };

        Ok(Object::Stream { dict, data })
    }

    /// Parses an indirect object with its `N G obj … endobj` framing.
    pub fn parse_indirect_object(&mut self) -> SplitResult<(ObjectId, Object)> {
        let offset = self.lexer.position();
        let num = self.expect_integer()?;
        let generation = self.expect_integer()?;

        if !(0..=u32::MAX as i64).contains(&num) || !(0..=u32::MAX as i64).contains(&generation) {
            return Err(SplitError::MalformedSyntax {
                offset,
                message: format!("invalid object header {} {}", num, generation),
            });
        }

        self.expect_keyword("obj")?;
        let value = self.parse_object()?;

        // Tolerate a missing endobj, but consume it when present
        if matches!(&self.buf1, Some(Token::Keyword(k)) if k == "endobj") {
            self.shift()?;
        } else {
            debug!(num, generation, "indirect object without endobj");
        }

        Ok((ObjectId::new(num as u32, generation as u32), value))
    }
}
