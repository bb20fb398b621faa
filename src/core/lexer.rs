use super::base_stream::BaseStream;
use super::error::{SplitError, SplitResult};

/// Lexical tokens produced by the Lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input marker
    Eof,

    /// Boolean value
    Boolean(bool),

    /// Null value
    Null,

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

    /// Bare keyword ('obj', 'endobj', 'stream', 'R', 'xref', ...)
    Keyword(String),

    /// Array start '['
    ArrayStart,

    /// Array end ']'
    ArrayEnd,

    /// Dictionary start '<<'
    DictStart,

    /// Dictionary end '>>'
    DictEnd,
}

/// Tokenizer for PDF syntax.
///
/// Scans raw bytes into lexical tokens, skipping whitespace and comments
/// transparently. Integers and reals are distinct token kinds: object
/// numbers, generation numbers, and byte offsets must survive as exact
/// integers.
///
/// The lexer keeps a one-character lookahead (`current_char`). Keyword
/// recognition folds `true`/`false`/`null` into their own token kinds.
pub struct Lexer {
    /// The input stream
    stream: Box<dyn BaseStream>,

    /// Current character being examined (-1 at end of input)
    current_char: i32,

    /// Reusable buffer for building strings and names
    str_buf: Vec<u8>,
}

impl Lexer {
    /// Creates a new Lexer from a stream.
    pub fn new(mut stream: Box<dyn BaseStream>) -> SplitResult<Self> {
        let current_char = Self::read_char(&mut stream)?;

        Ok(Lexer {
            stream,
            current_char,
            str_buf: Vec::new(),
        })
    }

    /// Reads the next character from the stream. Returns -1 at end of input.
    fn read_char(stream: &mut Box<dyn BaseStream>) -> SplitResult<i32> {
        match stream.get_byte() {
            Ok(byte) => Ok(byte as i32),
            Err(SplitError::UnexpectedEndOfStream) => Ok(-1),
            Err(e) => Err(e),
        }
    }

    /// Advances to the next character.
    fn next_char(&mut self) -> SplitResult<i32> {
        self.current_char = Self::read_char(&mut self.stream)?;
        Ok(self.current_char)
    }

    /// Peeks at the character after the current one without consuming it.
    fn peek_char(&mut self) -> SplitResult<i32> {
        match self.stream.peek_byte() {
            Ok(byte) => Ok(byte as i32),
            Err(SplitError::UnexpectedEndOfStream) => Ok(-1),
            Err(e) => Err(e),
        }
    }

    /// Byte offset of the next unconsumed character.
    pub fn position(&self) -> usize {
        if self.current_char >= 0 {
            self.stream.pos() - 1
        } else {
            self.stream.pos()
        }
    }

    /// Number of unconsumed bytes, counting the lookahead character.
    pub fn remaining(&self) -> usize {
        self.stream.remaining() + if self.current_char >= 0 { 1 } else { 0 }
    }

    /// Returns raw bytes from the underlying stream without consuming them.
    pub fn byte_range(&self, begin: usize, end: usize) -> SplitResult<Vec<u8>> {
        self.stream.get_byte_range(begin, end)
    }

    /// Repositions the lexer, reloading the lookahead character.
    ///
    /// Used after stream payload extraction to jump past raw binary data.
    pub fn seek(&mut self, pos: usize) -> SplitResult<()> {
        self.stream.set_pos(pos)?;
        self.current_char = Self::read_char(&mut self.stream)?;
        Ok(())
    }

    /// Checks if a character is whitespace according to PDF rules.
    ///
    /// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
    fn is_whitespace(ch: i32) -> bool {
        matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
    }

    /// Checks if a character is a delimiter according to PDF rules.
    ///
    /// PDF delimiters: ( ) < > [ ] { } / %
    fn is_delimiter(ch: i32) -> bool {
        matches!(
            ch,
            0x28 | 0x29 | 0x3C | 0x3E | 0x5B | 0x5D | 0x7B | 0x7D | 0x2F | 0x25
        )
    }

    /// Checks if a character is special (whitespace or delimiter).
    fn is_special(ch: i32) -> bool {
        Self::is_whitespace(ch) || Self::is_delimiter(ch)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) -> SplitResult<()> {
        let mut comment = false;

        loop {
            let ch = self.current_char;

            if ch < 0 {
                break;
            }

            if comment {
                // In a comment, skip until newline
                if ch == 0x0A || ch == 0x0D {
                    comment = false;
                }
            } else if ch == 0x25 {
                // '%' starts a comment
                comment = true;
            } else if !Self::is_whitespace(ch) {
                break;
            }

            self.next_char()?;
        }

        Ok(())
    }

    /// Produces the next token from the stream.
    pub fn next_token(&mut self) -> SplitResult<Token> {
        self.skip_whitespace_and_comments()?;

        let ch = self.current_char;

        if ch < 0 {
            return Ok(Token::Eof);
        }

        match ch {
            // Numbers: 0-9, +, -, .
            0x30..=0x39 | 0x2B | 0x2D | 0x2E => self.read_number(),

            // Literal string: (
            0x28 => self.read_string(),

            // Name: /
            0x2F => self.read_name(),

            // Array start: [
            0x5B => {
                self.next_char()?;
                Ok(Token::ArrayStart)
            }

            // Array end: ]
            0x5D => {
                self.next_char()?;
                Ok(Token::ArrayEnd)
            }

            // Hex string or dict start: <
            0x3C => {
                let next_ch = self.next_char()?;
                if next_ch == 0x3C {
                    // << dictionary start
                    self.next_char()?;
                    Ok(Token::DictStart)
                } else {
                    // < hex string
                    self.read_hex_string()
                }
            }

            // Dict end: >
            0x3E => {
                let offset = self.position();
                let next_ch = self.next_char()?;
                if next_ch == 0x3E {
                    // >> dictionary end
                    self.next_char()?;
                    Ok(Token::DictEnd)
                } else {
                    Err(SplitError::MalformedSyntax {
                        offset,
                        message: "'>' outside a hex string or dictionary close".to_string(),
                    })
                }
            }

            // A stray closing paren or brace is not a valid token start
            0x29 | 0x7B | 0x7D => {
                let offset = self.position();
                self.next_char()?;
                Err(SplitError::MalformedSyntax {
                    offset,
                    message: format!("unexpected delimiter '{}'", ch as u8 as char),
                })
            }

            // Everything else is a bare keyword
            _ => self.read_keyword(),
        }
    }

    /// Parses a number token, distinguishing integers from reals.
    ///
    /// Tolerances match Adobe Reader: a doubled leading minus is collapsed,
    /// line breaks after the sign are skipped, a minus in the middle of a
    /// number is ignored, and a bare sign followed by whitespace reads as
    /// zero. `1.5e2`-style exponents produce reals.
    fn read_number(&mut self) -> SplitResult<Token> {
        let mut ch = self.current_char;
        let mut sign = 1i64;

        if ch == 0x2D {
            // '-'
            sign = -1;
            ch = self.next_char()?;
            if ch == 0x2D {
                ch = self.next_char()?;
            }
        } else if ch == 0x2B {
            // '+'
            ch = self.next_char()?;
        }

        while ch == 0x0A || ch == 0x0D {
            ch = self.next_char()?;
        }

        let mut is_real = false;
        let mut divide_by = 0.0f64;
        if ch == 0x2E {
            // '.'
            is_real = true;
            divide_by = 10.0;
            ch = self.next_char()?;
        }

        if !(0x30..=0x39).contains(&ch) {
            if Self::is_whitespace(ch) || ch == 0x28 || ch == 0x3C || ch == -1 {
                return Ok(Token::Integer(0));
            }
            return Err(SplitError::MalformedSyntax {
                offset: self.position(),
                message: format!("invalid number character 0x{:02X}", ch.max(0)),
            });
        }

        let mut int_value = (ch - 0x30) as i64;
        let mut base_value = (ch - 0x30) as f64;
        let mut e_notation = false;
        let mut power_value = 0i32;
        let mut power_sign = 1i32;

        loop {
            ch = self.next_char()?;
            if (0x30..=0x39).contains(&ch) {
                let digit = (ch - 0x30) as i64;
                if e_notation {
                    power_value = power_value.saturating_mul(10).saturating_add(digit as i32);
                } else {
                    if divide_by != 0.0 {
                        divide_by *= 10.0;
                    }
                    base_value = base_value * 10.0 + digit as f64;
                    match int_value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                        Some(v) => int_value = v,
                        // Too many digits for i64, degrade to a real
                        None => is_real = true,
                    }
                }
            } else if ch == 0x2E {
                if divide_by == 0.0 {
                    is_real = true;
                    divide_by = 1.0;
                } else {
                    // A number can have only one dot
                    break;
                }
            } else if ch == 0x2D {
                // Minus in the middle of a number, ignored
            } else if ch == 0x45 || ch == 0x65 {
                // 'E' or 'e': exponent, or the start of a new token
                let peeked = self.peek_char()?;
                if peeked == 0x2B || peeked == 0x2D {
                    power_sign = if peeked == 0x2D { -1 } else { 1 };
                    self.next_char()?;
                } else if !(0x30..=0x39).contains(&peeked) {
                    break;
                }
                e_notation = true;
                is_real = true;
            } else {
                break;
            }
        }

        if !is_real {
            return Ok(Token::Integer(sign * int_value));
        }

        let mut value = base_value;
        if divide_by > 1.0 {
            value /= divide_by;
        }
        if e_notation {
            value *= 10f64.powi(power_sign * power_value);
        }
        Ok(Token::Real(sign as f64 * value))
    }

    /// Parses a literal string token.
    ///
    /// Handles nested parentheses and escape sequences.
    fn read_string(&mut self) -> SplitResult<Token> {
        let mut num_paren = 1; // Track nested parentheses
        self.str_buf.clear();

        let mut ch = self.next_char()?; // Consume opening '('

        loop {
            let mut char_buffered = false;

            match ch {
                -1 => {
                    // Unterminated string, keep what we have
                    break;
                }

                0x28 => {
                    // '(' nested opening paren
                    num_paren += 1;
                    self.str_buf.push(b'(');
                }

                0x29 => {
                    // ')' closing paren
                    num_paren -= 1;
                    if num_paren == 0 {
                        self.next_char()?; // Consume closing ')'
                        break;
                    }
                    self.str_buf.push(b')');
                }

                0x5C => {
                    // '\' escape sequence
                    ch = self.next_char()?;
                    match ch {
                        -1 => break,
                        0x6E => self.str_buf.push(b'\n'), // \n
                        0x72 => self.str_buf.push(b'\r'), // \r
                        0x74 => self.str_buf.push(b'\t'), // \t
                        0x62 => self.str_buf.push(0x08),  // \b (backspace)
                        0x66 => self.str_buf.push(0x0C),  // \f (form feed)
                        0x5C | 0x28 | 0x29 => {
                            // \\, \(, \)
                            self.str_buf.push(ch as u8);
                        }
                        0x30..=0x37 => {
                            // Octal escape \ddd (1-3 digits)
                            let mut x = (ch & 0x0F) as u8;
                            ch = self.next_char()?;
                            char_buffered = true;

                            if (0x30..=0x37).contains(&ch) {
                                x = (x << 3) + (ch & 0x0F) as u8;
                                ch = self.next_char()?;

                                if (0x30..=0x37).contains(&ch) {
                                    char_buffered = false;
                                    x = (x << 3) + (ch & 0x0F) as u8;
                                }
                            }
                            self.str_buf.push(x);
                        }
                        0x0D => {
                            // Escaped CR: line continuation, skip following LF
                            if self.peek_char()? == 0x0A {
                                self.next_char()?;
                            }
                        }
                        0x0A => {
                            // Escaped LF: line continuation
                        }
                        _ => {
                            // Any other escaped character stands for itself
                            self.str_buf.push(ch as u8);
                        }
                    }
                }

                _ => {
                    self.str_buf.push(ch as u8);
                }
            }

            if !char_buffered {
                ch = self.next_char()?;
            }
        }

        Ok(Token::String(self.str_buf.clone()))
    }

    /// Converts a hex character to its numeric value, or -1.
    fn to_hex_digit(ch: i32) -> i32 {
        if (0x30..=0x39).contains(&ch) {
            // '0'-'9'
            ch & 0x0F
        } else if (0x41..=0x46).contains(&ch) || (0x61..=0x66).contains(&ch) {
            // 'A'-'F' or 'a'-'f'
            (ch & 0x0F) + 9
        } else {
            -1
        }
    }

    /// Parses a hex string token: <48656c6c6f>
    ///
    /// Whitespace inside the brackets is skipped; an odd trailing digit is
    /// padded with zero.
    fn read_hex_string(&mut self) -> SplitResult<Token> {
        self.str_buf.clear();
        let mut ch = self.current_char;
        let mut first_digit = -1;

        loop {
            if ch < 0 {
                // Unterminated hex string
                break;
            } else if ch == 0x3E {
                // '>' end of hex string
                self.next_char()?;
                break;
            } else if Self::is_whitespace(ch) {
                ch = self.next_char()?;
                continue;
            } else {
                let digit = Self::to_hex_digit(ch);
                if digit == -1 {
                    // Invalid hex digit, skip it
                } else if first_digit == -1 {
                    first_digit = digit;
                } else {
                    // Two hex digits make one byte
                    self.str_buf.push(((first_digit << 4) | digit) as u8);
                    first_digit = -1;
                }
                ch = self.next_char()?;
            }
        }

        if first_digit != -1 {
            self.str_buf.push((first_digit << 4) as u8);
        }

        Ok(Token::HexString(self.str_buf.clone()))
    }

    /// Parses a name token.
    ///
    /// Names start with '/' and continue until whitespace or a delimiter.
    /// '#xx' escapes are decoded.
    fn read_name(&mut self) -> SplitResult<Token> {
        self.str_buf.clear();

        // Skip the initial '/'
        let mut ch = self.next_char()?;

        while ch >= 0 && !Self::is_special(ch) {
            if ch == 0x23 {
                // '#' hex escape sequence
                ch = self.next_char()?;

                if Self::is_special(ch) {
                    // '#' followed by a special character, keep the '#'
                    self.str_buf.push(b'#');
                    break;
                }

                let x = Self::to_hex_digit(ch);
                if x != -1 {
                    let previous_ch = ch;
                    ch = self.next_char()?;
                    let x2 = Self::to_hex_digit(ch);

                    if x2 == -1 {
                        // Second hex digit is invalid
                        self.str_buf.push(b'#');
                        self.str_buf.push(previous_ch as u8);

                        if Self::is_special(ch) {
                            break;
                        }
                        self.str_buf.push(ch as u8);
                        ch = self.next_char()?;
                        continue;
                    }

                    self.str_buf.push(((x << 4) | x2) as u8);
                } else {
                    // First digit not valid hex, keep '#' and the character
                    self.str_buf.push(b'#');
                    self.str_buf.push(ch as u8);
                }
            } else {
                self.str_buf.push(ch as u8);
            }

            ch = self.next_char()?;
        }

        let name = String::from_utf8_lossy(&self.str_buf).to_string();

        Ok(Token::Name(name))
    }

    /// Parses a bare keyword, recognizing `true`, `false`, and `null`.
    fn read_keyword(&mut self) -> SplitResult<Token> {
        let offset = self.position();
        let mut str_buf = String::new();
        let mut ch = self.current_char;

        while ch >= 0 && !Self::is_special(ch) {
            if str_buf.len() >= 127 {
                return Err(SplitError::MalformedSyntax {
                    offset,
                    message: format!("keyword too long: {} bytes", str_buf.len()),
                });
            }

            str_buf.push(ch as u8 as char);
            ch = self.next_char()?;
        }

        match str_buf.as_str() {
            "true" => Ok(Token::Boolean(true)),
            "false" => Ok(Token::Boolean(false)),
            "null" => Ok(Token::Null),
            _ => Ok(Token::Keyword(str_buf)),
        }
    }
}
