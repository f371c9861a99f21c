//! Tokenizer for logged request records.
//!
//! Records are written in a protobuf text-format style:
//! `query:"..." vars:<key:"$a" value:"1">`. The lexer is lazy so that text
//! trailing a complete record is never inspected.

use crate::extract::Reason;

/// A lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Field name
    Ident(&'a str),
    /// `:`
    Colon,
    /// `{` or `<`
    Open(char),
    /// `}` or `>`
    Close(char),
    /// Quoted string, already unescaped
    Str(String),
    /// Unquoted scalar such as a number or enum value
    Scalar(&'a str),
    /// Anything else
    Other(char),
}

/// Lazy tokenizer over one record
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    peeked: Option<Result<Token<'a>, Reason>>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `input`
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            peeked: None,
        }
    }

    /// Look at the next token without consuming it
    pub fn peek(&mut self) -> Option<&Result<Token<'a>, Reason>> {
        if self.peeked.is_none() {
            self.peeked = self.lex();
        }
        self.peeked.as_ref()
    }

    fn lex(&mut self) -> Option<Result<Token<'a>, Reason>> {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();

        let c = trimmed.chars().next()?;
        let token = match c {
            ':' => {
                self.pos += 1;
                Ok(Token::Colon)
            }
            '{' | '<' => {
                self.pos += 1;
                Ok(Token::Open(c))
            }
            '}' | '>' => {
                self.pos += 1;
                Ok(Token::Close(c))
            }
            '"' | '\'' => self.string(c),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = trimmed
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'))
                    .unwrap_or(trimmed.len());
                self.pos += len;
                Ok(Token::Ident(&trimmed[..len]))
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' => {
                let len = trimmed
                    .find(|ch: char| ch.is_whitespace() || is_delimiter(ch))
                    .unwrap_or(trimmed.len());
                self.pos += len;
                Ok(Token::Scalar(&trimmed[..len]))
            }
            other => {
                self.pos += other.len_utf8();
                Ok(Token::Other(other))
            }
        };
        Some(token)
    }

    /// Lex a quoted string starting at `self.pos`
    fn string(&mut self, quote: char) -> Result<Token<'a>, Reason> {
        let body = &self.input[self.pos + 1..];
        let mut bytes = Vec::with_capacity(body.len());
        let mut chars = body.char_indices();

        while let Some((i, ch)) = chars.next() {
            match ch {
                c if c == quote => {
                    self.pos += 1 + i + 1;
                    return String::from_utf8(bytes)
                        .map(Token::Str)
                        .map_err(|_| Reason::InvalidUtf8);
                }
                '\\' => {
                    let (_, esc) = chars.next().ok_or(Reason::UnterminatedString)?;
                    match esc {
                        'n' => bytes.push(b'\n'),
                        't' => bytes.push(b'\t'),
                        'r' => bytes.push(b'\r'),
                        'a' => bytes.push(0x07),
                        'b' => bytes.push(0x08),
                        'f' => bytes.push(0x0c),
                        'v' => bytes.push(0x0b),
                        '\\' | '\'' | '"' | '?' => bytes.push(esc as u8),
                        '0'..='7' => {
                            let mut value = esc.to_digit(8).unwrap_or(0);
                            for _ in 0..2 {
                                let digit = chars
                                    .clone()
                                    .next()
                                    .and_then(|(_, d)| d.to_digit(8));
                                match digit {
                                    Some(d) => {
                                        value = value * 8 + d;
                                        chars.next();
                                    }
                                    None => break,
                                }
                            }
                            let byte = u8::try_from(value).map_err(|_| Reason::InvalidEscape)?;
                            bytes.push(byte);
                        }
                        'x' => {
                            let value = hex_digits(&mut chars, 2)?;
                            bytes.push(value as u8);
                        }
                        'u' | 'U' => {
                            let width = if esc == 'u' { 4 } else { 8 };
                            let value = hex_digits(&mut chars, width)?;
                            let decoded = char::from_u32(value).ok_or(Reason::InvalidEscape)?;
                            let mut buf = [0u8; 4];
                            bytes.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
                        }
                        _ => return Err(Reason::InvalidEscape),
                    }
                }
                c => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        Err(Reason::UnterminatedString)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, Reason>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(token) => Some(token),
            None => self.lex(),
        }
    }
}

fn is_delimiter(ch: char) -> bool {
    matches!(ch, ':' | '{' | '}' | '<' | '>' | '"' | '\'')
}

fn hex_digits(chars: &mut std::str::CharIndices<'_>, width: usize) -> Result<u32, Reason> {
    let mut value = 0u32;
    for _ in 0..width {
        let digit = chars
            .next()
            .and_then(|(_, d)| d.to_digit(16))
            .ok_or(Reason::InvalidEscape)?;
        value = value * 16 + digit;
    }
    Ok(value)
}
