//! Content stream tokenizer.
//!
//! Turns raw content bytes into lopdf [`Operation`]s. Every byte must be
//! accounted for: a stray delimiter, an unterminated string or array, or a
//! truncated inline image is a [`SyntaxError`] rather than a shorter
//! operation list. Inline images (`BI … ID <data> EI`) are consumed whole and
//! reported as a single `BI` operation without operands.

use lopdf::content::Operation;
use lopdf::{Dictionary, Object, StringFormat};
use thiserror::Error;

/// Malformed content stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at byte {offset}")]
pub(super) struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

type ParseResult<T> = std::result::Result<T, SyntaxError>;

/// Tokenize a whole content stream.
pub(super) fn tokenize(input: &[u8]) -> ParseResult<Vec<Operation>> {
    Lexer { input, pos: 0 }.operations()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// A bare keyword: operator, `true`, `false` or `null`.
enum Keyword<'a> {
    Operand(Object),
    Operator(&'a [u8]),
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.input[self.pos..].starts_with(prefix)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while matches!(self.peek(), Some(c) if c != b'\n' && c != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn operations(mut self) -> ParseResult<Vec<Operation>> {
        let mut operations = Vec::new();
        let mut operands = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            if self.peek().is_none() {
                break;
            }

            if let Some(object) = self.operand()? {
                operands.push(object);
                continue;
            }

            match self.keyword()? {
                Keyword::Operand(object) => operands.push(object),
                Keyword::Operator(b"BI") => {
                    self.skip_inline_image()?;
                    operands.clear();
                    operations.push(Operation::new("BI", vec![]));
                }
                Keyword::Operator(name) => {
                    let operator = String::from_utf8_lossy(name).into_owned();
                    operations.push(Operation::new(&operator, std::mem::take(&mut operands)));
                }
            }
        }

        if !operands.is_empty() {
            return Err(self.error(format!(
                "{} operand(s) without an operator",
                operands.len()
            )));
        }
        Ok(operations)
    }

    /// Parse a non-keyword object, or `None` if a keyword starts here.
    fn operand(&mut self) -> ParseResult<Option<Object>> {
        let Some(b) = self.peek() else {
            return Err(self.error("unexpected end of stream"));
        };
        let object = match b {
            b'(' => self.literal_string()?,
            b'<' if self.starts_with(b"<<") => self.dictionary()?,
            b'<' => self.hex_string()?,
            b'[' => self.array()?,
            b'/' => Object::Name(self.name()),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.number()?,
            _ if is_regular(b) => return Ok(None),
            _ => return Err(self.error(format!("unexpected '{}'", b as char))),
        };
        Ok(Some(object))
    }

    fn keyword(&mut self) -> ParseResult<Keyword<'a>> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_regular(b)) {
            self.pos += 1;
        }
        let input = self.input;
        let word = &input[start..self.pos];
        Ok(match word {
            b"true" => Keyword::Operand(Object::Boolean(true)),
            b"false" => Keyword::Operand(Object::Boolean(false)),
            b"null" => Keyword::Operand(Object::Null),
            _ => Keyword::Operator(word),
        })
    }

    /// Object inside an array, dictionary or inline image header.
    fn nested_object(&mut self) -> ParseResult<Object> {
        if let Some(object) = self.operand()? {
            return Ok(object);
        }
        match self.keyword()? {
            Keyword::Operand(object) => Ok(object),
            // Abbreviated inline image values (`/CS /G` is also written `/CS G`)
            Keyword::Operator(word) => Ok(Object::Name(word.to_vec())),
        }
    }

    fn literal_string(&mut self) -> ParseResult<Object> {
        let start = self.pos;
        self.pos += 1;
        let mut bytes = Vec::new();
        let mut depth = 1u32;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    bytes.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Object::String(bytes, StringFormat::Literal));
                    }
                    bytes.push(b);
                }
                b'\\' => self.escape(&mut bytes),
                _ => bytes.push(b),
            }
        }

        self.pos = start;
        Err(self.error("unterminated literal string"))
    }

    fn escape(&mut self, bytes: &mut Vec<u8>) {
        let Some(b) = self.peek() else {
            return;
        };
        self.pos += 1;
        match b {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0C),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            other => bytes.push(other),
        }
    }

    fn hex_string(&mut self) -> ParseResult<Object> {
        self.pos += 1;
        let mut digits = Vec::new();

        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("unterminated hex string"));
            };
            if b == b'>' {
                self.pos += 1;
                break;
            }
            if !is_whitespace(b) {
                let value = hex_value(b).ok_or_else(|| self.error("invalid hex digit"))?;
                digits.push(value);
            }
            self.pos += 1;
        }

        if digits.len() % 2 != 0 {
            digits.push(0);
        }
        let bytes = digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
        Ok(Object::String(bytes, StringFormat::Hexadecimal))
    }

    fn array(&mut self) -> ParseResult<Object> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.error("unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                Some(_) => items.push(self.nested_object()?),
            }
        }
    }

    fn dictionary(&mut self) -> ParseResult<Object> {
        self.pos += 2;
        let mut dict = Dictionary::new();

        loop {
            self.skip_whitespace_and_comments();
            if self.starts_with(b">>") {
                self.pos += 2;
                return Ok(Object::Dictionary(dict));
            }
            match self.peek() {
                None => return Err(self.error("unterminated dictionary")),
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    if self.peek().is_none() {
                        return Err(self.error("unterminated dictionary"));
                    }
                    let value = self.nested_object()?;
                    dict.set(key, value);
                }
                Some(_) => return Err(self.error("expected name key in dictionary")),
            }
        }
    }

    /// A `/Name` token with `#xx` escapes resolved.
    fn name(&mut self) -> Vec<u8> {
        self.pos += 1;
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_regular(b)) {
            self.pos += 1;
        }

        let raw = &self.input[start..self.pos];
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    name.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        name
    }

    fn number(&mut self) -> ParseResult<Object> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_regular(b)) {
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.input[start..self.pos]).unwrap_or_default();

        if let Ok(value) = token.parse::<i64>() {
            return Ok(Object::Integer(value));
        }
        match token.parse::<f32>() {
            Ok(value) if token.contains('.') => Ok(Object::Real(value)),
            _ => {
                self.pos = start;
                Err(self.error(format!("invalid number '{}'", token)))
            }
        }
    }

    /// Consume an inline image after `BI`: header entries, `ID`, data, `EI`.
    fn skip_inline_image(&mut self) -> ParseResult<()> {
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.error("inline image without ID")),
                Some(b'/') => {
                    self.name();
                    self.skip_whitespace_and_comments();
                    if self.peek().is_none() {
                        return Err(self.error("inline image without ID"));
                    }
                    self.nested_object()?;
                }
                Some(_) if self.starts_with(b"ID") => {
                    self.pos += 2;
                    match self.peek() {
                        Some(b) if is_whitespace(b) => self.pos += 1,
                        _ => return Err(self.error("expected whitespace after ID")),
                    }
                    break;
                }
                Some(_) => return Err(self.error("expected name key in inline image")),
            }
        }

        let data_start = self.pos;
        let input = self.input;
        let end = (data_start..input.len().saturating_sub(1)).find(|&i| {
            &input[i..i + 2] == b"EI"
                && (i == data_start || is_whitespace(input[i - 1]))
                && input.get(i + 2).map_or(true, |&b| !is_regular(b))
        });

        match end {
            Some(i) => {
                self.pos = i + 2;
                Ok(())
            }
            None => Err(self.error("inline image without EI")),
        }
    }
}
