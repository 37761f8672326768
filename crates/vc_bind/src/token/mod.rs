//! The token stream interface of the wire format.
//!
//! The mapper never parses or prints text itself. It writes to a
//! [`TokenWriter`] and reads from a [`TokenReader`], both provided by a
//! format crate.
//!
//! ## Reader positions
//!
//! A decoder is called with the reader positioned **on** the first token of
//! its value and returns with the reader **on** the last token of that
//! value: the matching `EndObject`/`EndArray` for structures, the token
//! itself for scalars. The caller advances past it.

use alloc::string::{String, ToString};
use core::fmt;

use crate::error::{BindError, ValueError};

// -----------------------------------------------------------------------------
// Modules

mod buffer;

// -----------------------------------------------------------------------------
// Exports

pub use buffer::{BufferReader, ReplayReader, TokenBuffer};

// -----------------------------------------------------------------------------
// Token

/// One token of a structured document.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Null,
    /// A pre-encoded fragment, written verbatim.
    Raw(String),
}

impl Token {
    /// Returns `true` if this token opens an object or an array.
    #[inline]
    pub fn is_start(&self) -> bool {
        matches!(self, Token::StartObject | Token::StartArray)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::StartObject => f.write_str("start of object"),
            Token::EndObject => f.write_str("end of object"),
            Token::StartArray => f.write_str("start of array"),
            Token::EndArray => f.write_str("end of array"),
            Token::FieldName(name) => write!(f, "field name {name:?}"),
            Token::String(value) => write!(f, "string {value:?}"),
            Token::I64(value) => write!(f, "integer {value}"),
            Token::U64(value) => write!(f, "integer {value}"),
            Token::F64(value) => write!(f, "number {value}"),
            Token::Bool(value) => write!(f, "boolean {value}"),
            Token::Null => f.write_str("null"),
            Token::Raw(_) => f.write_str("raw fragment"),
        }
    }
}

/// Builds an [`ValueError::UnexpectedToken`], or [`ValueError::UnexpectedEnd`]
/// when the input is exhausted.
pub fn unexpected(expected: &'static str, found: Option<&Token>) -> BindError {
    match found {
        Some(token) => ValueError::UnexpectedToken {
            expected,
            found: token.to_string(),
        }
        .into(),
        None => ValueError::UnexpectedEnd.into(),
    }
}

// -----------------------------------------------------------------------------
// TokenReader

/// A cursor over the tokens of a document.
pub trait TokenReader {
    /// The token under the cursor, `None` before the first
    /// [`advance`](Self::advance) of a fresh reader or after the last token.
    fn current(&self) -> Option<&Token>;

    /// Moves the cursor to the next token.
    fn advance(&mut self) -> Result<(), BindError>;

    /// The token under the cursor, failing at the end of input.
    #[inline]
    fn token(&self) -> Result<&Token, BindError> {
        self.current()
            .ok_or_else(|| ValueError::UnexpectedEnd.into())
    }

    /// Advances and returns the new current token.
    #[inline]
    fn next_token(&mut self) -> Result<&Token, BindError> {
        self.advance()?;
        self.token()
    }

    /// The current scalar token; structural tokens are an error.
    fn scalar(&self) -> Result<&Token, BindError> {
        let token = self.token()?;
        match token {
            Token::StartObject
            | Token::EndObject
            | Token::StartArray
            | Token::EndArray
            | Token::FieldName(_) => Err(unexpected("a scalar", Some(token))),
            _ => Ok(token),
        }
    }

    /// The field name under the cursor, if any.
    fn peek_field_name(&self) -> Option<&str> {
        match self.current() {
            Some(Token::FieldName(name)) => Some(name),
            _ => None,
        }
    }

    /// Skips the value under the cursor.
    ///
    /// For a structure, the cursor ends on its closing token; a scalar is
    /// left as is.
    fn skip_children(&mut self) -> Result<(), BindError> {
        if !self.token()?.is_start() {
            return Ok(());
        }
        let mut depth = 1_usize;
        while depth > 0 {
            match self.next_token()? {
                Token::StartObject | Token::StartArray => depth += 1,
                Token::EndObject | Token::EndArray => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// TokenWriter

/// A sink for the tokens of a document.
pub trait TokenWriter {
    fn start_object(&mut self) -> Result<(), BindError>;
    fn end_object(&mut self) -> Result<(), BindError>;
    fn start_array(&mut self) -> Result<(), BindError>;
    fn end_array(&mut self) -> Result<(), BindError>;
    fn field_name(&mut self, name: &str) -> Result<(), BindError>;
    fn write_str(&mut self, value: &str) -> Result<(), BindError>;
    fn write_i64(&mut self, value: i64) -> Result<(), BindError>;
    fn write_u64(&mut self, value: u64) -> Result<(), BindError>;
    fn write_f64(&mut self, value: f64) -> Result<(), BindError>;
    fn write_bool(&mut self, value: bool) -> Result<(), BindError>;
    fn write_null(&mut self) -> Result<(), BindError>;
    fn write_raw(&mut self, fragment: &str) -> Result<(), BindError>;

    /// Writes one token.
    fn write_token(&mut self, token: &Token) -> Result<(), BindError> {
        match token {
            Token::StartObject => self.start_object(),
            Token::EndObject => self.end_object(),
            Token::StartArray => self.start_array(),
            Token::EndArray => self.end_array(),
            Token::FieldName(name) => self.field_name(name),
            Token::String(value) => self.write_str(value),
            Token::I64(value) => self.write_i64(*value),
            Token::U64(value) => self.write_u64(*value),
            Token::F64(value) => self.write_f64(*value),
            Token::Bool(value) => self.write_bool(*value),
            Token::Null => self.write_null(),
            Token::Raw(fragment) => self.write_raw(fragment),
        }
    }
}

/// Copies the value under the cursor of `reader` into `writer`.
///
/// The reader ends on the last token of the value.
pub fn copy_value(
    reader: &mut dyn TokenReader,
    writer: &mut dyn TokenWriter,
) -> Result<(), BindError> {
    let mut depth = 0_usize;
    loop {
        let token = reader.token()?;
        writer.write_token(token)?;
        match token {
            Token::StartObject | Token::StartArray => depth += 1,
            Token::EndObject | Token::EndArray => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 {
            return Ok(());
        }
        reader.advance()?;
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn skip_nested_structures() {
        let mut reader = BufferReader::new(vec![
            Token::StartObject,
            Token::FieldName("a".into()),
            Token::StartArray,
            Token::I64(1),
            Token::StartObject,
            Token::EndObject,
            Token::EndArray,
            Token::EndObject,
            Token::Null,
        ]);
        reader.skip_children().unwrap();
        assert_eq!(reader.current(), Some(&Token::EndObject));
        reader.advance().unwrap();
        assert_eq!(reader.current(), Some(&Token::Null));

        // Scalars stay in place.
        reader.skip_children().unwrap();
        assert_eq!(reader.current(), Some(&Token::Null));
    }

    #[test]
    fn copy_one_value() {
        let mut reader = BufferReader::new(vec![
            Token::StartArray,
            Token::String("x".into()),
            Token::EndArray,
            Token::Bool(true),
        ]);
        let mut buffer = TokenBuffer::new();
        copy_value(&mut reader, &mut buffer).unwrap();

        assert_eq!(buffer.tokens().len(), 3);
        assert_eq!(reader.current(), Some(&Token::EndArray));
    }

    #[test]
    fn scalar_rejects_structure() {
        let reader = BufferReader::new(vec![Token::StartObject]);
        let error = reader.scalar().unwrap_err();
        assert_eq!(
            error.to_string(),
            "expected a scalar, found start of object at $"
        );
    }

    #[test]
    fn unexpected_end() {
        let mut reader = BufferReader::new(vec![Token::Null]);
        assert!(reader.next_token().is_err());
        assert_eq!(
            unexpected("a string", None),
            BindError::from(ValueError::UnexpectedEnd)
        );
    }
}
