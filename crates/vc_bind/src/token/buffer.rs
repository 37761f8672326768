use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::BindError;

use super::{Token, TokenReader, TokenWriter};

// -----------------------------------------------------------------------------
// TokenBuffer

/// A [`TokenWriter`] collecting tokens in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
}

impl TokenBuffer {
    #[inline]
    pub const fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    #[inline]
    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    #[inline]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// A reader positioned on the first buffered token.
    #[inline]
    pub fn into_reader(self) -> BufferReader {
        BufferReader::new(self.tokens)
    }
}

macro_rules! impl_buffer_writes {
    ($($fn_name:ident($($arg:ident: $ty:ty)?) => $token:expr;)*) => {
        $(
            #[inline]
            fn $fn_name(&mut self $(, $arg: $ty)?) -> Result<(), BindError> {
                self.tokens.push($token);
                Ok(())
            }
        )*
    };
}

impl TokenWriter for TokenBuffer {
    impl_buffer_writes! {
        start_object() => Token::StartObject;
        end_object() => Token::EndObject;
        start_array() => Token::StartArray;
        end_array() => Token::EndArray;
        field_name(name: &str) => Token::FieldName(String::from(name));
        write_str(value: &str) => Token::String(String::from(value));
        write_i64(value: i64) => Token::I64(value);
        write_u64(value: u64) => Token::U64(value);
        write_f64(value: f64) => Token::F64(value);
        write_bool(value: bool) => Token::Bool(value);
        write_null() => Token::Null;
        write_raw(fragment: &str) => Token::Raw(String::from(fragment));
    }

    #[inline]
    fn write_token(&mut self, token: &Token) -> Result<(), BindError> {
        self.tokens.push(token.clone());
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// BufferReader

/// A [`TokenReader`] over buffered tokens.
///
/// Unlike a format reader, it starts **on** the first token, so it can be
/// handed to a decoder directly.
#[derive(Debug, Clone)]
pub struct BufferReader {
    tokens: Vec<Token>,
    position: usize,
}

impl BufferReader {
    #[inline]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }
}

impl TokenReader for BufferReader {
    #[inline]
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    #[inline]
    fn advance(&mut self) -> Result<(), BindError> {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ReplayReader

/// Replays buffered tokens before continuing with an underlying reader.
///
/// Used after reading ahead for a type discriminator: the concrete decoder
/// sees `head`, then the buffered tokens, then the rest of `inner` starting
/// with the token after `inner`'s current one.
pub struct ReplayReader<'r> {
    head: Option<Token>,
    pending: VecDeque<Token>,
    inner: &'r mut dyn TokenReader,
}

impl<'r> ReplayReader<'r> {
    pub fn new(head: Token, pending: Vec<Token>, inner: &'r mut dyn TokenReader) -> Self {
        Self {
            head: Some(head),
            pending: pending.into(),
            inner,
        }
    }
}

impl TokenReader for ReplayReader<'_> {
    #[inline]
    fn current(&self) -> Option<&Token> {
        match &self.head {
            Some(token) => Some(token),
            None => self.inner.current(),
        }
    }

    fn advance(&mut self) -> Result<(), BindError> {
        if self.head.is_none() {
            return self.inner.advance();
        }
        self.head = self.pending.pop_front();
        if self.head.is_none() {
            self.inner.advance()?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn buffer_then_read() {
        let mut buffer = TokenBuffer::new();
        buffer.start_object().unwrap();
        buffer.field_name("a").unwrap();
        buffer.write_i64(1).unwrap();
        buffer.end_object().unwrap();

        let mut reader = buffer.into_reader();
        assert_eq!(reader.current(), Some(&Token::StartObject));
        assert_eq!(reader.next_token().unwrap(), &Token::FieldName("a".into()));
        assert_eq!(reader.peek_field_name(), Some("a"));
        reader.advance().unwrap();
        reader.advance().unwrap();
        assert_eq!(reader.current(), Some(&Token::EndObject));
        reader.advance().unwrap();
        assert!(reader.current().is_none());
        reader.advance().unwrap();
        assert!(reader.current().is_none());
    }

    #[test]
    fn replay_then_continue() {
        let mut inner = BufferReader::new(vec![
            Token::String("A".into()),
            Token::FieldName("y".into()),
            Token::I64(2),
            Token::EndObject,
        ]);

        let mut replay = ReplayReader::new(
            Token::StartObject,
            vec![Token::FieldName("x".into()), Token::I64(1)],
            &mut inner,
        );

        let mut seen = vec![replay.token().unwrap().clone()];
        while replay.current() != Some(&Token::EndObject) {
            seen.push(replay.next_token().unwrap().clone());
        }

        assert_eq!(
            seen,
            vec![
                Token::StartObject,
                Token::FieldName("x".into()),
                Token::I64(1),
                Token::FieldName("y".into()),
                Token::I64(2),
                Token::EndObject,
            ]
        );
    }
}
