use alloc::string::String;
use alloc::vec::Vec;

use serde_json::Value;
use vc_bind::BindError;
use vc_bind::token::{Token, TokenReader};

/// Reads tokens from parsed JSON documents.
///
/// A new reader is positioned before its first token, as
/// [`Mapper::decode`](vc_bind::Mapper::decode) expects. Several documents
/// can be read in sequence; tokens after the first document are trailing
/// tokens of it.
pub struct JsonReader {
    tokens: Vec<Token>,
    position: Option<usize>,
}

impl JsonReader {
    pub fn new(value: &Value) -> Self {
        Self::from_values(core::iter::once(value))
    }

    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut tokens = Vec::new();
        for value in values {
            flatten(value, &mut tokens);
        }
        Self {
            tokens,
            position: None,
        }
    }
}

fn flatten(value: &Value, tokens: &mut Vec<Token>) {
    match value {
        Value::Null => tokens.push(Token::Null),
        Value::Bool(value) => tokens.push(Token::Bool(*value)),
        Value::Number(number) => tokens.push(if let Some(value) = number.as_i64() {
            Token::I64(value)
        } else if let Some(value) = number.as_u64() {
            Token::U64(value)
        } else {
            Token::F64(number.as_f64().unwrap_or(f64::NAN))
        }),
        Value::String(value) => tokens.push(Token::String(value.clone())),
        Value::Array(items) => {
            tokens.push(Token::StartArray);
            for item in items {
                flatten(item, tokens);
            }
            tokens.push(Token::EndArray);
        }
        Value::Object(map) => {
            tokens.push(Token::StartObject);
            for (key, value) in map {
                tokens.push(Token::FieldName(String::from(key)));
                flatten(value, tokens);
            }
            tokens.push(Token::EndObject);
        }
    }
}

impl TokenReader for JsonReader {
    #[inline]
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.position?)
    }

    fn advance(&mut self) -> Result<(), BindError> {
        self.position = match self.position {
            None => Some(0),
            Some(position) if position < self.tokens.len() => Some(position + 1),
            done => done,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn starts_before_the_first_token() {
        let value = json!({"a": [1, "x"]});
        let mut reader = JsonReader::new(&value);
        assert!(reader.current().is_none());

        let mut seen = Vec::new();
        reader.advance().unwrap();
        while let Some(token) = reader.current() {
            seen.push(token.clone());
            reader.advance().unwrap();
        }
        assert_eq!(
            seen,
            [
                Token::StartObject,
                Token::FieldName("a".into()),
                Token::StartArray,
                Token::I64(1),
                Token::String("x".into()),
                Token::EndArray,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn large_unsigned_numbers() {
        let value = json!(u64::MAX);
        let mut reader = JsonReader::new(&value);
        reader.advance().unwrap();
        assert_eq!(reader.current(), Some(&Token::U64(u64::MAX)));
    }
}
