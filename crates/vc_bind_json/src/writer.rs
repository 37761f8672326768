use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::{Map, Number, Value};
use vc_bind::BindError;
use vc_bind::token::TokenWriter;

use crate::JsonError;

enum Frame {
    Object {
        map: Map<String, Value>,
        key: Option<String>,
    },
    Array(Vec<Value>),
}

/// Builds a [`Value`] from written tokens.
#[derive(Default)]
pub struct JsonWriter {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl JsonWriter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the written document.
    pub fn finish(self) -> Result<Value, JsonError> {
        match (self.stack.is_empty(), self.root) {
            (true, Some(root)) => Ok(root),
            _ => Err(JsonError::Incomplete),
        }
    }

    fn push(&mut self, value: Value) -> Result<(), BindError> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(BindError::custom("a second root value was written")),
            Some(Frame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Frame::Object { map, key }) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(BindError::custom("object value written without a field name")),
            },
        }
    }
}

impl TokenWriter for JsonWriter {
    fn start_object(&mut self) -> Result<(), BindError> {
        self.stack.push(Frame::Object {
            map: Map::new(),
            key: None,
        });
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), BindError> {
        match self.stack.pop() {
            Some(Frame::Object { map, key: None }) => self.push(Value::Object(map)),
            _ => Err(BindError::custom("unbalanced end of object")),
        }
    }

    fn start_array(&mut self) -> Result<(), BindError> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> Result<(), BindError> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.push(Value::Array(items)),
            _ => Err(BindError::custom("unbalanced end of array")),
        }
    }

    fn field_name(&mut self, name: &str) -> Result<(), BindError> {
        match self.stack.last_mut() {
            Some(Frame::Object { key: key @ None, .. }) => {
                *key = Some(String::from(name));
                Ok(())
            }
            _ => Err(BindError::custom(format!("misplaced field name `{name}`"))),
        }
    }

    #[inline]
    fn write_str(&mut self, value: &str) -> Result<(), BindError> {
        self.push(Value::String(String::from(value)))
    }

    #[inline]
    fn write_i64(&mut self, value: i64) -> Result<(), BindError> {
        self.push(Value::from(value))
    }

    #[inline]
    fn write_u64(&mut self, value: u64) -> Result<(), BindError> {
        self.push(Value::from(value))
    }

    fn write_f64(&mut self, value: f64) -> Result<(), BindError> {
        let number = Number::from_f64(value)
            .ok_or_else(|| BindError::custom(format!("{value} has no JSON representation")))?;
        self.push(Value::Number(number))
    }

    #[inline]
    fn write_bool(&mut self, value: bool) -> Result<(), BindError> {
        self.push(Value::Bool(value))
    }

    #[inline]
    fn write_null(&mut self) -> Result<(), BindError> {
        self.push(Value::Null)
    }

    fn write_raw(&mut self, fragment: &str) -> Result<(), BindError> {
        let value = serde_json::from_str(fragment)
            .map_err(|error| BindError::custom(error.to_string()))?;
        self.push(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_document() {
        let mut writer = JsonWriter::new();
        writer.start_object().unwrap();
        writer.field_name("a").unwrap();
        writer.start_array().unwrap();
        writer.write_i64(-1).unwrap();
        writer.write_raw(r#"{"b":null}"#).unwrap();
        writer.end_array().unwrap();
        writer.field_name("c").unwrap();
        writer.write_bool(true).unwrap();
        writer.end_object().unwrap();

        assert_eq!(writer.finish().unwrap(), json!({"a": [-1, {"b": null}], "c": true}));
    }

    #[test]
    fn unfinished_document() {
        let mut writer = JsonWriter::new();
        writer.start_array().unwrap();
        assert!(matches!(writer.finish(), Err(JsonError::Incomplete)));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(JsonWriter::new().write_f64(f64::NAN).is_err());
    }
}
