//! JSON text for [`vc_bind`], backed by `serde_json`.
//!
//! ## Menu
//!
//! - [`JsonWriter`]: A [`TokenWriter`] building a [`serde_json::Value`].
//! - [`JsonReader`]: A [`TokenReader`] over parsed documents.
//! - [`to_value`], [`to_string`], [`to_string_pretty`]: Encoding entry points.
//! - [`from_value`], [`from_str`]: Decoding entry points.
//!
//! [`TokenWriter`]: vc_bind::token::TokenWriter
//! [`TokenReader`]: vc_bind::token::TokenReader

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod reader;
mod writer;

// -----------------------------------------------------------------------------
// Exports

pub use error::JsonError;
pub use reader::JsonReader;
pub use writer::JsonWriter;

// -----------------------------------------------------------------------------
// Entry points

use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use serde_json::Value;
use vc_bind::Mapper;

/// Encodes `value` into a JSON tree.
pub fn to_value<T: Any>(mapper: &Mapper, value: &T) -> Result<Value, JsonError> {
    let mut writer = JsonWriter::new();
    mapper.encode(value, &mut writer)?;
    writer.finish()
}

/// Encodes `value` as compact JSON text.
pub fn to_string<T: Any>(mapper: &Mapper, value: &T) -> Result<String, JsonError> {
    Ok(serde_json::to_string(&to_value(mapper, value)?)?)
}

pub fn to_string_pretty<T: Any>(mapper: &Mapper, value: &T) -> Result<String, JsonError> {
    Ok(serde_json::to_string_pretty(&to_value(mapper, value)?)?)
}

/// Decodes a `T` from a JSON tree.
pub fn from_value<T: Any>(mapper: &Mapper, value: &Value) -> Result<T, JsonError> {
    Ok(mapper.decode(&mut JsonReader::new(value))?)
}

/// Decodes a `T` from JSON text.
///
/// The text may hold further whitespace-separated documents; they are
/// rejected only when the mapper fails on trailing tokens.
pub fn from_str<T: Any>(mapper: &Mapper, text: &str) -> Result<T, JsonError> {
    let values = serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mapper.decode(&mut JsonReader::from_values(&values))?)
}
