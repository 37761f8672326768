use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::any::{Any, TypeId};
use core::marker::PhantomData;

use crate::error::{BindError, ValueError};
use crate::hash::HashMap;
use crate::token::{Token, TokenReader, TokenWriter, unexpected};

use super::{DecodeContext, Decoder, EncodeContext, Encoder, downcast};

// -----------------------------------------------------------------------------
// Integers

/// Converts one integer type.
///
/// Decoding accepts any integer token and fails with
/// [`ValueError::OutOfRange`] when the value does not fit.
pub struct IntConverter<T>(PhantomData<fn() -> T>);

impl<T> IntConverter<T> {
    #[inline]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntConverter<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! impl_int_converter {
    ($($ty:ty => $write:ident($wide:ty)),* $(,)?) => {
        $(
            impl Encoder for IntConverter<$ty> {
                fn encode(
                    &self,
                    value: &dyn Any,
                    writer: &mut dyn TokenWriter,
                    _ctx: &mut EncodeContext<'_>,
                ) -> Result<(), BindError> {
                    let value = *downcast::<$ty>(value)?;
                    writer.$write(value as $wide)
                }
            }

            impl Decoder for IntConverter<$ty> {
                fn decode(
                    &self,
                    reader: &mut dyn TokenReader,
                    _ctx: &mut DecodeContext<'_>,
                ) -> Result<Box<dyn Any>, BindError> {
                    let token = reader.scalar()?;
                    let (parsed, shown) = match token {
                        Token::I64(value) => (<$ty>::try_from(*value).ok(), value.to_string()),
                        Token::U64(value) => (<$ty>::try_from(*value).ok(), value.to_string()),
                        _ => return Err(unexpected("an integer", Some(token))),
                    };
                    match parsed {
                        Some(value) => Ok(Box::new(value)),
                        None => Err(ValueError::OutOfRange {
                            value: shown,
                            target: stringify!($ty),
                        }
                        .into()),
                    }
                }
            }
        )*
    };
}

impl_int_converter!(
    i8 => write_i64(i64),
    i16 => write_i64(i64),
    i32 => write_i64(i64),
    i64 => write_i64(i64),
    isize => write_i64(i64),
    u8 => write_u64(u64),
    u16 => write_u64(u64),
    u32 => write_u64(u64),
    u64 => write_u64(u64),
    usize => write_u64(u64),
);

// -----------------------------------------------------------------------------
// Floats

/// Converts `f32` or `f64`; integer tokens are accepted when decoding.
pub struct FloatConverter<T>(PhantomData<fn() -> T>);

impl<T> FloatConverter<T> {
    #[inline]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FloatConverter<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn read_f64(reader: &dyn TokenReader) -> Result<f64, BindError> {
    let token = reader.scalar()?;
    match token {
        Token::F64(value) => Ok(*value),
        Token::I64(value) => Ok(*value as f64),
        Token::U64(value) => Ok(*value as f64),
        _ => Err(unexpected("a number", Some(token))),
    }
}

impl Encoder for FloatConverter<f64> {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.write_f64(*downcast::<f64>(value)?)
    }
}

impl Decoder for FloatConverter<f64> {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        Ok(Box::new(read_f64(reader)?))
    }
}

impl Encoder for FloatConverter<f32> {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.write_f64(f64::from(*downcast::<f32>(value)?))
    }
}

impl Decoder for FloatConverter<f32> {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        Ok(Box::new(read_f64(reader)? as f32))
    }
}

// -----------------------------------------------------------------------------
// Other scalars

#[derive(Debug, Default, Clone, Copy)]
pub struct BoolConverter;

impl Encoder for BoolConverter {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.write_bool(*downcast::<bool>(value)?)
    }
}

impl Decoder for BoolConverter {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.scalar()? {
            Token::Bool(value) => Ok(Box::new(*value)),
            other => Err(unexpected("a boolean", Some(other))),
        }
    }
}

/// Converts `String`; the empty string counts as empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringConverter;

impl Encoder for StringConverter {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.write_str(downcast::<String>(value)?)
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<String>().is_some_and(String::is_empty)
    }
}

impl Decoder for StringConverter {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.scalar()? {
            Token::String(value) => Ok(Box::new(value.clone())),
            other => Err(unexpected("a string", Some(other))),
        }
    }
}

/// Converts `char` as a one-character string.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharConverter;

impl Encoder for CharConverter {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let mut buf = [0_u8; 4];
        writer.write_str(downcast::<char>(value)?.encode_utf8(&mut buf))
    }
}

impl Decoder for CharConverter {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let token = reader.scalar()?;
        if let Token::String(value) = token {
            let mut chars = value.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(Box::new(c));
            }
        }
        Err(unexpected("a single character", Some(token)))
    }
}

/// Converts `()` as `null`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitConverter;

impl Encoder for UnitConverter {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        downcast::<()>(value)?;
        writer.write_null()
    }
}

impl Decoder for UnitConverter {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.scalar()? {
            Token::Null => Ok(Box::new(())),
            other => Err(unexpected("null", Some(other))),
        }
    }
}

// -----------------------------------------------------------------------------
// StandardConverters

/// The built-in converters, keyed by the converted type.
pub struct StandardConverters {
    encoders: HashMap<TypeId, Arc<dyn Encoder>>,
    decoders: HashMap<TypeId, Arc<dyn Decoder>>,
}

impl Default for StandardConverters {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl StandardConverters {
    /// Creates the table with every primitive, `String` and `()`.
    pub fn new() -> Self {
        let mut table = Self {
            encoders: HashMap::default(),
            decoders: HashMap::default(),
        };

        table.insert::<i8, _>(IntConverter::<i8>::new());
        table.insert::<i16, _>(IntConverter::<i16>::new());
        table.insert::<i32, _>(IntConverter::<i32>::new());
        table.insert::<i64, _>(IntConverter::<i64>::new());
        table.insert::<isize, _>(IntConverter::<isize>::new());
        table.insert::<u8, _>(IntConverter::<u8>::new());
        table.insert::<u16, _>(IntConverter::<u16>::new());
        table.insert::<u32, _>(IntConverter::<u32>::new());
        table.insert::<u64, _>(IntConverter::<u64>::new());
        table.insert::<usize, _>(IntConverter::<usize>::new());
        table.insert::<f32, _>(FloatConverter::<f32>::new());
        table.insert::<f64, _>(FloatConverter::<f64>::new());
        table.insert::<bool, _>(BoolConverter);
        table.insert::<char, _>(CharConverter);
        table.insert::<String, _>(StringConverter);
        table.insert::<(), _>(UnitConverter);
        table
    }

    /// Adds or replaces the converter of `T`.
    pub fn insert<T: Any, C: Encoder + Decoder + 'static>(&mut self, converter: C) {
        let converter = Arc::new(converter);
        self.encoders.insert(TypeId::of::<T>(), converter.clone());
        self.decoders.insert(TypeId::of::<T>(), converter);
    }

    #[inline]
    pub fn encoder(&self, ty: TypeId) -> Option<&Arc<dyn Encoder>> {
        self.encoders.get(&ty)
    }

    #[inline]
    pub fn decoder(&self, ty: TypeId) -> Option<&Arc<dyn Decoder>> {
        self.decoders.get(&ty)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::Mapper;
    use crate::token::{BufferReader, TokenBuffer};

    fn decode_one(decoder: &dyn Decoder, token: Token) -> Result<Box<dyn Any>, BindError> {
        let mapper = Mapper::new();
        let mut ctx = DecodeContext::new(&mapper);
        let mut reader = BufferReader::new(vec![token]);
        decoder.decode(&mut reader, &mut ctx)
    }

    #[test]
    fn integers_check_their_range() {
        let value = decode_one(&IntConverter::<u8>::new(), Token::I64(200)).unwrap();
        assert_eq!(value.downcast_ref::<u8>(), Some(&200));

        let error = decode_one(&IntConverter::<u8>::new(), Token::I64(300)).unwrap_err();
        assert_eq!(
            error,
            ValueError::OutOfRange {
                value: "300".into(),
                target: "u8",
            }
            .into()
        );

        let error = decode_one(&IntConverter::<i32>::new(), Token::U64(u64::MAX)).unwrap_err();
        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::OutOfRange { target: "i32", .. },
                ..
            }
        ));

        let error = decode_one(&IntConverter::<i32>::new(), Token::String("1".into())).unwrap_err();
        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::UnexpectedToken { expected: "an integer", .. },
                ..
            }
        ));
    }

    #[test]
    fn floats_accept_integers() {
        let value = decode_one(&FloatConverter::<f64>::new(), Token::I64(-3)).unwrap();
        assert_eq!(value.downcast_ref::<f64>(), Some(&-3.0));

        let value = decode_one(&FloatConverter::<f32>::new(), Token::F64(1.5)).unwrap();
        assert_eq!(value.downcast_ref::<f32>(), Some(&1.5));
    }

    #[test]
    fn chars_are_single_character_strings() {
        let value = decode_one(&CharConverter, Token::String("é".into())).unwrap();
        assert_eq!(value.downcast_ref::<char>(), Some(&'é'));

        assert!(decode_one(&CharConverter, Token::String("ab".into())).is_err());
        assert!(decode_one(&CharConverter, Token::String(String::new())).is_err());
    }

    #[test]
    fn encode_through_table() {
        let mapper = Mapper::new();
        let table = StandardConverters::new();
        let mut ctx = EncodeContext::new(&mapper);
        let mut out = TokenBuffer::new();

        let encoder = table.encoder(TypeId::of::<i16>()).unwrap();
        encoder.encode(&-7_i16, &mut out, &mut ctx).unwrap();
        let encoder = table.encoder(TypeId::of::<u32>()).unwrap();
        encoder.encode(&7_u32, &mut out, &mut ctx).unwrap();
        let encoder = table.encoder(TypeId::of::<()>()).unwrap();
        encoder.encode(&(), &mut out, &mut ctx).unwrap();

        assert_eq!(out.tokens(), [Token::I64(-7), Token::U64(7), Token::Null]);

        // Handing the wrong type is a downcast failure, not a panic.
        let encoder = table.encoder(TypeId::of::<bool>()).unwrap();
        assert!(encoder.encode(&1_u8, &mut out, &mut ctx).is_err());
    }

    #[test]
    fn empty_strings() {
        assert!(StringConverter.is_empty(&String::new()));
        assert!(!StringConverter.is_empty(&String::from("x")));
        assert!(!StringConverter.is_absent(&String::new()));
    }
}
