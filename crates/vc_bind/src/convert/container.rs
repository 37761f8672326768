use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;

use crate::error::{AccessError, BindError, PathSegment, ValueError};
use crate::info::{BuildSeqFn, EntriesFn, EntrySetFn, IterFn, ProjectFn, TypeKey, WrapFn};
use crate::token::{Token, TokenReader, TokenWriter, unexpected};

use super::{DecodeContext, Decoder, EncodeContext, Encoder};

type MakeFn = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

#[inline]
fn mismatch(key: &TypeKey) -> BindError {
    AccessError::Downcast {
        expected: key.path(),
    }
    .into()
}

// -----------------------------------------------------------------------------
// Sequences

/// Writes a sequence as an array.
pub struct SequenceEncoder {
    pub(crate) key: TypeKey,
    pub(crate) iter: IterFn,
    pub(crate) element: Arc<dyn Encoder>,
}

impl Encoder for SequenceEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let items = (self.iter)(value).ok_or_else(|| mismatch(&self.key))?;
        ctx.nested(value, self.key.path(), |ctx| {
            writer.start_array()?;
            for (index, item) in items.into_iter().enumerate() {
                self.element
                    .encode(item, writer, ctx)
                    .map_err(|e| e.with_segment(PathSegment::Index(index)))?;
            }
            writer.end_array()
        })
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.iter)(value).is_some_and(|items| items.is_empty())
    }
}

/// Reads an array into a sequence.
pub struct SequenceDecoder {
    pub(crate) build: BuildSeqFn,
    pub(crate) element: Arc<dyn Decoder>,
}

impl Decoder for SequenceDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartArray => {}
            other => return Err(unexpected("start of array", Some(other))),
        }
        let items = ctx.nested(|ctx| {
            let mut items = Vec::new();
            loop {
                if reader.next_token()? == &Token::EndArray {
                    return Ok(items);
                }
                let item = self
                    .element
                    .decode(reader, ctx)
                    .map_err(|e| e.with_segment(PathSegment::Index(items.len())))?;
                items.push(item);
            }
        })?;
        Ok((self.build)(items)?)
    }
}

// -----------------------------------------------------------------------------
// Maps

/// Writes a string-keyed map as an object.
pub struct MapEncoder {
    pub(crate) key: TypeKey,
    pub(crate) entries: EntriesFn,
    pub(crate) value: Arc<dyn Encoder>,
    /// Orders entries by key before writing.
    pub(crate) sort: bool,
}

impl Encoder for MapEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let mut entries = (self.entries)(value).ok_or_else(|| mismatch(&self.key))?;
        if self.sort {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }
        ctx.nested(value, self.key.path(), |ctx| {
            writer.start_object()?;
            for (key, item) in entries {
                writer.field_name(key)?;
                self.value
                    .encode(item, writer, ctx)
                    .map_err(|e| e.with_segment(PathSegment::Key(String::from(key))))?;
            }
            writer.end_object()
        })
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.entries)(value).is_some_and(|entries| entries.is_empty())
    }
}

/// Reads an object into a string-keyed map.
pub struct MapDecoder {
    pub(crate) empty: MakeFn,
    pub(crate) insert: EntrySetFn,
    pub(crate) value: Arc<dyn Decoder>,
}

impl Decoder for MapDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartObject => {}
            other => return Err(unexpected("start of object", Some(other))),
        }
        let mut map = (self.empty)();
        ctx.nested(|ctx| {
            loop {
                let key = match reader.next_token()? {
                    Token::EndObject => return Ok(()),
                    Token::FieldName(name) => name.clone(),
                    other => return Err(unexpected("a field name", Some(other))),
                };
                reader.advance()?;
                let item = self
                    .value
                    .decode(reader, ctx)
                    .map_err(|e| e.with_segment(PathSegment::Key(key.clone())))?;
                (self.insert)(&mut *map, key, item)?;
            }
        })?;
        Ok(map)
    }
}

// -----------------------------------------------------------------------------
// Optionals

/// Writes `None` as `null` and `Some(v)` as `v`.
pub struct OptionalEncoder {
    pub(crate) get: ProjectFn,
    pub(crate) inner: Arc<dyn Encoder>,
}

impl Encoder for OptionalEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        match (self.get)(value) {
            Some(inner) => self.inner.encode(inner, writer, ctx),
            None => writer.write_null(),
        }
    }

    fn is_absent(&self, value: &dyn Any) -> bool {
        (self.get)(value).is_none()
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.get)(value).is_none_or(|inner| self.inner.is_empty(inner))
    }
}

/// Reads `null` as `None`; a missing creator property is `None` as well.
pub struct OptionalDecoder {
    pub(crate) some: WrapFn,
    pub(crate) none: MakeFn,
    pub(crate) inner: Arc<dyn Decoder>,
}

impl Decoder for OptionalDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        if reader.token()? == &Token::Null {
            return Ok((self.none)());
        }
        let inner = self.inner.decode(reader, ctx)?;
        Ok((self.some)(inner)?)
    }

    fn absent_value(&self) -> Option<Box<dyn Any>> {
        Some((self.none)())
    }
}

// -----------------------------------------------------------------------------
// Pointers

/// Writes the target of an owning pointer.
pub struct PointerEncoder {
    pub(crate) key: TypeKey,
    pub(crate) deref: ProjectFn,
    pub(crate) inner: Arc<dyn Encoder>,
}

impl Encoder for PointerEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let target = (self.deref)(value).ok_or_else(|| mismatch(&self.key))?;
        self.inner.encode(target, writer, ctx)
    }

    fn is_absent(&self, value: &dyn Any) -> bool {
        (self.deref)(value).is_some_and(|target| self.inner.is_absent(target))
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.deref)(value).is_some_and(|target| self.inner.is_empty(target))
    }
}

/// Reads a value and wraps it into an owning pointer.
pub struct PointerDecoder {
    pub(crate) wrap: WrapFn,
    pub(crate) inner: Arc<dyn Decoder>,
}

impl Decoder for PointerDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let inner = self.inner.decode(reader, ctx)?;
        Ok((self.wrap)(inner)?)
    }

    fn absent_value(&self) -> Option<Box<dyn Any>> {
        let inner = self.inner.absent_value()?;
        (self.wrap)(inner).ok()
    }
}

// -----------------------------------------------------------------------------
// Enums

/// Converts a unit-variant enum by variant name.
pub struct EnumConverter {
    pub(crate) key: TypeKey,
    pub(crate) variants: Vec<String>,
    pub(crate) index_of: Arc<dyn Fn(&dyn Any) -> Option<usize> + Send + Sync>,
    pub(crate) from_index: Arc<dyn Fn(usize) -> Option<Box<dyn Any>> + Send + Sync>,
}

impl Encoder for EnumConverter {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        _ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let name = (self.index_of)(value)
            .and_then(|index| self.variants.get(index))
            .ok_or_else(|| mismatch(&self.key))?;
        writer.write_str(name)
    }
}

impl Decoder for EnumConverter {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        _ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let name = match reader.scalar()? {
            Token::String(name) => name,
            other => return Err(unexpected("a variant name", Some(other))),
        };
        self.variants
            .iter()
            .position(|variant| variant == name)
            .and_then(|index| (self.from_index)(index))
            .ok_or_else(|| {
                ValueError::UnknownVariant {
                    name: name.clone(),
                    ty: self.key.path(),
                }
                .into()
            })
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::Mapper;
    use crate::error::ValuePath;
    use crate::info::{EnumDecl, GetTypeDecl};
    use crate::token::{BufferReader, TokenBuffer};

    #[derive(Debug, Clone, PartialEq)]
    enum Level {
        Low,
        High,
    }

    impl GetTypeDecl for Level {
        fn type_decl() -> crate::info::TypeDecl {
            EnumDecl::unit(&[("low", Level::Low), ("high", Level::High)])
        }
    }

    fn encode<T: Any>(mapper: &Mapper, value: &T) -> Vec<Token> {
        let mut out = TokenBuffer::new();
        mapper.encode(value, &mut out).unwrap();
        out.into_tokens()
    }

    fn decode<T: Any>(mapper: &Mapper, tokens: Vec<Token>) -> Result<T, BindError> {
        mapper.decode_value::<T>(&mut BufferReader::new(tokens))
    }

    #[test]
    fn sequences_of_optionals() {
        let mapper = Mapper::builder().register::<Vec<Option<u8>>>().build();
        let tokens = encode(&mapper, &vec![Some(1_u8), None]);
        assert_eq!(
            tokens,
            [Token::StartArray, Token::U64(1), Token::Null, Token::EndArray]
        );

        let back: Vec<Option<u8>> = decode(&mapper, tokens).unwrap();
        assert_eq!(back, [Some(1), None]);
    }

    #[test]
    fn element_errors_carry_their_index() {
        let mapper = Mapper::builder().register::<Vec<u8>>().build();
        let error = decode::<Vec<u8>>(
            &mapper,
            vec![
                Token::StartArray,
                Token::U64(1),
                Token::I64(-1),
                Token::EndArray,
            ],
        )
        .unwrap_err();
        assert_eq!(error.path().map(ValuePath::to_string).as_deref(), Some("$[1]"));
    }

    #[test]
    fn hash_maps_are_sorted_on_request() {
        let mut map = StdHashMap::new();
        for key in ["b", "c", "a"] {
            map.insert(String::from(key), 1_u8);
        }

        let mapper = Mapper::builder()
            .register::<StdHashMap<String, u8>>()
            .configure(|config| config.order_map_entries_by_keys = true)
            .build();
        let tokens = encode(&mapper, &map);
        let keys: Vec<&Token> = tokens
            .iter()
            .filter(|token| matches!(token, Token::FieldName(_)))
            .collect();
        assert_eq!(
            keys,
            [
                &Token::FieldName("a".into()),
                &Token::FieldName("b".into()),
                &Token::FieldName("c".into()),
            ]
        );
    }

    #[test]
    fn map_value_errors_carry_their_key() {
        let mapper = Mapper::builder().register::<BTreeMap<String, bool>>().build();
        let error = decode::<BTreeMap<String, bool>>(
            &mapper,
            vec![
                Token::StartObject,
                Token::FieldName("ok".into()),
                Token::Bool(true),
                Token::FieldName("bad".into()),
                Token::Null,
                Token::EndObject,
            ],
        )
        .unwrap_err();
        assert_eq!(
            error.path().map(ValuePath::to_string).as_deref(),
            Some("$[\"bad\"]")
        );
    }

    #[test]
    fn enums_by_name() {
        let mapper = Mapper::builder().register::<Level>().build();
        assert_eq!(encode(&mapper, &Level::High), [Token::String("high".into())]);

        let low: Level = decode(&mapper, vec![Token::String("low".into())]).unwrap();
        assert_eq!(low, Level::Low);

        let error = decode::<Level>(&mapper, vec![Token::String("mid".into())]).unwrap_err();
        assert!(matches!(
            error,
            BindError::Value {
                error: ValueError::UnknownVariant { .. },
                ..
            }
        ));
    }

    #[test]
    fn optional_emptiness() {
        let inner: Arc<dyn Encoder> = Arc::new(super::super::StringConverter);
        let decl = Option::<String>::type_decl();
        let optional = decl.as_optional().unwrap();
        let encoder = OptionalEncoder {
            get: optional.get.clone(),
            inner,
        };

        assert!(encoder.is_absent(&None::<String>));
        assert!(encoder.is_empty(&Some(String::new())));
        assert!(!encoder.is_absent(&Some(String::new())));
        assert!(!encoder.is_empty(&Some(String::from("x"))));
    }
}
