use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;

use crate::convert::{DecodeContext, Decoder, DecoderKey};
use crate::error::{BindError, PolymorphicError};
use crate::info::{ClassKind, TypeKey};
use crate::token::{BufferReader, ReplayReader, Token, TokenBuffer, TokenReader};
use crate::token::{copy_value, unexpected};

use super::{EmbedStyle, TypeInfoSpec};

/// Reads a value declared as a polymorphic base.
///
/// The type id selects the subtype; the subtype's plain decoder reads the
/// rest of the value, which is then upcast into the base when the base is
/// abstract.
pub struct PolymorphicDecoder {
    base: TypeKey,
    kind: ClassKind,
    spec: TypeInfoSpec,
}

impl PolymorphicDecoder {
    #[inline]
    pub fn new(base: TypeKey, kind: ClassKind, spec: TypeInfoSpec) -> Self {
        Self { base, kind, spec }
    }

    fn misplaced(&self, expected: &'static str, found: &Token) -> BindError {
        PolymorphicError::InvalidDiscriminatorLocation {
            base: self.base.path(),
            expected,
            found: found.to_string(),
        }
        .into()
    }

    /// Reads the id from the current token, which must be a string.
    fn read_id(&self, reader: &dyn TokenReader) -> Result<String, BindError> {
        match reader.token()? {
            Token::String(id) => Ok(id.clone()),
            other => Err(self.misplaced("a string", other)),
        }
    }

    /// `["id", value]`
    fn decode_array(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartArray => {}
            other => return Err(self.misplaced("an array", other)),
        }
        reader.advance()?;
        let id = self.read_id(reader)?;
        reader.advance()?;
        let value = self.decode_subtype(&id, reader, ctx)?;
        match reader.next_token()? {
            Token::EndArray => Ok(value),
            other => Err(unexpected("end of array", Some(other))),
        }
    }

    /// `{"id": value}`
    fn decode_wrapper_object(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartObject => {}
            other => return Err(self.misplaced("an object", other)),
        }
        let id = match reader.next_token()? {
            Token::FieldName(id) => id.clone(),
            other => return Err(self.misplaced("a field name", other)),
        };
        reader.advance()?;
        let value = self.decode_subtype(&id, reader, ctx)?;
        match reader.next_token()? {
            Token::EndObject => Ok(value),
            other => Err(unexpected("end of object", Some(other))),
        }
    }

    /// `{"@type": "id", ...properties}`, with the id property anywhere.
    ///
    /// Properties before the id are buffered and replayed to the subtype's
    /// decoder ahead of the remaining input.
    fn decode_property(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match reader.token()? {
            Token::StartObject => {}
            // Values written without an object of their own.
            Token::StartArray => return self.decode_array(reader, ctx),
            other => return Err(self.misplaced("an object", other)),
        }

        let mut buffer = TokenBuffer::new();
        loop {
            match reader.next_token()? {
                Token::EndObject => return self.decode_without_id(buffer.into_tokens(), ctx),
                Token::FieldName(name) if *name == self.spec.property => {
                    reader.advance()?;
                    let id = self.read_id(reader)?;
                    let ty = self.lookup(&id, ctx)?;
                    let mut replay =
                        ReplayReader::new(Token::StartObject, buffer.into_tokens(), reader);
                    let mut reader = RepeatedIdFilter::new(self, id, &mut replay);
                    return self.decode_concrete(&ty, &mut reader, ctx);
                }
                Token::FieldName(name) => {
                    buffer.push(Token::FieldName(name.clone()));
                    reader.advance()?;
                    copy_value(reader, &mut buffer)?;
                }
                other => return Err(unexpected("a field name", Some(other))),
            }
        }
    }

    fn decode_without_id(
        &self,
        fields: Vec<Token>,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let Some(default_impl) = self.spec.default_impl else {
            return Err(PolymorphicError::MissingDiscriminator {
                base: self.base.path(),
                property: self.spec.property.clone(),
            }
            .into());
        };
        let mut tokens = Vec::with_capacity(fields.len() + 2);
        tokens.push(Token::StartObject);
        tokens.extend(fields);
        tokens.push(Token::EndObject);
        self.decode_concrete(&default_impl, &mut BufferReader::new(tokens), ctx)
    }

    fn decode_subtype(
        &self,
        id: &str,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let ty = self.lookup(id, ctx)?;
        self.decode_concrete(&ty, reader, ctx)
    }

    /// Resolves a type id: the table first, then class-style ids through the
    /// mapper's type name lookup.
    fn lookup(&self, id: &str, ctx: &DecodeContext<'_>) -> Result<TypeKey, BindError> {
        let mapper = ctx.mapper();
        let table = mapper.type_table(&self.base)?;
        if let Some(ty) = table.type_for(id) {
            return Ok(*ty);
        }

        if let Some(ty) = table.expand_path(id).and_then(|path| mapper.lookup_path(&path)) {
            if !mapper.is_assignable(&ty, &self.base) {
                return Err(PolymorphicError::UnassignableSubtype {
                    ty: ty.path(),
                    base: self.base.path(),
                }
                .into());
            }
            return Ok(ty);
        }

        Err(PolymorphicError::UnrecognizedSubtype {
            id: String::from(id),
            base: self.base.path(),
        }
        .into())
    }

    fn decode_concrete(
        &self,
        ty: &TypeKey,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        let decoder = ctx.decoder(DecoderKey::untyped(*ty))?;
        let value = decoder.decode(reader, ctx)?;
        if *ty == self.base {
            return Ok(value);
        }

        let upcast = match self.kind {
            ClassKind::Abstract => ctx.mapper().upcast(ty, &self.base),
            ClassKind::Concrete => None,
        };
        match upcast {
            Some(upcast) => Ok(upcast(value)?),
            None => Err(PolymorphicError::UnassignableSubtype {
                ty: ty.path(),
                base: self.base.path(),
            }
            .into()),
        }
    }
}

// -----------------------------------------------------------------------------
// RepeatedIdFilter

/// Hides later copies of the type id property from the subtype's decoder.
///
/// Only fields of the outermost object are inspected. A copy holding a
/// different id is an error.
struct RepeatedIdFilter<'a> {
    decoder: &'a PolymorphicDecoder,
    id: String,
    inner: &'a mut dyn TokenReader,
    /// Open structures up to and including the current token.
    depth: usize,
}

impl<'a> RepeatedIdFilter<'a> {
    fn new(decoder: &'a PolymorphicDecoder, id: String, inner: &'a mut dyn TokenReader) -> Self {
        Self {
            decoder,
            id,
            inner,
            depth: 1,
        }
    }
}

impl TokenReader for RepeatedIdFilter<'_> {
    #[inline]
    fn current(&self) -> Option<&Token> {
        self.inner.current()
    }

    fn advance(&mut self) -> Result<(), BindError> {
        let closed = matches!(self.inner.current(), Some(Token::EndObject | Token::EndArray));
        if closed {
            self.depth = self.depth.saturating_sub(1);
        }
        self.inner.advance()?;

        while self.depth == 1
            && self.inner.peek_field_name() == Some(self.decoder.spec.property.as_str())
        {
            self.inner.advance()?;
            let id = self.decoder.read_id(&*self.inner)?;
            if id != self.id {
                return Err(self.decoder.misplaced("a single type id", &Token::String(id)));
            }
            self.inner.advance()?;
        }

        if self.inner.current().is_some_and(Token::is_start) {
            self.depth += 1;
        }
        Ok(())
    }
}

impl Decoder for PolymorphicDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match self.spec.style {
            EmbedStyle::Property => self.decode_property(reader, ctx),
            EmbedStyle::WrapperArray => self.decode_array(reader, ctx),
            EmbedStyle::WrapperObject => self.decode_wrapper_object(reader, ctx),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::Mapper;
    use crate::info::{ClassBuilder, Directive, GetTypeDecl, TypeDecl};
    use crate::poly::IdKind;
    use crate::token::BufferReader;

    #[derive(Debug, Default)]
    struct Pet {
        name: String,
        legs: u8,
    }

    impl GetTypeDecl for Pet {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Pet>::new()
                .field("name", |p| &p.name, |p| &mut p.name)
                .field("legs", |p| &p.legs, |p| &mut p.legs)
                .directive(Directive::TypeInfo(TypeInfoSpec::new(
                    EmbedStyle::Property,
                    IdKind::Name,
                )))
                .directive(Directive::TypeName(String::from("pet")))
                .default_creator(Pet::default)
                .build()
        }
    }

    fn pet_tokens(second_id: &str) -> Vec<Token> {
        vec![
            Token::StartObject,
            Token::FieldName("name".into()),
            Token::String("rex".into()),
            Token::FieldName("@type".into()),
            Token::String("pet".into()),
            Token::FieldName("legs".into()),
            Token::I64(4),
            Token::FieldName("@type".into()),
            Token::String(second_id.into()),
            Token::EndObject,
        ]
    }

    #[test]
    fn repeated_type_id_is_skipped() {
        let mapper = Mapper::builder().register::<Pet>().build();
        assert!(mapper.config().fail_on_unknown_properties);

        let mut reader = BufferReader::new(pet_tokens("pet"));
        let pet: Pet = mapper.decode_value(&mut reader).unwrap();
        assert_eq!((pet.name.as_str(), pet.legs), ("rex", 4));
        assert_eq!(reader.current(), Some(&Token::EndObject));
    }

    #[test]
    fn conflicting_type_ids() {
        let mapper = Mapper::builder().register::<Pet>().build();

        let mut reader = BufferReader::new(pet_tokens("cat"));
        let error = mapper.decode_value::<Pet>(&mut reader).unwrap_err();
        assert!(matches!(
            error,
            BindError::Polymorphic {
                error: PolymorphicError::InvalidDiscriminatorLocation { .. },
                ..
            }
        ));
    }
}
