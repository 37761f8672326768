use alloc::string::String;
use alloc::sync::Arc;
use core::any::Any;

use crate::convert::{EncodeContext, Encoder, EncoderKey};
use crate::error::{AccessError, BindError, ReferenceChain, ResolveError};
use crate::info::{ProjectFn, TypeKey};
use crate::token::TokenWriter;

use super::{EmbedStyle, TypeInfoSpec};

// -----------------------------------------------------------------------------
// TypedEncoder

/// Writes values of one concrete type together with a fixed type id.
pub struct TypedEncoder {
    style: EmbedStyle,
    property: String,
    id: String,
    inner: Arc<dyn Encoder>,
}

impl TypedEncoder {
    pub fn new(spec: &TypeInfoSpec, id: String, inner: Arc<dyn Encoder>) -> Self {
        Self {
            style: spec.style,
            property: spec.property.clone(),
            id,
            inner,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn wrapper_array(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        writer.start_array()?;
        writer.write_str(&self.id)?;
        self.inner.encode(value, writer, ctx)?;
        writer.end_array()
    }
}

impl Encoder for TypedEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        match self.style {
            EmbedStyle::Property => match self.inner.as_record() {
                Some(record) => {
                    writer.start_object()?;
                    writer.field_name(&self.property)?;
                    writer.write_str(&self.id)?;
                    record.write_fields(value, writer, ctx)?;
                    writer.end_object()
                }
                None => self.wrapper_array(value, writer, ctx),
            },
            EmbedStyle::WrapperArray => self.wrapper_array(value, writer, ctx),
            EmbedStyle::WrapperObject => {
                writer.start_object()?;
                writer.field_name(&self.id)?;
                self.inner.encode(value, writer, ctx)?;
                writer.end_object()
            }
        }
    }

    #[inline]
    fn is_absent(&self, value: &dyn Any) -> bool {
        self.inner.is_absent(value)
    }

    #[inline]
    fn is_empty(&self, value: &dyn Any) -> bool {
        self.inner.is_empty(value)
    }
}

// -----------------------------------------------------------------------------
// PolymorphicEncoder

/// Writes a value declared as a polymorphic base.
///
/// The concrete type is looked up at encode time; its typed encoder is
/// resolved through the mapper and cached like any other converter.
pub struct PolymorphicEncoder {
    base: TypeKey,
    view: Option<ProjectFn>,
}

impl PolymorphicEncoder {
    #[inline]
    pub fn new(base: TypeKey, view: Option<ProjectFn>) -> Self {
        Self { base, view }
    }
}

impl Encoder for PolymorphicEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let concrete = match &self.view {
            Some(view) => view(value).ok_or(AccessError::Downcast {
                expected: self.base.path(),
            })?,
            None => value,
        };
        let runtime = ctx.mapper().key_of(concrete.type_id()).ok_or_else(|| {
            BindError::from(ResolveError::UnresolvedType {
                ty: self.base.path(),
                chain: ReferenceChain::default(),
            })
        })?;
        let encoder = ctx.encoder(EncoderKey::through(runtime, self.base))?;
        encoder.encode(concrete, writer, ctx)
    }
}
