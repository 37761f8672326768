use alloc::sync::Arc;
use core::any::Any;

use crate::error::{AccessError, BindError, ReferenceChain, ResolveError};
use crate::info::{ProjectFn, TypeKey};
use crate::token::TokenWriter;

use super::{EncodeContext, Encoder, EncoderKey};

/// Writes an abstract value with the encoder of its concrete type.
///
/// Used for abstract bases without a type discriminator: the output is the
/// plain concrete value, which cannot be read back as the base.
pub struct DynamicEncoder {
    key: TypeKey,
    view: ProjectFn,
}

impl DynamicEncoder {
    #[inline]
    pub fn new(key: TypeKey, view: ProjectFn) -> Self {
        Self { key, view }
    }

    fn concrete<'v>(&self, value: &'v dyn Any) -> Result<&'v dyn Any, BindError> {
        (self.view)(value).ok_or_else(|| {
            AccessError::Downcast {
                expected: self.key.path(),
            }
            .into()
        })
    }

    fn encoder_of(
        &self,
        concrete: &dyn Any,
        ctx: &EncodeContext<'_>,
    ) -> Result<Arc<dyn Encoder>, BindError> {
        let runtime = ctx.mapper().key_of(concrete.type_id()).ok_or_else(|| {
            BindError::from(ResolveError::UnresolvedType {
                ty: self.key.path(),
                chain: ReferenceChain::default(),
            })
        })?;
        ctx.encoder(EncoderKey::of(runtime))
    }
}

impl Encoder for DynamicEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        let concrete = self.concrete(value)?;
        let encoder = self.encoder_of(concrete, ctx)?;
        encoder.encode(concrete, writer, ctx)
    }
}
