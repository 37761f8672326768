use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::Any;
use std::sync::OnceLock;

use crate::error::{BindError, ReferenceChain, ResolveError};
use crate::info::TypeKey;
use crate::token::{TokenReader, TokenWriter};

use super::{DecodeContext, Decoder, EncodeContext, Encoder, RecordEncoder};

// Recursive types refer to their own converter while it is being built.
// The resolver hands out a forward placeholder for such a reference and
// fills it once the real converter exists.

fn unfilled(key: &TypeKey) -> BindError {
    ResolveError::UnresolvedType {
        ty: key.path(),
        chain: ReferenceChain::default(),
    }
    .into()
}

pub(crate) struct ForwardEncoder {
    key: TypeKey,
    target: OnceLock<Arc<dyn Encoder>>,
}

impl ForwardEncoder {
    #[inline]
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            target: OnceLock::new(),
        }
    }

    #[inline]
    pub fn fill(&self, target: Arc<dyn Encoder>) {
        let _ = self.target.set(target);
    }
}

impl Encoder for ForwardEncoder {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError> {
        match self.target.get() {
            Some(target) => target.encode(value, writer, ctx),
            None => Err(unfilled(&self.key)),
        }
    }

    fn is_absent(&self, value: &dyn Any) -> bool {
        self.target.get().is_some_and(|t| t.is_absent(value))
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        self.target.get().is_some_and(|t| t.is_empty(value))
    }

    fn as_record(&self) -> Option<&RecordEncoder> {
        self.target.get().and_then(|t| t.as_record())
    }
}

pub(crate) struct ForwardDecoder {
    key: TypeKey,
    target: OnceLock<Arc<dyn Decoder>>,
}

impl ForwardDecoder {
    #[inline]
    pub fn new(key: TypeKey) -> Self {
        Self {
            key,
            target: OnceLock::new(),
        }
    }

    #[inline]
    pub fn fill(&self, target: Arc<dyn Decoder>) {
        let _ = self.target.set(target);
    }
}

impl Decoder for ForwardDecoder {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError> {
        match self.target.get() {
            Some(target) => target.decode(reader, ctx),
            None => Err(unfilled(&self.key)),
        }
    }

    fn absent_value(&self) -> Option<Box<dyn Any>> {
        self.target.get().and_then(|t| t.absent_value())
    }
}
