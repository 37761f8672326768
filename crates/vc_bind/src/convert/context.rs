use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};

use crate::error::{BindError, ValueError};
use crate::mapper::Mapper;

use super::{Decoder, DecoderKey, Encoder, EncoderKey};

// -----------------------------------------------------------------------------
// EncodeContext

/// State of one encode call.
///
/// Tracks the nesting depth and, when cycle detection is enabled, the
/// values currently being written. A value is identified by its address
/// together with its type, so a record and its first field never collide.
pub struct EncodeContext<'m> {
    mapper: &'m Mapper,
    depth: usize,
    active: Vec<(usize, TypeId)>,
}

impl<'m> EncodeContext<'m> {
    #[inline]
    pub fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            depth: 0,
            active: Vec::new(),
        }
    }

    #[inline]
    pub fn mapper(&self) -> &'m Mapper {
        self.mapper
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Resolves the encoder of a nested value.
    #[inline]
    pub fn encoder(&self, key: EncoderKey) -> Result<Arc<dyn Encoder>, BindError> {
        self.mapper.resolve_encoder(key)
    }

    /// Runs `f` one level deeper, with `value` marked as in progress.
    pub fn nested<R>(
        &mut self,
        value: &dyn Any,
        ty: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R, BindError>,
    ) -> Result<R, BindError> {
        let limit = self.mapper.config().max_depth;
        if self.depth >= limit {
            return Err(ValueError::DepthExceeded { limit }.into());
        }

        let detect = self.mapper.config().detect_cycles;
        if detect {
            let entry = (address(value), value.type_id());
            if self.active.contains(&entry) {
                return Err(ValueError::Cycle { ty }.into());
            }
            self.active.push(entry);
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if detect {
            self.active.pop();
        }
        result
    }
}

#[inline]
fn address(value: &dyn Any) -> usize {
    (value as *const dyn Any).cast::<()>().addr()
}

// -----------------------------------------------------------------------------
// DecodeContext

/// State of one decode call.
pub struct DecodeContext<'m> {
    mapper: &'m Mapper,
    depth: usize,
}

impl<'m> DecodeContext<'m> {
    #[inline]
    pub fn new(mapper: &'m Mapper) -> Self {
        Self { mapper, depth: 0 }
    }

    #[inline]
    pub fn mapper(&self) -> &'m Mapper {
        self.mapper
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Resolves the decoder of a nested value.
    #[inline]
    pub fn decoder(&self, key: DecoderKey) -> Result<Arc<dyn Decoder>, BindError> {
        self.mapper.resolve_decoder(key)
    }

    /// Runs `f` one level deeper.
    pub fn nested<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, BindError>,
    ) -> Result<R, BindError> {
        let limit = self.mapper.config().max_depth;
        if self.depth >= limit {
            return Err(ValueError::DepthExceeded { limit }.into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
