//! Converters between values and token streams.
//!
//! ## Menu
//!
//! - [`Encoder`] / [`Decoder`]: The converter traits, object safe.
//! - [`EncodeContext`] / [`DecodeContext`]: Per-call state, handing out
//!   nested converters and guarding recursion.
//! - [`StandardConverters`]: Scalars, strings and unit.
//! - Structural converters for sequences, maps, optionals, pointers and
//!   unit enums.
//! - [`RecordEncoder`] / [`RecordDecoder`]: Driven by a
//!   [`TypeDescriptor`](crate::descriptor::TypeDescriptor).
//! - [`EncoderKey`] / [`DecoderKey`]: Cache keys of resolved converters.
//!
//! Converters are built once per key by the resolver of a
//! [`Mapper`](crate::Mapper) and shared through `Arc`s afterwards.

use alloc::boxed::Box;
use core::any::{Any, type_name};

use crate::error::{AccessError, BindError};
use crate::info::TypeKey;
use crate::token::{TokenReader, TokenWriter};

// -----------------------------------------------------------------------------
// Modules

mod container;
mod context;
mod dynamic;
mod forward;
mod record;
mod resolver;
mod scalar;

// -----------------------------------------------------------------------------
// Exports

pub use container::{EnumConverter, MapDecoder, MapEncoder, OptionalDecoder, OptionalEncoder};
pub use container::{PointerDecoder, PointerEncoder, SequenceDecoder, SequenceEncoder};
pub use context::{DecodeContext, EncodeContext};
pub use dynamic::DynamicEncoder;
pub use record::{RecordDecoder, RecordEncoder};
pub use scalar::{BoolConverter, CharConverter, FloatConverter, IntConverter};
pub use scalar::{StandardConverters, StringConverter, UnitConverter};

pub(crate) use forward::{ForwardDecoder, ForwardEncoder};
pub(crate) use record::{AnyReader, AnyWriter, ChildAccess, Construct, ManagedFixup};
pub(crate) use record::{PropertyReader, PropertyWriter};
pub(crate) use resolver::Resolver;

// -----------------------------------------------------------------------------
// Converter traits

/// Writes values of one type as tokens.
///
/// `value` is always a value of the type the encoder was resolved for; a
/// mismatch is reported as [`AccessError::Downcast`].
pub trait Encoder: Send + Sync {
    fn encode(
        &self,
        value: &dyn Any,
        writer: &mut dyn TokenWriter,
        ctx: &mut EncodeContext<'_>,
    ) -> Result<(), BindError>;

    /// Returns `true` if `value` is absent, such as `None`.
    #[inline]
    fn is_absent(&self, value: &dyn Any) -> bool {
        let _ = value;
        false
    }

    /// Returns `true` if `value` is absent or empty.
    #[inline]
    fn is_empty(&self, value: &dyn Any) -> bool {
        self.is_absent(value)
    }

    /// Returns the record encoder if this encoder writes an object of
    /// properties.
    ///
    /// Property-style type discriminators are inserted between the
    /// object's opening token and its properties.
    #[inline]
    fn as_record(&self) -> Option<&RecordEncoder> {
        None
    }
}

/// Reads values of one type from tokens.
///
/// The reader is positioned on the first token of the value and must be
/// left on its last token.
pub trait Decoder: Send + Sync {
    fn decode(
        &self,
        reader: &mut dyn TokenReader,
        ctx: &mut DecodeContext<'_>,
    ) -> Result<Box<dyn Any>, BindError>;

    /// The value used when a creator property is missing from the input.
    #[inline]
    fn absent_value(&self) -> Option<Box<dyn Any>> {
        None
    }
}

/// Downcasts the value handed to an encoder.
#[inline]
pub fn downcast<T: Any>(value: &dyn Any) -> Result<&T, BindError> {
    value.downcast_ref::<T>().ok_or_else(|| {
        AccessError::Downcast {
            expected: type_name::<T>(),
        }
        .into()
    })
}

// -----------------------------------------------------------------------------
// Cache keys

/// Identifies a resolved encoder.
///
/// `declared` is the polymorphic base a value was declared as. A value
/// written through its base carries the base's type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderKey {
    pub runtime: TypeKey,
    pub declared: Option<TypeKey>,
}

impl EncoderKey {
    /// The key of a value declared as its own type.
    #[inline]
    pub const fn of(ty: TypeKey) -> Self {
        Self {
            runtime: ty,
            declared: None,
        }
    }

    /// The key of `runtime` written through the polymorphic `base`.
    #[inline]
    pub const fn through(runtime: TypeKey, base: TypeKey) -> Self {
        Self {
            runtime,
            declared: Some(base),
        }
    }
}

/// Identifies a resolved decoder.
///
/// A typed decoder honors the type discriminator of the type; an untyped
/// one reads the plain value, as done after a discriminator was consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderKey {
    pub ty: TypeKey,
    pub typed: bool,
}

impl DecoderKey {
    #[inline]
    pub const fn typed(ty: TypeKey) -> Self {
        Self { ty, typed: true }
    }

    #[inline]
    pub const fn untyped(ty: TypeKey) -> Self {
        Self { ty, typed: false }
    }
}
