//! Type discriminators for polymorphic values.
//!
//! ## Menu
//!
//! - [`TypeInfoSpec`]: Where the discriminator goes and how type ids are
//!   formed, attached to a base with [`Directive::TypeInfo`].
//! - [`TypeIdTable`]: The id-to-type table of one base.
//! - [`TypedEncoder`] / [`PolymorphicEncoder`]: Write a value together
//!   with its type id.
//! - [`PolymorphicDecoder`]: Reads the type id and decodes the subtype.
//!
//! [`Directive::TypeInfo`]: crate::info::Directive::TypeInfo

// -----------------------------------------------------------------------------
// Modules

mod decode;
mod encode;
mod spec;
mod table;

// -----------------------------------------------------------------------------
// Exports

pub use decode::PolymorphicDecoder;
pub use encode::{PolymorphicEncoder, TypedEncoder};
pub use spec::{EmbedStyle, IdKind, TypeInfoSpec};
pub use table::TypeIdTable;
