//! Registries consulted while building converters.
//!
//! ## Menu
//!
//! - [`MetadataSource`]: The capability of returning a [`TypeDecl`] for a `TypeId`.
//! - [`TypeNameLookup`]: Resolves a class-style type discriminator to a type.
//! - [`MetadataRegistry`]: A store of declarations, implementing both traits.
//! - [`OverlayRegistry`]: Directive-only declarations attached to other types.
//! - [`SubtypeRegistry`]: Subtypes registered per polymorphic base, with reverse lookup.
//!
//! [`TypeDecl`]: crate::info::TypeDecl

// -----------------------------------------------------------------------------
// Modules

mod metadata;
mod overlay;
mod subtype;

// -----------------------------------------------------------------------------
// Exports

pub use metadata::{MetadataRegistry, MetadataSource, RegisterFn, TypeNameLookup};
pub use overlay::OverlayRegistry;
pub use subtype::SubtypeRegistry;
