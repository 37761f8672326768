//! Declarations describing how values are read, written and created.
//!
//! ## Menu
//!
//! - [`TypeKey`]: A `TypeId` paired with a printable path.
//! - [`NamedType`]: A subtype reference with an optional logical name.
//!
//! - [`TypeDecl`]: The structural category of a type, one of:
//!     - [`ScalarDecl`]: Converted by a standard or override converter.
//!     - [`SequenceDecl`]: `Vec<T>`-like collections.
//!     - [`MapDecl`]: String-keyed maps.
//!     - [`OptionalDecl`]: `Option<T>`.
//!     - [`PointerDecl`]: `Box<T>`, encoded as `T`.
//!     - [`EnumDecl`]: Unit-variant enums, encoded by name.
//!     - [`ClassDecl`]: Record types, built with [`ClassBuilder`].
//!
//! - [`MemberDecl`]: A field, read accessor or write accessor of a record.
//! - [`CreatorDecl`]: A constructor, with [`ParamDecl`] parameters.
//! - [`SuperLink`]: A link from a record to an embedded parent, an abstract
//!   base or an interface.
//!
//! - [`Directive`]: One piece of overridable binding metadata.
//! - [`Directives`]: A set of directives, at most one per kind.
//!
//! - [`GetTypeDecl`]: A trait providing the `TypeDecl` of a type.
//!
//! Declarations are plain data: nothing here inspects types at runtime.
//! A record's members reach into values only through the erased access
//! functions stored in [`MemberAccess`].

// -----------------------------------------------------------------------------
// Modules

mod class;
mod creator;
mod directive;
mod member;
mod type_decl;
mod type_key;
mod visibility;

// -----------------------------------------------------------------------------
// Exports

pub use class::{ClassBuilder, ClassDecl, ClassKind, HandleFn, SuperLink, delegate};
pub use creator::{CreateFn, CreatorArgs, CreatorDecl, ParamDecl};
pub use directive::{AccessMode, ConverterRef, CreatorMode, Directive, DirectiveKind};
pub use directive::{Directives, Inclusion};
pub use member::{EntrySetFn, GetFn, GetMutFn, ProjectFn, SetFn, WrapFn};
pub use member::{MemberAccess, MemberDecl, MemberKind, MemberSignature, ValueRef};
pub use member::{entry_fn, get_fn, get_mut_fn, project_fn, set_fn, unbox, wrap_fn};
pub use type_decl::{BuildSeqFn, EntriesFn, IterFn, IterMutFn};
pub use type_decl::{EnumDecl, MapDecl, OptionalDecl, PointerDecl, ScalarDecl, SequenceDecl};
pub use type_decl::{GetTypeDecl, TypeCategory, TypeDecl};
pub use type_key::{NamedType, TypeKey};
pub use visibility::{DefaultVisibilityChecker, MemberRole, MinVisibility, Visibility};
pub use visibility::{VisibilityChecker, VisibilityPolicy};
