//! Turning declarations into properties.
//!
//! ## Menu
//!
//! - [`annotation_sources`]: The precedence order of directive sources.
//! - [`collect`]: Walks a record's hierarchy into an [`AnnotatedType`],
//!   merging overlays and masking overridden members.
//! - [`merge`]: Groups annotated members into a [`PropertyModel`] of
//!   logical properties, applying names, ignorals and visibility.
//! - [`NamingStrategy`]: Converts implicit property names.

// -----------------------------------------------------------------------------
// Modules

mod collect;
mod merge;
mod naming;
mod source;

// -----------------------------------------------------------------------------
// Exports

pub use collect::{AnnotatedCreator, AnnotatedMember, AnnotatedParam, AnnotatedType};
pub use collect::{SupertypeRef, collect};
pub use merge::{CandidateSource, LogicalProperty, MergeOptions, PropertyCandidate};
pub use merge::{PropertyModel, merge};
pub use naming::{NamingStrategy, default_name};
pub use source::{AnnotationSource, annotation_sources};
