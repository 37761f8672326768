use alloc::vec::Vec;
use core::fmt;

use crate::info::TypeKey;

/// Where a directive set comes from.
///
/// Sources are consulted in precedence order, each one only adding what
/// the sources before it left unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationSource {
    /// The overlay registered for a type.
    Overlay(TypeKey),
    /// The annotated type's own declaration.
    Own(TypeKey),
    /// The declaration of a supertype.
    Supertype(TypeKey),
    /// The root overlay shared by every record type.
    Root,
}

impl fmt::Display for AnnotationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationSource::Overlay(key) => write!(f, "overlay of {key}"),
            AnnotationSource::Own(key) => write!(f, "{key}"),
            AnnotationSource::Supertype(key) => write!(f, "supertype {key}"),
            AnnotationSource::Root => f.write_str("root overlay"),
        }
    }
}

/// Lists the directive sources of `ty` in precedence order.
///
/// Each level contributes its overlay before its own declaration; the
/// root overlay comes last.
///
/// ```
/// use vc_bind::info::TypeKey;
/// use vc_bind::introspect::{AnnotationSource, annotation_sources};
///
/// struct Child;
/// struct Parent;
///
/// let child = TypeKey::of::<Child>();
/// let parent = TypeKey::of::<Parent>();
///
/// assert_eq!(
///     annotation_sources(&child, &[parent]),
///     [
///         AnnotationSource::Overlay(child),
///         AnnotationSource::Own(child),
///         AnnotationSource::Overlay(parent),
///         AnnotationSource::Supertype(parent),
///         AnnotationSource::Root,
///     ]
/// );
/// ```
pub fn annotation_sources(ty: &TypeKey, chain: &[TypeKey]) -> Vec<AnnotationSource> {
    let mut sources = Vec::with_capacity(2 * chain.len() + 3);
    sources.push(AnnotationSource::Overlay(*ty));
    sources.push(AnnotationSource::Own(*ty));
    for supertype in chain {
        sources.push(AnnotationSource::Overlay(*supertype));
        sources.push(AnnotationSource::Supertype(*supertype));
    }
    sources.push(AnnotationSource::Root);
    sources
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    struct A;

    #[test]
    fn no_supertypes() {
        let key = TypeKey::of::<A>();
        let sources = annotation_sources(&key, &[]);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[2], AnnotationSource::Root);
        assert_eq!(sources[0].to_string(), alloc::format!("overlay of {key}"));
        assert_eq!(AnnotationSource::Root.to_string(), "root overlay");
    }
}
