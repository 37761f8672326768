use core::any::TypeId;

use crate::hash::HashMap;
use crate::info::{ClassDecl, TypeKey};

/// Directive-only declarations attached to types the caller may not own.
///
/// An overlay is a [`ClassDecl`] whose members and creators carry no access
/// functions; their directives are merged onto matching real members with
/// the highest precedence. The root overlay applies to every record type
/// with the lowest precedence.
#[derive(Default)]
pub struct OverlayRegistry {
    by_target: HashMap<TypeId, ClassDecl>,
    root: Option<ClassDecl>,
}

impl OverlayRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `overlay` to `target`, replacing any previous overlay.
    pub fn insert(&mut self, target: TypeKey, overlay: ClassDecl) -> Option<ClassDecl> {
        self.by_target.insert(target.id(), overlay)
    }

    pub fn set_root(&mut self, overlay: ClassDecl) {
        self.root = Some(overlay);
    }

    #[inline]
    pub fn get(&self, target: TypeId) -> Option<&ClassDecl> {
        self.by_target.get(&target)
    }

    #[inline]
    pub fn root(&self) -> Option<&ClassDecl> {
        self.root.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty() && self.root.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{ClassBuilder, MemberDecl};

    struct Target;
    struct MixIn;

    #[test]
    fn insert_and_replace() {
        let mut overlays = OverlayRegistry::new();
        assert!(overlays.is_empty());

        let first = ClassBuilder::<MixIn>::new()
            .member(MemberDecl::virtual_field::<u8>("a"))
            .build_class();
        assert!(overlays.insert(TypeKey::of::<Target>(), first).is_none());

        let second = ClassBuilder::<MixIn>::new().build_class();
        let replaced = overlays.insert(TypeKey::of::<Target>(), second);
        assert_eq!(replaced.unwrap().members().len(), 1);

        assert!(overlays.get(TypeId::of::<Target>()).is_some());
        assert!(overlays.root().is_none());
    }
}
