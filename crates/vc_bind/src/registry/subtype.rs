use alloc::vec::Vec;
use core::any::TypeId;

use crate::hash::HashMap;
use crate::info::{NamedType, TypeKey};

/// Subtypes registered per polymorphic base, in registration order.
///
/// Complements the subtypes a base lists in its own declaration.
#[derive(Default)]
pub struct SubtypeRegistry {
    by_base: HashMap<TypeId, Vec<NamedType>>,
}

impl SubtypeRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subtype of `base`.
    pub fn insert(&mut self, base: TypeKey, subtype: NamedType) {
        self.by_base.entry(base.id()).or_default().push(subtype);
    }

    /// Returns the subtypes registered for `base`.
    pub fn subtypes(&self, base: TypeId) -> &[NamedType] {
        self.by_base.get(&base).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the logical name `subtype` was registered with under `base`.
    pub fn name_of(&self, base: TypeId, subtype: TypeId) -> Option<&str> {
        self.subtypes(base)
            .iter()
            .find(|named| named.type_key().id() == subtype)
            .and_then(NamedType::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    struct A;
    struct B;

    #[test]
    fn forward_and_reverse_lookup() {
        let mut registry = SubtypeRegistry::new();
        let base = TypeKey::of::<Base>();
        registry.insert(base, NamedType::key(TypeKey::of::<A>()).named("a"));
        registry.insert(base, NamedType::key(TypeKey::of::<B>()));

        let list = registry.subtypes(TypeId::of::<Base>());
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name(), Some("a"));

        assert_eq!(
            registry.name_of(TypeId::of::<Base>(), TypeId::of::<A>()),
            Some("a")
        );
        assert_eq!(registry.name_of(TypeId::of::<Base>(), TypeId::of::<B>()), None);
        assert!(registry.subtypes(TypeId::of::<A>()).is_empty());
    }
}
