use alloc::format;
use alloc::string::String;
use core::any::TypeId;

use indexmap::IndexMap;
use log::warn;

use crate::hash::HashMap;
use crate::info::TypeKey;

use super::IdKind;

/// Maps the type ids of one polymorphic base to its subtypes and back.
///
/// Built by the mapper from the base's
/// [`SubTypes`](crate::info::Directive::SubTypes) directive, the subtype
/// registry and the base itself when it is concrete.
#[derive(Debug, Clone)]
pub struct TypeIdTable {
    base: TypeKey,
    kind: IdKind,
    by_id: IndexMap<String, TypeKey>,
    by_type: HashMap<TypeId, String>,
}

impl TypeIdTable {
    pub fn new(base: TypeKey, kind: IdKind) -> Self {
        Self {
            base,
            kind,
            by_id: IndexMap::new(),
            by_type: HashMap::default(),
        }
    }

    #[inline]
    pub fn base(&self) -> &TypeKey {
        &self.base
    }

    #[inline]
    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// Adds `ty` under its id.
    ///
    /// `name` is a registered logical name, `type_name` the type's own
    /// `TypeName` directive; both only matter for [`IdKind::Name`]. A type
    /// is added once; an id already taken by another type keeps its first
    /// type.
    pub fn insert(&mut self, ty: TypeKey, name: Option<&str>, type_name: Option<&str>) {
        if self.by_type.contains_key(&ty.id()) {
            return;
        }
        let id = self.compute_id(&ty, name, type_name);
        if let Some(existing) = self.by_id.get(&id) {
            warn!(
                "type id `{id}` of `{}` is already taken by `{}` under base `{}`; keeping the first",
                ty.path(),
                existing.path(),
                self.base.path(),
            );
            return;
        }
        self.by_type.insert(ty.id(), id.clone());
        self.by_id.insert(id, ty);
    }

    /// The subtype registered under `id`.
    #[inline]
    pub fn type_for(&self, id: &str) -> Option<&TypeKey> {
        self.by_id.get(id)
    }

    /// The id written for values of `ty`.
    ///
    /// Types missing from the table get their computed default id.
    pub fn id_for(&self, ty: &TypeKey) -> String {
        match self.by_type.get(&ty.id()) {
            Some(id) => id.clone(),
            None => self.compute_id(ty, None, None),
        }
    }

    /// The full type path a class-style id stands for, `None` for
    /// logical names.
    pub fn expand_path(&self, id: &str) -> Option<String> {
        match self.kind {
            IdKind::Name => None,
            IdKind::Class => Some(String::from(id)),
            IdKind::MinimalClass => match (id.strip_prefix("::"), self.base.module()) {
                (Some(_), Some(module)) => Some(format!("{module}{id}")),
                _ => Some(String::from(id)),
            },
        }
    }

    /// The registered ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn compute_id(&self, ty: &TypeKey, name: Option<&str>, type_name: Option<&str>) -> String {
        match self.kind {
            IdKind::Class => String::from(ty.path()),
            IdKind::MinimalClass => {
                let path = ty.path();
                let relative = self
                    .base
                    .module()
                    .and_then(|module| path.strip_prefix(module))
                    .filter(|rest| rest.starts_with("::"));
                String::from(relative.unwrap_or(path))
            }
            IdKind::Name => String::from(name.or(type_name).unwrap_or(ty.name())),
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    mod shapes {
        pub struct Shape;
        pub struct Circle;
        pub mod solid {
            pub struct Cube;
        }
    }

    use shapes::{Circle, Shape, solid::Cube};

    #[test]
    fn logical_names() {
        let mut table = TypeIdTable::new(TypeKey::of::<Shape>(), IdKind::Name);
        table.insert(TypeKey::of::<Circle>(), Some("circle"), Some("Round"));
        table.insert(TypeKey::of::<Cube>(), None, Some("box"));

        assert_eq!(table.id_for(&TypeKey::of::<Circle>()), "circle");
        assert_eq!(table.id_for(&TypeKey::of::<Cube>()), "box");
        assert_eq!(table.type_for("box"), Some(&TypeKey::of::<Cube>()));
        // Not in the table: the short name.
        assert_eq!(table.id_for(&TypeKey::of::<Shape>()), "Shape");
        assert_eq!(table.expand_path("circle"), None);
    }

    #[test]
    fn duplicate_ids_keep_the_first_type() {
        let mut table = TypeIdTable::new(TypeKey::of::<Shape>(), IdKind::Name);
        table.insert(TypeKey::of::<Circle>(), Some("x"), None);
        table.insert(TypeKey::of::<Cube>(), Some("x"), None);
        table.insert(TypeKey::of::<Circle>(), Some("y"), None);

        assert_eq!(table.ids().collect::<Vec<_>>(), ["x"]);
        assert_eq!(table.type_for("x"), Some(&TypeKey::of::<Circle>()));
    }

    #[test]
    fn minimal_class_ids_are_relative_to_the_base() {
        let mut table = TypeIdTable::new(TypeKey::of::<Shape>(), IdKind::MinimalClass);
        table.insert(TypeKey::of::<Cube>(), None, None);

        assert_eq!(table.id_for(&TypeKey::of::<Cube>()), "::solid::Cube");
        assert_eq!(
            table.expand_path("::solid::Cube").as_deref(),
            Some(TypeKey::of::<Cube>().path())
        );
        // Outside the base's module: the full path.
        assert_eq!(table.id_for(&TypeKey::of::<u8>()), "u8");
    }

    #[test]
    fn class_ids_are_full_paths() {
        let table = TypeIdTable::new(TypeKey::of::<Shape>(), IdKind::Class);
        let circle = TypeKey::of::<Circle>();
        assert_eq!(table.id_for(&circle), circle.path());
        assert_eq!(table.expand_path(circle.path()).as_deref(), Some(circle.path()));
    }
}
