use alloc::string::String;
use core::any::TypeId;

use log::warn;

use crate::hash::{HashMap, HashSet};
use crate::info::{GetTypeDecl, TypeDecl};

// -----------------------------------------------------------------------------
// Capabilities

/// Returns the declaration of a type.
///
/// The answer for one `TypeId` must not change while a mapper uses the
/// source; descriptors built from it are cached.
pub trait MetadataSource: Send + Sync {
    fn type_decl(&self, ty: TypeId) -> Option<&TypeDecl>;
}

/// Resolves a class-style type discriminator (a type path) to a type.
///
/// Consulted by polymorphic decoders when the discriminator is not in the
/// subtype table of the base.
pub trait TypeNameLookup: Send + Sync {
    fn type_for_path(&self, path: &str) -> Option<TypeId>;
}

/// Registers a type and its dependencies.
pub type RegisterFn = fn(&mut MetadataRegistry);

// -----------------------------------------------------------------------------
// MetadataRegistry

/// A store of type declarations.
///
/// # Examples
///
/// ```
/// use core::any::TypeId;
/// use vc_bind::registry::MetadataRegistry;
///
/// let mut registry = MetadataRegistry::empty();
/// registry.register::<Option<Vec<u8>>>();
///
/// // The type and its dependencies.
/// assert!(registry.contains(TypeId::of::<Option<Vec<u8>>>()));
/// assert!(registry.contains(TypeId::of::<Vec<u8>>()));
/// assert!(registry.contains(TypeId::of::<u8>()));
/// ```
pub struct MetadataRegistry {
    decls: HashMap<TypeId, TypeDecl>,
    type_path_to_id: HashMap<&'static str, TypeId>,
    type_name_to_id: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl Default for MetadataRegistry {
    /// See [`MetadataRegistry::new`] .
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn empty() -> Self {
        Self {
            decls: HashMap::default(),
            type_path_to_id: HashMap::default(),
            type_name_to_id: HashMap::default(),
            ambiguous_names: HashSet::default(),
        }
    }

    /// Creates a registry with the primitive types and `String` registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<()>();
        registry.register::<bool>();
        registry.register::<char>();
        registry.register::<u8>();
        registry.register::<u16>();
        registry.register::<u32>();
        registry.register::<u64>();
        registry.register::<usize>();
        registry.register::<i8>();
        registry.register::<i16>();
        registry.register::<i32>();
        registry.register::<i64>();
        registry.register::<isize>();
        registry.register::<f32>();
        registry.register::<f64>();
        registry.register::<String>();
        registry
    }

    // # Validity
    // The type must **not** already exist.
    fn add_new_type_indices(&mut self, decl: &TypeDecl) {
        let key = decl.key();
        let name = key.name();

        if !self.ambiguous_names.contains(name) {
            if let Some(previous) = self.type_name_to_id.remove(name) {
                warn!(
                    "type name `{name}` is shared by `{}` and another registered type; \
                     lookups by this name are disabled",
                    key.path()
                );
                debug_assert_ne!(previous, key.id());
                self.ambiguous_names.insert(name);
            } else {
                self.type_name_to_id.insert(name, key.id());
            }
        }

        self.type_path_to_id.insert(key.path(), key.id());
    }

    /// Inserts a declaration unless its type is already registered.
    ///
    /// Returns `true` if the declaration was inserted. Dependencies are
    /// _not_ registered; use [`register`](Self::register) for that.
    pub fn insert_decl(&mut self, decl: TypeDecl) -> bool {
        let id = decl.key().id();
        if self.decls.contains_key(&id) {
            return false;
        }
        self.add_new_type_indices(&decl);
        self.decls.insert(id, decl);
        true
    }

    /// Registers `T` if it is not registered yet, followed by the types its
    /// declaration depends on.
    ///
    /// Recursive types terminate because a type is inserted before its
    /// dependencies are visited.
    pub fn register<T: GetTypeDecl>(&mut self) {
        if self.decls.contains_key(&TypeId::of::<T>()) {
            return;
        }
        let decl = T::type_decl();
        let dependencies = decl.dependencies().to_vec();
        if self.insert_decl(decl) {
            for register in dependencies {
                register(self);
            }
        }
    }

    #[inline]
    pub fn contains(&self, ty: TypeId) -> bool {
        self.decls.contains_key(&ty)
    }

    #[inline]
    pub fn get(&self, ty: TypeId) -> Option<&TypeDecl> {
        self.decls.get(&ty)
    }

    /// Returns the declaration registered under a full type path.
    pub fn get_with_type_path(&self, type_path: &str) -> Option<&TypeDecl> {
        match self.type_path_to_id.get(type_path) {
            Some(id) => self.get(*id),
            None => None,
        }
    }

    /// Returns the declaration registered under a short type name.
    ///
    /// Ambiguous names return `None`.
    pub fn get_with_type_name(&self, type_name: &str) -> Option<&TypeDecl> {
        match self.type_name_to_id.get(type_name) {
            Some(id) => self.get(*id),
            None => None,
        }
    }

    /// Returns `true` if the short name matches more than one registered type.
    #[inline]
    pub fn is_ambiguous(&self, type_name: &str) -> bool {
        self.ambiguous_names.contains(type_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TypeDecl> {
        self.decls.values()
    }
}

impl MetadataSource for MetadataRegistry {
    #[inline]
    fn type_decl(&self, ty: TypeId) -> Option<&TypeDecl> {
        self.get(ty)
    }
}

impl TypeNameLookup for MetadataRegistry {
    /// Tries the full path first, then the unambiguous short name.
    fn type_for_path(&self, path: &str) -> Option<TypeId> {
        self.type_path_to_id
            .get(path)
            .or_else(|| self.type_name_to_id.get(path))
            .copied()
    }
}

impl core::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.type_path_to_id.keys()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    use super::*;
    use crate::info::{ClassBuilder, TypeKey};

    mod foo {
        pub struct Item;
    }

    mod bar {
        pub struct Item;
    }

    impl GetTypeDecl for foo::Item {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<foo::Item>::new().build()
        }
    }

    impl GetTypeDecl for bar::Item {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<bar::Item>::new().build()
        }
    }

    struct Node {
        children: Vec<Node>,
    }

    impl GetTypeDecl for Node {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Node>::new()
                .field("children", |n| &n.children, |n| &mut n.children)
                .build()
        }
    }

    #[test]
    fn register_with_dependencies() {
        let mut registry = MetadataRegistry::empty();
        registry.register::<BTreeMap<String, Option<u8>>>();

        assert!(registry.contains(TypeId::of::<Option<u8>>()));
        assert!(registry.contains(TypeId::of::<u8>()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn recursive_registration_terminates() {
        let mut registry = MetadataRegistry::empty();
        registry.register::<Node>();

        assert!(registry.contains(TypeId::of::<Node>()));
        assert!(registry.contains(TypeId::of::<Vec<Node>>()));
    }

    #[test]
    fn ambiguous_short_names() {
        let mut registry = MetadataRegistry::empty();
        registry.register::<foo::Item>();
        registry.register::<bar::Item>();

        assert!(registry.is_ambiguous("Item"));
        assert!(registry.get_with_type_name("Item").is_none());

        let path = TypeKey::of::<foo::Item>().path();
        assert!(registry.get_with_type_path(path).is_some());
        assert_eq!(
            registry.type_for_path(path),
            Some(TypeId::of::<foo::Item>())
        );
    }

    #[test]
    fn insert_keeps_the_first_declaration() {
        let mut registry = MetadataRegistry::new();
        assert!(!registry.insert_decl(TypeDecl::scalar::<u8>()));
        assert!(registry.insert_decl(TypeDecl::scalar::<TypeKey>()));
        assert_eq!(registry.type_for_path("u8"), Some(TypeId::of::<u8>()));
    }
}
