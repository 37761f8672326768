use alloc::string::String;
use core::any::{Any, TypeId, type_name};
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::registry::{MetadataRegistry, RegisterFn};

use super::GetTypeDecl;

// -----------------------------------------------------------------------------
// TypeKey

/// The identity of a declared type together with its printable paths.
///
/// Equality and hashing only consider the [`TypeId`]; the paths are used for
/// diagnostics and for class-based type discriminators.
///
/// # Examples
///
/// ```
/// use vc_bind::info::TypeKey;
///
/// let key = TypeKey::of::<Vec<u8>>();
/// assert_eq!(key.path(), "alloc::vec::Vec<u8>");
/// assert_eq!(key.name(), "Vec<u8>");
/// assert_eq!(key.module(), Some("alloc::vec"));
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    path: &'static str,
}

impl TypeKey {
    /// Creates the key of `T`, using [`type_name`] as its path.
    #[inline]
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            path: type_name::<T>(),
        }
    }

    /// Creates the key of `T` with a custom path.
    ///
    /// Useful for trait-object types, whose [`type_name`] does not describe
    /// a module the subtypes live in.
    #[inline]
    pub fn with_path<T: ?Sized + Any>(path: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            path,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified path, e.g. `my_crate::shapes::Circle`.
    #[inline]
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Returns the path without its module prefix, e.g. `Circle`.
    ///
    /// Generic arguments are kept unchanged.
    pub fn name(&self) -> &'static str {
        match self.module_split() {
            Some(index) => &self.path[index + 2..],
            None => self.path,
        }
    }

    /// Returns the module prefix of the path, e.g. `my_crate::shapes`.
    pub fn module(&self) -> Option<&'static str> {
        self.module_split().map(|index| &self.path[..index])
    }

    fn module_split(&self) -> Option<usize> {
        let head = match self.path.find('<') {
            Some(generic) => &self.path[..generic],
            None => self.path,
        };
        head.rfind("::")
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path)
    }
}

// -----------------------------------------------------------------------------
// NamedType

/// A subtype reference with an optional logical name.
#[derive(Clone)]
pub struct NamedType {
    key: TypeKey,
    name: Option<String>,
    register: Option<RegisterFn>,
}

impl NamedType {
    /// References `T`; registering the owner also registers `T`.
    pub fn of<T: GetTypeDecl>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            name: None,
            register: Some(MetadataRegistry::register::<T>),
        }
    }

    /// References an already registered type by key.
    pub fn key(key: TypeKey) -> Self {
        Self {
            key,
            name: None,
            register: None,
        }
    }

    /// Sets the logical name used by [`IdKind::Name`](crate::poly::IdKind::Name).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn type_key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub(crate) fn register_fn(&self) -> Option<RegisterFn> {
        self.register
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedType")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    struct Local;

    #[test]
    fn key_equality_uses_type_id() {
        let a = TypeKey::of::<Local>();
        let b = TypeKey::with_path::<Local>("elsewhere::Local");
        assert_eq!(a, b);
        assert_ne!(a, TypeKey::of::<u8>());
    }

    #[test]
    fn name_and_module() {
        let key = TypeKey::with_path::<Local>("demo::shapes::Shape");
        assert_eq!(key.name(), "Shape");
        assert_eq!(key.module(), Some("demo::shapes"));

        let scalar = TypeKey::of::<u32>();
        assert_eq!(scalar.name(), "u32");
        assert_eq!(scalar.module(), None);

        let generic = TypeKey::with_path::<Local>("a::Wrap<b::Inner>");
        assert_eq!(generic.name(), "Wrap<b::Inner>");
        assert_eq!(generic.module(), Some("a"));
    }
}
