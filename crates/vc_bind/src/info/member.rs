use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::any::{Any, TypeId, type_name};
use core::fmt;

use crate::error::AccessError;
use crate::registry::{MetadataRegistry, RegisterFn};

use super::{Directive, Directives, GetTypeDecl, TypeKey, Visibility};

// -----------------------------------------------------------------------------
// Erased access functions

/// A value read from a record: borrowed from a field, or produced by an
/// accessor.
pub enum ValueRef<'a> {
    Borrowed(&'a dyn Any),
    Owned(Box<dyn Any>),
}

impl ValueRef<'_> {
    #[inline]
    pub fn as_any(&self) -> &dyn Any {
        match self {
            ValueRef::Borrowed(value) => *value,
            ValueRef::Owned(value) => &**value,
        }
    }
}

/// Reads a value out of its owner.
pub type GetFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<ValueRef<'a>> + Send + Sync>;

/// Borrows a nested value mutably.
pub type GetMutFn = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

/// Borrows a nested value, or views a trait object as its concrete value.
pub type ProjectFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

/// Stores a decoded value into its owner.
pub type SetFn = Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), AccessError> + Send + Sync>;

/// Stores a decoded key/value entry into its owner.
pub type EntrySetFn =
    Arc<dyn Fn(&mut dyn Any, String, Box<dyn Any>) -> Result<(), AccessError> + Send + Sync>;

/// Converts an owned value into another owned value, e.g. `T` into `Box<dyn Base>`.
pub type WrapFn = Arc<dyn Fn(Box<dyn Any>) -> Result<Box<dyn Any>, AccessError> + Send + Sync>;

// Closures passed straight to a function bounded by a higher-ranked `Fn`
// get their signature from that bound; these helpers are that function.

#[inline]
pub fn get_fn<F>(f: F) -> GetFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<ValueRef<'a>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub fn get_mut_fn<F>(f: F) -> GetMutFn
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub fn project_fn<F>(f: F) -> ProjectFn
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub fn set_fn<F>(f: F) -> SetFn
where
    F: Fn(&mut dyn Any, Box<dyn Any>) -> Result<(), AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub fn entry_fn<F>(f: F) -> EntrySetFn
where
    F: Fn(&mut dyn Any, String, Box<dyn Any>) -> Result<(), AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[inline]
pub fn wrap_fn<F>(f: F) -> WrapFn
where
    F: Fn(Box<dyn Any>) -> Result<Box<dyn Any>, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Unboxes a decoded value into `T`.
#[inline]
pub fn unbox<T: Any>(value: Box<dyn Any>) -> Result<T, AccessError> {
    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| AccessError::Downcast {
            expected: type_name::<T>(),
        })
}

#[inline]
pub(crate) fn owner_mut<T: Any>(owner: &mut dyn Any) -> Result<&mut T, AccessError> {
    owner.downcast_mut::<T>().ok_or(AccessError::Downcast {
        expected: type_name::<T>(),
    })
}

// -----------------------------------------------------------------------------
// MemberAccess

/// The data-access functions of a real member.
///
/// Directive-only members (overlays, interfaces) carry none.
#[derive(Clone, Default)]
pub struct MemberAccess {
    pub get: Option<GetFn>,
    pub get_mut: Option<GetMutFn>,
    pub set: Option<SetFn>,
    pub set_entry: Option<EntrySetFn>,
}

impl MemberAccess {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.get.is_none() && self.get_mut.is_none() && self.set.is_none() && self.set_entry.is_none()
    }
}

// -----------------------------------------------------------------------------
// MemberDecl

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    /// A read accessor, like `fn name(&self) -> String`.
    Accessor,
    /// A write accessor, like `fn set_name(&mut self, name: String)`.
    Mutator,
}

/// Identifies a member across a type hierarchy.
///
/// A more-derived member with the same signature masks the less-derived one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    pub kind: MemberKind,
    pub name: String,
    pub params: Vec<TypeId>,
}

/// The declaration of one field, accessor or mutator.
///
/// # Examples
///
/// ```
/// use vc_bind::info::{MemberDecl, MemberKind, Visibility};
///
/// struct Point { x: i32 }
///
/// let member = MemberDecl::field::<Point, _>("x", |p| &p.x, |p| &mut p.x)
///     .named("X")
///     .private();
///
/// assert_eq!(member.kind(), MemberKind::Field);
/// assert_eq!(member.visibility(), Visibility::Private);
/// assert_eq!(member.directives().rename(), Some("X"));
/// ```
#[derive(Clone)]
pub struct MemberDecl {
    kind: MemberKind,
    name: String,
    visibility: Visibility,
    value_type: TypeKey,
    key_type: Option<TypeKey>,
    directives: Directives,
    access: Option<MemberAccess>,
    dependency: Option<RegisterFn>,
}

impl MemberDecl {
    fn new(kind: MemberKind, name: &str, value_type: TypeKey) -> Self {
        Self {
            kind,
            name: name.into(),
            visibility: Visibility::Public,
            value_type,
            key_type: None,
            directives: Directives::new(),
            access: None,
            dependency: None,
        }
    }

    /// A field of `T` holding a `V`.
    pub fn field<T: Any, V: GetTypeDecl>(
        name: &str,
        get: impl for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
        get_mut: impl for<'a> Fn(&'a mut T) -> &'a mut V + Send + Sync + 'static,
    ) -> Self {
        let get_mut = Arc::new(get_mut);
        let set_inner = get_mut.clone();

        let mut member = Self::new(MemberKind::Field, name, TypeKey::of::<V>());
        member.dependency = Some(MetadataRegistry::register::<V>);
        member.access = Some(MemberAccess {
            get: Some(get_fn(move |owner| {
                let owner = owner.downcast_ref::<T>()?;
                Some(ValueRef::Borrowed(get(owner)))
            })),
            get_mut: Some(get_mut_fn(move |owner| {
                let owner = owner.downcast_mut::<T>()?;
                Some(get_mut(owner) as &mut dyn Any)
            })),
            set: Some(set_fn(move |owner, value| {
                *set_inner(owner_mut::<T>(owner)?) = unbox::<V>(value)?;
                Ok(())
            })),
            set_entry: None,
        });
        member
    }

    /// A read accessor of `T` computing a `V`.
    pub fn accessor<T: Any, V: GetTypeDecl>(
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        let mut member = Self::new(MemberKind::Accessor, name, TypeKey::of::<V>());
        member.dependency = Some(MetadataRegistry::register::<V>);
        member.access = Some(MemberAccess {
            get: Some(get_fn(move |owner| {
                let owner = owner.downcast_ref::<T>()?;
                Some(ValueRef::Owned(Box::new(get(owner))))
            })),
            ..MemberAccess::default()
        });
        member
    }

    /// A read accessor of `T` returning a reference.
    pub fn accessor_ref<T: Any, V: GetTypeDecl>(
        name: &str,
        get: impl for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
    ) -> Self {
        let mut member = Self::new(MemberKind::Accessor, name, TypeKey::of::<V>());
        member.dependency = Some(MetadataRegistry::register::<V>);
        member.access = Some(MemberAccess {
            get: Some(get_fn(move |owner| {
                let owner = owner.downcast_ref::<T>()?;
                Some(ValueRef::Borrowed(get(owner)))
            })),
            ..MemberAccess::default()
        });
        member
    }

    /// A write accessor of `T` taking a `V`.
    pub fn mutator<T: Any, V: GetTypeDecl>(
        name: &str,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        let mut member = Self::new(MemberKind::Mutator, name, TypeKey::of::<V>());
        member.dependency = Some(MetadataRegistry::register::<V>);
        member.access = Some(MemberAccess {
            set: Some(set_fn(move |owner, value| {
                set(owner_mut::<T>(owner)?, unbox::<V>(value)?);
                Ok(())
            })),
            ..MemberAccess::default()
        });
        member
    }

    /// A two-argument write accessor of `T` taking a key and a `V`.
    ///
    /// This is the shape required by [`Directive::AnySetter`].
    pub fn entry_mutator<T: Any, V: GetTypeDecl>(
        name: &str,
        set: impl Fn(&mut T, String, V) + Send + Sync + 'static,
    ) -> Self {
        let mut member = Self::new(MemberKind::Mutator, name, TypeKey::of::<V>());
        member.key_type = Some(TypeKey::of::<String>());
        member.dependency = Some(MetadataRegistry::register::<V>);
        member.access = Some(MemberAccess {
            set_entry: Some(entry_fn(move |owner, key, value| {
                set(owner_mut::<T>(owner)?, key, unbox::<V>(value)?);
                Ok(())
            })),
            ..MemberAccess::default()
        });
        member
    }

    /// A directive-only field, used by overlays and interfaces.
    pub fn virtual_field<V: ?Sized + Any>(name: &str) -> Self {
        Self::new(MemberKind::Field, name, TypeKey::of::<V>())
    }

    /// A directive-only read accessor.
    pub fn virtual_accessor<V: ?Sized + Any>(name: &str) -> Self {
        Self::new(MemberKind::Accessor, name, TypeKey::of::<V>())
    }

    /// A directive-only write accessor.
    pub fn virtual_mutator<V: ?Sized + Any>(name: &str) -> Self {
        Self::new(MemberKind::Mutator, name, TypeKey::of::<V>())
    }

    /// A directive-only key/value write accessor.
    pub fn virtual_entry_mutator<V: ?Sized + Any>(name: &str) -> Self {
        let mut member = Self::new(MemberKind::Mutator, name, TypeKey::of::<V>());
        member.key_type = Some(TypeKey::of::<String>());
        member
    }

    /// Sets an explicit property name.
    pub fn named(self, name: impl Into<String>) -> Self {
        self.with(Directive::Rename(name.into()))
    }

    pub fn ignored(self) -> Self {
        self.with(Directive::Ignore(true))
    }

    /// Includes the member regardless of its visibility.
    pub fn include(self) -> Self {
        self.with(Directive::Include)
    }

    pub fn private(self) -> Self {
        self.with_visibility(Visibility::Private)
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.insert(directive);
        self
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn value_type(&self) -> &TypeKey {
        &self.value_type
    }

    #[inline]
    pub fn key_type(&self) -> Option<&TypeKey> {
        self.key_type.as_ref()
    }

    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Returns `None` for directive-only members.
    #[inline]
    pub fn access(&self) -> Option<&MemberAccess> {
        self.access.as_ref()
    }

    #[inline]
    pub(crate) fn dependency(&self) -> Option<RegisterFn> {
        self.dependency
    }

    pub fn signature(&self) -> MemberSignature {
        let params = match self.kind {
            MemberKind::Field | MemberKind::Accessor => Vec::new(),
            MemberKind::Mutator => match &self.key_type {
                Some(key) => vec![key.id(), self.value_type.id()],
                None => vec![self.value_type.id()],
            },
        };
        MemberSignature {
            kind: self.kind,
            name: self.name.clone(),
            params,
        }
    }
}

impl fmt::Debug for MemberDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDecl")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("value_type", &self.value_type)
            .field("directives", &self.directives)
            .field("virtual", &self.access.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    struct Point {
        x: i32,
        label: String,
    }

    #[test]
    fn field_access_round_trip() {
        let member = MemberDecl::field::<Point, _>("x", |p| &p.x, |p| &mut p.x);
        let access = member.access().unwrap();

        let mut point = Point {
            x: 1,
            label: String::new(),
        };

        let read = (access.get.as_ref().unwrap())(&point).unwrap();
        assert_eq!(read.as_any().downcast_ref::<i32>(), Some(&1));

        (access.set.as_ref().unwrap())(&mut point, Box::new(7_i32)).unwrap();
        assert_eq!(point.x, 7);

        let wrong = (access.set.as_ref().unwrap())(&mut point, Box::new("no"));
        assert!(matches!(wrong, Err(AccessError::Downcast { .. })));
    }

    #[test]
    fn accessor_produces_owned_values() {
        let member = MemberDecl::accessor::<Point, String>("get_label", |p| p.label.to_uppercase());
        let point = Point {
            x: 0,
            label: "abc".to_string(),
        };
        let get = member.access().unwrap().get.clone().unwrap();
        let value = get(&point).unwrap();
        assert!(matches!(value, ValueRef::Owned(_)));
        assert_eq!(value.as_any().downcast_ref::<String>().unwrap(), "ABC");
    }

    #[test]
    fn signatures() {
        let a = MemberDecl::mutator::<Point, i32>("set_x", |p, v| p.x = v);
        let b = MemberDecl::virtual_mutator::<i32>("set_x");
        let c = MemberDecl::virtual_mutator::<String>("set_x");
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());

        let entry = MemberDecl::virtual_entry_mutator::<i32>("put");
        assert_eq!(entry.signature().params.len(), 2);
        assert!(entry.access().is_none());
    }
}
