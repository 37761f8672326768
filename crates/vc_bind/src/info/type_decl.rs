use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, type_name};
use core::fmt;
use std::collections::HashMap as StdHashMap;

use crate::error::AccessError;
use crate::registry::{MetadataRegistry, RegisterFn};

use super::{ClassDecl, EntrySetFn, ProjectFn, TypeKey, WrapFn, entry_fn, project_fn, unbox, wrap_fn};

// -----------------------------------------------------------------------------
// GetTypeDecl

/// Provides the binding declaration of a type.
///
/// Implemented here for scalars, `String`, `Option`, `Vec` and string-keyed
/// maps. Record types implement it with a [`ClassBuilder`](super::ClassBuilder);
/// boxed types use [`PointerDecl::boxed`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `GetTypeDecl`",
    note = "declare it with `ClassBuilder`, or register the declaration with `MetadataRegistry::insert_decl`"
)]
pub trait GetTypeDecl: Any {
    fn type_decl() -> TypeDecl;
}

// -----------------------------------------------------------------------------
// Category declarations

/// A type converted by a standard or override converter.
#[derive(Debug, Clone)]
pub struct ScalarDecl {
    pub key: TypeKey,
}

/// Returns borrowed elements, `None` if the value is not the declared type.
pub type IterFn = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<Vec<&'a dyn Any>> + Send + Sync>;
/// Returns mutable elements.
pub type IterMutFn =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<Vec<&'a mut dyn Any>> + Send + Sync>;
/// Collects decoded elements.
pub type BuildSeqFn =
    Arc<dyn Fn(Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, AccessError> + Send + Sync>;
/// Returns borrowed map entries.
pub type EntriesFn =
    Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<Vec<(&'a str, &'a dyn Any)>> + Send + Sync>;

/// An ordered collection of one element type.
#[derive(Clone)]
pub struct SequenceDecl {
    pub key: TypeKey,
    pub element: TypeKey,
    pub iter: IterFn,
    pub iter_mut: IterMutFn,
    pub build: BuildSeqFn,
    pub(crate) dependencies: Vec<RegisterFn>,
}

/// A map with string keys.
#[derive(Clone)]
pub struct MapDecl {
    pub key: TypeKey,
    pub value: TypeKey,
    pub entries: EntriesFn,
    /// Creates an empty map.
    pub empty: Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>,
    pub insert: EntrySetFn,
    /// Entries are already ordered by key.
    pub sorted: bool,
    pub(crate) dependencies: Vec<RegisterFn>,
}

/// An optional value.
#[derive(Clone)]
pub struct OptionalDecl {
    pub key: TypeKey,
    pub inner: TypeKey,
    pub get: ProjectFn,
    pub some: WrapFn,
    pub none: Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>,
    pub(crate) dependencies: Vec<RegisterFn>,
}

/// An owning pointer, encoded as its target.
#[derive(Clone)]
pub struct PointerDecl {
    pub key: TypeKey,
    pub inner: TypeKey,
    pub deref: ProjectFn,
    pub wrap: WrapFn,
    pub(crate) dependencies: Vec<RegisterFn>,
}

/// An enum of unit variants, encoded by variant name.
#[derive(Clone)]
pub struct EnumDecl {
    pub key: TypeKey,
    pub variants: Vec<String>,
    pub index_of: Arc<dyn Fn(&dyn Any) -> Option<usize> + Send + Sync>,
    pub from_index: Arc<dyn Fn(usize) -> Option<Box<dyn Any>> + Send + Sync>,
}

impl PointerDecl {
    /// The declaration of `Box<T>`.
    ///
    /// ```
    /// use vc_bind::info::{GetTypeDecl, PointerDecl, TypeDecl};
    ///
    /// struct Node;
    /// # impl GetTypeDecl for Node {
    /// #     fn type_decl() -> TypeDecl { TypeDecl::scalar::<Node>() }
    /// # }
    ///
    /// impl GetTypeDecl for Box<Node> {
    ///     fn type_decl() -> TypeDecl {
    ///         PointerDecl::boxed::<Node>()
    ///     }
    /// }
    /// ```
    pub fn boxed<T: GetTypeDecl>() -> TypeDecl {
        TypeDecl::Pointer(PointerDecl {
            key: TypeKey::of::<Box<T>>(),
            inner: TypeKey::of::<T>(),
            deref: project_fn(|value| {
                let boxed = value.downcast_ref::<Box<T>>()?;
                Some(&**boxed as &dyn Any)
            }),
            wrap: wrap_fn(|value| unbox::<T>(value).map(|v| Box::new(Box::new(v)) as Box<dyn Any>)),
            dependencies: alloc::vec![MetadataRegistry::register::<T> as RegisterFn],
        })
    }
}

impl EnumDecl {
    /// Declares a unit-variant enum from its `(name, value)` pairs.
    pub fn unit<T>(variants: &[(&str, T)]) -> TypeDecl
    where
        T: Any + Clone + PartialEq + Send + Sync,
    {
        let names = variants.iter().map(|(name, _)| String::from(*name)).collect();
        let values: Arc<[T]> = variants.iter().map(|(_, value)| value.clone()).collect();
        let lookup = values.clone();

        TypeDecl::Enum(EnumDecl {
            key: TypeKey::of::<T>(),
            variants: names,
            index_of: Arc::new(move |value: &dyn Any| {
                let value = value.downcast_ref::<T>()?;
                lookup.iter().position(|candidate| candidate == value)
            }),
            from_index: Arc::new(move |index: usize| {
                values
                    .get(index)
                    .map(|value| Box::new(value.clone()) as Box<dyn Any>)
            }),
        })
    }
}

// -----------------------------------------------------------------------------
// TypeDecl

/// The structural category of a type together with its declaration.
#[derive(Clone)]
pub enum TypeDecl {
    Scalar(ScalarDecl),
    Sequence(SequenceDecl),
    Map(MapDecl),
    Optional(OptionalDecl),
    Pointer(PointerDecl),
    Enum(EnumDecl),
    Record(ClassDecl),
}

/// The discriminant of a [`TypeDecl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Scalar,
    Sequence,
    Map,
    Optional,
    Pointer,
    Enum,
    Record,
}

macro_rules! impl_cast_method {
    ($name:ident : $kind:ident => $info:ty) => {
        #[doc = concat!("Returns the [`", stringify!($info), "`] if this is a `", stringify!($kind), "` declaration.")]
        #[inline]
        pub fn $name(&self) -> Option<&$info> {
            match self {
                Self::$kind(info) => Some(info),
                _ => None,
            }
        }
    };
}

impl TypeDecl {
    /// The declaration of a type converted by a standard or override converter.
    #[inline]
    pub fn scalar<T: ?Sized + Any>() -> Self {
        TypeDecl::Scalar(ScalarDecl {
            key: TypeKey::of::<T>(),
        })
    }

    pub fn key(&self) -> &TypeKey {
        match self {
            TypeDecl::Scalar(decl) => &decl.key,
            TypeDecl::Sequence(decl) => &decl.key,
            TypeDecl::Map(decl) => &decl.key,
            TypeDecl::Optional(decl) => &decl.key,
            TypeDecl::Pointer(decl) => &decl.key,
            TypeDecl::Enum(decl) => &decl.key,
            TypeDecl::Record(decl) => &decl.key,
        }
    }

    pub fn category(&self) -> TypeCategory {
        match self {
            TypeDecl::Scalar(_) => TypeCategory::Scalar,
            TypeDecl::Sequence(_) => TypeCategory::Sequence,
            TypeDecl::Map(_) => TypeCategory::Map,
            TypeDecl::Optional(_) => TypeCategory::Optional,
            TypeDecl::Pointer(_) => TypeCategory::Pointer,
            TypeDecl::Enum(_) => TypeCategory::Enum,
            TypeDecl::Record(_) => TypeCategory::Record,
        }
    }

    /// Types that registering this declaration also registers.
    pub(crate) fn dependencies(&self) -> &[RegisterFn] {
        match self {
            TypeDecl::Scalar(_) | TypeDecl::Enum(_) => &[],
            TypeDecl::Sequence(decl) => &decl.dependencies,
            TypeDecl::Map(decl) => &decl.dependencies,
            TypeDecl::Optional(decl) => &decl.dependencies,
            TypeDecl::Pointer(decl) => &decl.dependencies,
            TypeDecl::Record(decl) => &decl.dependencies,
        }
    }

    impl_cast_method!(as_sequence: Sequence => SequenceDecl);
    impl_cast_method!(as_map: Map => MapDecl);
    impl_cast_method!(as_optional: Optional => OptionalDecl);
    impl_cast_method!(as_pointer: Pointer => PointerDecl);
    impl_cast_method!(as_enum: Enum => EnumDecl);
    impl_cast_method!(as_record: Record => ClassDecl);
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecl::Record(decl) => decl.fmt(f),
            _ => f
                .debug_tuple("TypeDecl")
                .field(&self.category())
                .field(self.key())
                .finish(),
        }
    }
}

// -----------------------------------------------------------------------------
// Implementations

macro_rules! impl_scalar_decl {
    ($($ty:ty),* $(,)?) => {
        $(
            impl GetTypeDecl for $ty {
                #[inline]
                fn type_decl() -> TypeDecl {
                    TypeDecl::scalar::<$ty>()
                }
            }
        )*
    };
}

impl_scalar_decl!(
    bool, char, String, (), i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
);

impl<T: GetTypeDecl> GetTypeDecl for Option<T> {
    fn type_decl() -> TypeDecl {
        TypeDecl::Optional(OptionalDecl {
            key: TypeKey::of::<Self>(),
            inner: TypeKey::of::<T>(),
            get: project_fn(|value| {
                let value = value.downcast_ref::<Option<T>>()?;
                value.as_ref().map(|inner| inner as &dyn Any)
            }),
            some: wrap_fn(|value| unbox::<T>(value).map(|v| Box::new(Some(v)) as Box<dyn Any>)),
            none: Arc::new(|| Box::new(None::<T>) as Box<dyn Any>),
            dependencies: alloc::vec![MetadataRegistry::register::<T> as RegisterFn],
        })
    }
}

impl<T: GetTypeDecl> GetTypeDecl for Vec<T> {
    fn type_decl() -> TypeDecl {
        TypeDecl::Sequence(SequenceDecl {
            key: TypeKey::of::<Self>(),
            element: TypeKey::of::<T>(),
            iter: Arc::new(|value: &dyn Any| {
                let value = value.downcast_ref::<Vec<T>>()?;
                Some(value.iter().map(|item| item as &dyn Any).collect())
            }),
            iter_mut: Arc::new(|value: &mut dyn Any| {
                let value = value.downcast_mut::<Vec<T>>()?;
                Some(value.iter_mut().map(|item| item as &mut dyn Any).collect())
            }),
            build: Arc::new(|items: Vec<Box<dyn Any>>| {
                let items = items
                    .into_iter()
                    .map(unbox::<T>)
                    .collect::<Result<Vec<T>, _>>()?;
                Ok(Box::new(items) as Box<dyn Any>)
            }),
            dependencies: alloc::vec![MetadataRegistry::register::<T> as RegisterFn],
        })
    }
}

/// Declares a string-keyed map type built from `(String, V)` pairs.
macro_rules! impl_map_decl {
    ($map:ident, $sorted:expr) => {
        impl<V: GetTypeDecl> GetTypeDecl for $map<String, V> {
            fn type_decl() -> TypeDecl {
                TypeDecl::Map(MapDecl {
                    key: TypeKey::of::<Self>(),
                    value: TypeKey::of::<V>(),
                    entries: Arc::new(|value: &dyn Any| {
                        let value = value.downcast_ref::<$map<String, V>>()?;
                        Some(
                            value
                                .iter()
                                .map(|(key, item)| (key.as_str(), item as &dyn Any))
                                .collect(),
                        )
                    }),
                    empty: Arc::new(|| Box::new($map::<String, V>::new()) as Box<dyn Any>),
                    insert: entry_fn(|map, key, item| {
                        let map = map.downcast_mut::<$map<String, V>>().ok_or(
                            AccessError::Downcast {
                                expected: type_name::<$map<String, V>>(),
                            },
                        )?;
                        map.insert(key, unbox::<V>(item)?);
                        Ok(())
                    }),
                    sorted: $sorted,
                    dependencies: alloc::vec![MetadataRegistry::register::<V> as RegisterFn],
                })
            }
        }
    };
}

impl_map_decl!(BTreeMap, true);
impl_map_decl!(StdHashMap, false);

// -----------------------------------------------------------------------------
// Tests
