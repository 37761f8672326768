use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, type_name};
use core::fmt;
use core::marker::PhantomData;

use crate::error::AccessError;
use crate::registry::{MetadataRegistry, RegisterFn};

use super::{
    CreatorArgs, CreatorDecl, Directive, DirectiveKind, Directives, GetMutFn, GetTypeDecl,
    MemberDecl, NamedType, ProjectFn, TypeDecl, TypeKey, WrapFn, get_mut_fn, project_fn, wrap_fn,
};

// -----------------------------------------------------------------------------
// SuperLink

/// Whether a record type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Concrete,
    /// A base that only exists through its subtypes, such as `Box<dyn Shape>`.
    Abstract,
}

/// A link from a record to one of its supertypes.
#[derive(Clone)]
pub enum SuperLink {
    /// The record embeds its parent; the parent's members are reached through
    /// the projections and belong to the record's own properties.
    Embedded {
        target: TypeKey,
        project: ProjectFn,
        project_mut: GetMutFn,
    },
    /// The record can be converted into an abstract base value.
    Abstract { target: TypeKey, upcast: WrapFn },
    /// The record implements a directive-only interface.
    Interface { target: TypeKey },
}

impl SuperLink {
    #[inline]
    pub fn target(&self) -> &TypeKey {
        match self {
            SuperLink::Embedded { target, .. }
            | SuperLink::Abstract { target, .. }
            | SuperLink::Interface { target } => target,
        }
    }

    /// Returns `true` for superclasses, `false` for interface-like links.
    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self, SuperLink::Embedded { .. })
    }
}

impl fmt::Debug for SuperLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            SuperLink::Embedded { .. } => "Embedded",
            SuperLink::Abstract { .. } => "Abstract",
            SuperLink::Interface { .. } => "Interface",
        };
        f.debug_tuple(kind).field(self.target()).finish()
    }
}

/// Produces the value stored in a back-reference property of a child.
pub type HandleFn = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

// -----------------------------------------------------------------------------
// ClassDecl

/// The declaration of a record type.
///
/// Created with [`ClassBuilder`].
#[derive(Clone)]
pub struct ClassDecl {
    pub(crate) key: TypeKey,
    pub(crate) kind: ClassKind,
    pub(crate) supers: Vec<SuperLink>,
    pub(crate) members: Vec<MemberDecl>,
    pub(crate) creators: Vec<CreatorDecl>,
    pub(crate) directives: Directives,
    pub(crate) view: Option<ProjectFn>,
    pub(crate) back_handle: Option<HandleFn>,
    pub(crate) dependencies: Vec<RegisterFn>,
}

impl ClassDecl {
    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    #[inline]
    pub fn supers(&self) -> &[SuperLink] {
        &self.supers
    }

    #[inline]
    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    #[inline]
    pub fn creators(&self) -> &[CreatorDecl] {
        &self.creators
    }

    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Maps an abstract value to the concrete value behind it.
    #[inline]
    pub fn view(&self) -> Option<&ProjectFn> {
        self.view.as_ref()
    }

    #[inline]
    pub fn back_handle(&self) -> Option<&HandleFn> {
        self.back_handle.as_ref()
    }

    /// Returns the upcast into `base`, if this record declares one.
    pub fn upcast_to(&self, base: &TypeKey) -> Option<&WrapFn> {
        self.supers.iter().find_map(|link| match link {
            SuperLink::Abstract { target, upcast } if target == base => Some(upcast),
            _ => None,
        })
    }
}

impl fmt::Debug for ClassDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("supers", &self.supers)
            .field("members", &self.members)
            .field("creators", &self.creators)
            .field("directives", &self.directives)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ClassBuilder

/// Builds the [`ClassDecl`] of `T`.
///
/// # Examples
///
/// ```
/// use vc_bind::info::{ClassBuilder, GetTypeDecl, TypeDecl};
///
/// #[derive(Default)]
/// struct Point { x: i32, y: i32 }
///
/// impl GetTypeDecl for Point {
///     fn type_decl() -> TypeDecl {
///         ClassBuilder::<Point>::new()
///             .field("x", |p| &p.x, |p| &mut p.x)
///             .field("y", |p| &p.y, |p| &mut p.y)
///             .default_creator(Point::default)
///             .build()
///     }
/// }
///
/// let decl = Point::type_decl();
/// assert_eq!(decl.as_record().unwrap().members().len(), 2);
/// ```
pub struct ClassBuilder<T: ?Sized> {
    decl: ClassDecl,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Any> ClassBuilder<T> {
    /// Starts a concrete record declaration keyed by `T`.
    pub fn new() -> Self {
        Self::with_key(TypeKey::of::<T>())
    }

    /// Starts a declaration with a custom key path.
    pub fn with_key(key: TypeKey) -> Self {
        Self {
            decl: ClassDecl {
                key,
                kind: ClassKind::Concrete,
                supers: Vec::new(),
                members: Vec::new(),
                creators: Vec::new(),
                directives: Directives::new(),
                view: None,
                back_handle: None,
                dependencies: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Marks the declaration abstract without a value view.
    ///
    /// Used for directive-only interfaces such as `dyn Named`.
    pub fn interface(mut self) -> Self {
        self.decl.kind = ClassKind::Abstract;
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        if let Some(dependency) = member.dependency() {
            self.decl.dependencies.push(dependency);
        }
        self.decl.members.push(member);
        self
    }

    pub fn creator(mut self, creator: CreatorDecl) -> Self {
        for param in creator.params() {
            if let Some(dependency) = param.dependency() {
                self.decl.dependencies.push(dependency);
            }
        }
        self.decl.creators.push(creator);
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.decl.directives.insert(directive);
        self
    }

    /// Adds a directive-only interface link.
    pub fn interface_of(mut self, target: TypeKey) -> Self {
        self.decl.supers.push(SuperLink::Interface { target });
        self
    }

    /// Adds a subtype to the [`Directive::SubTypes`] list.
    pub fn subtype(mut self, subtype: NamedType) -> Self {
        if let Some(register) = subtype.register_fn() {
            self.decl.dependencies.push(register);
        }
        let mut list = match self.decl.directives.remove(DirectiveKind::SubTypes) {
            Some(Directive::SubTypes(list)) => list,
            _ => Vec::new(),
        };
        list.push(subtype);
        self.decl.directives.insert(Directive::SubTypes(list));
        self
    }

    pub fn build_class(self) -> ClassDecl {
        self.decl
    }

    pub fn build(self) -> TypeDecl {
        TypeDecl::Record(self.decl)
    }
}

impl<T: Any> ClassBuilder<T> {
    /// Shorthand for [`MemberDecl::field`].
    pub fn field<V: GetTypeDecl>(
        self,
        name: &str,
        get: impl for<'a> Fn(&'a T) -> &'a V + Send + Sync + 'static,
        get_mut: impl for<'a> Fn(&'a mut T) -> &'a mut V + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberDecl::field::<T, V>(name, get, get_mut))
    }

    /// Shorthand for [`MemberDecl::accessor`].
    pub fn accessor<V: GetTypeDecl>(
        self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberDecl::accessor::<T, V>(name, get))
    }

    /// Shorthand for [`MemberDecl::mutator`].
    pub fn mutator<V: GetTypeDecl>(
        self,
        name: &str,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberDecl::mutator::<T, V>(name, set))
    }

    /// Adds a no-argument creator.
    pub fn default_creator(self, make: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.creator(CreatorDecl::default_of::<T>(make))
    }

    /// Declares `P` as an embedded parent of `T`.
    pub fn extends<P: GetTypeDecl>(
        mut self,
        project: impl for<'a> Fn(&'a T) -> &'a P + Send + Sync + 'static,
        project_mut: impl for<'a> Fn(&'a mut T) -> &'a mut P + Send + Sync + 'static,
    ) -> Self {
        self.decl.dependencies.push(MetadataRegistry::register::<P>);
        self.decl.supers.push(SuperLink::Embedded {
            target: TypeKey::of::<P>(),
            project: project_fn(move |value| {
                let value = value.downcast_ref::<T>()?;
                Some(project(value) as &dyn Any)
            }),
            project_mut: get_mut_fn(move |value| {
                let value = value.downcast_mut::<T>()?;
                Some(project_mut(value) as &mut dyn Any)
            }),
        });
        self
    }

    /// Declares that `T` converts into the abstract base `B`.
    ///
    /// For trait objects, `B` is the boxed trait object:
    /// `.implements::<Box<dyn Shape>>(|c| Box::new(c))`.
    pub fn implements<B: GetTypeDecl>(
        mut self,
        upcast: impl Fn(T) -> B + Send + Sync + 'static,
    ) -> Self {
        self.decl.dependencies.push(MetadataRegistry::register::<B>);
        self.decl.supers.push(SuperLink::Abstract {
            target: TypeKey::of::<B>(),
            upcast: wrap_fn(move |value| {
                let value = value.downcast::<T>().map_err(|_| AccessError::Downcast {
                    expected: type_name::<T>(),
                })?;
                Ok(Box::new(upcast(*value)))
            }),
        });
        self
    }

    /// Marks `T` as an abstract base whose values are viewed as their
    /// concrete values by `view`.
    ///
    /// For `Box<dyn Shape>` where `Shape: AsAny`, the view is
    /// `|shape| shape.as_any()`.
    pub fn abstract_view(
        mut self,
        view: impl (for<'a> Fn(&'a T) -> &'a dyn Any) + Send + Sync + 'static,
    ) -> Self {
        self.decl.kind = ClassKind::Abstract;
        self.decl.view = Some(project_fn(move |value| {
            let value = value.downcast_ref::<T>()?;
            Some(view(value))
        }));
        self
    }

    /// Sets the handle stored into back-reference properties of children.
    pub fn back_handle<H: Any>(
        mut self,
        handle: impl Fn(&T) -> H + Send + Sync + 'static,
    ) -> Self {
        self.decl.back_handle = Some(Arc::new(move |value: &dyn Any| {
            let value = value.downcast_ref::<T>()?;
            Some(Box::new(handle(value)) as Box<dyn Any>)
        }));
        self
    }
}

/// A convenience for creators taking owned arguments in order.
///
/// `args.required` for each parameter is usually clearer; this exists for
/// single-argument delegating creators.
pub fn delegate<T: Any, V: Any>(
    make: impl Fn(V) -> T + Send + Sync + 'static,
) -> impl Fn(&mut CreatorArgs) -> Result<T, AccessError> + Send + Sync + 'static {
    move |args: &mut CreatorArgs| args.required::<V>(0).map(&make)
}
