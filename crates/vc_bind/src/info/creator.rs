use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use crate::error::AccessError;
use crate::registry::{MetadataRegistry, RegisterFn};

use super::{CreatorMode, Directive, Directives, GetTypeDecl, TypeKey, Visibility, unbox};

// -----------------------------------------------------------------------------
// CreatorArgs

/// The decoded arguments handed to a creator, one slot per parameter.
///
/// A slot is `None` when the input did not provide the property and its
/// decoder has no absent value.
pub struct CreatorArgs {
    slots: Vec<Option<Box<dyn Any>>>,
}

impl CreatorArgs {
    #[inline]
    pub fn new(slots: Vec<Option<Box<dyn Any>>>) -> Self {
        Self { slots }
    }

    #[inline]
    pub fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Takes argument `index`, `None` if it was not provided.
    pub fn take<V: Any>(&mut self, index: usize) -> Result<Option<V>, AccessError> {
        match self.slots.get_mut(index).and_then(Option::take) {
            Some(value) => unbox::<V>(value).map(Some),
            None => Ok(None),
        }
    }

    /// Takes argument `index`, failing if it was not provided.
    pub fn required<V: Any>(&mut self, index: usize) -> Result<V, AccessError> {
        self.take::<V>(index)?
            .ok_or(AccessError::MissingArgument { index })
    }
}

/// Builds a record from decoded arguments.
pub type CreateFn =
    Arc<dyn Fn(&mut CreatorArgs) -> Result<Box<dyn Any>, AccessError> + Send + Sync>;

#[inline]
fn create_fn<F>(f: F) -> CreateFn
where
    F: Fn(&mut CreatorArgs) -> Result<Box<dyn Any>, AccessError> + Send + Sync + 'static,
{
    Arc::new(f)
}

// -----------------------------------------------------------------------------
// ParamDecl

/// One creator parameter.
///
/// Parameters carry no positional names; a property name must be given with
/// [`ParamDecl::named`] unless the creator is delegating.
#[derive(Clone)]
pub struct ParamDecl {
    value_type: TypeKey,
    directives: Directives,
    dependency: Option<RegisterFn>,
}

impl ParamDecl {
    pub fn of<V: GetTypeDecl>() -> Self {
        Self {
            value_type: TypeKey::of::<V>(),
            directives: Directives::new(),
            dependency: Some(MetadataRegistry::register::<V>),
        }
    }

    /// A parameter of a directive-only creator signature.
    pub fn virtual_of<V: ?Sized + Any>() -> Self {
        Self {
            value_type: TypeKey::of::<V>(),
            directives: Directives::new(),
            dependency: None,
        }
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.with(Directive::Rename(name.into()))
    }

    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.insert(directive);
        self
    }

    #[inline]
    pub fn value_type(&self) -> &TypeKey {
        &self.value_type
    }

    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    #[inline]
    pub(crate) fn dependency(&self) -> Option<RegisterFn> {
        self.dependency
    }
}

// -----------------------------------------------------------------------------
// CreatorDecl

/// A constructor or factory function.
#[derive(Clone)]
pub struct CreatorDecl {
    name: String,
    visibility: Visibility,
    params: Vec<ParamDecl>,
    directives: Directives,
    invoke: Option<CreateFn>,
}

impl CreatorDecl {
    /// A no-argument creator.
    pub fn default_of<T: Any>(make: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            name: "default".into(),
            visibility: Visibility::Public,
            params: Vec::new(),
            directives: Directives::new(),
            invoke: Some(create_fn(move |_| Ok(Box::new(make())))),
        }
    }

    /// A creator taking `params`.
    pub fn new<T: Any>(
        name: &str,
        params: Vec<ParamDecl>,
        make: impl Fn(&mut CreatorArgs) -> Result<T, AccessError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            params,
            directives: Directives::new(),
            invoke: Some(create_fn(move |args| {
                make(args).map(|value| Box::new(value) as Box<dyn Any>)
            })),
        }
    }

    /// A directive-only creator signature, used by overlays.
    pub fn signature(name: &str, params: Vec<ParamDecl>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            params,
            directives: Directives::new(),
            invoke: None,
        }
    }

    /// Designates this creator; its mode is inferred from its parameters.
    pub fn designated(self) -> Self {
        self.with(Directive::Creator(CreatorMode::Auto))
    }

    pub fn properties(self) -> Self {
        self.with(Directive::Creator(CreatorMode::Properties))
    }

    pub fn delegating(self) -> Self {
        self.with(Directive::Creator(CreatorMode::Delegating))
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
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn params(&self) -> &[ParamDecl] {
        &self.params
    }

    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    #[inline]
    pub fn invoke(&self) -> Option<&CreateFn> {
        self.invoke.as_ref()
    }

    pub fn param_types(&self) -> Vec<TypeId> {
        self.params.iter().map(|p| p.value_type.id()).collect()
    }
}

impl fmt::Debug for CreatorDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatorDecl")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("directives", &self.directives)
            .finish()
    }
}
