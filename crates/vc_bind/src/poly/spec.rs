use alloc::string::String;
use core::any::Any;

use crate::info::TypeKey;

/// Where the type id of a polymorphic value is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EmbedStyle {
    /// An extra leading property of the value's object: `{"@type":"A","x":3}`.
    ///
    /// Values that are not written as objects fall back to
    /// [`WrapperArray`](Self::WrapperArray).
    #[default]
    Property,
    /// A two-element array: `["A",{"x":3}]`.
    WrapperArray,
    /// A single-property object: `{"A":{"x":3}}`.
    WrapperObject,
}

/// How type ids are formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// The full type path.
    Class,
    /// The type path relative to the base's module, starting with `::`.
    MinimalClass,
    /// A logical name: the registered name, the type's
    /// [`TypeName`](crate::info::Directive::TypeName), or its short name.
    #[default]
    Name,
}

/// The discriminator settings of a polymorphic base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfoSpec {
    pub style: EmbedStyle,
    pub id: IdKind,
    /// The discriminator property of [`EmbedStyle::Property`].
    pub property: String,
    /// Decoded when the discriminator property is missing.
    pub default_impl: Option<TypeKey>,
}

impl Default for TypeInfoSpec {
    fn default() -> Self {
        Self::new(EmbedStyle::Property, IdKind::Name)
    }
}

impl TypeInfoSpec {
    pub fn new(style: EmbedStyle, id: IdKind) -> Self {
        Self {
            style,
            id,
            property: String::from("@type"),
            default_impl: None,
        }
    }

    /// Renames the discriminator property.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property = name.into();
        self
    }

    pub fn default_impl<T: Any>(mut self) -> Self {
        self.default_impl = Some(TypeKey::of::<T>());
        self
    }
}
