use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::convert::{Decoder, Encoder};
use crate::poly::TypeInfoSpec;

use super::{NamedType, VisibilityPolicy};

// -----------------------------------------------------------------------------
// Directive values

/// When a property is written during encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inclusion {
    /// Always written.
    #[default]
    Always,
    /// Skipped when the value is absent (`None`).
    NonNull,
    /// Skipped when absent or empty (empty string, sequence or map).
    NonEmpty,
}

/// Restricts a property to one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Encoded, never decoded.
    ReadOnly,
    /// Decoded, never encoded.
    WriteOnly,
    ReadWrite,
}

/// How a designated creator consumes its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreatorMode {
    /// Inferred from the parameter list.
    Auto,
    /// Every parameter is bound to a property by name.
    Properties,
    /// The single parameter is decoded from the whole value.
    Delegating,
}

/// Explicit converters attached to a type or a member.
#[derive(Clone, Default)]
pub struct ConverterRef {
    pub encoder: Option<Arc<dyn Encoder>>,
    pub decoder: Option<Arc<dyn Decoder>>,
}

impl ConverterRef {
    pub fn encoder(encoder: impl Encoder + 'static) -> Self {
        Self {
            encoder: Some(Arc::new(encoder)),
            decoder: None,
        }
    }

    pub fn decoder(decoder: impl Decoder + 'static) -> Self {
        Self {
            encoder: None,
            decoder: Some(Arc::new(decoder)),
        }
    }

    /// Uses one value as both encoder and decoder.
    pub fn both<C: Encoder + Decoder + 'static>(converter: C) -> Self {
        let converter = Arc::new(converter);
        Self {
            encoder: Some(converter.clone()),
            decoder: Some(converter),
        }
    }
}

impl fmt::Debug for ConverterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRef")
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Directive

/// A named, overridable piece of binding metadata.
///
/// Directives are attached to types, members, creators and creator
/// parameters. A [`Directives`] set holds at most one directive per
/// [`DirectiveKind`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Directive {
    /// Explicit property name; an empty name keeps the default name but
    /// still marks the member as included.
    Rename(String),
    Ignore(bool),
    /// Include the member even when it is not visible.
    Include,
    Access(AccessMode),
    /// Names written first, in this order.
    Order(Vec<String>),
    SortAlphabetically(bool),
    Inclusion(Inclusion),
    AnyGetter,
    AnySetter,
    Creator(CreatorMode),
    ManagedReference(String),
    BackReference(String),
    Converter(ConverterRef),
    TypeInfo(TypeInfoSpec),
    SubTypes(Vec<NamedType>),
    TypeName(String),
    IgnoreUnknown(bool),
    IgnoredProperties(Vec<String>),
    AutoDetect(VisibilityPolicy),
    Alias(Vec<String>),
}

/// The discriminant of a [`Directive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Rename,
    Ignore,
    Include,
    Access,
    Order,
    SortAlphabetically,
    Inclusion,
    AnyGetter,
    AnySetter,
    Creator,
    ManagedReference,
    BackReference,
    Converter,
    TypeInfo,
    SubTypes,
    TypeName,
    IgnoreUnknown,
    IgnoredProperties,
    AutoDetect,
    Alias,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Rename(_) => DirectiveKind::Rename,
            Directive::Ignore(_) => DirectiveKind::Ignore,
            Directive::Include => DirectiveKind::Include,
            Directive::Access(_) => DirectiveKind::Access,
            Directive::Order(_) => DirectiveKind::Order,
            Directive::SortAlphabetically(_) => DirectiveKind::SortAlphabetically,
            Directive::Inclusion(_) => DirectiveKind::Inclusion,
            Directive::AnyGetter => DirectiveKind::AnyGetter,
            Directive::AnySetter => DirectiveKind::AnySetter,
            Directive::Creator(_) => DirectiveKind::Creator,
            Directive::ManagedReference(_) => DirectiveKind::ManagedReference,
            Directive::BackReference(_) => DirectiveKind::BackReference,
            Directive::Converter(_) => DirectiveKind::Converter,
            Directive::TypeInfo(_) => DirectiveKind::TypeInfo,
            Directive::SubTypes(_) => DirectiveKind::SubTypes,
            Directive::TypeName(_) => DirectiveKind::TypeName,
            Directive::IgnoreUnknown(_) => DirectiveKind::IgnoreUnknown,
            Directive::IgnoredProperties(_) => DirectiveKind::IgnoredProperties,
            Directive::AutoDetect(_) => DirectiveKind::AutoDetect,
            Directive::Alias(_) => DirectiveKind::Alias,
        }
    }
}

impl DirectiveKind {
    /// Returns `true` for kinds that are meaningful on a type declaration.
    pub fn is_type_level(self) -> bool {
        matches!(
            self,
            DirectiveKind::Order
                | DirectiveKind::SortAlphabetically
                | DirectiveKind::Inclusion
                | DirectiveKind::Converter
                | DirectiveKind::TypeInfo
                | DirectiveKind::SubTypes
                | DirectiveKind::TypeName
                | DirectiveKind::IgnoreUnknown
                | DirectiveKind::IgnoredProperties
                | DirectiveKind::AutoDetect
        )
    }
}

// -----------------------------------------------------------------------------
// Directives

/// A set of directives, one per kind.
///
/// Small by nature, so it is a vector searched linearly.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    items: Vec<Directive>,
}

macro_rules! impl_directive_getters {
    ($($(#[$attr:meta])* $fn_name:ident => $variant:ident($bind:ident) -> $ret:ty = $expr:expr;)*) => {
        $(
            $(#[$attr])*
            pub fn $fn_name(&self) -> Option<$ret> {
                match self.get(DirectiveKind::$variant)? {
                    Directive::$variant($bind) => Some($expr),
                    _ => None,
                }
            }
        )*
    };
}

impl Directives {
    #[inline]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Builder form of [`Directives::insert`].
    #[inline]
    pub fn with(mut self, directive: Directive) -> Self {
        self.insert(directive);
        self
    }

    /// Inserts a directive, replacing and returning one of the same kind.
    pub fn insert(&mut self, directive: Directive) -> Option<Directive> {
        let kind = directive.kind();
        match self.items.iter_mut().find(|item| item.kind() == kind) {
            Some(slot) => Some(core::mem::replace(slot, directive)),
            None => {
                self.items.push(directive);
                None
            }
        }
    }

    /// Inserts a directive unless one of the same kind is present.
    pub fn add_if_absent(&mut self, directive: Directive) -> bool {
        if self.contains(directive.kind()) {
            false
        } else {
            self.items.push(directive);
            true
        }
    }

    /// Copies every directive of `other` whose kind is not present.
    pub fn add_missing(&mut self, other: &Directives) {
        for directive in &other.items {
            if !self.contains(directive.kind()) {
                self.items.push(directive.clone());
            }
        }
    }

    /// Copies every directive of `other`, replacing same-kind entries.
    pub fn override_with(&mut self, other: &Directives) {
        for directive in &other.items {
            self.insert(directive.clone());
        }
    }

    #[inline]
    pub fn get(&self, kind: DirectiveKind) -> Option<&Directive> {
        self.items.iter().find(|item| item.kind() == kind)
    }

    #[inline]
    pub fn contains(&self, kind: DirectiveKind) -> bool {
        self.items.iter().any(|item| item.kind() == kind)
    }

    pub fn remove(&mut self, kind: DirectiveKind) -> Option<Directive> {
        let index = self.items.iter().position(|item| item.kind() == kind)?;
        Some(self.items.remove(index))
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Directive> {
        self.items.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_included(&self) -> bool {
        self.contains(DirectiveKind::Include)
    }

    #[inline]
    pub fn is_any_getter(&self) -> bool {
        self.contains(DirectiveKind::AnyGetter)
    }

    #[inline]
    pub fn is_any_setter(&self) -> bool {
        self.contains(DirectiveKind::AnySetter)
    }

    /// Returns the aliases, or an empty slice.
    pub fn aliases(&self) -> &[String] {
        match self.get(DirectiveKind::Alias) {
            Some(Directive::Alias(names)) => names,
            _ => &[],
        }
    }

    impl_directive_getters! {
        /// The explicit name, including the empty "default name" marker.
        rename => Rename(v) -> &str = v.as_str();
        ignored => Ignore(v) -> bool = *v;
        access => Access(v) -> AccessMode = *v;
        order => Order(v) -> &[String] = v.as_slice();
        sort_alphabetically => SortAlphabetically(v) -> bool = *v;
        inclusion => Inclusion(v) -> Inclusion = *v;
        creator_mode => Creator(v) -> CreatorMode = *v;
        managed_reference => ManagedReference(v) -> &str = v.as_str();
        back_reference => BackReference(v) -> &str = v.as_str();
        converter => Converter(v) -> &ConverterRef = v;
        type_info => TypeInfo(v) -> &TypeInfoSpec = v;
        subtypes => SubTypes(v) -> &[NamedType] = v.as_slice();
        type_name => TypeName(v) -> &str = v.as_str();
        ignore_unknown => IgnoreUnknown(v) -> bool = *v;
        ignored_properties => IgnoredProperties(v) -> &[String] = v.as_slice();
        auto_detect => AutoDetect(v) -> &VisibilityPolicy = v;
    }
}

impl FromIterator<Directive> for Directives {
    fn from_iter<I: IntoIterator<Item = Directive>>(iter: I) -> Self {
        let mut directives = Directives::new();
        for directive in iter {
            directives.insert(directive);
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn one_directive_per_kind() {
        let mut set = Directives::new()
            .with(Directive::Rename("a".into()))
            .with(Directive::Rename("b".into()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.rename(), Some("b"));

        assert!(!set.add_if_absent(Directive::Rename("c".into())));
        assert!(set.add_if_absent(Directive::Ignore(true)));
        assert_eq!(set.ignored(), Some(true));

        assert!(set.remove(DirectiveKind::Ignore).is_some());
        assert!(set.ignored().is_none());
    }

    #[test]
    fn add_missing_keeps_existing() {
        let mut own = Directives::new().with(Directive::Rename("own".into()));
        let inherited = Directives::new()
            .with(Directive::Rename("parent".into()))
            .with(Directive::Alias(vec!["p".into()]));

        own.add_missing(&inherited);
        assert_eq!(own.rename(), Some("own"));
        assert_eq!(own.aliases(), ["p"]);

        own.override_with(&inherited);
        assert_eq!(own.rename(), Some("parent"));
    }

    #[test]
    fn type_level_kinds() {
        assert!(DirectiveKind::TypeInfo.is_type_level());
        assert!(DirectiveKind::Order.is_type_level());
        assert!(!DirectiveKind::Rename.is_type_level());
        assert!(!DirectiveKind::AnySetter.is_type_level());
    }
}
