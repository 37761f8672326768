//! Encode and decode views of record types.
//!
//! ## Menu
//!
//! - [`TypeDescriptor`]: Both views of one record type.
//! - [`EncodeView`]: Ordered readable properties and the any-getter.
//! - [`DecodeView`]: Settable properties, the chosen creator, the
//!   any-setter and reference bookkeeping.
//! - [`build_descriptor`]: Builds a descriptor from an [`AnnotatedType`]
//!   and its merged [`PropertyModel`].
//!
//! Views hold access functions and explicit converters only; converters
//! for property value types are resolved afterwards, when a record
//! encoder or decoder is built from the descriptor.

// -----------------------------------------------------------------------------
// Modules

mod decode;
mod encode;

// -----------------------------------------------------------------------------
// Exports

pub use decode::{AnySetter, BoundParam, CreatorBinding, CreatorKind, DecodeProperty, DecodeView};
pub use decode::{ManagedReference, SetTarget};
pub use encode::{AnyGetter, EncodeProperty, EncodeView};

// -----------------------------------------------------------------------------
// TypeDescriptor

use alloc::vec::Vec;

use crate::error::ConfigError;
use crate::info::{
    ClassKind, Directives, Inclusion, TypeKey, VisibilityChecker, VisibilityPolicy,
};
use crate::introspect::{AnnotatedMember, AnnotatedType, CandidateSource, PropertyModel};
use crate::registry::MetadataSource;

/// The encode and decode views of one record type.
///
/// Built once per type and shared by every converter of that type.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub key: TypeKey,
    pub kind: ClassKind,
    pub encode: EncodeView,
    pub decode: DecodeView,
}

/// Mapper settings used by [`build_descriptor`].
pub struct DescriptorOptions<'a> {
    pub sort_alphabetically: bool,
    pub default_inclusion: Inclusion,
    pub policy: VisibilityPolicy,
    pub checker: &'a dyn VisibilityChecker,
}

/// Builds both views of a record type.
///
/// Every conflict of the property model and of both views is reported in
/// one error.
pub fn build_descriptor(
    ty: &AnnotatedType,
    model: &PropertyModel,
    source: &dyn MetadataSource,
    options: &DescriptorOptions<'_>,
) -> Result<TypeDescriptor, ConfigError> {
    let mut errors = model.errors.clone();
    let parts = Parts { ty, model, source };

    let encode = encode::build(&parts, options, &mut errors);
    let decode = decode::build(&parts, options, &mut errors);

    match ConfigError::collect(errors) {
        Some(error) => Err(error),
        None => Ok(TypeDescriptor {
            key: *ty.key(),
            kind: ty.kind(),
            encode,
            decode,
        }),
    }
}

// -----------------------------------------------------------------------------
// Shared helpers

struct Parts<'a> {
    ty: &'a AnnotatedType,
    model: &'a PropertyModel,
    source: &'a dyn MetadataSource,
}

impl<'a> Parts<'a> {
    fn directives(&self, candidate: usize) -> &'a Directives {
        match self.model.candidates[candidate].source {
            CandidateSource::Member(index) => self.ty.members()[index].directives(),
            CandidateSource::Param { creator, index } => {
                &self.ty.creators()[creator].params[index].directives
            }
        }
    }

    fn member(&self, candidate: usize) -> Option<&'a AnnotatedMember> {
        match self.model.candidates[candidate].source {
            CandidateSource::Member(index) => self.ty.members().get(index),
            CandidateSource::Param { .. } => None,
        }
    }

    /// The first directive value found on `candidates`, in order.
    fn find<T>(
        &self,
        candidates: &[Option<usize>],
        get: impl Fn(&'a Directives) -> Option<T>,
    ) -> Option<T> {
        candidates
            .iter()
            .flatten()
            .find_map(|&candidate| get(self.directives(candidate)))
    }

    fn ty_path(&self) -> &'static str {
        self.ty.key().path()
    }
}

fn flatten(ids: &[usize]) -> Vec<Option<usize>> {
    ids.iter().copied().map(Some).collect()
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use core::any::Any;

    use super::*;
    use crate::info::{
        AccessMode, ClassBuilder, CreatorDecl, CreatorMode, DefaultVisibilityChecker, Directive,
        GetTypeDecl, MemberDecl, ParamDecl, TypeDecl,
    };
    use crate::introspect::{MergeOptions, NamingStrategy, collect, merge};
    use crate::registry::{MetadataRegistry, OverlayRegistry};

    fn describe<T: GetTypeDecl>(sort: bool) -> Result<TypeDescriptor, ConfigError> {
        let mut registry = MetadataRegistry::new();
        registry.register::<T>();
        let ty = collect(&registry, &OverlayRegistry::new(), &TypeKey::of::<T>()).unwrap();
        let model = merge(
            &ty,
            &MergeOptions {
                naming: NamingStrategy::Identity,
                policy: VisibilityPolicy::default(),
                checker: &DefaultVisibilityChecker,
                infer_property_mutators: true,
            },
        );
        build_descriptor(
            &ty,
            &model,
            &registry,
            &DescriptorOptions {
                sort_alphabetically: sort,
                default_inclusion: Inclusion::Always,
                policy: VisibilityPolicy::default(),
                checker: &DefaultVisibilityChecker,
            },
        )
    }

    #[derive(Default)]
    struct Item {
        zeta: u8,
        alpha: u8,
        mid: u8,
        secret: String,
        extra: BTreeMap<String, String>,
    }

    impl GetTypeDecl for Item {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Item>::new()
                .field("zeta", |i| &i.zeta, |i| &mut i.zeta)
                .field("alpha", |i| &i.alpha, |i| &mut i.alpha)
                .member(
                    MemberDecl::field::<Item, u8>("mid", |i| &i.mid, |i| &mut i.mid)
                        .with(Directive::Access(AccessMode::ReadOnly))
                        .with(Directive::Inclusion(Inclusion::NonEmpty)),
                )
                .member(
                    MemberDecl::field::<Item, String>("secret", |i| &i.secret, |i| {
                        &mut i.secret
                    })
                    .with(Directive::Access(AccessMode::WriteOnly))
                    .with(Directive::Alias(vec!["password".into()])),
                )
                .member(
                    MemberDecl::field::<Item, BTreeMap<String, String>>(
                        "extra",
                        |i| &i.extra,
                        |i| &mut i.extra,
                    )
                    .with(Directive::AnyGetter)
                    .with(Directive::AnySetter),
                )
                .directive(Directive::Order(vec!["mid".into()]))
                .default_creator(Item::default)
                .build()
        }
    }

    fn encode_names(descriptor: &TypeDescriptor) -> Vec<&str> {
        descriptor
            .encode
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    #[test]
    fn encode_order_and_access() {
        let descriptor = describe::<Item>(false).unwrap();
        assert_eq!(encode_names(&descriptor), ["mid", "zeta", "alpha"]);
        assert_eq!(descriptor.encode.properties[0].inclusion, Inclusion::NonEmpty);
        assert!(descriptor.encode.any_getter.is_some());

        let sorted = describe::<Item>(true).unwrap();
        assert_eq!(encode_names(&sorted), ["mid", "alpha", "zeta"]);
    }

    #[test]
    fn decode_view() {
        let descriptor = describe::<Item>(false).unwrap();
        let decode = &descriptor.decode;

        assert!(decode.find("mid").is_none());
        assert!(decode.ignored.contains("mid"));
        let secret = decode.find("password").unwrap();
        assert_eq!(secret.name, "secret");
        assert!(matches!(decode.any_setter, Some(AnySetter::Map { .. })));

        let creator = decode.creator.as_ref().unwrap();
        assert_eq!(creator.kind, CreatorKind::Default);
        let created = (creator.invoke)(&mut crate::info::CreatorArgs::empty()).unwrap();
        assert!(created.downcast_ref::<Item>().is_some());
    }

    struct Pair {
        left: i32,
        right: i32,
    }

    impl GetTypeDecl for Pair {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Pair>::new()
                .field("left", |p| &p.left, |p| &mut p.left)
                .field("right", |p| &p.right, |p| &mut p.right)
                .creator(CreatorDecl::new::<Pair>(
                    "new",
                    vec![
                        ParamDecl::of::<i32>().named("left"),
                        ParamDecl::of::<i32>().named("right"),
                    ],
                    |args| {
                        Ok(Pair {
                            left: args.required(0)?,
                            right: args.required(1)?,
                        })
                    },
                ))
                .build()
        }
    }

    #[test]
    fn properties_creator_binds_by_name() {
        let descriptor = describe::<Pair>(false).unwrap();
        let creator = descriptor.decode.creator.as_ref().unwrap();
        assert_eq!(creator.kind, CreatorKind::Properties);
        assert_eq!(creator.params.len(), 2);
        assert!(matches!(
            descriptor.decode.find("right").unwrap().target,
            SetTarget::Creator(1)
        ));
    }

    struct Wrapper(String);

    impl GetTypeDecl for Wrapper {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Wrapper>::new()
                .creator(CreatorDecl::new::<Wrapper>(
                    "from_string",
                    vec![ParamDecl::of::<String>()],
                    crate::info::delegate(Wrapper),
                ))
                .creator(CreatorDecl::new::<Wrapper>(
                    "from_len",
                    vec![ParamDecl::of::<u32>()],
                    |args| Ok(Wrapper(alloc::format!("{}", args.required::<u32>(0)?))),
                ))
                .build()
        }
    }

    #[test]
    fn two_single_argument_creators_are_unresolved() {
        let error = describe::<Wrapper>(false).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::UnresolvedCreator { ref candidates, .. } if candidates.len() == 2
        ));
    }

    struct Designated(String);

    impl GetTypeDecl for Designated {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Designated>::new()
                .creator(CreatorDecl::new::<Designated>(
                    "from_string",
                    vec![ParamDecl::of::<String>()],
                    crate::info::delegate(Designated),
                ))
                .creator(
                    CreatorDecl::new::<Designated>(
                        "from_len",
                        vec![ParamDecl::of::<u32>()],
                        |args| {
                            Ok(Designated(alloc::format!("{}", args.required::<u32>(0)?)))
                        },
                    )
                    .with(Directive::Creator(CreatorMode::Auto)),
                )
                .build()
        }
    }

    #[test]
    fn designated_creator_wins() {
        let descriptor = describe::<Designated>(false).unwrap();
        let creator = descriptor.decode.creator.as_ref().unwrap();
        assert_eq!(creator.name, "from_len");
        assert_eq!(creator.kind, CreatorKind::Delegating);

        let mut args = crate::info::CreatorArgs::new(vec![Some(Box::new(4_u32) as Box<dyn Any>)]);
        let value = (creator.invoke)(&mut args).unwrap();
        assert_eq!(value.downcast_ref::<Designated>().unwrap().0, "4");
    }

    struct Broken {
        a: u8,
    }

    impl GetTypeDecl for Broken {
        fn type_decl() -> TypeDecl {
            ClassBuilder::<Broken>::new()
                .member(MemberDecl::accessor::<Broken, u8>("first", |b| b.a).with(Directive::AnyGetter))
                .member(MemberDecl::accessor::<Broken, u8>("second", |b| b.a).with(Directive::AnyGetter))
                .creator(CreatorDecl::new::<Broken>(
                    "new",
                    vec![ParamDecl::of::<u8>().named("a"), ParamDecl::of::<u8>()],
                    |args| Ok(Broken { a: args.required(0)? }),
                ))
                .build()
        }
    }

    #[test]
    fn every_conflict_is_reported() {
        let error = describe::<Broken>(false).unwrap_err();
        let ConfigError::Multiple(errors) = error else {
            panic!("expected several errors, got {error:?}");
        };
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::AmbiguousAnyProperty { direction: "getter", .. }
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::UnboundCreatorParameter { index: 1, .. }
        )));
    }
}
