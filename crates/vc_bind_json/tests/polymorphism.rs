use core::any::{Any, type_name};

use serde_json::json;
use vc_bind::error::{BindError, PolymorphicError};
use vc_bind::info::{ClassBuilder, Directive, GetTypeDecl, NamedType, TypeDecl};
use vc_bind::poly::{EmbedStyle, IdKind, TypeInfoSpec};
use vc_bind::{Mapper, MapperBuilder};
use vc_bind_json::{JsonError, from_str, from_value, to_string, to_value};

// -----------------------------------------------------------------------------
// Shapes

trait Shape: Any + core::fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Default, PartialEq)]
struct A {
    x: i32,
}

#[derive(Debug, Default, PartialEq)]
struct B {
    y: String,
}

/// Implements `Shape` without being listed as a subtype.
#[derive(Debug, Default, PartialEq)]
struct C {
    z: bool,
}

impl Shape for A {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Shape for B {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Shape for C {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl GetTypeDecl for Box<dyn Shape> {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Box<dyn Shape>>::new()
            .abstract_view(|shape| shape.as_any())
            .directive(Directive::TypeInfo(TypeInfoSpec::new(
                EmbedStyle::Property,
                IdKind::Name,
            )))
            .subtype(NamedType::of::<A>().named("A"))
            .subtype(NamedType::of::<B>().named("B"))
            .build()
    }
}

impl GetTypeDecl for A {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<A>::new()
            .field("x", |a| &a.x, |a| &mut a.x)
            .default_creator(A::default)
            .implements::<Box<dyn Shape>>(|a| Box::new(a) as Box<dyn Shape>)
            .build()
    }
}

impl GetTypeDecl for B {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<B>::new()
            .field("y", |b| &b.y, |b| &mut b.y)
            .default_creator(B::default)
            .implements::<Box<dyn Shape>>(|b| Box::new(b) as Box<dyn Shape>)
            .build()
    }
}

impl GetTypeDecl for C {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<C>::new()
            .field("z", |c| &c.z, |c| &mut c.z)
            .default_creator(C::default)
            .implements::<Box<dyn Shape>>(|c| Box::new(c) as Box<dyn Shape>)
            .build()
    }
}

fn builder() -> MapperBuilder {
    Mapper::builder().register::<Box<dyn Shape>>()
}

/// A mapper whose shapes use `spec` instead of their declared settings.
fn mapper_with(spec: TypeInfoSpec) -> Mapper {
    builder()
        .overlay(
            ClassBuilder::<Box<dyn Shape>>::new()
                .directive(Directive::TypeInfo(spec))
                .build_class(),
        )
        .build()
}

fn downcast<T: Any>(shape: &dyn Shape) -> &T {
    shape.as_any().downcast_ref::<T>().unwrap()
}

fn polymorphic_error(error: JsonError) -> PolymorphicError {
    match error {
        JsonError::Bind(BindError::Polymorphic { error, .. }) => error,
        other => panic!("not a polymorphic error: {other}"),
    }
}

// -----------------------------------------------------------------------------
// Tests

#[test]
fn property_style() {
    let mapper = builder().build();

    let shape: Box<dyn Shape> = Box::new(A { x: 3 });
    assert_eq!(to_string(&mapper, &shape).unwrap(), r#"{"@type":"A","x":3}"#);

    let back: Box<dyn Shape> = from_str(&mapper, r#"{"@type":"A","x":3}"#).unwrap();
    assert_eq!(downcast::<A>(&*back), &A { x: 3 });
}

#[test]
fn type_id_after_other_properties() {
    let mapper = builder().build();

    let back: Box<dyn Shape> = from_str(&mapper, r#"{"y":"late","@type":"B"}"#).unwrap();
    assert_eq!(downcast::<B>(&*back).y, "late");
}

#[test]
fn wrapper_array_style() {
    let mapper = mapper_with(TypeInfoSpec::new(EmbedStyle::WrapperArray, IdKind::Name));

    let shape: Box<dyn Shape> = Box::new(B { y: "hi".into() });
    assert_eq!(to_value(&mapper, &shape).unwrap(), json!(["B", {"y": "hi"}]));

    let back: Box<dyn Shape> = from_value(&mapper, &json!(["B", {"y": "hi"}])).unwrap();
    assert_eq!(downcast::<B>(&*back).y, "hi");
}

#[test]
fn wrapper_object_style() {
    let mapper = mapper_with(TypeInfoSpec::new(EmbedStyle::WrapperObject, IdKind::Name));

    let shape: Box<dyn Shape> = Box::new(A { x: 3 });
    assert_eq!(to_value(&mapper, &shape).unwrap(), json!({"A": {"x": 3}}));

    let back: Box<dyn Shape> = from_value(&mapper, &json!({"A": {"x": 3}})).unwrap();
    assert_eq!(downcast::<A>(&*back).x, 3);
}

#[test]
fn unrecognized_type_id() {
    let mapper = builder().build();

    let error = from_str::<Box<dyn Shape>>(&mapper, r#"{"@type":"C","x":1}"#).unwrap_err();
    match polymorphic_error(error) {
        PolymorphicError::UnrecognizedSubtype { id, .. } => assert_eq!(id, "C"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_type_id() {
    let mapper = builder().build();

    let error = from_str::<Box<dyn Shape>>(&mapper, r#"{"x":1}"#).unwrap_err();
    assert!(matches!(
        polymorphic_error(error),
        PolymorphicError::MissingDiscriminator { ref property, .. } if property == "@type"
    ));
}

#[test]
fn default_implementation_without_type_id() {
    let mapper = mapper_with(
        TypeInfoSpec::new(EmbedStyle::Property, IdKind::Name).default_impl::<A>(),
    );

    let back: Box<dyn Shape> = from_str(&mapper, r#"{"x":7}"#).unwrap();
    assert_eq!(downcast::<A>(&*back).x, 7);
}

#[test]
fn custom_type_property() {
    let mapper = mapper_with(TypeInfoSpec::new(EmbedStyle::Property, IdKind::Name).property("kind"));

    let shape: Box<dyn Shape> = Box::new(A { x: 1 });
    assert_eq!(to_string(&mapper, &shape).unwrap(), r#"{"kind":"A","x":1}"#);
}

#[test]
fn registered_subtype_with_logical_name() {
    let mapper = builder().named_subtype::<Box<dyn Shape>, C>("C").build();

    let back: Box<dyn Shape> = from_str(&mapper, r#"{"@type":"C","z":true}"#).unwrap();
    assert!(downcast::<C>(&*back).z);
}

#[test]
fn class_ids_resolve_registered_types() {
    let mapper = Mapper::builder()
        .register::<Box<dyn Shape>>()
        .register::<C>()
        .overlay(
            ClassBuilder::<Box<dyn Shape>>::new()
                .directive(Directive::TypeInfo(TypeInfoSpec::new(
                    EmbedStyle::Property,
                    IdKind::Class,
                )))
                .build_class(),
        )
        .build();

    let shape: Box<dyn Shape> = Box::new(C { z: true });
    let value = to_value(&mapper, &shape).unwrap();
    assert_eq!(value, json!({"@type": type_name::<C>(), "z": true}));

    let back: Box<dyn Shape> = from_value(&mapper, &value).unwrap();
    assert!(downcast::<C>(&*back).z);
}

#[test]
fn class_ids_need_a_lookup() {
    let mapper = Mapper::builder()
        .register::<Box<dyn Shape>>()
        .register::<C>()
        .use_registry_type_lookup(false)
        .overlay(
            ClassBuilder::<Box<dyn Shape>>::new()
                .directive(Directive::TypeInfo(TypeInfoSpec::new(
                    EmbedStyle::Property,
                    IdKind::Class,
                )))
                .build_class(),
        )
        .build();

    let value = json!({"@type": type_name::<C>(), "z": true});
    let error = from_value::<Box<dyn Shape>>(&mapper, &value).unwrap_err();
    assert!(matches!(
        polymorphic_error(error),
        PolymorphicError::UnrecognizedSubtype { .. }
    ));
}

#[test]
fn sequences_of_shapes() {
    let mapper = Mapper::builder().register::<Vec<Box<dyn Shape>>>().build();

    let shapes: Vec<Box<dyn Shape>> = vec![Box::new(A { x: 1 }), Box::new(B { y: "b".into() })];
    let value = to_value(&mapper, &shapes).unwrap();
    assert_eq!(
        value,
        json!([{"@type": "A", "x": 1}, {"@type": "B", "y": "b"}])
    );

    let back: Vec<Box<dyn Shape>> = from_value(&mapper, &value).unwrap();
    assert_eq!(downcast::<A>(&*back[0]).x, 1);
    assert_eq!(downcast::<B>(&*back[1]).y, "b");

    let bad = json!([{"@type": "A", "x": 1}, {"@type": "Z"}]);
    let error = from_value::<Vec<Box<dyn Shape>>>(&mapper, &bad).unwrap_err();
    let JsonError::Bind(error) = error else {
        panic!("not a binding error");
    };
    assert_eq!(error.path().unwrap().to_string(), "$[1]");
}
