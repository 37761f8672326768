use std::collections::BTreeMap;

use serde_json::json;
use vc_bind::error::{BindError, ValueError};
use vc_bind::info::{AccessMode, ClassBuilder, CreatorDecl, Directive, GetTypeDecl};
use vc_bind::info::{Inclusion, MemberDecl, ParamDecl, TypeDecl, TypeKey, delegate};
use vc_bind::introspect::NamingStrategy;
use vc_bind::{Mapper, MapperConfig};
use vc_bind_json::{JsonError, from_str, from_value, to_string, to_value};

fn value_error(error: JsonError) -> (String, ValueError) {
    match error {
        JsonError::Bind(BindError::Value { path, error }) => (path.to_string(), error),
        other => panic!("not a value error: {other}"),
    }
}

// -----------------------------------------------------------------------------
// Catch-all properties

#[derive(Debug, Default)]
struct Bag {
    a: i32,
    b: String,
    extra: BTreeMap<String, i64>,
}

impl GetTypeDecl for Bag {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Bag>::new()
            .field("a", |bag| &bag.a, |bag| &mut bag.a)
            .field("b", |bag| &bag.b, |bag| &mut bag.b)
            .member(
                MemberDecl::field::<Bag, BTreeMap<String, i64>>(
                    "extra",
                    |bag| &bag.extra,
                    |bag| &mut bag.extra,
                )
                .with(Directive::AnyGetter)
                .with(Directive::AnySetter),
            )
            .default_creator(Bag::default)
            .build()
    }
}

#[test]
fn any_properties_round_trip() {
    let mapper = Mapper::builder().register::<Bag>().build();

    let bag: Bag = from_str(&mapper, r#"{"a":1,"c":3,"b":"two"}"#).unwrap();
    assert_eq!((bag.a, bag.b.as_str()), (1, "two"));
    assert_eq!(bag.extra.get("c"), Some(&3));

    assert_eq!(to_string(&mapper, &bag).unwrap(), r#"{"a":1,"b":"two","c":3}"#);
}

#[test]
fn declared_properties_shadow_extra_entries() {
    let mapper = Mapper::builder().register::<Bag>().build();

    let mut bag = Bag {
        a: 1,
        b: String::from("two"),
        extra: BTreeMap::new(),
    };
    bag.extra.insert(String::from("a"), 99);
    bag.extra.insert(String::from("c"), 3);

    assert_eq!(to_string(&mapper, &bag).unwrap(), r#"{"a":1,"b":"two","c":3}"#);
}

#[test]
fn any_property_values_are_typed() {
    let mapper = Mapper::builder().register::<Bag>().build();

    let error = from_str::<Bag>(&mapper, r#"{"a":1,"c":"three"}"#).unwrap_err();
    let (path, error) = value_error(error);
    assert_eq!(path, "$.c");
    assert!(matches!(error, ValueError::UnexpectedToken { .. }));
}

// -----------------------------------------------------------------------------
// Creators

#[derive(Debug, PartialEq)]
struct Money {
    amount: i64,
    currency: String,
    note: Option<String>,
}

impl GetTypeDecl for Money {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Money>::new()
            .field("amount", |m| &m.amount, |m| &mut m.amount)
            .field("currency", |m| &m.currency, |m| &mut m.currency)
            .field("note", |m| &m.note, |m| &mut m.note)
            .creator(
                CreatorDecl::new::<Money>(
                    "new",
                    vec![
                        ParamDecl::of::<i64>().named("amount"),
                        ParamDecl::of::<String>().named("currency"),
                        ParamDecl::of::<Option<String>>().named("note"),
                    ],
                    |args| {
                        Ok(Money {
                            amount: args.required(0)?,
                            currency: args.required(1)?,
                            note: args.required(2)?,
                        })
                    },
                )
                .properties(),
            )
            .build()
    }
}

#[derive(Debug, PartialEq)]
struct Email(String);

impl GetTypeDecl for Email {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Email>::new()
            .creator(
                CreatorDecl::new::<Email>("parse", vec![ParamDecl::of::<String>()], delegate(Email))
                    .delegating(),
            )
            .build()
    }
}

#[test]
fn properties_creator() {
    let mapper = Mapper::builder().register::<Money>().build();

    let money: Money = from_str(&mapper, r#"{"currency":"EUR","amount":5}"#).unwrap();
    assert_eq!(
        money,
        Money {
            amount: 5,
            currency: "EUR".into(),
            note: None,
        }
    );

    let value = to_value(&mapper, &money).unwrap();
    assert_eq!(value, json!({"amount": 5, "currency": "EUR", "note": null}));
}

#[test]
fn missing_creator_property() {
    let mapper = Mapper::builder().register::<Money>().build();

    let error = from_str::<Money>(&mapper, r#"{"amount":5}"#).unwrap_err();
    let (path, error) = value_error(error);
    assert_eq!(path, "$");
    assert!(matches!(
        error,
        ValueError::MissingCreatorProperty { ref name, .. } if name == "currency"
    ));
}

#[test]
fn delegating_creator() {
    let mapper = Mapper::builder().register::<Email>().build();

    let email: Email = from_str(&mapper, r#""ada@example.com""#).unwrap();
    assert_eq!(email, Email("ada@example.com".into()));
}

// -----------------------------------------------------------------------------
// Names

#[derive(Default)]
struct Person {
    first_name: String,
    last_name: String,
    age: Option<u8>,
    secret: String,
}

impl GetTypeDecl for Person {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Person>::new()
            .field("first_name", |p| &p.first_name, |p| &mut p.first_name)
            .member(
                MemberDecl::field::<Person, String>(
                    "last_name",
                    |p| &p.last_name,
                    |p| &mut p.last_name,
                )
                .with(Directive::Alias(vec!["surname".into()])),
            )
            .member(
                MemberDecl::field::<Person, Option<u8>>("age", |p| &p.age, |p| &mut p.age)
                    .with(Directive::Inclusion(Inclusion::NonNull)),
            )
            .member(
                MemberDecl::field::<Person, String>("secret", |p| &p.secret, |p| &mut p.secret)
                    .with(Directive::Access(AccessMode::WriteOnly)),
            )
            .default_creator(Person::default)
            .build()
    }
}

fn camel_case_mapper() -> Mapper {
    Mapper::builder()
        .register::<Person>()
        .configure(|config| config.naming = NamingStrategy::LowerCamel)
        .build()
}

#[test]
fn naming_strategy_and_inclusion() {
    let mapper = camel_case_mapper();
    let person = Person {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        age: None,
        secret: "hidden".into(),
    };

    assert_eq!(
        to_string(&mapper, &person).unwrap(),
        r#"{"firstName":"Ada","lastName":"Lovelace"}"#
    );
}

#[test]
fn aliases_and_write_only_properties() {
    let mapper = camel_case_mapper();

    let value = json!({"firstName": "Ada", "surname": "Lovelace", "age": 36, "secret": "s"});
    let person: Person = from_value(&mapper, &value).unwrap();
    assert_eq!(person.last_name, "Lovelace");
    assert_eq!(person.age, Some(36));
    assert_eq!(person.secret, "s");
}

#[test]
fn introspection_is_repeatable() {
    let mapper = camel_case_mapper();
    let key = TypeKey::of::<Person>();

    let names = |mapper: &Mapper| -> Vec<String> {
        let descriptor = mapper.descriptor(&key).unwrap();
        descriptor
            .encode
            .properties
            .iter()
            .map(|property| property.name.clone())
            .collect()
    };

    let first = names(&mapper);
    mapper.flush_caches();
    let second = names(&mapper);

    assert_eq!(first, ["firstName", "lastName", "age"]);
    assert_eq!(first, second);
    assert_eq!(mapper.stats().descriptor_builds, 2);
}

// -----------------------------------------------------------------------------
// Unknown properties

#[derive(Debug, Default)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Debug, Default)]
struct Path {
    points: Vec<Point>,
}

#[derive(Default)]
struct Lenient {
    x: i32,
}

impl GetTypeDecl for Point {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Point>::new()
            .field("x", |p| &p.x, |p| &mut p.x)
            .field("y", |p| &p.y, |p| &mut p.y)
            .directive(Directive::IgnoredProperties(vec!["legacy".into()]))
            .default_creator(Point::default)
            .build()
    }
}

impl GetTypeDecl for Path {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Path>::new()
            .field("points", |p| &p.points, |p| &mut p.points)
            .default_creator(Path::default)
            .build()
    }
}

impl GetTypeDecl for Lenient {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Lenient>::new()
            .field("x", |l| &l.x, |l| &mut l.x)
            .directive(Directive::IgnoreUnknown(true))
            .default_creator(Lenient::default)
            .build()
    }
}

#[test]
fn unknown_property_path() {
    let mapper = Mapper::builder().register::<Path>().build();

    let value = json!({"points": [{"x": 1, "y": 2}, {"x": 3, "z": 4}]});
    let (path, error) = value_error(from_value::<Path>(&mapper, &value).unwrap_err());
    assert_eq!(path, "$.points[1].z");
    assert!(matches!(error, ValueError::UnknownProperty { ref name, .. } if name == "z"));
}

#[test]
fn ignored_and_unknown_properties() {
    let mapper = Mapper::builder()
        .register::<Point>()
        .register::<Lenient>()
        .build();

    let point: Point = from_str(&mapper, r#"{"x":1,"legacy":{"a":[1,2]},"y":2}"#).unwrap();
    assert_eq!((point.x, point.y), (1, 2));

    let lenient: Lenient = from_str(&mapper, r#"{"x":1,"w":[true]}"#).unwrap();
    assert_eq!(lenient.x, 1);

    let relaxed = Mapper::builder()
        .register::<Point>()
        .config(MapperConfig {
            fail_on_unknown_properties: false,
            ..MapperConfig::default()
        })
        .build();
    let point: Point = from_str(&relaxed, r#"{"x":5,"z":{}}"#).unwrap();
    assert_eq!(point.x, 5);
}

// -----------------------------------------------------------------------------
// Managed and back references

#[derive(Default)]
struct Tree {
    id: u32,
    leaves: Vec<Leaf>,
}

#[derive(Default)]
struct Leaf {
    name: String,
    tree: u32,
}

impl GetTypeDecl for Tree {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Tree>::new()
            .field("id", |t| &t.id, |t| &mut t.id)
            .member(
                MemberDecl::field::<Tree, Vec<Leaf>>("leaves", |t| &t.leaves, |t| &mut t.leaves)
                    .with(Directive::ManagedReference("tree".into())),
            )
            .back_handle(|tree: &Tree| tree.id)
            .default_creator(Tree::default)
            .build()
    }
}

impl GetTypeDecl for Leaf {
    fn type_decl() -> TypeDecl {
        ClassBuilder::<Leaf>::new()
            .field("name", |l| &l.name, |l| &mut l.name)
            .member(
                MemberDecl::field::<Leaf, u32>("tree", |l| &l.tree, |l| &mut l.tree)
                    .with(Directive::BackReference("tree".into())),
            )
            .default_creator(Leaf::default)
            .build()
    }
}

#[test]
fn back_references_are_filled() {
    let mapper = Mapper::builder().register::<Tree>().build();

    let value = json!({"id": 7, "leaves": [{"name": "a"}, {"name": "b"}]});
    let tree: Tree = from_value(&mapper, &value).unwrap();
    assert_eq!(tree.leaves.len(), 2);
    assert!(tree.leaves.iter().all(|leaf| leaf.tree == 7));

    // Back references are not written.
    assert_eq!(to_value(&mapper, &tree).unwrap(), value);
}

// -----------------------------------------------------------------------------
// Documents

#[test]
fn trailing_documents() {
    let lenient = Mapper::new();
    assert_eq!(from_str::<i32>(&lenient, "1 2").unwrap(), 1);

    let strict = Mapper::builder()
        .configure(|config| config.fail_on_trailing_tokens = true)
        .build();
    let (_, error) = value_error(from_str::<i32>(&strict, "1 2").unwrap_err());
    assert_eq!(error, ValueError::TrailingTokens);
    assert_eq!(from_str::<i32>(&strict, " 3 ").unwrap(), 3);
}

#[test]
fn malformed_text() {
    let mapper = Mapper::new();
    assert!(matches!(
        from_str::<i32>(&mapper, "{").unwrap_err(),
        JsonError::Json(_)
    ));
}
