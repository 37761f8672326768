use alloc::string::String;

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

use crate::info::MemberKind;

// -----------------------------------------------------------------------------
// NamingStrategy

/// Converts implicit property names; explicit names are kept as written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingStrategy {
    #[default]
    Identity,
    /// `lowerCamelCase`
    LowerCamel,
    /// `UpperCamelCase`
    UpperCamel,
    /// `snake_case`
    Snake,
    /// `kebab-case`
    Kebab,
    /// `SCREAMING_SNAKE_CASE`
    ScreamingSnake,
}

impl NamingStrategy {
    pub fn apply(self, name: &str) -> String {
        match self {
            NamingStrategy::Identity => String::from(name),
            NamingStrategy::LowerCamel => name.to_lower_camel_case(),
            NamingStrategy::UpperCamel => name.to_upper_camel_case(),
            NamingStrategy::Snake => name.to_snake_case(),
            NamingStrategy::Kebab => name.to_kebab_case(),
            NamingStrategy::ScreamingSnake => name.to_shouty_snake_case(),
        }
    }
}

// -----------------------------------------------------------------------------
// Default names

/// Strips `prefix` when it is followed by `_` or an uppercase letter.
fn strip_accessor_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    if let Some(rest) = rest.strip_prefix('_') {
        return (!rest.is_empty()).then_some(rest);
    }
    rest.chars()
        .next()
        .filter(char::is_ascii_uppercase)
        .map(|_| rest)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The logical name of a member without an explicit name.
///
/// Accessors lose a `get` prefix (or `is` when they return `bool`),
/// mutators lose a `set` prefix; the first letter is then lower-cased.
/// Field names are used as they are.
///
/// ```
/// use vc_bind::info::MemberKind;
/// use vc_bind::introspect::default_name;
///
/// assert_eq!(default_name(MemberKind::Accessor, "get_label", false), "label");
/// assert_eq!(default_name(MemberKind::Accessor, "isActive", true), "active");
/// assert_eq!(default_name(MemberKind::Mutator, "set_x", false), "x");
/// assert_eq!(default_name(MemberKind::Field, "Raw", false), "Raw");
/// ```
pub fn default_name(kind: MemberKind, name: &str, is_bool: bool) -> String {
    let stripped = match kind {
        MemberKind::Field => return String::from(name),
        MemberKind::Accessor => strip_accessor_prefix(name, "get").or_else(|| {
            if is_bool {
                strip_accessor_prefix(name, "is")
            } else {
                None
            }
        }),
        MemberKind::Mutator => strip_accessor_prefix(name, "set"),
    };
    lower_first(stripped.unwrap_or(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes() {
        assert_eq!(default_name(MemberKind::Accessor, "getName", false), "name");
        assert_eq!(default_name(MemberKind::Accessor, "getaway", false), "getaway");
        assert_eq!(default_name(MemberKind::Accessor, "get", false), "get");
        assert_eq!(default_name(MemberKind::Accessor, "get_", false), "get_");
        assert_eq!(default_name(MemberKind::Accessor, "is_open", false), "is_open");
        assert_eq!(default_name(MemberKind::Accessor, "is_open", true), "open");
        assert_eq!(default_name(MemberKind::Mutator, "setURL", false), "uRL");
        assert_eq!(default_name(MemberKind::Mutator, "settle", false), "settle");
    }

    #[test]
    fn strategies() {
        assert_eq!(NamingStrategy::Identity.apply("first_name"), "first_name");
        assert_eq!(NamingStrategy::LowerCamel.apply("first_name"), "firstName");
        assert_eq!(NamingStrategy::UpperCamel.apply("first_name"), "FirstName");
        assert_eq!(NamingStrategy::Snake.apply("firstName"), "first_name");
        assert_eq!(NamingStrategy::Kebab.apply("firstName"), "first-name");
        assert_eq!(NamingStrategy::ScreamingSnake.apply("firstName"), "FIRST_NAME");
    }
}
