use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::convert::Encoder;
use crate::error::ConfigError;
use crate::info::{AccessMode, EntriesFn, GetFn, Inclusion, MemberKind, TypeKey};

use super::{DescriptorOptions, Parts, flatten};

/// A property written during encoding.
#[derive(Clone)]
pub struct EncodeProperty {
    pub name: String,
    pub value_type: TypeKey,
    /// Reads the value; an accessor is preferred over a field.
    pub get: GetFn,
    pub inclusion: Inclusion,
    /// An explicit converter from a member directive.
    pub converter: Option<Arc<dyn Encoder>>,
}

impl fmt::Debug for EncodeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeProperty")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("inclusion", &self.inclusion)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

/// A member whose map entries are written as extra properties.
#[derive(Clone)]
pub struct AnyGetter {
    pub member: String,
    pub get: GetFn,
    pub entries: EntriesFn,
    /// The map's value type.
    pub value_type: TypeKey,
}

impl fmt::Debug for AnyGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyGetter")
            .field("member", &self.member)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// The properties of a record in output order.
#[derive(Debug, Clone, Default)]
pub struct EncodeView {
    pub properties: Vec<EncodeProperty>,
    pub any_getter: Option<AnyGetter>,
}

impl EncodeView {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.name.as_str())
    }
}

pub(super) fn build(
    parts: &Parts<'_>,
    options: &DescriptorOptions<'_>,
    errors: &mut Vec<ConfigError>,
) -> EncodeView {
    let type_directives = parts.ty.directives();
    let type_inclusion = type_directives
        .inclusion()
        .unwrap_or(options.default_inclusion);

    let mut properties: Vec<EncodeProperty> = Vec::new();
    for property in parts.model.properties.values() {
        let accessor = property.accessor();
        let field = property.field();
        let order = [accessor, field];

        let mut everything = order.to_vec();
        everything.push(property.mutator());
        everything.extend(flatten(&property.params));

        let access = parts.find(&everything, |d| d.access());
        if access == Some(AccessMode::WriteOnly)
            || parts.find(&everything, |d| d.back_reference()).is_some()
        {
            continue;
        }

        let reader = order.iter().flatten().find_map(|&candidate| {
            let member = parts.member(candidate)?;
            Some((member.access().get.clone()?, *member.value_type()))
        });
        let Some((get, value_type)) = reader else {
            continue;
        };

        properties.push(EncodeProperty {
            name: property.name.clone(),
            value_type,
            get,
            inclusion: parts
                .find(&everything, |d| d.inclusion())
                .unwrap_or(type_inclusion),
            converter: parts.find(&everything, |d| {
                d.converter().and_then(|converter| converter.encoder.clone())
            }),
        });
    }

    let sort = type_directives
        .sort_alphabetically()
        .unwrap_or(options.sort_alphabetically);
    if sort {
        properties.sort_by(|a, b| a.name.cmp(&b.name));
    }

    if let Some(order) = type_directives.order() {
        let mut ordered = Vec::with_capacity(properties.len());
        for name in order {
            if let Some(index) = properties.iter().position(|p| &p.name == name) {
                ordered.push(properties.remove(index));
            }
        }
        ordered.append(&mut properties);
        properties = ordered;
    }

    EncodeView {
        properties,
        any_getter: any_getter(parts, errors),
    }
}

fn any_getter(parts: &Parts<'_>, errors: &mut Vec<ConfigError>) -> Option<AnyGetter> {
    let members = parts.ty.members();
    let (first, rest) = parts.model.any_getters.split_first()?;
    if let Some(second) = rest.first() {
        errors.push(ConfigError::AmbiguousAnyProperty {
            ty: parts.ty_path(),
            direction: "getter",
            first: members[*first].label(),
            second: members[*second].label(),
        });
        return None;
    }

    let member = &members[*first];
    let invalid = |reason| ConfigError::InvalidAnyProperty {
        ty: parts.ty_path(),
        member: member.label(),
        reason,
    };

    if member.kind() == MemberKind::Mutator {
        errors.push(invalid("an any-getter must be a field or an accessor"));
        return None;
    }
    let map = parts
        .source
        .type_decl(member.value_type().id())
        .and_then(|decl| decl.as_map());
    let (Some(map), Some(get)) = (map, member.access().get.clone()) else {
        errors.push(invalid("an any-getter must return a string-keyed map"));
        return None;
    };

    Some(AnyGetter {
        member: member.label(),
        get,
        entries: map.entries.clone(),
        value_type: map.value,
    })
}
