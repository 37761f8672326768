use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use log::debug;

use crate::convert::Decoder;
use crate::error::ConfigError;
use crate::hash::{HashMap, HashSet};
use crate::info::{
    AccessMode, CreateFn, CreatorMode, EntrySetFn, GetFn, GetMutFn, MemberKind, MemberRole, SetFn,
    TypeKey,
};
use crate::introspect::{AnnotatedCreator, CandidateSource};

use super::{DescriptorOptions, Parts, flatten};

// -----------------------------------------------------------------------------
// View types

/// Where a decoded property value goes.
#[derive(Clone)]
pub enum SetTarget {
    /// The argument slot of the creator.
    Creator(usize),
    /// A mutator or field of the created instance.
    Setter(SetFn),
}

impl fmt::Debug for SetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetTarget::Creator(index) => f.debug_tuple("Creator").field(index).finish(),
            SetTarget::Setter(_) => f.write_str("Setter"),
        }
    }
}

/// A property accepted during decoding.
#[derive(Clone)]
pub struct DecodeProperty {
    pub name: String,
    pub value_type: TypeKey,
    pub target: SetTarget,
    pub converter: Option<Arc<dyn Decoder>>,
}

impl fmt::Debug for DecodeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeProperty")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("target", &self.target)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorKind {
    /// A no-argument creator; properties are set afterwards.
    Default,
    /// Named parameters, filled from buffered properties.
    Properties,
    /// One unnamed parameter decoded from the whole value.
    Delegating,
}

/// One parameter of the chosen creator.
#[derive(Clone)]
pub struct BoundParam {
    pub name: Option<String>,
    pub value_type: TypeKey,
    pub converter: Option<Arc<dyn Decoder>>,
}

impl fmt::Debug for BoundParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundParam")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// The creator used to instantiate a record.
#[derive(Clone)]
pub struct CreatorBinding {
    pub kind: CreatorKind,
    pub name: String,
    pub invoke: CreateFn,
    pub params: Vec<BoundParam>,
}

impl fmt::Debug for CreatorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatorBinding")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Receives input properties that match no declared property.
#[derive(Clone)]
pub enum AnySetter {
    /// A key/value mutator.
    Entry {
        member: String,
        set: EntrySetFn,
        value_type: TypeKey,
    },
    /// A string-keyed map field, filled in place.
    Map {
        member: String,
        get_mut: GetMutFn,
        insert: EntrySetFn,
        value_type: TypeKey,
    },
}

impl AnySetter {
    #[inline]
    pub fn value_type(&self) -> &TypeKey {
        match self {
            AnySetter::Entry { value_type, .. } | AnySetter::Map { value_type, .. } => value_type,
        }
    }
}

impl fmt::Debug for AnySetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnySetter::Entry { member, .. } => f.debug_tuple("Entry").field(member).finish(),
            AnySetter::Map { member, .. } => f.debug_tuple("Map").field(member).finish(),
        }
    }
}

/// A field holding children whose back references point at the owner.
#[derive(Clone)]
pub struct ManagedReference {
    /// The reference name shared with the children's back-reference property.
    pub reference: String,
    pub property: String,
    pub value_type: TypeKey,
    pub get: GetFn,
    pub get_mut: GetMutFn,
}

impl fmt::Debug for ManagedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedReference")
            .field("reference", &self.reference)
            .field("property", &self.property)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// What decoding a record accepts and how it builds the value.
#[derive(Clone, Default)]
pub struct DecodeView {
    pub properties: Vec<DecodeProperty>,
    /// Property names and aliases to indices of `properties`.
    pub lookup: HashMap<String, usize>,
    pub creator: Option<CreatorBinding>,
    pub any_setter: Option<AnySetter>,
    /// Input names skipped without error.
    pub ignored: HashSet<String>,
    pub ignore_unknown: bool,
    pub managed: Vec<ManagedReference>,
    /// Back-reference setters by reference name.
    pub back_references: HashMap<String, SetFn>,
}

impl DecodeView {
    /// Finds a property by name or alias.
    #[inline]
    pub fn find(&self, name: &str) -> Option<&DecodeProperty> {
        self.lookup.get(name).map(|&index| &self.properties[index])
    }

    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// The property bound to creator argument `index`.
    pub fn creator_property(&self, index: usize) -> Option<&DecodeProperty> {
        self.properties
            .iter()
            .find(|p| matches!(p.target, SetTarget::Creator(i) if i == index))
    }
}

impl fmt::Debug for DecodeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeView")
            .field("properties", &self.properties)
            .field("creator", &self.creator)
            .field("any_setter", &self.any_setter)
            .field("ignored", &self.ignored)
            .field("ignore_unknown", &self.ignore_unknown)
            .field("managed", &self.managed)
            .field("back_references", &self.back_references.keys().collect::<Vec<_>>())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Building

pub(super) fn build(
    parts: &Parts<'_>,
    options: &DescriptorOptions<'_>,
    errors: &mut Vec<ConfigError>,
) -> DecodeView {
    let mut view = DecodeView {
        ignored: parts.model.ignored.clone(),
        ignore_unknown: parts.ty.directives().ignore_unknown().unwrap_or(false),
        ..DecodeView::default()
    };

    let chosen = choose_creator(parts, options, errors);
    let (creator_index, binding) = match chosen {
        Some((index, binding)) => (Some(index), Some(binding)),
        None => (None, None),
    };
    let properties_creator = creator_index.filter(|_| {
        binding
            .as_ref()
            .is_some_and(|b| b.kind == CreatorKind::Properties)
    });
    let mut bound = alloc::vec![false; binding.as_ref().map_or(0, |b| b.params.len())];

    for property in parts.model.properties.values() {
        let mut everything = alloc::vec![property.mutator(), property.field()];
        everything.extend(flatten(&property.params));
        everything.push(property.accessor());

        if let Some(reference) = parts.find(&everything, |d| d.back_reference()) {
            match setter_of(parts, property.mutator(), property.field()) {
                Some((set, _)) => {
                    view.back_references.insert(String::from(reference), set);
                }
                None => debug!(
                    "back reference `{}` of `{}` has no setter",
                    property.name,
                    parts.ty.key()
                ),
            }
            view.ignored.insert(property.name.clone());
            continue;
        }

        if parts.find(&everything, |d| d.access()) == Some(AccessMode::ReadOnly) {
            view.ignored.insert(property.name.clone());
            continue;
        }

        let param = property.params.iter().find_map(|&candidate| {
            match parts.model.candidates[candidate].source {
                CandidateSource::Param { creator, index } if Some(creator) == properties_creator => {
                    Some((creator, index))
                }
                _ => None,
            }
        });

        let (target, value_type) = match param {
            Some((creator, index)) => {
                bound[index] = true;
                let ty = parts.ty.creators()[creator].params[index].value_type;
                (SetTarget::Creator(index), ty)
            }
            None => match setter_of(parts, property.mutator(), property.field()) {
                Some((set, ty)) => (SetTarget::Setter(set), ty),
                None => {
                    view.ignored.insert(property.name.clone());
                    continue;
                }
            },
        };

        if let Some(reference) = parts.find(&everything, |d| d.managed_reference()) {
            managed_reference(parts, property.field(), reference, &property.name, &mut view);
        }

        let index = view.properties.len();
        view.properties.push(DecodeProperty {
            name: property.name.clone(),
            value_type,
            target,
            converter: parts.find(&everything, |d| {
                d.converter().and_then(|converter| converter.decoder.clone())
            }),
        });
        view.lookup.entry(property.name.clone()).or_insert(index);
        for candidate in everything.iter().flatten() {
            for alias in parts.directives(*candidate).aliases() {
                view.lookup.entry(alias.clone()).or_insert(index);
            }
        }
    }

    // Creator parameters whose property was removed by name still receive input.
    if let Some(binding) = &binding
        && binding.kind == CreatorKind::Properties
    {
        for (index, param) in binding.params.iter().enumerate() {
            let Some(name) = param.name.as_ref().filter(|_| !bound[index]) else {
                continue;
            };
            view.ignored.remove(name);
            view.lookup.insert(name.clone(), view.properties.len());
            view.properties.push(DecodeProperty {
                name: name.clone(),
                value_type: param.value_type,
                target: SetTarget::Creator(index),
                converter: param.converter.clone(),
            });
        }
    }

    view.creator = binding;
    view.any_setter = any_setter(parts, errors);
    view
}

fn setter_of(
    parts: &Parts<'_>,
    mutator: Option<usize>,
    field: Option<usize>,
) -> Option<(SetFn, TypeKey)> {
    [mutator, field].into_iter().flatten().find_map(|candidate| {
        let member = parts.member(candidate)?;
        Some((member.access().set.clone()?, *member.value_type()))
    })
}

fn managed_reference(
    parts: &Parts<'_>,
    field: Option<usize>,
    reference: &str,
    property: &str,
    view: &mut DecodeView,
) {
    let member = field.and_then(|candidate| parts.member(candidate));
    let access = member.and_then(|m| Some((m.access().get.clone()?, m.access().get_mut.clone()?)));
    match (member, access) {
        (Some(member), Some((get, get_mut))) => view.managed.push(ManagedReference {
            reference: String::from(reference),
            property: String::from(property),
            value_type: *member.value_type(),
            get,
            get_mut,
        }),
        _ => debug!(
            "managed reference `{reference}` of `{}` needs a field",
            parts.ty.key()
        ),
    }
}

// -----------------------------------------------------------------------------
// Creator choice

fn is_named(creator: &AnnotatedCreator, index: usize) -> bool {
    creator.params[index]
        .directives
        .rename()
        .is_some_and(|name| !name.is_empty())
}

fn infer_kind(creator: &AnnotatedCreator) -> CreatorKind {
    match creator.params.len() {
        0 => CreatorKind::Default,
        1 if !is_named(creator, 0) => CreatorKind::Delegating,
        _ => CreatorKind::Properties,
    }
}

/// Picks the creator: a designated one, else a visible no-argument one,
/// else the only candidate with named parameters or a single parameter.
fn choose_creator(
    parts: &Parts<'_>,
    options: &DescriptorOptions<'_>,
    errors: &mut Vec<ConfigError>,
) -> Option<(usize, CreatorBinding)> {
    let creators = parts.ty.creators();
    let policy = parts
        .ty
        .directives()
        .auto_detect()
        .copied()
        .unwrap_or(options.policy);
    let unresolved = |ids: &[usize]| ConfigError::UnresolvedCreator {
        ty: parts.ty_path(),
        candidates: ids.iter().map(|&i| creators[i].name.clone()).collect(),
    };

    let designated: Vec<usize> = (0..creators.len())
        .filter(|&i| creators[i].directives.creator_mode().is_some())
        .collect();

    let (index, kind) = match designated.as_slice() {
        [index] => {
            let creator = &creators[*index];
            let kind = match creator.directives.creator_mode() {
                Some(CreatorMode::Properties) => CreatorKind::Properties,
                Some(CreatorMode::Delegating) => CreatorKind::Delegating,
                _ => infer_kind(creator),
            };
            (*index, kind)
        }
        [_, _, ..] => {
            errors.push(unresolved(&designated));
            return None;
        }
        [] => {
            let visible: Vec<usize> = (0..creators.len())
                .filter(|&i| {
                    options
                        .checker
                        .is_visible(MemberRole::CreatorParam, creators[i].visibility, &policy)
                })
                .collect();

            if let Some(&index) = visible.iter().find(|&&i| creators[i].params.is_empty()) {
                (index, CreatorKind::Default)
            } else {
                let multi: Vec<usize> = visible
                    .iter()
                    .copied()
                    .filter(|&i| {
                        let c = &creators[i];
                        c.params.len() > 1 && (0..c.params.len()).any(|p| is_named(c, p))
                    })
                    .collect();
                match multi.as_slice() {
                    [index] => (*index, CreatorKind::Properties),
                    [_, _, ..] => {
                        errors.push(unresolved(&multi));
                        return None;
                    }
                    [] => {
                        let single: Vec<usize> = visible
                            .iter()
                            .copied()
                            .filter(|&i| creators[i].params.len() == 1)
                            .collect();
                        match single.as_slice() {
                            [index] => (*index, infer_kind(&creators[*index])),
                            [_, _, ..] => {
                                errors.push(unresolved(&single));
                                return None;
                            }
                            [] => return None,
                        }
                    }
                }
            }
        }
    };

    let creator = &creators[index];
    match kind {
        CreatorKind::Properties => {
            let mut seen: HashSet<&str> = HashSet::default();
            let mut valid = true;
            for (param_index, param) in creator.params.iter().enumerate() {
                match param.directives.rename().filter(|name| !name.is_empty()) {
                    None => {
                        errors.push(ConfigError::UnboundCreatorParameter {
                            ty: parts.ty_path(),
                            creator: creator.name.clone(),
                            index: param_index,
                        });
                        valid = false;
                    }
                    Some(name) if !seen.insert(name) => {
                        errors.push(ConfigError::DuplicateCreatorProperty {
                            ty: parts.ty_path(),
                            property: String::from(name),
                        });
                        valid = false;
                    }
                    Some(_) => {}
                }
            }
            if !valid {
                return None;
            }
        }
        CreatorKind::Delegating if creator.params.len() != 1 => {
            errors.push(unresolved(&[index]));
            return None;
        }
        CreatorKind::Delegating | CreatorKind::Default => {}
    }

    let invoke = creator.invoke.clone()?;
    Some((
        index,
        CreatorBinding {
            kind,
            name: creator.name.clone(),
            invoke,
            params: creator
                .params
                .iter()
                .map(|param| BoundParam {
                    name: param
                        .directives
                        .rename()
                        .filter(|name| !name.is_empty())
                        .map(String::from),
                    value_type: param.value_type,
                    converter: param
                        .directives
                        .converter()
                        .and_then(|converter| converter.decoder.clone()),
                })
                .collect(),
        },
    ))
}

// -----------------------------------------------------------------------------
// Any-setter

fn any_setter(parts: &Parts<'_>, errors: &mut Vec<ConfigError>) -> Option<AnySetter> {
    let members = parts.ty.members();
    let (first, rest) = parts.model.any_setters.split_first()?;
    if let Some(second) = rest.first() {
        errors.push(ConfigError::AmbiguousAnyProperty {
            ty: parts.ty_path(),
            direction: "setter",
            first: members[*first].label(),
            second: members[*second].label(),
        });
        return None;
    }

    let member = &members[*first];
    let access = member.access();
    if let Some(set) = &access.set_entry {
        return Some(AnySetter::Entry {
            member: member.label(),
            set: set.clone(),
            value_type: *member.value_type(),
        });
    }

    let map = parts
        .source
        .type_decl(member.value_type().id())
        .and_then(|decl| decl.as_map());
    match (member.kind(), map, &access.get_mut) {
        (MemberKind::Field, Some(map), Some(get_mut)) => Some(AnySetter::Map {
            member: member.label(),
            get_mut: get_mut.clone(),
            insert: map.insert.clone(),
            value_type: map.value,
        }),
        _ => {
            errors.push(ConfigError::InvalidAnyProperty {
                ty: parts.ty_path(),
                member: member.label(),
                reason: "an any-setter must take a key and a value, or be a string-keyed map field",
            });
            None
        }
    }
}
