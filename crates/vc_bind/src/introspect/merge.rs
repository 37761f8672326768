use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::TypeId;

use indexmap::IndexMap;

use crate::error::ConfigError;
use crate::hash::HashSet;
use crate::info::{MemberKind, MemberRole, TypeKey, VisibilityChecker, VisibilityPolicy};

use super::{AnnotatedType, NamingStrategy, default_name};

// -----------------------------------------------------------------------------
// Candidates

/// What a [`PropertyCandidate`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    /// An index into [`AnnotatedType::members`].
    Member(usize),
    /// A parameter of an entry of [`AnnotatedType::creators`].
    Param { creator: usize, index: usize },
}

/// One member considered for a logical property.
#[derive(Debug, Clone)]
pub struct PropertyCandidate {
    pub source: CandidateSource,
    pub role: MemberRole,
    pub implicit_name: String,
    /// The explicit name; an empty name only marks the member as included.
    pub explicit_name: Option<String>,
    pub visible: bool,
    pub ignored: bool,
    /// Explicitly named or included.
    pub included: bool,
    pub level: usize,
    pub declaring: TypeKey,
    pub label: String,
}

/// A named property and the candidates that survived the merge.
///
/// Each list refers to [`PropertyModel::candidates`]. After the merge the
/// field, accessor and mutator lists hold at most one entry each.
#[derive(Debug, Clone, Default)]
pub struct LogicalProperty {
    pub name: String,
    /// The implicit name the property was grouped under.
    pub internal_name: String,
    pub fields: Vec<usize>,
    pub accessors: Vec<usize>,
    pub mutators: Vec<usize>,
    pub params: Vec<usize>,
}

impl LogicalProperty {
    #[inline]
    pub fn field(&self) -> Option<usize> {
        self.fields.first().copied()
    }

    #[inline]
    pub fn accessor(&self) -> Option<usize> {
        self.accessors.first().copied()
    }

    #[inline]
    pub fn mutator(&self) -> Option<usize> {
        self.mutators.first().copied()
    }

    fn list_mut(&mut self, role: MemberRole) -> &mut Vec<usize> {
        match role {
            MemberRole::Field => &mut self.fields,
            MemberRole::Accessor => &mut self.accessors,
            MemberRole::Mutator => &mut self.mutators,
            MemberRole::CreatorParam => &mut self.params,
        }
    }
}

/// The conflict-resolved properties of one record type.
#[derive(Debug, Clone)]
pub struct PropertyModel {
    pub ty: TypeKey,
    pub candidates: Vec<PropertyCandidate>,
    /// Properties in declaration order: fields, then methods, then
    /// creator parameters.
    pub properties: IndexMap<String, LogicalProperty>,
    /// Names removed by ignore directives; input keys with these names are
    /// skipped when decoding.
    pub ignored: HashSet<String>,
    /// Members carrying the any-getter directive.
    pub any_getters: Vec<usize>,
    /// Members carrying the any-setter directive.
    pub any_setters: Vec<usize>,
    pub errors: Vec<ConfigError>,
}

// -----------------------------------------------------------------------------
// Merge

/// Inputs of [`merge`] that come from the mapper configuration.
pub struct MergeOptions<'a> {
    pub naming: NamingStrategy,
    pub policy: VisibilityPolicy,
    pub checker: &'a dyn VisibilityChecker,
    /// Keeps invisible fields and mutators of a property with a visible
    /// accessor.
    pub infer_property_mutators: bool,
}

fn role_of(kind: MemberKind) -> MemberRole {
    match kind {
        MemberKind::Field => MemberRole::Field,
        MemberKind::Accessor => MemberRole::Accessor,
        MemberKind::Mutator => MemberRole::Mutator,
    }
}

/// Groups the members of `ty` into logical properties.
///
/// Conflicts are collected in [`PropertyModel::errors`] rather than
/// returned, so one call reports every problem of the type.
pub fn merge(ty: &AnnotatedType, options: &MergeOptions<'_>) -> PropertyModel {
    let policy = ty
        .directives()
        .auto_detect()
        .copied()
        .unwrap_or(options.policy);

    let mut model = PropertyModel {
        ty: *ty.key(),
        candidates: Vec::new(),
        properties: IndexMap::new(),
        ignored: HashSet::default(),
        any_getters: Vec::new(),
        any_setters: Vec::new(),
        errors: Vec::new(),
    };

    // Candidates: fields first, then accessors and mutators.
    let members = ty.members();
    let field_pass = members.iter().enumerate().filter(|(_, m)| m.kind() == MemberKind::Field);
    let method_pass = members.iter().enumerate().filter(|(_, m)| m.kind() != MemberKind::Field);

    for (index, member) in field_pass.chain(method_pass) {
        let directives = member.directives();
        if directives.ignored() == Some(true)
            && (directives.is_any_getter() || directives.is_any_setter())
        {
            continue;
        }
        if directives.is_any_getter() {
            model.any_getters.push(index);
        }
        if directives.is_any_setter() {
            model.any_setters.push(index);
        }
        if directives.is_any_getter() || directives.is_any_setter() || member.key_type().is_some()
        {
            continue;
        }

        let role = role_of(member.kind());
        let explicit_name = directives.rename().map(String::from);
        let included = directives.is_included() || explicit_name.is_some();
        let is_bool = member.value_type().id() == TypeId::of::<bool>();

        model.candidates.push(PropertyCandidate {
            source: CandidateSource::Member(index),
            role,
            implicit_name: default_name(member.kind(), member.name(), is_bool),
            explicit_name,
            visible: included || options.checker.is_visible(role, member.visibility(), &policy),
            ignored: directives.ignored() == Some(true),
            included,
            level: member.level(),
            declaring: *member.declaring(),
            label: member.label(),
        });
    }

    // Group by implicit name.
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (id, candidate) in model.candidates.iter().enumerate() {
        groups
            .entry(candidate.implicit_name.clone())
            .or_default()
            .push(id);
    }

    // Ignorals.
    let candidates = &model.candidates;
    let mut kept: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (name, mut ids) in groups {
        if !ids.iter().any(|&i| candidates[i].ignored) {
            kept.insert(name, ids);
            continue;
        }
        let rescued = ids
            .iter()
            .any(|&i| !candidates[i].ignored && candidates[i].included);
        if rescued {
            ids.retain(|&i| !candidates[i].ignored);
            kept.insert(name, ids);
        } else {
            for &i in &ids {
                if let Some(explicit) = &candidates[i].explicit_name
                    && !explicit.is_empty()
                {
                    model.ignored.insert(explicit.clone());
                }
            }
            model.ignored.insert(name);
        }
    }

    // Visibility.
    for ids in kept.values_mut() {
        let visible_accessor = ids
            .iter()
            .any(|&i| candidates[i].role == MemberRole::Accessor && candidates[i].visible);
        ids.retain(|&i| {
            let candidate = &candidates[i];
            candidate.visible
                || (options.infer_property_mutators
                    && visible_accessor
                    && matches!(candidate.role, MemberRole::Field | MemberRole::Mutator))
        });
    }
    kept.retain(|_, ids| !ids.is_empty());

    // Renaming, then regrouping by the final name.
    let mut renamed: IndexMap<String, (String, Vec<usize>)> = IndexMap::new();
    for (implicit, ids) in kept {
        let mut names: Vec<&str> = Vec::new();
        for &i in &ids {
            if let Some(explicit) = candidates[i].explicit_name.as_deref()
                && !explicit.is_empty()
                && !names.contains(&explicit)
            {
                names.push(explicit);
            }
        }

        let name = match names.as_slice() {
            [] => options.naming.apply(&implicit),
            [one] => one.to_string(),
            _ => {
                model.errors.push(ConfigError::ConflictingNames {
                    ty: ty.key().path(),
                    property: implicit,
                    names: names.iter().map(ToString::to_string).collect(),
                });
                continue;
            }
        };

        renamed
            .entry(name)
            .or_insert_with(|| (implicit, Vec::new()))
            .1
            .extend(ids);
    }

    // Named creator parameters bind to the property of that name.
    for (creator_index, creator) in ty.creators().iter().enumerate() {
        for (index, param) in creator.params.iter().enumerate() {
            let Some(name) = param.directives.rename().filter(|n| !n.is_empty()) else {
                continue;
            };
            let id = model.candidates.len();
            model.candidates.push(PropertyCandidate {
                source: CandidateSource::Param {
                    creator: creator_index,
                    index,
                },
                role: MemberRole::CreatorParam,
                implicit_name: String::from(name),
                explicit_name: Some(String::from(name)),
                visible: true,
                ignored: false,
                included: true,
                level: 0,
                declaring: *ty.key(),
                label: alloc::format!("{}::{}#{index}", ty.key().name(), creator.name),
            });
            renamed
                .entry(String::from(name))
                .or_insert_with(|| (String::from(name), Vec::new()))
                .1
                .push(id);
        }
    }

    // Type-level ignored names.
    if let Some(names) = ty.directives().ignored_properties() {
        for name in names {
            renamed.shift_remove(name);
            model.ignored.insert(name.clone());
        }
    }

    // One candidate per role; the most-derived declaration wins.
    let candidates = &model.candidates;
    for (name, (internal_name, ids)) in renamed {
        let mut property = LogicalProperty {
            name: name.clone(),
            internal_name,
            ..LogicalProperty::default()
        };
        for id in ids {
            property.list_mut(candidates[id].role).push(id);
        }

        for role in [MemberRole::Field, MemberRole::Accessor, MemberRole::Mutator] {
            let list = property.list_mut(role);
            if list.len() <= 1 {
                continue;
            }
            let Some(best) = list.iter().map(|&i| candidates[i].level).min() else {
                continue;
            };
            let at_best: Vec<usize> = list
                .iter()
                .copied()
                .filter(|&i| candidates[i].level == best)
                .collect();
            if let [first, second, ..] = at_best.as_slice() {
                model.errors.push(ConfigError::AmbiguousProperty {
                    ty: ty.key().path(),
                    property: name.clone(),
                    role: role.as_str(),
                    first: candidates[*first].label.clone(),
                    second: candidates[*second].label.clone(),
                });
            }
            *list = alloc::vec![at_best[0]];
        }

        model.properties.insert(name, property);
    }

    model
}

// -----------------------------------------------------------------------------
// Tests
