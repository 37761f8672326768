use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::fmt;

use log::debug;

use crate::error::{AccessError, ReferenceChain, ResolveError};
use crate::hash::{HashMap, HashSet};
use crate::info::{
    ClassDecl, ClassKind, CreateFn, CreatorDecl, Directives, GetMutFn, HandleFn, MemberAccess,
    MemberDecl, MemberKind, MemberSignature, ProjectFn, SuperLink, TypeKey, Visibility, entry_fn,
    get_fn, get_mut_fn, project_fn, set_fn,
};
use crate::registry::{MetadataSource, OverlayRegistry};

use super::{AnnotationSource, annotation_sources};

// -----------------------------------------------------------------------------
// Annotated model

/// One entry of a supertype chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupertypeRef {
    pub key: TypeKey,
    /// `true` for embedded parents, `false` for abstract bases and interfaces.
    pub is_class: bool,
}

/// A member of an [`AnnotatedType`] with its merged directives.
#[derive(Clone)]
pub struct AnnotatedMember {
    kind: MemberKind,
    name: String,
    declaring: TypeKey,
    level: usize,
    visibility: Visibility,
    value_type: TypeKey,
    key_type: Option<TypeKey>,
    directives: Directives,
    access: MemberAccess,
}

impl AnnotatedMember {
    fn new(decl: &MemberDecl, declaring: TypeKey, level: usize, access: MemberAccess) -> Self {
        Self {
            kind: decl.kind(),
            name: String::from(decl.name()),
            declaring,
            level,
            visibility: decl.visibility(),
            value_type: *decl.value_type(),
            key_type: decl.key_type().copied(),
            directives: decl.directives().clone(),
            access,
        }
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most-derived type declaring this member.
    #[inline]
    pub fn declaring(&self) -> &TypeKey {
        &self.declaring
    }

    /// The position of the declaring type in the hierarchy, `0` for the
    /// annotated type itself.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn value_type(&self) -> &TypeKey {
        &self.value_type
    }

    #[inline]
    pub fn key_type(&self) -> Option<&TypeKey> {
        self.key_type.as_ref()
    }

    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// The access functions, composed with the projection of the declaring
    /// parent.
    #[inline]
    pub fn access(&self) -> &MemberAccess {
        &self.access
    }

    /// A `Type::member` label for diagnostics.
    pub fn label(&self) -> String {
        alloc::format!("{}::{}", self.declaring.name(), self.name)
    }
}

impl fmt::Debug for AnnotatedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedMember")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("declaring", &self.declaring)
            .field("level", &self.level)
            .field("directives", &self.directives)
            .finish()
    }
}

/// A creator parameter with its merged directives.
#[derive(Debug, Clone)]
pub struct AnnotatedParam {
    pub value_type: TypeKey,
    pub directives: Directives,
}

/// A creator of an [`AnnotatedType`] with its merged directives.
#[derive(Clone)]
pub struct AnnotatedCreator {
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<AnnotatedParam>,
    pub directives: Directives,
    pub invoke: Option<CreateFn>,
}

impl AnnotatedCreator {
    fn new(decl: &CreatorDecl) -> Self {
        Self {
            name: String::from(decl.name()),
            visibility: decl.visibility(),
            params: decl
                .params()
                .iter()
                .map(|param| AnnotatedParam {
                    value_type: *param.value_type(),
                    directives: param.directives().clone(),
                })
                .collect(),
            directives: decl.directives().clone(),
            invoke: decl.invoke().cloned(),
        }
    }

    fn param_types(&self) -> Vec<core::any::TypeId> {
        self.params.iter().map(|p| p.value_type.id()).collect()
    }
}

impl fmt::Debug for AnnotatedCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedCreator")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("directives", &self.directives)
            .finish()
    }
}

/// A record type with its hierarchy, merged directives and members.
///
/// Built once per type by [`collect`] and shared afterwards.
#[derive(Clone)]
pub struct AnnotatedType {
    key: TypeKey,
    kind: ClassKind,
    chain: Vec<SupertypeRef>,
    directives: Directives,
    members: Vec<AnnotatedMember>,
    creators: Vec<AnnotatedCreator>,
    sources: Vec<AnnotationSource>,
    view: Option<ProjectFn>,
    back_handle: Option<HandleFn>,
}

impl AnnotatedType {
    #[inline]
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Supertypes: embedded parents first, then abstract bases and
    /// interfaces, each group most-derived first.
    #[inline]
    pub fn chain(&self) -> &[SupertypeRef] {
        &self.chain
    }

    /// Type-level directives merged over every [source](Self::sources).
    #[inline]
    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Members with data access, base-class members first.
    #[inline]
    pub fn members(&self) -> &[AnnotatedMember] {
        &self.members
    }

    #[inline]
    pub fn creators(&self) -> &[AnnotatedCreator] {
        &self.creators
    }

    #[inline]
    pub fn sources(&self) -> &[AnnotationSource] {
        &self.sources
    }

    #[inline]
    pub fn view(&self) -> Option<&ProjectFn> {
        self.view.as_ref()
    }

    #[inline]
    pub fn back_handle(&self) -> Option<&HandleFn> {
        self.back_handle.as_ref()
    }

    /// Returns `true` if `ty` is this type or one of its supertypes.
    pub fn is_a(&self, ty: &TypeKey) -> bool {
        self.key == *ty || self.chain.iter().any(|s| s.key == *ty)
    }
}

impl fmt::Debug for AnnotatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatedType")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("chain", &self.chain)
            .field("directives", &self.directives)
            .field("members", &self.members)
            .field("creators", &self.creators)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Projections

#[derive(Clone)]
struct Projection {
    project: ProjectFn,
    project_mut: GetMutFn,
}

impl Projection {
    fn then(&self, project: &ProjectFn, project_mut: &GetMutFn) -> Projection {
        let (outer, inner) = (self.project.clone(), project.clone());
        let (outer_mut, inner_mut) = (self.project_mut.clone(), project_mut.clone());
        Projection {
            project: project_fn(move |value| inner(outer(value)?)),
            project_mut: get_mut_fn(move |value| inner_mut(outer_mut(value)?)),
        }
    }
}

/// Reaches a parent member through the projection from the annotated type.
fn project_access(access: &MemberAccess, path: &Projection, parent: &TypeKey) -> MemberAccess {
    let parent_path = parent.path();
    MemberAccess {
        get: access.get.clone().map(|get| {
            let project = path.project.clone();
            get_fn(move |owner| get(project(owner)?))
        }),
        get_mut: access.get_mut.clone().map(|get_mut| {
            let project_mut = path.project_mut.clone();
            get_mut_fn(move |owner| get_mut(project_mut(owner)?))
        }),
        set: access.set.clone().map(|set| {
            let project_mut = path.project_mut.clone();
            set_fn(move |owner, value| {
                let parent = project_mut(owner).ok_or(AccessError::Downcast {
                    expected: parent_path,
                })?;
                set(parent, value)
            })
        }),
        set_entry: access.set_entry.clone().map(|set_entry| {
            let project_mut = path.project_mut.clone();
            entry_fn(move |owner, key, value| {
                let parent = project_mut(owner).ok_or(AccessError::Downcast {
                    expected: parent_path,
                })?;
                set_entry(parent, key, value)
            })
        }),
    }
}

// -----------------------------------------------------------------------------
// Collection

enum LevelAccess {
    Own,
    Projected(Projection),
    Directives,
}

struct Level<'a> {
    key: TypeKey,
    decl: Option<&'a ClassDecl>,
    access: LevelAccess,
    is_class: bool,
}

/// Walks the supertypes breadth-first, classes before interfaces.
fn hierarchy<'a>(source: &'a dyn MetadataSource, root: &'a ClassDecl) -> Vec<Level<'a>> {
    let mut visited: HashSet<core::any::TypeId> = HashSet::default();
    visited.insert(root.key().id());

    let mut classes = Vec::new();
    let mut interfaces = Vec::new();
    let mut queue: VecDeque<(&'a ClassDecl, Option<Projection>)> = VecDeque::new();
    queue.push_back((root, None));
    let mut is_root = true;

    while let Some((decl, path)) = queue.pop_front() {
        for link in decl.supers() {
            let target = *link.target();
            if !visited.insert(target.id()) {
                continue;
            }
            let target_decl = source.type_decl(target.id()).and_then(|d| d.as_record());

            let access = match link {
                SuperLink::Embedded {
                    project,
                    project_mut,
                    ..
                } if is_root || path.is_some() => {
                    let projection = match &path {
                        Some(outer) => outer.then(project, project_mut),
                        None => Projection {
                            project: project.clone(),
                            project_mut: project_mut.clone(),
                        },
                    };
                    LevelAccess::Projected(projection)
                }
                _ => LevelAccess::Directives,
            };

            if let Some(target_decl) = target_decl {
                let next_path = match &access {
                    LevelAccess::Projected(p) => Some(p.clone()),
                    _ => None,
                };
                queue.push_back((target_decl, next_path));
            }

            let level = Level {
                key: target,
                decl: target_decl,
                is_class: link.is_class(),
                access,
            };
            if level.is_class {
                classes.push(level);
            } else {
                interfaces.push(level);
            }
        }
        is_root = false;
    }

    let mut levels = Vec::with_capacity(1 + classes.len() + interfaces.len());
    levels.push(Level {
        key: *root.key(),
        decl: Some(root),
        access: LevelAccess::Own,
        is_class: true,
    });
    levels.extend(classes);
    levels.extend(interfaces);
    levels
}

/// Builds the [`AnnotatedType`] of a record type.
///
/// Members are walked from the most-derived level to the least. A member
/// whose signature was already seen only contributes the directives the
/// more-derived declaration lacks. Overlay members never provide access;
/// an overlay member matching no real member is discarded.
pub fn collect(
    source: &dyn MetadataSource,
    overlays: &OverlayRegistry,
    ty: &TypeKey,
) -> Result<AnnotatedType, ResolveError> {
    let decl = source
        .type_decl(ty.id())
        .ok_or(ResolveError::UnresolvedType {
            ty: ty.path(),
            chain: ReferenceChain::default(),
        })?
        .as_record()
        .ok_or(ResolveError::NotRecord { ty: ty.path() })?;

    let levels = hierarchy(source, decl);
    let chain: Vec<SupertypeRef> = levels[1..]
        .iter()
        .map(|level| SupertypeRef {
            key: level.key,
            is_class: level.is_class,
        })
        .collect();
    let chain_keys: Vec<TypeKey> = chain.iter().map(|s| s.key).collect();
    let sources = annotation_sources(decl.key(), &chain_keys);

    let directives = collect_type_directives(&levels, overlays, &sources);
    let members = collect_members(&levels, overlays);
    let creators = collect_creators(decl, overlays);

    Ok(AnnotatedType {
        key: *decl.key(),
        kind: decl.kind(),
        chain,
        directives,
        members,
        creators,
        sources,
        view: decl.view().cloned(),
        back_handle: decl.back_handle().cloned(),
    })
}

fn collect_type_directives(
    levels: &[Level<'_>],
    overlays: &OverlayRegistry,
    sources: &[AnnotationSource],
) -> Directives {
    let declared = |key: &TypeKey| {
        levels
            .iter()
            .find(|level| level.key == *key)
            .and_then(|level| level.decl)
            .map(ClassDecl::directives)
    };

    let mut directives = Directives::new();
    for source in sources {
        let set = match source {
            AnnotationSource::Overlay(key) => overlays.get(key.id()).map(ClassDecl::directives),
            AnnotationSource::Own(key) | AnnotationSource::Supertype(key) => declared(key),
            AnnotationSource::Root => overlays.root().map(ClassDecl::directives),
        };
        let Some(set) = set else { continue };
        for directive in set.iter() {
            if directive.kind().is_type_level() {
                directives.add_if_absent(directive.clone());
            }
        }
    }
    directives
}

fn collect_members(levels: &[Level<'_>], overlays: &OverlayRegistry) -> Vec<AnnotatedMember> {
    let mut members: Vec<AnnotatedMember> = Vec::new();
    let mut index: HashMap<MemberSignature, usize> = HashMap::default();
    let mut pending: Vec<(usize, &MemberDecl)> = Vec::new();

    for (level_index, level) in levels.iter().enumerate() {
        if let Some(decl) = level.decl {
            for member in decl.members() {
                let access = match (&level.access, member.access()) {
                    (LevelAccess::Own, Some(access)) => access.clone(),
                    (LevelAccess::Projected(path), Some(access)) => {
                        project_access(access, path, &level.key)
                    }
                    _ => MemberAccess::default(),
                };

                match index.get(&member.signature()) {
                    Some(&i) => {
                        let existing = &mut members[i];
                        existing.directives.add_missing(member.directives());
                        if existing.access.is_empty() && !access.is_empty() {
                            existing.access = access;
                            existing.visibility = member.visibility();
                        }
                    }
                    None => {
                        index.insert(member.signature(), members.len());
                        members.push(AnnotatedMember::new(member, level.key, level_index, access));
                    }
                }
            }
        }

        if let Some(overlay) = overlays.get(level.key.id()) {
            for member in overlay.members() {
                match index.get(&member.signature()) {
                    Some(&i) if members[i].level == level_index => {
                        members[i].directives.override_with(member.directives());
                    }
                    Some(&i) => members[i].directives.add_missing(member.directives()),
                    None => pending.push((level_index, member)),
                }
            }
        }
    }

    // Pending overlay members can only match members declared further up;
    // the least-derived overlay goes first so the most-derived one wins.
    for (level_index, member) in pending.iter().rev() {
        match index.get(&member.signature()) {
            Some(&i) => members[i].directives.override_with(member.directives()),
            None => debug!(
                "discarding overlay member `{}` of `{}`: no matching member",
                member.name(),
                levels[*level_index].key,
            ),
        }
    }

    if let Some(root) = overlays.root() {
        for member in root.members() {
            match index.get(&member.signature()) {
                Some(&i) => members[i].directives.add_missing(member.directives()),
                None => debug!(
                    "discarding root overlay member `{}`: no matching member",
                    member.name()
                ),
            }
        }
    }

    members.retain(|member| !member.access.is_empty());
    members.sort_by_key(|member| Reverse(member.level));
    members
}

fn collect_creators(decl: &ClassDecl, overlays: &OverlayRegistry) -> Vec<AnnotatedCreator> {
    let mut creators: Vec<AnnotatedCreator> = decl
        .creators()
        .iter()
        .filter(|creator| creator.invoke().is_some())
        .map(AnnotatedCreator::new)
        .collect();

    let Some(overlay) = overlays.get(decl.key().id()) else {
        return creators;
    };

    for mixin in overlay.creators() {
        let wanted = mixin.param_types();
        let mut matched = None;
        for (index, creator) in creators.iter().enumerate() {
            if matched.is_none() && creator.param_types() == wanted {
                matched = Some(index);
            }
        }

        match matched {
            Some(index) => {
                let creator = &mut creators[index];
                creator.directives.override_with(mixin.directives());
                for (param, mixin_param) in creator.params.iter_mut().zip(mixin.params()) {
                    param.directives.override_with(mixin_param.directives());
                }
            }
            None => debug!(
                "discarding overlay creator `{}` of `{}`: no creator with matching parameters",
                mixin.name(),
                decl.key(),
            ),
        }
    }
    creators
}

// -----------------------------------------------------------------------------
// Tests
