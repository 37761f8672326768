use core::fmt;

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// Visibility

/// Declared visibility of a member or creator.
///
/// Ordered from least to most visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    Crate,
    Public,
}

/// The least visibility a member needs to be auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinVisibility {
    /// Every member qualifies.
    Any,
    /// `Crate` and `Public` members qualify.
    NonPrivate,
    /// Only `Public` members qualify.
    PublicOnly,
    /// Nothing is auto-detected; members need an explicit include.
    None,
}

impl MinVisibility {
    #[inline]
    pub fn admits(self, visibility: Visibility) -> bool {
        match self {
            MinVisibility::Any => true,
            MinVisibility::NonPrivate => visibility >= Visibility::Crate,
            MinVisibility::PublicOnly => visibility == Visibility::Public,
            MinVisibility::None => false,
        }
    }
}

// -----------------------------------------------------------------------------
// MemberRole

/// The role a candidate plays for its logical property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRole {
    Field,
    Accessor,
    Mutator,
    CreatorParam,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Field => "field",
            MemberRole::Accessor => "accessor",
            MemberRole::Mutator => "mutator",
            MemberRole::CreatorParam => "creator parameter",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// VisibilityPolicy

/// Auto-detection thresholds per member role.
///
/// The mapper default can be replaced per type with
/// [`Directive::AutoDetect`](crate::info::Directive::AutoDetect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityPolicy {
    pub field: MinVisibility,
    pub accessor: MinVisibility,
    pub mutator: MinVisibility,
    pub creator: MinVisibility,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            field: MinVisibility::PublicOnly,
            accessor: MinVisibility::PublicOnly,
            mutator: MinVisibility::Any,
            creator: MinVisibility::Any,
        }
    }
}

impl VisibilityPolicy {
    /// A policy that detects every member regardless of visibility.
    pub const ALL: Self = Self {
        field: MinVisibility::Any,
        accessor: MinVisibility::Any,
        mutator: MinVisibility::Any,
        creator: MinVisibility::Any,
    };

    #[inline]
    pub fn min_for(&self, role: MemberRole) -> MinVisibility {
        match role {
            MemberRole::Field => self.field,
            MemberRole::Accessor => self.accessor,
            MemberRole::Mutator => self.mutator,
            MemberRole::CreatorParam => self.creator,
        }
    }
}

// -----------------------------------------------------------------------------
// VisibilityChecker

/// Decides whether a member is auto-detected.
///
/// Implemented for closures, so a custom rule can be injected with
/// [`MapperBuilder::visibility_checker`](crate::MapperBuilder::visibility_checker).
pub trait VisibilityChecker: Send + Sync {
    fn is_visible(
        &self,
        role: MemberRole,
        visibility: Visibility,
        policy: &VisibilityPolicy,
    ) -> bool;
}

/// Applies the [`VisibilityPolicy`] thresholds as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVisibilityChecker;

impl VisibilityChecker for DefaultVisibilityChecker {
    #[inline]
    fn is_visible(
        &self,
        role: MemberRole,
        visibility: Visibility,
        policy: &VisibilityPolicy,
    ) -> bool {
        policy.min_for(role).admits(visibility)
    }
}

impl<F> VisibilityChecker for F
where
    F: Fn(MemberRole, Visibility, &VisibilityPolicy) -> bool + Send + Sync,
{
    #[inline]
    fn is_visible(
        &self,
        role: MemberRole,
        visibility: Visibility,
        policy: &VisibilityPolicy,
    ) -> bool {
        self(role, visibility, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = VisibilityPolicy::default();
        let checker = DefaultVisibilityChecker;

        assert!(checker.is_visible(MemberRole::Field, Visibility::Public, &policy));
        assert!(!checker.is_visible(MemberRole::Field, Visibility::Private, &policy));
        assert!(!checker.is_visible(MemberRole::Accessor, Visibility::Crate, &policy));
        assert!(checker.is_visible(MemberRole::Mutator, Visibility::Private, &policy));
    }

    #[test]
    fn closure_checker() {
        let nothing = |_: MemberRole, _: Visibility, _: &VisibilityPolicy| false;
        assert!(!nothing.is_visible(
            MemberRole::Field,
            Visibility::Public,
            &VisibilityPolicy::ALL
        ));
    }

    #[test]
    fn min_visibility_order() {
        assert!(MinVisibility::NonPrivate.admits(Visibility::Crate));
        assert!(!MinVisibility::NonPrivate.admits(Visibility::Private));
        assert!(!MinVisibility::None.admits(Visibility::Public));
    }
}
