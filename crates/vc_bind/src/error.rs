use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use thiserror::Error;

// -----------------------------------------------------------------------------
// ValuePath

/// One step from a parent value into a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A record property.
    Property(String),
    /// A sequence element.
    Index(usize),
    /// A map entry.
    Key(String),
}

/// The location of a value inside the document being converted.
///
/// Displayed in a JSONPath-like form: `$.items[2].name`.
///
/// Paths are built while an error propagates out of nested converters,
/// so the segment closest to the root is prepended last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuePath {
    segments: Vec<PathSegment>,
}

impl ValuePath {
    /// The document root.
    #[inline]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Returns the segments from the root to the failure point.
    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Adds a segment on the root side of the path.
    #[inline]
    pub fn prepend(&mut self, segment: PathSegment) {
        self.segments.insert(0, segment);
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Property(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) => write!(f, "[\"{key}\"]")?,
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ReferenceChain

/// One reference followed while resolving a converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLink {
    /// The type that holds the reference.
    pub owner: &'static str,
    /// How the reference is reached, such as `.name`, `[]` or `{}`.
    pub via: String,
}

/// The references that led the resolver to a type, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceChain(pub Vec<ReferenceLink>);

impl fmt::Display for ReferenceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (index, link) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}{}", link.owner, link.via)?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Error kinds

/// Conflicts found while building the property model of a record type.
///
/// These are raised once per type and are never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("ambiguous {role} for property `{property}` of `{ty}`: `{first}` and `{second}`")]
    AmbiguousProperty {
        ty: &'static str,
        property: String,
        role: &'static str,
        first: String,
        second: String,
    },

    #[error("conflicting explicit names for property `{property}` of `{ty}`: {names:?}")]
    ConflictingNames {
        ty: &'static str,
        property: String,
        names: Vec<String>,
    },

    #[error("multiple any-{direction} members on `{ty}`: `{first}` and `{second}`")]
    AmbiguousAnyProperty {
        ty: &'static str,
        direction: &'static str,
        first: String,
        second: String,
    },

    #[error("invalid any-property member `{member}` on `{ty}`: {reason}")]
    InvalidAnyProperty {
        ty: &'static str,
        member: String,
        reason: &'static str,
    },

    #[error("cannot choose a creator for `{ty}` among {candidates:?}")]
    UnresolvedCreator {
        ty: &'static str,
        candidates: Vec<String>,
    },

    #[error("parameter #{index} of creator `{creator}` on `{ty}` has no property name")]
    UnboundCreatorParameter {
        ty: &'static str,
        creator: String,
        index: usize,
    },

    #[error("property `{property}` is bound twice by the creator of `{ty}`")]
    DuplicateCreatorProperty { ty: &'static str, property: String },

    #[error("{}", display_all(.0))]
    Multiple(Vec<ConfigError>),
}

fn display_all(errors: &[ConfigError]) -> String {
    use alloc::string::ToString;

    let mut out = String::new();
    for (index, error) in errors.iter().enumerate() {
        if index > 0 {
            out.push_str("; ");
        }
        out.push_str(&error.to_string());
    }
    out
}

impl ConfigError {
    /// Folds a non-empty list of errors into one error.
    pub fn collect(mut errors: Vec<ConfigError>) -> Option<ConfigError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ConfigError::Multiple(errors)),
        }
    }
}

/// Failures to produce a converter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("no converter for `{ty}` (reached through {chain})")]
    UnresolvedType {
        ty: &'static str,
        chain: ReferenceChain,
    },

    #[error("`{ty}` is abstract and carries no type discriminator")]
    AbstractType { ty: &'static str },

    #[error("`{ty}` has no usable creator")]
    MissingCreator { ty: &'static str },

    #[error("`{ty}` is not a record type")]
    NotRecord { ty: &'static str },
}

/// Discriminator failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolymorphicError {
    #[error("unrecognized type id `{id}` for base type `{base}`")]
    UnrecognizedSubtype { id: String, base: &'static str },

    #[error("missing type id property `{property}` for base type `{base}`")]
    MissingDiscriminator {
        base: &'static str,
        property: String,
    },

    #[error("expected {expected} holding the type id of `{base}`, found {found}")]
    InvalidDiscriminatorLocation {
        base: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("`{ty}` is not a subtype of `{base}`")]
    UnassignableSubtype { ty: &'static str, base: &'static str },
}

/// Failures raised by declared access functions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("value is not a `{expected}`")]
    Downcast { expected: &'static str },

    #[error("missing creator argument #{index}")]
    MissingArgument { index: usize },

    #[error("{0}")]
    Custom(String),
}

/// Failures of a single encode or decode call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("trailing tokens after the root value")]
    TrailingTokens,

    #[error("decoded a `{found}` where a `{expected}` was requested")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown property `{name}` for `{ty}`")]
    UnknownProperty { name: String, ty: &'static str },

    #[error("unknown variant `{name}` for `{ty}`")]
    UnknownVariant { name: String, ty: &'static str },

    #[error("value {value} is out of range for `{target}`")]
    OutOfRange {
        value: String,
        target: &'static str,
    },

    #[error("missing creator property `{name}` for `{ty}`")]
    MissingCreatorProperty { name: String, ty: &'static str },

    #[error("cycle detected while encoding `{ty}`")]
    Cycle { ty: &'static str },

    #[error("recursion limit of {limit} exceeded")]
    DepthExceeded { limit: usize },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Custom(String),
}

// -----------------------------------------------------------------------------
// BindError

/// The error type of every mapper operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BindError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{error} at {path}")]
    Polymorphic {
        path: ValuePath,
        error: PolymorphicError,
    },

    #[error("{error} at {path}")]
    Value { path: ValuePath, error: ValueError },
}

impl BindError {
    /// Prepends a path segment to value-level errors.
    ///
    /// Configuration and resolution errors have no document location
    /// and are returned unchanged.
    pub fn with_segment(mut self, segment: PathSegment) -> Self {
        match &mut self {
            BindError::Polymorphic { path, .. } | BindError::Value { path, .. } => {
                path.prepend(segment);
            }
            BindError::Config(_) | BindError::Resolve(_) => {}
        }
        self
    }

    /// Returns the document location of a value-level error.
    pub fn path(&self) -> Option<&ValuePath> {
        match self {
            BindError::Polymorphic { path, .. } | BindError::Value { path, .. } => Some(path),
            BindError::Config(_) | BindError::Resolve(_) => None,
        }
    }

    #[inline]
    pub fn custom(message: impl Into<String>) -> Self {
        ValueError::Custom(message.into()).into()
    }
}

impl From<ValueError> for BindError {
    #[inline]
    fn from(error: ValueError) -> Self {
        BindError::Value {
            path: ValuePath::root(),
            error,
        }
    }
}

impl From<PolymorphicError> for BindError {
    #[inline]
    fn from(error: PolymorphicError) -> Self {
        BindError::Polymorphic {
            path: ValuePath::root(),
            error,
        }
    }
}

impl From<AccessError> for BindError {
    #[inline]
    fn from(error: AccessError) -> Self {
        ValueError::Access(error).into()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::*;

    #[test]
    fn path_is_built_from_the_leaf_outwards() {
        let error = BindError::from(ValueError::UnexpectedEnd)
            .with_segment(PathSegment::Property("name".into()))
            .with_segment(PathSegment::Index(2))
            .with_segment(PathSegment::Property("items".into()));

        let path = error.path().unwrap();
        assert_eq!(path.to_string(), "$.items[2].name");
        assert_eq!(error.to_string(), "unexpected end of input at $.items[2].name");
    }

    #[test]
    fn config_errors_ignore_segments() {
        let error = BindError::from(ResolveError::AbstractType { ty: "Shape" })
            .with_segment(PathSegment::Key("k".into()));
        assert!(error.path().is_none());
    }

    #[test]
    fn collect_folds_errors() {
        assert!(ConfigError::collect(vec![]).is_none());

        let one = ConfigError::DuplicateCreatorProperty {
            ty: "T",
            property: "x".into(),
        };
        assert_eq!(ConfigError::collect(vec![one.clone()]), Some(one.clone()));

        let many = ConfigError::collect(vec![one.clone(), one]).unwrap();
        assert!(matches!(many, ConfigError::Multiple(ref v) if v.len() == 2));
        assert!(many.to_string().contains("; "));
    }

    #[test]
    fn reference_chain_display() {
        let chain = ReferenceChain(vec![
            ReferenceLink {
                owner: "Outer",
                via: ".inner".into(),
            },
            ReferenceLink {
                owner: "Vec<Inner>",
                via: "[]".into(),
            },
        ]);
        assert_eq!(chain.to_string(), "Outer.inner -> Vec<Inner>[]");
        assert_eq!(ReferenceChain::default().to_string(), "<root>");
    }
}
