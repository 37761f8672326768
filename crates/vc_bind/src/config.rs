use serde::{Deserialize, Serialize};

use crate::info::{Inclusion, VisibilityPolicy};
use crate::introspect::NamingStrategy;

/// Mapper-wide settings.
///
/// Deserializable, so settings can come from a configuration file; missing
/// keys take their defaults.
///
/// ```
/// use vc_bind::MapperConfig;
///
/// let config: MapperConfig = serde_json::from_str(r#"{ "max_depth": 16 }"#).unwrap();
/// assert_eq!(config.max_depth, 16);
/// assert!(config.fail_on_unknown_properties);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Sorts properties by name unless a type says otherwise.
    pub sort_properties_alphabetically: bool,
    /// Inclusion of properties without their own directive.
    pub default_inclusion: Inclusion,
    pub fail_on_unknown_properties: bool,
    /// Nesting limit of a single encode or decode call.
    pub max_depth: usize,
    /// Applied to implicit property names.
    pub naming: NamingStrategy,
    /// Minimum visibility for members to be detected.
    pub visibility: VisibilityPolicy,
    /// Keeps invisible fields and mutators of properties that have a
    /// visible accessor.
    pub infer_property_mutators: bool,
    /// Writes entries of unordered maps sorted by key.
    pub order_map_entries_by_keys: bool,
    pub detect_cycles: bool,
    /// Rejects input continuing after the root value.
    pub fail_on_trailing_tokens: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            sort_properties_alphabetically: false,
            default_inclusion: Inclusion::Always,
            fail_on_unknown_properties: true,
            max_depth: 128,
            naming: NamingStrategy::Identity,
            visibility: VisibilityPolicy::default(),
            infer_property_mutators: true,
            order_map_entries_by_keys: false,
            detect_cycles: true,
            fail_on_trailing_tokens: false,
        }
    }
}
