//! Configuration for PATCH processing.
//!
//! [`PatchConfig`] switches the vendor compatibility rewrites on or off and
//! controls how lenient the engine is with unknown attributes and missing
//! targets. It deserializes from a camelCase JSON fragment in which every key
//! is optional.

use crate::error::ScimResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration for a [`PatchHandler`](crate::patch::PatchHandler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchConfig {
    /// Skip unknown attribute names instead of failing.
    pub ignore_unknown_attributes: bool,

    /// Treat REMOVE of an absent attribute and filters without any match as
    /// no-ops rather than `noTarget` failures.
    pub do_not_fail_on_no_target: bool,

    /// Rewrite Azure AD REMOVE operations that carry `{"value": ...}` objects
    /// instead of a path filter.
    pub ms_azure_remove_workaround: bool,

    /// Nest the dot-qualified keys Azure AD sends in REPLACE values.
    pub ms_azure_replace_workaround: bool,

    /// Wrap a scalar sent for a complex attribute as `{"value": <scalar>}`.
    pub ms_azure_complex_simple_value_workaround: bool,

    /// Unwrap `{"value": "<json object>"}` values into the embedded object.
    pub ms_azure_value_sub_attribute_workaround: bool,

    /// Let successive REPLACE operations on one complex attribute accumulate.
    pub sails_point_workaround: bool,

    /// Recompute `meta.version` whenever the resource changed.
    pub update_version: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            ignore_unknown_attributes: false,
            do_not_fail_on_no_target: false,
            ms_azure_remove_workaround: true,
            ms_azure_replace_workaround: true,
            ms_azure_complex_simple_value_workaround: false,
            ms_azure_value_sub_attribute_workaround: false,
            sails_point_workaround: false,
            update_version: true,
        }
    }
}

impl PatchConfig {
    /// Parse a configuration fragment. Missing keys keep their defaults.
    pub fn from_json(value: &Value) -> ScimResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Configuration with every vendor workaround disabled.
    pub fn strict() -> Self {
        Self {
            ms_azure_remove_workaround: false,
            ms_azure_replace_workaround: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PatchConfig::default();
        assert!(config.ms_azure_remove_workaround);
        assert!(config.ms_azure_replace_workaround);
        assert!(!config.sails_point_workaround);
        assert!(!config.ignore_unknown_attributes);
        assert!(config.update_version);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PatchConfig::from_json(&json!({
            "sailsPointWorkaround": true,
            "msAzureRemoveWorkaround": false
        }))
        .unwrap();
        assert!(config.sails_point_workaround);
        assert!(!config.ms_azure_remove_workaround);
        assert!(config.ms_azure_replace_workaround);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(PatchConfig::from_json(&json!({"sailsPointWorkaround": "yes"})).is_err());
    }

    #[test]
    fn test_strict_disables_workarounds() {
        let config = PatchConfig::strict();
        assert!(!config.ms_azure_remove_workaround);
        assert!(!config.ms_azure_replace_workaround);
    }
}
