//! Error types for SCIM PATCH and filter processing.
//!
//! Every failure the engine can produce is a [`ScimError`]. Each variant maps
//! onto one of the RFC 7644 `scimType` values so the transport layer can build
//! the wire [`ErrorResponse`] without re-deriving any detail text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Schema URI of the RFC 7644 §3.12 error message.
pub const ERROR_RESPONSE_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// Per-attribute error messages, keyed by the attribute's fully qualified name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Main error type for SCIM PATCH operations.
///
/// All variants are terminal: the engine never retries, and a failing
/// operation aborts the whole PATCH request.
#[derive(Debug, thiserror::Error)]
pub enum ScimError {
    /// The filter expression could not be parsed or references unknown attributes
    #[error("{message}")]
    InvalidFilter { message: String },

    /// The attribute path could not be resolved against the resource schemas
    #[error("{detail}")]
    InvalidPath { detail: String },

    /// A value does not conform to its attribute definition
    #[error("{detail}")]
    InvalidValue {
        detail: String,
        field_errors: FieldErrors,
    },

    /// A write violates the attribute's mutability
    #[error("{detail}")]
    Mutability { detail: String },

    /// A path or filter addressed nothing
    #[error("{detail}")]
    NoTarget { detail: String },

    /// The PATCH request body itself is malformed
    #[error("{detail}")]
    InvalidSyntax { detail: String },

    /// An attribute name is declared by none of the schemas in scope
    #[error("{detail}")]
    UnknownAttribute { detail: String },

    /// Schema not found errors
    #[error("Schema not found: {schema_id}")]
    SchemaNotFound { schema_id: String },

    /// Resource type not registered
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Convenience methods for creating common errors
impl ScimError {
    /// Create a filter parse error
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            message: message.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path(detail: impl Into<String>) -> Self {
        Self::InvalidPath {
            detail: detail.into(),
        }
    }

    /// Create an invalid value error without field errors
    pub fn invalid_value(detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            detail: detail.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Create a mutability error
    pub fn mutability(detail: impl Into<String>) -> Self {
        Self::Mutability {
            detail: detail.into(),
        }
    }

    /// Create a no-target error
    pub fn no_target(detail: impl Into<String>) -> Self {
        Self::NoTarget {
            detail: detail.into(),
        }
    }

    /// Create an invalid syntax error
    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            detail: detail.into(),
        }
    }

    /// Create an unknown attribute error
    pub fn unknown_attribute(detail: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            detail: detail.into(),
        }
    }

    /// Create a schema not found error
    pub fn schema_not_found(schema_id: impl Into<String>) -> Self {
        Self::SchemaNotFound {
            schema_id: schema_id.into(),
        }
    }

    /// The RFC 7644 `scimType` this error is reported with.
    pub fn scim_type(&self) -> ScimType {
        match self {
            Self::InvalidFilter { .. } => ScimType::InvalidFilter,
            Self::InvalidPath { .. } | Self::UnknownAttribute { .. } => ScimType::InvalidPath,
            Self::InvalidValue { .. } => ScimType::InvalidValue,
            Self::Mutability { .. } => ScimType::Mutability,
            Self::NoTarget { .. } => ScimType::NoTarget,
            Self::InvalidSyntax { .. } | Self::Json(_) => ScimType::InvalidSyntax,
            Self::SchemaNotFound { .. } | Self::UnknownResourceType(_) => ScimType::InvalidValue,
        }
    }

    /// Field errors recorded while validating values, if any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::InvalidValue { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    /// Build the wire error message for this error.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            schemas: vec![ERROR_RESPONSE_SCHEMA.to_string()],
            status: "400".to_string(),
            scim_type: Some(self.scim_type()),
            detail: self.to_string(),
            field_errors: self.field_errors().cloned(),
        }
    }
}

/// RFC 7644 §3.12 `scimType` values produced by the PATCH engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimType {
    InvalidPath,
    InvalidValue,
    InvalidFilter,
    Mutability,
    NoTarget,
    InvalidSyntax,
}

impl fmt::Display for ScimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidPath => "invalidPath",
            Self::InvalidValue => "invalidValue",
            Self::InvalidFilter => "invalidFilter",
            Self::Mutability => "mutability",
            Self::NoTarget => "noTarget",
            Self::InvalidSyntax => "invalidSyntax",
        };
        f.write_str(name)
    }
}

/// SCIM error message body as sent back to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub schemas: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimType>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

/// Accumulates validation messages for one value before it is surfaced as
/// a single [`ScimError::InvalidValue`].
///
/// Messages are kept per attribute in insertion order. Nested values are
/// validated into a child context and merged back, so errors of sibling
/// branches never interleave.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    field_errors: FieldErrors,
    first_error: Option<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against an attribute.
    pub fn add_error(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        let message = message.into();
        if self.first_error.is_none() {
            self.first_error = Some(message.clone());
        }
        self.field_errors
            .entry(attribute.into())
            .or_default()
            .push(message);
    }

    /// Append every message of `other` after the messages already recorded.
    pub fn merge(&mut self, other: ValidationContext) {
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
        for (attribute, messages) in other.field_errors {
            self.field_errors
                .entry(attribute)
                .or_default()
                .extend(messages);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }

    /// Messages recorded for one attribute.
    pub fn errors_for(&self, attribute: &str) -> &[String] {
        self.field_errors
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    /// Convert a non-empty context into an error whose detail is the first
    /// recorded message.
    pub fn into_result(self) -> ScimResult<()> {
        match self.first_error {
            None => Ok(()),
            Some(detail) => Err(ScimError::InvalidValue {
                detail,
                field_errors: self.field_errors,
            }),
        }
    }
}

// Result type aliases for convenience
pub type ScimResult<T> = Result<T, ScimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scim_type_mapping() {
        assert_eq!(
            ScimError::invalid_filter("bad").scim_type(),
            ScimType::InvalidFilter
        );
        assert_eq!(
            ScimError::unknown_attribute("x").scim_type(),
            ScimType::InvalidPath
        );
        assert_eq!(ScimError::no_target("x").scim_type(), ScimType::NoTarget);
        assert_eq!(
            ScimError::mutability("x").scim_type(),
            ScimType::Mutability
        );
    }

    #[test]
    fn test_error_response_shape() {
        let error = ScimError::no_target("No target found for path-filter 'emails[type eq \"x\"]'");
        let body = serde_json::to_value(error.to_error_response()).unwrap();
        assert_eq!(body["schemas"][0], ERROR_RESPONSE_SCHEMA);
        assert_eq!(body["status"], "400");
        assert_eq!(body["scimType"], "noTarget");
        assert!(body["detail"].as_str().unwrap().contains("path-filter"));
        assert!(body.get("fieldErrors").is_none());
    }

    #[test]
    fn test_validation_context_keeps_first_message_and_order() {
        let mut ctx = ValidationContext::new();
        assert!(ctx.clone().into_result().is_ok());

        ctx.add_error("urn:x:numberArray", "aggregate");
        let mut child = ValidationContext::new();
        child.add_error("urn:x:numberArray", "element");
        ctx.merge(child);

        assert_eq!(ctx.errors_for("urn:x:numberArray"), ["aggregate", "element"]);
        match ctx.into_result() {
            Err(ScimError::InvalidValue {
                detail,
                field_errors,
            }) => {
                assert_eq!(detail, "aggregate");
                assert_eq!(field_errors.len(), 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_field_errors_serialized() {
        let mut ctx = ValidationContext::new();
        ctx.add_error("urn:x:string", "broken");
        let error = ctx.into_result().unwrap_err();
        let body = serde_json::to_value(error.to_error_response()).unwrap();
        assert_eq!(body["scimType"], "invalidValue");
        assert_eq!(body["fieldErrors"]["urn:x:string"][0], "broken");
    }
}
