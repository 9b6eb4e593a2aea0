//! Core schema type definitions for SCIM resources.
//!
//! [`Schema`] and [`AttributeDefinition`] mirror the RFC 7643 §7 JSON
//! representation and are only used while registering a schema. Once
//! registered, attributes live in the registry arena as [`SchemaAttribute`]
//! records addressed by [`AttributeId`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A SCIM schema definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Unique schema identifier (URI)
    pub id: String,
    /// Human-readable schema name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub attributes: Vec<AttributeDefinition>,
}

/// Definition of a SCIM attribute as it appears in a schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: AttributeType,
    #[serde(default)]
    pub multi_valued: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub case_exact: bool,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default)]
    pub uniqueness: Uniqueness,
    /// Allowed values for string attributes
    #[serde(default)]
    pub canonical_values: Vec<String>,
    /// Sub-attributes for complex types
    #[serde(default)]
    pub sub_attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub returned: Option<String>,
}

/// SCIM attribute data types.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[default]
    String,
    Boolean,
    Decimal,
    Integer,
    /// DateTime in RFC3339 format
    DateTime,
    /// Binary data (base64 encoded)
    Binary,
    Reference,
    Complex,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::DateTime => "dateTime",
            Self::Binary => "binary",
            Self::Reference => "reference",
            Self::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Attribute mutability characteristics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    /// Managed by the service provider
    ReadOnly,
    #[default]
    ReadWrite,
    /// Set once, never modified afterwards
    Immutable,
    WriteOnly,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadOnly => "readOnly",
            Self::ReadWrite => "readWrite",
            Self::Immutable => "immutable",
            Self::WriteOnly => "writeOnly",
        };
        f.write_str(name)
    }
}

/// Attribute uniqueness constraints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Uniqueness {
    #[default]
    None,
    Server,
    Global,
}

/// Stable handle of an attribute inside a [`SchemaRegistry`](super::SchemaRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(pub(crate) usize);

/// A registered attribute.
///
/// Records are created once at registration and are read-only afterwards.
/// Children and parent are referenced by id, never by ownership.
#[derive(Debug, Clone)]
pub struct SchemaAttribute {
    pub name: String,
    /// Schema URI followed by the dotted attribute path,
    /// e.g. `urn:ietf:params:scim:schemas:core:2.0:User:name.givenName`.
    pub full_name: String,
    /// URI of the schema that declares this attribute
    pub schema_id: String,
    pub data_type: AttributeType,
    pub multi_valued: bool,
    pub required: bool,
    pub case_exact: bool,
    pub mutability: Mutability,
    pub uniqueness: Uniqueness,
    pub canonical_values: Vec<String>,
    pub returned: Option<String>,
    pub sub_attributes: Vec<AttributeId>,
    pub parent: Option<AttributeId>,
}

impl SchemaAttribute {
    pub fn is_complex(&self) -> bool {
        self.data_type == AttributeType::Complex
    }

    pub fn is_multi_valued_complex(&self) -> bool {
        self.multi_valued && self.is_complex()
    }

    /// Whether values of this attribute are compared as strings.
    pub fn is_string_like(&self) -> bool {
        matches!(
            self.data_type,
            AttributeType::String | AttributeType::Reference | AttributeType::Binary
        )
    }

    /// Dotted attribute path without the schema URI, e.g. `name.givenName`.
    pub fn scim_name(&self) -> &str {
        self.full_name
            .strip_prefix(self.schema_id.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(&self.name)
    }
}

/// Binding of an extension schema to a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaExtension {
    pub schema: String,
    #[serde(default)]
    pub required: bool,
}

/// A resource type: one main schema plus any number of extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub schema_extensions: Vec<SchemaExtension>,
}

impl ResourceType {
    /// Main schema followed by the extension schemas, in declaration order.
    pub fn schema_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.schema.as_str())
            .chain(self.schema_extensions.iter().map(|ext| ext.schema.as_str()))
    }

    /// The extension whose URI matches `uri`, ignoring case.
    pub fn extension(&self, uri: &str) -> Option<&SchemaExtension> {
        self.schema_extensions
            .iter()
            .find(|ext| ext.schema.eq_ignore_ascii_case(uri))
    }

    pub fn is_extension(&self, uri: &str) -> bool {
        self.extension(uri).is_some()
    }
}
