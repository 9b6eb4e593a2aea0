//! Schema registry holding every attribute definition the engine resolves
//! paths and values against.
//!
//! Attributes are flattened into a single arena when a schema is registered.
//! The registry is built once during bootstrap and is only read afterwards,
//! so one instance can be shared by reference across concurrent PATCH calls.

use super::embedded;
use super::types::{
    AttributeDefinition, AttributeId, ResourceType, Schema, SchemaAttribute, SchemaExtension,
};
use crate::error::{ScimError, ScimResult};

use chrono::{DateTime, FixedOffset};
use log::debug;
use std::collections::HashMap;

/// URI of the RFC 7643 core User schema.
pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
/// URI of the RFC 7643 core Group schema.
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
/// URI of the RFC 7643 enterprise User extension.
pub const ENTERPRISE_USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

#[derive(Debug, Clone)]
struct RegisteredSchema {
    schema: Schema,
    attributes: Vec<AttributeId>,
}

/// Registry of SCIM schemas and resource types.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, RegisteredSchema>,
    attributes: Vec<SchemaAttribute>,
    resource_types: HashMap<String, ResourceType>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the RFC 7643 User, Group and EnterpriseUser
    /// schemas and the `User` and `Group` resource types.
    pub fn with_embedded_schemas() -> ScimResult<Self> {
        let mut registry = Self::new();
        registry.load_schema_from_str(embedded::core_user_schema())?;
        registry.load_schema_from_str(embedded::core_group_schema())?;
        registry.load_schema_from_str(embedded::enterprise_user_schema())?;

        registry.register_resource_type(ResourceType {
            name: "User".to_string(),
            schema: USER_SCHEMA.to_string(),
            schema_extensions: vec![SchemaExtension {
                schema: ENTERPRISE_USER_SCHEMA.to_string(),
                required: false,
            }],
        })?;
        registry.register_resource_type(ResourceType {
            name: "Group".to_string(),
            schema: GROUP_SCHEMA.to_string(),
            schema_extensions: Vec::new(),
        })?;
        Ok(registry)
    }

    /// Parse and register a schema from its JSON representation.
    pub fn load_schema_from_str(&mut self, content: &str) -> ScimResult<()> {
        let schema: Schema = serde_json::from_str(content)?;
        self.register_schema(schema)
    }

    /// Register a schema, flattening its attribute tree into the arena.
    pub fn register_schema(&mut self, schema: Schema) -> ScimResult<()> {
        let key = schema.id.to_ascii_lowercase();
        if self.schemas.contains_key(&key) {
            return Err(ScimError::invalid_value(format!(
                "Schema '{}' is already registered",
                schema.id
            )));
        }

        let attributes = schema
            .attributes
            .iter()
            .map(|definition| self.add_attribute(&schema.id, definition, None))
            .collect();
        debug!("Registered schema '{}'", schema.id);
        self.schemas
            .insert(key, RegisteredSchema { schema, attributes });
        Ok(())
    }

    fn add_attribute(
        &mut self,
        schema_id: &str,
        definition: &AttributeDefinition,
        parent: Option<AttributeId>,
    ) -> AttributeId {
        let full_name = match parent {
            Some(parent) => format!("{}.{}", self.attribute(parent).full_name, definition.name),
            None => format!("{}:{}", schema_id, definition.name),
        };
        let id = AttributeId(self.attributes.len());
        self.attributes.push(SchemaAttribute {
            name: definition.name.clone(),
            full_name,
            schema_id: schema_id.to_string(),
            data_type: definition.data_type,
            multi_valued: definition.multi_valued,
            required: definition.required,
            case_exact: definition.case_exact,
            mutability: definition.mutability,
            uniqueness: definition.uniqueness,
            canonical_values: definition.canonical_values.clone(),
            returned: definition.returned.clone(),
            sub_attributes: Vec::new(),
            parent,
        });

        let children: Vec<AttributeId> = definition
            .sub_attributes
            .iter()
            .map(|sub| self.add_attribute(schema_id, sub, Some(id)))
            .collect();
        self.attributes[id.0].sub_attributes = children;
        id
    }

    /// Register a resource type. Its main and extension schemas must already
    /// be registered.
    pub fn register_resource_type(&mut self, resource_type: ResourceType) -> ScimResult<()> {
        for schema_id in resource_type.schema_ids() {
            if self.get_resource_schema(schema_id).is_none() {
                return Err(ScimError::schema_not_found(schema_id));
            }
        }
        self.resource_types
            .insert(resource_type.name.to_ascii_lowercase(), resource_type);
        Ok(())
    }

    /// Get all registered schemas.
    pub fn get_schemas(&self) -> Vec<&Schema> {
        self.schemas.values().map(|entry| &entry.schema).collect()
    }

    /// Get a schema by its URI, ignoring case.
    pub fn get_resource_schema(&self, uri: &str) -> Option<&Schema> {
        self.schemas
            .get(&uri.to_ascii_lowercase())
            .map(|entry| &entry.schema)
    }

    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types.get(&name.to_ascii_lowercase())
    }

    /// Like [`resource_type`](Self::resource_type) but fails for unknown names.
    pub fn get_resource_type(&self, name: &str) -> ScimResult<&ResourceType> {
        self.resource_type(name)
            .ok_or_else(|| ScimError::UnknownResourceType(name.to_string()))
    }

    /// Look up an attribute record by id.
    ///
    /// Ids are only handed out by this registry, so every id is valid.
    pub fn attribute(&self, id: AttributeId) -> &SchemaAttribute {
        &self.attributes[id.0]
    }

    /// Top-level attributes of a schema in declaration order.
    pub fn root_attributes(&self, schema_id: &str) -> &[AttributeId] {
        self.schemas
            .get(&schema_id.to_ascii_lowercase())
            .map(|entry| entry.attributes.as_slice())
            .unwrap_or_default()
    }

    /// Find a top-level attribute of one schema by name, ignoring case.
    pub fn find_attribute(&self, schema_id: &str, name: &str) -> Option<AttributeId> {
        self.root_attributes(schema_id)
            .iter()
            .copied()
            .find(|id| self.attribute(*id).name.eq_ignore_ascii_case(name))
    }

    /// Find a sub-attribute of a complex attribute by name, ignoring case.
    pub fn sub_attribute(&self, parent: AttributeId, name: &str) -> Option<AttributeId> {
        self.attribute(parent)
            .sub_attributes
            .iter()
            .copied()
            .find(|id| self.attribute(*id).name.eq_ignore_ascii_case(name))
    }

    /// Find a top-level attribute across the schemas of a resource type.
    ///
    /// The main schema is searched first, so on a name collision the core
    /// attribute wins and the extension attribute is only reachable through
    /// its fully qualified name.
    pub fn find_resource_attribute(
        &self,
        resource_type: &ResourceType,
        name: &str,
    ) -> Option<AttributeId> {
        resource_type
            .schema_ids()
            .find_map(|schema_id| self.find_attribute(schema_id, name))
    }

    /// Resolve a schema URI used as an attribute prefix to one of the
    /// resource type's schemas.
    ///
    /// Besides exact (case-insensitive) matches this accepts the form Azure
    /// AD sends, which omits the trailing resource name segment, e.g.
    /// `urn:ietf:params:scim:schemas:extension:enterprise:2.0`.
    pub fn resolve_schema_uri<'r>(
        &self,
        resource_type: &'r ResourceType,
        uri: &str,
    ) -> Option<&'r str> {
        resource_type
            .schema_ids()
            .find(|schema_id| schema_id.eq_ignore_ascii_case(uri))
            .or_else(|| {
                resource_type.schema_ids().find(|schema_id| {
                    schema_id
                        .rsplit_once(':')
                        .is_some_and(|(prefix, _)| prefix.eq_ignore_ascii_case(uri))
                })
            })
    }

    /// Resolve an attribute name of a resource type.
    ///
    /// Accepts bare names (`userName`), dotted sub-attribute names
    /// (`name.givenName`) and fully qualified names
    /// (`urn:ietf:params:scim:schemas:core:2.0:User:name.givenName`).
    pub fn get_schema_attribute(&self, resource_type: &str, name: &str) -> Option<AttributeId> {
        let resource_type = self.resource_type(resource_type)?;
        self.resolve_attribute_name(resource_type, name)
    }

    pub(crate) fn resolve_attribute_name(
        &self,
        resource_type: &ResourceType,
        name: &str,
    ) -> Option<AttributeId> {
        let (schema_id, attribute_path) = match name.rsplit_once(':') {
            Some((uri, rest)) => (Some(self.resolve_schema_uri(resource_type, uri)?), rest),
            None => (None, name),
        };

        let mut segments = attribute_path.split('.');
        let root_name = segments.next()?;
        let root = match schema_id {
            Some(schema_id) => self.find_attribute(schema_id, root_name)?,
            None => self.find_resource_attribute(resource_type, root_name)?,
        };
        match (segments.next(), segments.next()) {
            (None, _) => Some(root),
            (Some(sub), None) => self.sub_attribute(root, sub),
            _ => None,
        }
    }
}

/// Parse an RFC 3339 timestamp, the only dateTime form SCIM allows.
pub(crate) fn parse_date_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if value.is_empty() {
        return None;
    }
    DateTime::<FixedOffset>::parse_from_rfc3339(value).ok()
}
