//! Tests for schema loading and attribute lookup.

use super::registry::{ENTERPRISE_USER_SCHEMA, SchemaRegistry, USER_SCHEMA, parse_date_time};
use super::types::{AttributeType, Mutability, ResourceType, SchemaExtension};
use crate::error::ScimError;

fn registry() -> SchemaRegistry {
    SchemaRegistry::with_embedded_schemas().expect("Failed to create registry")
}

#[test]
fn test_schema_registry_creation() {
    let registry = registry();
    assert_eq!(registry.get_schemas().len(), 3);
    assert!(registry.get_resource_schema(USER_SCHEMA).is_some());
    assert!(
        registry
            .get_resource_schema("urn:ietf:params:scim:schemas:core:2.0:group")
            .is_some()
    );
    assert!(registry.resource_type("user").is_some());
    assert!(registry.resource_type("Group").is_some());
}

#[test]
fn test_attribute_arena_links_parent_and_children() {
    let registry = registry();
    let name = registry.get_schema_attribute("User", "name").unwrap();
    let given = registry.get_schema_attribute("User", "name.givenName").unwrap();

    let name_attr = registry.attribute(name);
    assert!(name_attr.is_complex());
    assert!(name_attr.sub_attributes.contains(&given));
    assert_eq!(registry.attribute(given).parent, Some(name));
    assert_eq!(registry.attribute(given).scim_name(), "name.givenName");
    assert_eq!(
        registry.attribute(given).full_name,
        format!("{}:name.givenName", USER_SCHEMA)
    );
}

#[test]
fn test_lookup_is_case_insensitive() {
    let registry = registry();
    let a = registry.get_schema_attribute("User", "USERNAME").unwrap();
    let b = registry.get_schema_attribute("User", "userName").unwrap();
    assert_eq!(a, b);
    assert_eq!(registry.attribute(a).name, "userName");
}

#[test]
fn test_fully_qualified_and_extension_names() {
    let registry = registry();
    let cost_center = registry
        .get_schema_attribute("User", "costCenter")
        .expect("bare extension name");
    let qualified = registry
        .get_schema_attribute("User", &format!("{}:costCenter", ENTERPRISE_USER_SCHEMA))
        .unwrap();
    assert_eq!(cost_center, qualified);
    assert_eq!(registry.attribute(cost_center).schema_id, ENTERPRISE_USER_SCHEMA);

    let manager_value = registry
        .get_schema_attribute("User", &format!("{}:manager.value", ENTERPRISE_USER_SCHEMA))
        .unwrap();
    assert_eq!(registry.attribute(manager_value).name, "value");
}

#[test]
fn test_azure_style_extension_prefix() {
    let registry = registry();
    let id = registry
        .get_schema_attribute(
            "User",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:department",
        )
        .expect("prefix without the trailing resource segment");
    assert_eq!(registry.attribute(id).name, "department");
}

#[test]
fn test_unknown_names() {
    let registry = registry();
    assert!(registry.get_schema_attribute("User", "unknown").is_none());
    assert!(registry.get_schema_attribute("User", "name.unknown").is_none());
    assert!(registry.get_schema_attribute("User", "name.givenName.x").is_none());
    assert!(registry.get_schema_attribute("Nope", "userName").is_none());
    assert!(
        registry
            .get_schema_attribute("User", "urn:unknown:schema:userName")
            .is_none()
    );
}

#[test]
fn test_core_attribute_wins_name_collision() {
    let mut registry = registry();
    registry
        .load_schema_from_str(
            r#"{
                "id": "urn:example:extension:Collision",
                "attributes": [
                    {"name": "displayName", "type": "integer"}
                ]
            }"#,
        )
        .unwrap();
    registry
        .register_resource_type(ResourceType {
            name: "Colliding".to_string(),
            schema: USER_SCHEMA.to_string(),
            schema_extensions: vec![SchemaExtension {
                schema: "urn:example:extension:Collision".to_string(),
                required: false,
            }],
        })
        .unwrap();

    let bare = registry
        .get_schema_attribute("Colliding", "displayName")
        .unwrap();
    assert_eq!(registry.attribute(bare).data_type, AttributeType::String);

    let qualified = registry
        .get_schema_attribute("Colliding", "urn:example:extension:Collision:displayName")
        .unwrap();
    assert_eq!(registry.attribute(qualified).data_type, AttributeType::Integer);
}

#[test]
fn test_minimal_attribute_definitions_use_defaults() {
    let mut registry = SchemaRegistry::new();
    registry
        .load_schema_from_str(r#"{"id": "urn:example:Minimal", "attributes": [{"name": "flag", "type": "boolean"}]}"#)
        .unwrap();
    let flag = registry.find_attribute("urn:example:Minimal", "flag").unwrap();
    let attr = registry.attribute(flag);
    assert_eq!(attr.mutability, Mutability::ReadWrite);
    assert!(!attr.multi_valued);
    assert!(!attr.case_exact);
}

#[test]
fn test_duplicate_schema_rejected() {
    let mut registry = registry();
    let result = registry.load_schema_from_str(super::embedded::core_group_schema());
    assert!(matches!(result, Err(ScimError::InvalidValue { .. })));
}

#[test]
fn test_resource_type_requires_known_schemas() {
    let mut registry = SchemaRegistry::new();
    let result = registry.register_resource_type(ResourceType {
        name: "Device".to_string(),
        schema: "urn:example:Device".to_string(),
        schema_extensions: Vec::new(),
    });
    assert!(matches!(result, Err(ScimError::SchemaNotFound { .. })));
}

#[test]
fn test_embedded_mutability() {
    let registry = registry();
    let id = registry.get_schema_attribute("User", "id").unwrap();
    assert_eq!(registry.attribute(id).mutability, Mutability::ReadOnly);
    let member_value = registry.get_schema_attribute("Group", "members.value").unwrap();
    assert_eq!(registry.attribute(member_value).mutability, Mutability::Immutable);
}

#[test]
fn test_parse_date_time() {
    assert!(parse_date_time("2019-09-29T22:00:00Z").is_some());
    assert!(parse_date_time("2019-09-29T22:00:00.123+02:00").is_some());
    assert!(parse_date_time("2019-02-30T22:00:00Z").is_none());
    assert!(parse_date_time("yesterday").is_none());
    assert!(parse_date_time("").is_none());
}
