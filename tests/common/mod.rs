//! Shared fixtures for the PATCH integration tests.
//!
//! The `AllTypes` resource type declares one attribute of every SCIM data
//! type in every shape (simple, multi-valued, complex, multi-valued complex)
//! plus an extension, so scenarios can exercise the merge rules without the
//! restrictions of the User and Group schemas.

#![allow(dead_code)]

use scim_patch::patch::PatchOpRequest;
use scim_patch::schema::{ResourceType, SchemaExtension, SchemaRegistry};
use scim_patch::{PatchConfig, PatchHandler, PatchOutcome, ScimResult};
use serde_json::{Value, json};

pub const ALL_TYPES_SCHEMA: &str = "urn:example:params:scim:schemas:custom:2.0:AllTypes";
pub const ALL_TYPES_EXTENSION: &str =
    "urn:example:params:scim:schemas:extension:custom:2.0:AllTypes";

const ALL_TYPES: &str = r#"{
    "id": "urn:example:params:scim:schemas:custom:2.0:AllTypes",
    "name": "AllTypes",
    "attributes": [
        {"name": "id", "type": "string", "caseExact": true, "mutability": "readOnly"},
        {"name": "string", "type": "string"},
        {"name": "number", "type": "integer"},
        {"name": "decimal", "type": "decimal"},
        {"name": "bool", "type": "boolean"},
        {"name": "date", "type": "dateTime"},
        {"name": "binary", "type": "binary"},
        {"name": "immutableString", "type": "string", "mutability": "immutable"},
        {"name": "readOnlyString", "type": "string", "mutability": "readOnly"},
        {"name": "stringArray", "type": "string", "multiValued": true},
        {"name": "numberArray", "type": "integer", "multiValued": true},
        {"name": "decimalArray", "type": "decimal", "multiValued": true},
        {"name": "boolArray", "type": "boolean", "multiValued": true},
        {"name": "dateArray", "type": "dateTime", "multiValued": true},
        {"name": "complex", "type": "complex", "subAttributes": [
            {"name": "string", "type": "string"},
            {"name": "number", "type": "integer"},
            {"name": "decimal", "type": "decimal"},
            {"name": "bool", "type": "boolean"},
            {"name": "date", "type": "dateTime"},
            {"name": "binary", "type": "binary"},
            {"name": "stringArray", "type": "string", "multiValued": true},
            {"name": "numberArray", "type": "integer", "multiValued": true}
        ]},
        {"name": "multiComplex", "type": "complex", "multiValued": true, "subAttributes": [
            {"name": "string", "type": "string"},
            {"name": "number", "type": "integer"},
            {"name": "decimal", "type": "decimal"},
            {"name": "bool", "type": "boolean"},
            {"name": "date", "type": "dateTime"},
            {"name": "binary", "type": "binary"},
            {"name": "stringArray", "type": "string", "multiValued": true},
            {"name": "numberArray", "type": "integer", "multiValued": true},
            {"name": "primary", "type": "boolean"},
            {"name": "fixed", "type": "string", "mutability": "immutable"},
            {"name": "generated", "type": "string", "mutability": "readOnly"}
        ]}
    ]
}"#;

const ALL_TYPES_EXTENSION_DEFINITION: &str = r#"{
    "id": "urn:example:params:scim:schemas:extension:custom:2.0:AllTypes",
    "name": "AllTypesExtension",
    "attributes": [
        {"name": "costCenter", "type": "string"},
        {"name": "string", "type": "string"},
        {"name": "numberArray", "type": "integer", "multiValued": true},
        {"name": "manager", "type": "complex", "subAttributes": [
            {"name": "value", "type": "string"},
            {"name": "displayName", "type": "string", "mutability": "readOnly"}
        ]}
    ]
}"#;

/// Embedded User/Group schemas plus the `AllTypes` resource type.
pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::with_embedded_schemas().expect("embedded schemas load");
    registry
        .load_schema_from_str(ALL_TYPES)
        .expect("AllTypes schema loads");
    registry
        .load_schema_from_str(ALL_TYPES_EXTENSION_DEFINITION)
        .expect("AllTypes extension loads");
    registry
        .register_resource_type(ResourceType {
            name: "AllTypes".to_string(),
            schema: ALL_TYPES_SCHEMA.to_string(),
            schema_extensions: vec![SchemaExtension {
                schema: ALL_TYPES_EXTENSION.to_string(),
                required: false,
            }],
        })
        .expect("AllTypes resource type registers");
    registry
}

/// An `AllTypes` resource with the given attributes.
pub fn all_types(attributes: Value) -> Value {
    let mut resource = json!({
        "schemas": [ALL_TYPES_SCHEMA],
        "id": "123456",
        "meta": {"resourceType": "AllTypes"}
    });
    if let (Some(resource), Value::Object(attributes)) = (resource.as_object_mut(), attributes) {
        resource.extend(attributes);
    }
    resource
}

/// Wrap operation JSON objects into a request.
pub fn request(operations: Vec<Value>) -> PatchOpRequest {
    PatchOpRequest::from_json(&json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
        "Operations": operations
    }))
    .expect("request body decodes")
}

pub fn patch_with(
    registry: &SchemaRegistry,
    resource_type: &str,
    config: PatchConfig,
    resource: &Value,
    operations: Vec<Value>,
) -> ScimResult<PatchOutcome> {
    PatchHandler::new(registry, resource_type, config)?
        .patch_resource(resource, &request(operations))
}

/// Patch an `AllTypes` resource with the default configuration.
pub fn patch(resource: &Value, operations: Vec<Value>) -> ScimResult<PatchOutcome> {
    patch_with(
        &registry(),
        "AllTypes",
        PatchConfig::default(),
        resource,
        operations,
    )
}

pub fn operation(op: &str, path: &str, value: Value) -> Value {
    json!({"op": op, "path": path, "value": value})
}

pub fn remove(path: &str) -> Value {
    json!({"op": "remove", "path": path})
}

/// Log output for failing tests, `RUST_LOG=debug cargo test`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
