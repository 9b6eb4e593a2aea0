//! SCIM 2.0 PATCH engine for Rust.
//!
//! Applies RFC 7644 PATCH requests to schema-typed SCIM resources held as
//! plain JSON documents. The engine is synchronous and performs no I/O: for
//! one request and one resource it computes either the patched resource or a
//! [`ScimError`] carrying the wire error detail.
//!
//! # Core Components
//!
//! - [`SchemaRegistry`] - Registered schemas and resource types
//! - [`PatchHandler`] - Applies a [`PatchOpRequest`] to a resource
//! - [`filter`] - SCIM filter expressions used in value paths
//! - [`PatchConfig`] - Leniency switches and vendor workarounds
//!
//! # Quick Start
//!
//! ```rust
//! use scim_patch::{PatchConfig, PatchHandler, PatchOpRequest, SchemaRegistry};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::with_embedded_schemas()?;
//! let handler = PatchHandler::new(&registry, "User", PatchConfig::default())?;
//!
//! let user = json!({
//!     "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
//!     "userName": "bjensen",
//!     "emails": [{"value": "bjensen@example.com", "type": "work", "primary": true}]
//! });
//! let request = PatchOpRequest::from_json(&json!({
//!     "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!     "Operations": [
//!         {"op": "add", "path": "emails", "value": {"value": "babs@jensen.org", "primary": true}},
//!         {"op": "replace", "path": "name.givenName", "value": "Barbara"}
//!     ]
//! }))?;
//!
//! let outcome = handler.patch_resource(&user, &request)?;
//! assert_eq!(outcome.resource["name"]["givenName"], "Barbara");
//! assert_eq!(outcome.resource["emails"][1]["primary"], true);
//! assert!(outcome.resource["emails"][0].get("primary").is_none());
//! # Ok(())
//! # }
//! ```
//!
//! Errors convert into the RFC 7644 error body with
//! [`ScimError::to_error_response`].

pub mod config;
pub mod error;
pub mod filter;
pub mod patch;
pub mod schema;

mod document;

// Re-export commonly used types for convenience
pub use config::PatchConfig;
pub use error::{ErrorResponse, ScimError, ScimResult, ScimType, ValidationContext};
pub use filter::{FilterEvaluator, FilterExpression, FilterScope};
pub use patch::{
    PATCH_OP_SCHEMA, PatchHandler, PatchOp, PatchOpRequest, PatchOutcome, PatchRequestOperation,
};
pub use schema::{ResourceType, Schema, SchemaAttribute, SchemaRegistry};
