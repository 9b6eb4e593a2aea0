//! Schema definitions for SCIM resources.
//!
//! This module provides the schema registry the PATCH engine resolves
//! attribute paths and values against, together with the embedded RFC 7643
//! core schemas.
//!
//! # Key Types
//!
//! - [`Schema`] - SCIM schema definition as found in schema documents
//! - [`SchemaRegistry`] - Arena of registered attributes and resource types
//! - [`SchemaAttribute`] - A registered attribute, addressed by [`AttributeId`]
//!
//! # Examples
//!
//! ```rust
//! use scim_patch::schema::SchemaRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::with_embedded_schemas()?;
//! let given_name = registry
//!     .get_schema_attribute("User", "name.givenName")
//!     .expect("givenName is part of the core User schema");
//! assert_eq!(
//!     registry.attribute(given_name).full_name,
//!     "urn:ietf:params:scim:schemas:core:2.0:User:name.givenName"
//! );
//! # Ok(())
//! # }
//! ```

pub mod embedded;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

pub use registry::{ENTERPRISE_USER_SCHEMA, GROUP_SCHEMA, SchemaRegistry, USER_SCHEMA};
pub use types::{
    AttributeDefinition, AttributeId, AttributeType, Mutability, ResourceType, Schema,
    SchemaAttribute, SchemaExtension, Uniqueness,
};
