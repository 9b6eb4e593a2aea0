//! SCIM PATCH processing (RFC 7644 §3.5.2).
//!
//! A [`PatchOpRequest`] is applied by a [`PatchHandler`], which runs each
//! operation through the following stages:
//!
//! 1. [`workaround`] rewrites known vendor-specific shapes into standard form
//! 2. [`path`] resolves the attribute path against the resource schemas
//! 3. [`coerce`] checks the value against the attribute definition
//! 4. [`mutability`] gates the write
//! 5. [`executor`] merges the value into the resource document
//!
//! Any failing operation aborts the whole request and the caller's resource
//! stays untouched.
//!
//! # Examples
//!
//! ```rust
//! use scim_patch::patch::{PatchHandler, PatchOpRequest, PatchRequestOperation};
//! use scim_patch::{PatchConfig, SchemaRegistry};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::with_embedded_schemas()?;
//! let handler = PatchHandler::new(&registry, "Group", PatchConfig::default())?;
//!
//! let group = json!({
//!     "displayName": "Tour Guides",
//!     "members": [{"value": "2819c223"}, {"value": "902c246b"}]
//! });
//! let request = PatchOpRequest::new(vec![PatchRequestOperation::remove(
//!     r#"members[value eq "2819c223"]"#,
//! )]);
//!
//! let outcome = handler.patch_resource(&group, &request)?;
//! assert_eq!(outcome.resource["members"], json!([{"value": "902c246b"}]));
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod executor;
pub mod handler;
pub mod mutability;
pub mod path;
pub mod request;
pub mod workaround;

pub use coerce::ValueCoercer;
pub use executor::PatchExecutor;
pub use handler::{PatchHandler, PatchOutcome};
pub use mutability::MutabilityEnforcer;
pub use path::{AttributePath, PathResolver, PathTarget};
pub use request::{PATCH_OP_SCHEMA, PatchOp, PatchOpRequest, PatchRequestOperation};
pub use workaround::{
    MsAzureComplexSimpleValueWorkaround, MsAzureRemoveWorkaround, MsAzureReplaceWorkaround,
    MsAzureValueSubAttributeWorkaround, PatchWorkaround, SailsPointTracker, WorkaroundContext,
    default_workarounds,
};
