//! Entry point applying a whole PATCH request to a resource.

use super::executor::PatchExecutor;
use super::request::{PatchOpRequest, PatchRequestOperation};
use super::workaround::{
    PatchWorkaround, SailsPointTracker, WorkaroundContext, default_workarounds, normalize,
};
use crate::config::PatchConfig;
use crate::document::{find_key, insert_ignore_case, remove_ignore_case};
use crate::error::{ScimError, ScimResult};
use crate::schema::{ResourceType, SchemaRegistry};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const META: &str = "meta";

/// Result of a successful PATCH request.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    /// The patched resource
    pub resource: Value,
    /// Whether any operation had an effect. `meta` is only touched when set.
    pub changed: bool,
}

/// Applies PATCH requests to resources of one resource type.
///
/// The handler borrows the registry and never mutates it, so one registry can
/// serve any number of handlers on any number of threads.
///
/// ```rust
/// use scim_patch::{PatchConfig, PatchHandler, PatchOpRequest, SchemaRegistry};
/// use serde_json::json;
///
/// let registry = SchemaRegistry::with_embedded_schemas()?;
/// let handler = PatchHandler::new(&registry, "User", PatchConfig::default())?;
/// let request = PatchOpRequest::from_json(&json!({
///     "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
///     "Operations": [{"op": "replace", "path": "displayName", "value": "Babs"}]
/// }))?;
///
/// let outcome = handler.patch_resource(&json!({"userName": "bjensen"}), &request)?;
/// assert!(outcome.changed);
/// assert_eq!(outcome.resource["displayName"], "Babs");
/// # Ok::<(), scim_patch::ScimError>(())
/// ```
pub struct PatchHandler<'r> {
    registry: &'r SchemaRegistry,
    resource_type: &'r ResourceType,
    config: PatchConfig,
    workarounds: Vec<Box<dyn PatchWorkaround>>,
}

impl<'r> PatchHandler<'r> {
    /// Create a handler for the resource type registered as `resource_type`.
    pub fn new(
        registry: &'r SchemaRegistry,
        resource_type: &str,
        config: PatchConfig,
    ) -> ScimResult<Self> {
        let resource_type = registry.get_resource_type(resource_type)?;
        Ok(Self {
            registry,
            resource_type,
            config,
            workarounds: default_workarounds(),
        })
    }

    /// Replace the built-in workarounds.
    pub fn with_workarounds(mut self, workarounds: Vec<Box<dyn PatchWorkaround>>) -> Self {
        self.workarounds = workarounds;
        self
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    pub fn resource_type(&self) -> &ResourceType {
        self.resource_type
    }

    /// Apply every operation of `request` to a copy of `resource`.
    ///
    /// Operations run in order and each sees the effect of the previous ones.
    /// The first failing operation aborts the request; `resource` itself is
    /// never modified.
    pub fn patch_resource(
        &self,
        resource: &Value,
        request: &PatchOpRequest,
    ) -> ScimResult<PatchOutcome> {
        request.validate()?;
        let Value::Object(original) = resource else {
            return Err(ScimError::invalid_value(format!(
                "Resource to patch must be a JSON object but was '{}'",
                resource
            )));
        };

        let ctx = WorkaroundContext {
            registry: self.registry,
            resource_type: self.resource_type,
        };
        let executor = PatchExecutor::new(self.registry, self.resource_type, &self.config);
        let mut tracker = SailsPointTracker::new();
        let mut document = original.clone();
        let mut changed = false;

        for (index, operation) in request.operations.iter().enumerate() {
            let operation = self.prepare(&ctx, &tracker, operation.clone());
            let before = document.clone();
            executor.apply(&mut document, &operation).inspect_err(|e| {
                debug!(
                    "Operation {} ({} '{}') of {} patch failed: {}",
                    index,
                    operation.op,
                    operation.path.as_deref().unwrap_or_default(),
                    self.resource_type.name,
                    e
                )
            })?;

            if document == before {
                debug!("Operation {} ({}) had no effect", index, operation.op);
            } else {
                changed = true;
            }
            if self.config.sails_point_workaround {
                tracker.record(&ctx, &operation);
            }
        }

        if changed {
            self.touch_meta(&mut document);
        }
        debug!(
            "Applied {} patch operation(s) to {} resource, changed: {}",
            request.operations.len(),
            self.resource_type.name,
            changed
        );
        Ok(PatchOutcome {
            resource: Value::Object(document),
            changed,
        })
    }

    fn prepare(
        &self,
        ctx: &WorkaroundContext<'_>,
        tracker: &SailsPointTracker,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        let operation = normalize(&self.workarounds, &self.config, ctx, operation);
        if self.config.sails_point_workaround {
            return tracker.rewrite(ctx, operation);
        }
        operation
    }

    fn touch_meta(&self, document: &mut Map<String, Value>) {
        let version = self.config.update_version.then(|| content_version(document));
        let key = find_key(document, META).unwrap_or_else(|| META.to_string());
        let meta = document
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Value::Object(meta) = meta {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            insert_ignore_case(meta, "lastModified", Value::String(now));
            if let Some(version) = version {
                insert_ignore_case(meta, "version", Value::String(version));
            }
        }
    }
}

/// Weak ETag over the resource content without `meta`.
fn content_version(document: &Map<String, Value>) -> String {
    let mut content = document.clone();
    remove_ignore_case(&mut content, META);
    let mut hasher = Sha256::new();
    hasher.update(Value::Object(content).to_string().as_bytes());
    let hash = hasher.finalize();
    // first 8 bytes keep the tag short
    format!("W/\"{}\"", BASE64.encode(&hash[..8]))
}
