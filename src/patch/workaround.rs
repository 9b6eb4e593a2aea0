//! Rewrites for known non-conformant PATCH operations.
//!
//! Azure AD (Microsoft Entra) and SailsPoint send operations that RFC 7644
//! does not allow or that mean something other than what the client intends.
//! Each [`PatchWorkaround`] recognises one such shape and turns it into the
//! standard form; any operation that does not match the shape exactly is
//! passed through untouched. Rewrites are idempotent.

use super::path::{PathResolver, PathTarget};
use super::request::{PatchOp, PatchRequestOperation};
use crate::config::PatchConfig;
use crate::filter::{ComparisonOperator, FilterExpression};
use crate::schema::{AttributeId, ResourceType, SchemaRegistry};
use log::{debug, trace};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Schema information available to workarounds.
#[derive(Debug, Clone, Copy)]
pub struct WorkaroundContext<'r> {
    pub registry: &'r SchemaRegistry,
    pub resource_type: &'r ResourceType,
}

impl<'r> WorkaroundContext<'r> {
    fn resolver(&self) -> PathResolver<'r> {
        PathResolver::new(self.registry, self.resource_type)
    }

    /// The attribute a plain path (no filter, no sub-attribute) names.
    fn plain_attribute(&self, path: &str) -> Option<AttributeId> {
        match self.resolver().resolve(path).ok()? {
            PathTarget::Attribute(resolved)
                if resolved.filter.is_none() && resolved.sub_attribute.is_none() =>
            {
                Some(resolved.attribute)
            }
            _ => None,
        }
    }
}

/// A stateless rewrite of one vendor-specific operation shape.
pub trait PatchWorkaround: Send + Sync {
    /// Name used in log messages.
    fn name(&self) -> &'static str;

    fn is_enabled(&self, config: &PatchConfig) -> bool;

    /// Return the rewritten operation, or `operation` unchanged.
    fn rewrite(
        &self,
        ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation;
}

/// The built-in workarounds in the order they are applied.
pub fn default_workarounds() -> Vec<Box<dyn PatchWorkaround>> {
    vec![
        Box::new(MsAzureValueSubAttributeWorkaround),
        Box::new(MsAzureComplexSimpleValueWorkaround),
        Box::new(MsAzureRemoveWorkaround),
        Box::new(MsAzureReplaceWorkaround),
    ]
}

/// Apply every enabled workaround to `operation`.
pub fn normalize(
    workarounds: &[Box<dyn PatchWorkaround>],
    config: &PatchConfig,
    ctx: &WorkaroundContext<'_>,
    operation: PatchRequestOperation,
) -> PatchRequestOperation {
    workarounds
        .iter()
        .filter(|workaround| workaround.is_enabled(config))
        .fold(operation, |operation, workaround| {
            workaround.rewrite(ctx, operation)
        })
}

/// Azure removes members with
/// `{"op": "remove", "path": "members", "value": [{"value": "123"}]}`, which
/// is rewritten to `{"op": "remove", "path": "members[value eq \"123\"]"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsAzureRemoveWorkaround;

impl PatchWorkaround for MsAzureRemoveWorkaround {
    fn name(&self) -> &'static str {
        "MS Azure remove"
    }

    fn is_enabled(&self, config: &PatchConfig) -> bool {
        config.ms_azure_remove_workaround
    }

    fn rewrite(
        &self,
        ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        if operation.op != PatchOp::Remove {
            return operation;
        }
        let (Some(path), Some(value)) = (operation.target_path(), operation.value.as_ref()) else {
            return operation;
        };
        if path.contains('[') {
            trace!("[{}] path '{}' already carries a filter", self.name(), path);
            return operation;
        }
        let is_multi_valued = ctx
            .plain_attribute(path)
            .is_some_and(|id| ctx.registry.attribute(id).multi_valued);
        if !is_multi_valued {
            trace!("[{}] '{}' is no multi-valued attribute", self.name(), path);
            return operation;
        }

        let elements = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(_) => std::slice::from_ref(value),
            _ => return operation,
        };
        let mut filter: Option<FilterExpression> = None;
        for element in elements {
            let Some(members) = element.as_object().filter(|members| members.len() == 1) else {
                trace!("[{}] value {} is no single-key object", self.name(), element);
                return operation;
            };
            let Some((name, scalar)) = members
                .iter()
                .next()
                .filter(|(_, scalar)| matches!(scalar, Value::String(_) | Value::Number(_) | Value::Bool(_)))
            else {
                trace!("[{}] value {} does not hold a scalar", self.name(), element);
                return operation;
            };
            let comparison =
                FilterExpression::comparison(name.as_str(), ComparisonOperator::Eq, scalar.clone());
            filter = Some(match filter {
                None => comparison,
                Some(previous) => previous.or(comparison),
            });
        }
        let Some(filter) = filter else {
            return operation;
        };

        let rewritten = format!("{}[{}]", path, filter);
        debug!("[{}] rewrote remove path '{}' to '{}'", self.name(), path, rewritten);
        PatchRequestOperation {
            op: PatchOp::Remove,
            path: Some(rewritten),
            value: None,
        }
    }
}

/// Azure replaces sub-attributes with dotted keys, e.g.
/// `{"op": "replace", "value": {"name.givenName": "Barbara"}}`, which is
/// rewritten to `{"op": "replace", "value": {"name": {"givenName": "Barbara"}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsAzureReplaceWorkaround;

impl PatchWorkaround for MsAzureReplaceWorkaround {
    fn name(&self) -> &'static str {
        "MS Azure replace"
    }

    fn is_enabled(&self, config: &PatchConfig) -> bool {
        config.ms_azure_replace_workaround
    }

    fn rewrite(
        &self,
        _ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        if operation.op != PatchOp::Replace || operation.target_path().is_some() {
            return operation;
        }
        let Some(Value::Object(members)) = operation.value.as_ref() else {
            return operation;
        };
        let is_dotted = |key: &str| !key.contains(':') && key.matches('.').count() == 1;
        if !members.keys().any(|key| is_dotted(key)) {
            return operation;
        }

        let mut nested = Map::new();
        for (key, value) in members {
            let Some((parent, child)) = key.split_once('.').filter(|_| is_dotted(key)) else {
                nested.insert(key.clone(), value.clone());
                continue;
            };
            match nested
                .entry(parent.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
            {
                Value::Object(target) => {
                    target.insert(child.to_string(), value.clone());
                }
                other => {
                    trace!(
                        "[{}] '{}' is already set to the non-object {}",
                        self.name(),
                        parent,
                        other
                    );
                    return operation;
                }
            }
        }

        debug!("[{}] nested dotted keys of replace value", self.name());
        PatchRequestOperation {
            value: Some(Value::Object(nested)),
            ..operation
        }
    }
}

/// Azure sends a bare scalar for complex attributes such as the enterprise
/// `manager`; the scalar is meant for the `value` sub-attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsAzureComplexSimpleValueWorkaround;

impl PatchWorkaround for MsAzureComplexSimpleValueWorkaround {
    fn name(&self) -> &'static str {
        "MS Azure complex simple value"
    }

    fn is_enabled(&self, config: &PatchConfig) -> bool {
        config.ms_azure_complex_simple_value_workaround
    }

    fn rewrite(
        &self,
        ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        if operation.op == PatchOp::Remove {
            return operation;
        }
        let Some(scalar) = operation
            .value
            .as_ref()
            .filter(|value| matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
        else {
            return operation;
        };
        let Some(id) = operation
            .target_path()
            .and_then(|path| ctx.plain_attribute(path))
        else {
            return operation;
        };
        let attribute = ctx.registry.attribute(id);
        if !attribute.is_complex() || ctx.registry.sub_attribute(id, "value").is_none() {
            trace!("[{}] '{}' has no value sub-attribute", self.name(), attribute.full_name);
            return operation;
        }

        debug!("[{}] wrapped scalar for '{}'", self.name(), attribute.full_name);
        let mut wrapped = Map::new();
        wrapped.insert("value".to_string(), scalar.clone());
        PatchRequestOperation {
            value: Some(Value::Object(wrapped)),
            ..operation
        }
    }
}

/// Azure wraps whole objects as JSON text inside a `value` member:
/// `[{"value": "{\"value\": \"Admin\", \"display\": \"Admin\"}"}]` becomes
/// `[{"value": "Admin", "display": "Admin"}]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsAzureValueSubAttributeWorkaround;

impl MsAzureValueSubAttributeWorkaround {
    fn unwrap_element(&self, element: &Value) -> Option<Value> {
        let members = element.as_object().filter(|members| members.len() == 1)?;
        let text = members.get("value")?.as_str()?;
        match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Object(_)) => Some(inner),
            _ => {
                trace!("[{}] inner value is no JSON object", self.name());
                None
            }
        }
    }
}

impl PatchWorkaround for MsAzureValueSubAttributeWorkaround {
    fn name(&self) -> &'static str {
        "MS Azure value sub-attribute"
    }

    fn is_enabled(&self, config: &PatchConfig) -> bool {
        config.ms_azure_value_sub_attribute_workaround
    }

    fn rewrite(
        &self,
        _ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        if operation.op == PatchOp::Remove {
            return operation;
        }
        let fixed = match operation.value.as_ref() {
            Some(Value::Array(items)) if !items.is_empty() => {
                let fixed: Vec<Value> = items
                    .iter()
                    .map(|item| self.unwrap_element(item).unwrap_or_else(|| item.clone()))
                    .collect();
                if fixed == *items {
                    return operation;
                }
                Value::Array(fixed)
            }
            Some(single @ Value::Object(_)) => match self.unwrap_element(single) {
                Some(inner) => inner,
                None => return operation,
            },
            _ => return operation,
        };

        debug!("[{}] unwrapped embedded JSON values", self.name());
        PatchRequestOperation {
            value: Some(fixed),
            ..operation
        }
    }
}

/// SailsPoint sends one REPLACE per sub-attribute of a complex attribute,
/// each carrying only that sub-attribute. Replayed literally every REPLACE
/// would discard what the previous one set.
///
/// The tracker remembers the single-valued complex attributes written by
/// earlier operations of the same request and turns a later REPLACE of such
/// an attribute into an ADD, which merges.
#[derive(Debug, Default)]
pub struct SailsPointTracker {
    written: HashSet<AttributeId>,
}

impl SailsPointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewrite(
        &self,
        ctx: &WorkaroundContext<'_>,
        operation: PatchRequestOperation,
    ) -> PatchRequestOperation {
        if operation.op != PatchOp::Replace {
            return operation;
        }
        let Some(id) = operation
            .target_path()
            .and_then(|path| ctx.plain_attribute(path))
        else {
            return operation;
        };
        if !self.written.contains(&id) {
            return operation;
        }

        debug!(
            "[SailsPoint] merging replace of '{}' with the earlier operation",
            ctx.registry.attribute(id).full_name
        );
        PatchRequestOperation {
            op: PatchOp::Add,
            ..operation
        }
    }

    /// Remember the complex attributes a successfully applied operation wrote.
    pub fn record(&mut self, ctx: &WorkaroundContext<'_>, operation: &PatchRequestOperation) {
        if operation.op == PatchOp::Remove {
            return;
        }
        let candidates: Vec<AttributeId> = match operation.target_path() {
            Some(path) => match ctx.resolver().resolve(path) {
                Ok(PathTarget::Attribute(resolved)) => vec![resolved.attribute],
                _ => Vec::new(),
            },
            None => operation
                .value
                .as_ref()
                .and_then(Value::as_object)
                .map(|members| {
                    members
                        .keys()
                        .filter_map(|key| {
                            ctx.registry.resolve_attribute_name(ctx.resource_type, key)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        };

        for id in candidates {
            let attribute = ctx.registry.attribute(id);
            if attribute.is_complex() && !attribute.multi_valued && attribute.parent.is_none() {
                self.written.insert(id);
            }
        }
    }
}
