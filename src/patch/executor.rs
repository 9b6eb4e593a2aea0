//! Applies one PATCH operation to a resource document.
//!
//! The executor works on a schema-less `serde_json` map and imposes the
//! attribute semantics of the registry at every step. The new value of a
//! top-level attribute is computed from its current value and the coerced
//! input, checked against the mutability rules, and only then stored, so a
//! failing operation leaves the attribute untouched.
//!
//! | Target shape                              | ADD                         | REPLACE                         |
//! |-------------------------------------------|-----------------------------|---------------------------------|
//! | simple, single-valued                     | overwrite                   | overwrite                       |
//! | simple, multi-valued                      | append                      | discard and set                 |
//! | complex, single-valued, no path           | merge per sub-attribute     | merge per sub-attribute         |
//! | complex, single-valued, explicit path     | merge per sub-attribute     | replace all sub-attributes      |
//! | multi-valued complex, no filter           | append new elements         | discard and set                 |
//! | multi-valued complex, filter              | merge into matched elements | replace matched elements        |

use super::coerce::ValueCoercer;
use super::mutability::MutabilityEnforcer;
use super::path::{AttributePath, PathResolver, PathTarget};
use super::request::{PatchOp, PatchRequestOperation};
use crate::config::PatchConfig;
use crate::document::{
    find_key, get_ignore_case, get_ignore_case_mut, insert_ignore_case, literal,
    remove_ignore_case,
};
use crate::error::{ScimError, ScimResult};
use crate::filter::{FilterEvaluator, FilterExpression, FilterScope};
use crate::schema::{AttributeId, Mutability, ResourceType, SchemaAttribute, SchemaRegistry};
use log::{debug, trace};
use serde_json::{Map, Value};

const SCHEMAS: &str = "schemas";
const META: &str = "meta";

/// Applies operations for one resource type.
#[derive(Debug, Clone, Copy)]
pub struct PatchExecutor<'r> {
    registry: &'r SchemaRegistry,
    resource_type: &'r ResourceType,
    config: &'r PatchConfig,
}

impl<'r> PatchExecutor<'r> {
    pub fn new(
        registry: &'r SchemaRegistry,
        resource_type: &'r ResourceType,
        config: &'r PatchConfig,
    ) -> Self {
        Self {
            registry,
            resource_type,
            config,
        }
    }

    /// Apply `operation` to `document`.
    ///
    /// On error the document may be partially modified; callers work on a
    /// copy and discard it.
    pub fn apply(
        &self,
        document: &mut Map<String, Value>,
        operation: &PatchRequestOperation,
    ) -> ScimResult<()> {
        operation.validate()?;

        let Some(path) = operation.target_path() else {
            return match operation.value.as_ref() {
                Some(Value::Object(members)) => {
                    self.apply_resource_value(document, operation.op, members)
                }
                other => Err(ScimError::invalid_value(format!(
                    "Value of a '{}' operation without path must be a JSON object but was '{}'",
                    operation.op,
                    other.map(literal).unwrap_or_default()
                ))),
            };
        };

        let target = match PathResolver::new(self.registry, self.resource_type).resolve(path) {
            Err(ScimError::UnknownAttribute { detail })
                if self.config.ignore_unknown_attributes =>
            {
                debug!("Ignoring operation on unknown path: {}", detail);
                return Ok(());
            }
            other => other?,
        };
        trace!("Applying {} on '{}'", operation.op, path);

        match target {
            PathTarget::Extension { schema_id } => {
                self.apply_extension(document, operation, &schema_id)
            }
            PathTarget::Attribute(path) => {
                match (operation.op, operation.value.as_ref()) {
                    (PatchOp::Remove, _) => self.remove_path(document, &path, true)?,
                    (_, None | Some(Value::Null)) => self.remove_path(document, &path, false)?,
                    (op, Some(raw)) => self.write_path(document, &path, op, raw)?,
                }
                let schema_id = &self.registry.attribute(path.attribute).schema_id;
                self.sync_extension(document, schema_id);
                Ok(())
            }
        }
    }

    // ----- operations without path -----

    fn apply_resource_value(
        &self,
        document: &mut Map<String, Value>,
        op: PatchOp,
        members: &Map<String, Value>,
    ) -> ScimResult<()> {
        for (key, raw) in members {
            if key.eq_ignore_ascii_case(SCHEMAS) || key.eq_ignore_ascii_case(META) {
                trace!("Skipping '{}' in value without path", key);
                continue;
            }
            if let Some(extension) = self.resource_type.extension(key) {
                self.apply_extension_value(document, op, &extension.schema, raw)?;
                continue;
            }
            // sub-attribute keys like "name.givenName" are not top-level names
            let id = self
                .registry
                .resolve_attribute_name(self.resource_type, key)
                .filter(|id| self.registry.attribute(*id).parent.is_none());
            match id {
                Some(id) => self.assign(document, id, op, raw)?,
                None => self.unknown_key(key, &self.resource_type.name)?,
            }
        }
        Ok(())
    }

    fn apply_extension(
        &self,
        document: &mut Map<String, Value>,
        operation: &PatchRequestOperation,
        schema_id: &str,
    ) -> ScimResult<()> {
        match (operation.op, operation.value.as_ref()) {
            (PatchOp::Remove, _) | (_, None | Some(Value::Null)) => {
                if remove_ignore_case(document, schema_id).is_none()
                    && operation.op == PatchOp::Remove
                    && !self.config.do_not_fail_on_no_target
                {
                    return Err(ScimError::no_target(format!(
                        "No target found for path '{}'",
                        schema_id
                    )));
                }
                self.remove_schema_uri(document, schema_id);
                Ok(())
            }
            (PatchOp::Replace, Some(raw @ Value::Object(_))) => {
                // READ_ONLY attributes survive a replace of the whole extension
                if let Some(Value::Object(current)) = get_ignore_case_mut(document, schema_id) {
                    current.retain(|name, _| {
                        self.registry
                            .find_attribute(schema_id, name)
                            .is_some_and(|id| {
                                self.registry.attribute(id).mutability == Mutability::ReadOnly
                            })
                    });
                }
                self.apply_extension_value(document, PatchOp::Replace, schema_id, raw)
            }
            (op, Some(raw)) => self.apply_extension_value(document, op, schema_id, raw),
        }
    }

    fn apply_extension_value(
        &self,
        document: &mut Map<String, Value>,
        op: PatchOp,
        schema_id: &str,
        raw: &Value,
    ) -> ScimResult<()> {
        let members = match raw {
            Value::Null => {
                remove_ignore_case(document, schema_id);
                self.remove_schema_uri(document, schema_id);
                return Ok(());
            }
            Value::Object(members) => members,
            other => {
                return Err(ScimError::invalid_value(format!(
                    "Value of extension '{}' must be a JSON object but was '{}'",
                    schema_id,
                    literal(other)
                )));
            }
        };

        for (key, raw) in members {
            match self.registry.find_attribute(schema_id, key) {
                Some(id) => self.assign(document, id, op, raw)?,
                None => self.unknown_key(key, schema_id)?,
            }
        }
        self.sync_extension(document, schema_id);
        Ok(())
    }

    /// Write one top-level attribute taken from a value without path.
    fn assign(
        &self,
        document: &mut Map<String, Value>,
        id: AttributeId,
        op: PatchOp,
        raw: &Value,
    ) -> ScimResult<()> {
        self.enforcer().check_writable(id)?;
        let attribute = self.registry.attribute(id);
        let schema_id = attribute.schema_id.as_str();

        match self.coercer().coerce(id, raw)? {
            None => {
                if let Some(container) = self.container_mut(document, schema_id) {
                    remove_ignore_case(container, &attribute.name);
                }
            }
            Some(value) => {
                if let Value::Array(items) = &value {
                    self.enforcer().check_unique_values(id, items)?;
                }
                let current = self
                    .container(document, schema_id)
                    .and_then(|container| get_ignore_case(container, &attribute.name));
                let updated = self.updated_value(id, op, current, value, false)?;
                let container = self.container_or_insert(document, schema_id)?;
                self.store(container, id, updated)?;
            }
        }
        self.sync_extension(document, schema_id);
        Ok(())
    }

    fn unknown_key(&self, key: &str, owner: &str) -> ScimResult<()> {
        if self.config.ignore_unknown_attributes {
            debug!("Ignoring unknown attribute '{}' of '{}'", key, owner);
            return Ok(());
        }
        Err(ScimError::unknown_attribute(format!(
            "Attribute '{}' is unknown to resource type '{}'",
            key, owner
        )))
    }

    // ----- operations with path -----

    fn write_path(
        &self,
        document: &mut Map<String, Value>,
        path: &AttributePath,
        op: PatchOp,
        raw: &Value,
    ) -> ScimResult<()> {
        let Some(value) = self.coercer().coerce(path.leaf(), raw)? else {
            return Ok(());
        };
        if let Value::Array(items) = &value {
            self.enforcer().check_unique_values(path.leaf(), items)?;
        }

        let attribute = self.registry.attribute(path.attribute);
        let current = self
            .container(document, &attribute.schema_id)
            .and_then(|container| get_ignore_case(container, &attribute.name));
        let updated = match (&path.filter, path.sub_attribute) {
            (None, None) => Some(self.updated_value(path.attribute, op, current, value, true)?),
            (None, Some(sub)) => {
                Some(self.updated_sub_attribute(path.attribute, sub, op, current, value)?)
            }
            (Some(filter), _) => {
                self.updated_filtered(path, filter, op, current, value, raw.is_array())?
            }
        };

        match updated {
            Some(updated) => {
                let container = self.container_or_insert(document, &attribute.schema_id)?;
                self.store(container, path.attribute, updated)
            }
            None => Ok(()),
        }
    }

    fn remove_path(
        &self,
        document: &mut Map<String, Value>,
        path: &AttributePath,
        strict: bool,
    ) -> ScimResult<()> {
        let attribute = self.registry.attribute(path.attribute);
        let Some(container) = self.container_mut(document, &attribute.schema_id) else {
            return self.no_target(path, strict);
        };
        let Some(key) = find_key(container, &attribute.name) else {
            return self.no_target(path, strict);
        };
        let sub_name = path
            .sub_attribute
            .map(|sub| self.registry.attribute(sub).name.as_str());

        let removed = match (&path.filter, sub_name) {
            (None, None) => container.shift_remove(&key).is_some(),
            (None, Some(sub_name)) => match container.get_mut(&key) {
                Some(Value::Object(members)) => remove_ignore_case(members, sub_name).is_some(),
                Some(Value::Array(items)) => {
                    let mut removed = false;
                    for item in items.iter_mut() {
                        if let Value::Object(members) = item {
                            removed |= remove_ignore_case(members, sub_name).is_some();
                        }
                    }
                    removed
                }
                _ => false,
            },
            (Some(filter), sub_name) => {
                let evaluator = self.evaluator(path.attribute);
                match container.get_mut(&key) {
                    Some(Value::Array(items)) => {
                        let matched = matching_indices(&evaluator, filter, items);
                        if matched.is_empty() {
                            return self.no_filter_target(path, strict);
                        }
                        match sub_name {
                            None => remove_indices(items, &matched),
                            Some(sub_name) => {
                                for index in &matched {
                                    if let Some(Value::Object(members)) = items.get_mut(*index) {
                                        remove_ignore_case(members, sub_name);
                                    }
                                }
                            }
                        }
                        true
                    }
                    Some(value) if evaluator.matches(filter, value) => match (sub_name, value) {
                        (Some(sub_name), Value::Object(members)) => {
                            remove_ignore_case(members, sub_name).is_some()
                        }
                        (None, slot) => {
                            *slot = Value::Null;
                            true
                        }
                        _ => false,
                    },
                    _ => return self.no_filter_target(path, strict),
                }
            }
        };

        if !removed {
            return self.no_target(path, strict);
        }
        drop_emptied(container, &key);
        Ok(())
    }

    // ----- value computation -----

    /// New value of attribute `id` after writing `value` to it.
    ///
    /// `from_path` tells an explicit path from a value without path; it only
    /// matters for REPLACE of a single-valued complex attribute.
    fn updated_value(
        &self,
        id: AttributeId,
        op: PatchOp,
        current: Option<&Value>,
        value: Value,
        from_path: bool,
    ) -> ScimResult<Value> {
        let attribute = self.registry.attribute(id);
        if !attribute.multi_valued {
            let Value::Object(incoming) = value else {
                return Ok(value);
            };
            let merge = op == PatchOp::Add || !from_path;
            let mut members = match current {
                Some(Value::Object(current)) if merge => current.clone(),
                Some(Value::Object(current)) => self.read_only_members(id, current),
                _ => Map::new(),
            };
            merge_members(&mut members, incoming);
            return Ok(Value::Object(members));
        }

        let mut items = match (op, current) {
            (PatchOp::Add, Some(current)) => into_items(current.clone()),
            _ => Vec::new(),
        };
        if !attribute.is_complex() {
            items.extend(into_items(value));
            return Ok(Value::Array(items));
        }

        let mut touched = Vec::new();
        for item in into_items(value).into_iter().map(strip_nulls) {
            // re-adding an element that is already there changes nothing
            if is_empty_value(&item) || items.contains(&item) {
                continue;
            }
            touched.push(items.len());
            items.push(item);
        }
        self.enforcer()
            .enforce_single_primary(id, &mut items, &touched)?;
        Ok(Value::Array(items))
    }

    /// New value of complex attribute `parent` after writing `value` to its
    /// sub-attribute `sub` (path `parent.sub`).
    fn updated_sub_attribute(
        &self,
        parent: AttributeId,
        sub: AttributeId,
        op: PatchOp,
        current: Option<&Value>,
        value: Value,
    ) -> ScimResult<Value> {
        let attribute = self.registry.attribute(parent);
        let sub_attribute = self.registry.attribute(sub);

        if !attribute.multi_valued {
            let mut members = match current {
                Some(Value::Object(current)) => current.clone(),
                _ => Map::new(),
            };
            let merged = merge_leaf(
                sub_attribute,
                op,
                get_ignore_case(&members, &sub_attribute.name),
                value,
            );
            insert_ignore_case(&mut members, &sub_attribute.name, merged);
            return Ok(Value::Object(members));
        }

        // without a filter the sub-attribute of every element is written
        let mut items = current.cloned().map(into_items).unwrap_or_default();
        if items.is_empty() {
            items.push(Value::Object(Map::new()));
        }
        for item in items.iter_mut() {
            if let Value::Object(members) = item {
                self.write_member(members, sub_attribute, sub, op, value.clone())?;
            }
        }
        let touched: Vec<usize> = (0..items.len()).collect();
        self.enforcer()
            .enforce_single_primary(parent, &mut items, &touched)?;
        Ok(Value::Array(items))
    }

    /// New value of the attribute a filtered path addresses, or `None` when
    /// an ADD filter matched nothing.
    fn updated_filtered(
        &self,
        path: &AttributePath,
        filter: &FilterExpression,
        op: PatchOp,
        current: Option<&Value>,
        value: Value,
        value_is_array: bool,
    ) -> ScimResult<Option<Value>> {
        let attribute = self.registry.attribute(path.attribute);
        let evaluator = self.evaluator(path.attribute);

        if !attribute.multi_valued {
            // a filter on a single-valued complex attribute guards the write
            if !current.is_some_and(|current| evaluator.matches(filter, current)) {
                return self.unmatched_filter(path, op).map(|()| None);
            }
            return match path.sub_attribute {
                None => self.updated_value(path.attribute, op, current, value, true),
                Some(sub) => self.updated_sub_attribute(path.attribute, sub, op, current, value),
            }
            .map(Some);
        }

        let mut items = current.cloned().map(into_items).unwrap_or_default();
        let matched = matching_indices(&evaluator, filter, &items);
        if matched.is_empty() {
            return self.unmatched_filter(path, op).map(|()| None);
        }

        if !attribute.is_complex() {
            match op {
                PatchOp::Add => items.extend(into_items(value)),
                _ => replace_indices(&mut items, &matched, into_items(value)),
            }
            return Ok(Some(Value::Array(items)));
        }

        let mut touched = Vec::new();
        match (path.sub_attribute, op) {
            (Some(sub), _) => {
                let sub_attribute = self.registry.attribute(sub);
                for index in &matched {
                    if let Some(Value::Object(members)) = items.get_mut(*index) {
                        self.write_member(members, sub_attribute, sub, op, value.clone())?;
                        touched.push(*index);
                    }
                }
            }
            (None, PatchOp::Add) => {
                for index in &matched {
                    if let Some(Value::Object(members)) = items.get_mut(*index) {
                        let before = members.clone();
                        for incoming in into_items(value.clone()) {
                            if let Value::Object(incoming) = incoming {
                                merge_members(members, incoming);
                            }
                        }
                        self.enforcer()
                            .check_members(path.attribute, &before, members)?;
                        touched.push(*index);
                    }
                }
            }
            (None, _) if !value_is_array => {
                // one object replaces every matched element
                let replacement = into_items(value)
                    .into_iter()
                    .next()
                    .map(strip_nulls)
                    .unwrap_or_default();
                for index in &matched {
                    let replaced = match (items.get(*index), &replacement) {
                        (Some(Value::Object(before)), Value::Object(after)) => {
                            let seeded = self.replaced_member(path.attribute, before, after)?;
                            Value::Object(seeded)
                        }
                        _ => replacement.clone(),
                    };
                    if let Some(slot) = items.get_mut(*index) {
                        *slot = replaced;
                        touched.push(*index);
                    }
                }
            }
            (None, _) => {
                let mut incoming: Vec<Value> =
                    into_items(value).into_iter().map(strip_nulls).collect();
                // elements pair up by position, otherwise every match is held
                // against the first incoming element
                let paired = incoming.len() == matched.len();
                let originals = incoming.clone();
                for (position, index) in matched.iter().enumerate() {
                    let slot = if paired { position } else { 0 };
                    if let (Some(Value::Object(before)), Some(Value::Object(after))) =
                        (items.get(*index), originals.get(slot))
                    {
                        let seeded = self.replaced_member(path.attribute, before, after)?;
                        if paired || position == 0 {
                            incoming[slot] = Value::Object(seeded);
                        }
                    }
                }
                let first = matched[0];
                touched.extend(first..first + incoming.len());
                replace_indices(&mut items, &matched, incoming);
            }
        }

        self.enforcer()
            .enforce_single_primary(path.attribute, &mut items, &touched)?;
        items.retain(|item| !is_empty_value(item));
        Ok(Some(Value::Array(items)))
    }

    /// READ_ONLY members of complex value `current`, which survive a REPLACE.
    fn read_only_members(
        &self,
        parent: AttributeId,
        current: &Map<String, Value>,
    ) -> Map<String, Value> {
        current
            .iter()
            .filter(|(name, _)| {
                self.registry
                    .sub_attribute(parent, name)
                    .is_some_and(|id| {
                        self.registry.attribute(id).mutability == Mutability::ReadOnly
                    })
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Element `before` replaced by `after`, keeping its READ_ONLY members.
    fn replaced_member(
        &self,
        parent: AttributeId,
        before: &Map<String, Value>,
        after: &Map<String, Value>,
    ) -> ScimResult<Map<String, Value>> {
        let mut replaced = self.read_only_members(parent, before);
        merge_members(&mut replaced, after.clone());
        self.enforcer().check_members(parent, before, &replaced)?;
        Ok(replaced)
    }

    /// Write sub-attribute `sub` of one complex element.
    fn write_member(
        &self,
        members: &mut Map<String, Value>,
        sub_attribute: &SchemaAttribute,
        sub: AttributeId,
        op: PatchOp,
        value: Value,
    ) -> ScimResult<()> {
        let current = get_ignore_case(members, &sub_attribute.name);
        let merged = merge_leaf(sub_attribute, op, current, value);
        self.enforcer()
            .check_assignment(sub, current, Some(&merged))?;
        insert_ignore_case(members, &sub_attribute.name, merged);
        Ok(())
    }

    /// Store the new value of top-level attribute `id` after the mutability
    /// check. Empty values remove the attribute.
    fn store(
        &self,
        container: &mut Map<String, Value>,
        id: AttributeId,
        updated: Value,
    ) -> ScimResult<()> {
        let attribute = self.registry.attribute(id);
        self.enforcer().check_assignment(
            id,
            get_ignore_case(container, &attribute.name),
            Some(&updated),
        )?;
        if is_empty_value(&updated) {
            remove_ignore_case(container, &attribute.name);
        } else {
            insert_ignore_case(container, &attribute.name, updated);
        }
        Ok(())
    }

    // ----- no target -----

    fn unmatched_filter(&self, path: &AttributePath, op: PatchOp) -> ScimResult<()> {
        if op == PatchOp::Add {
            debug!("Filter of path '{}' matched nothing, add has no effect", path);
            return Ok(());
        }
        self.no_filter_target(path, true)
    }

    fn no_target(&self, path: &AttributePath, strict: bool) -> ScimResult<()> {
        if strict && !self.config.do_not_fail_on_no_target {
            return Err(ScimError::no_target(format!(
                "No target found for path '{}'",
                path
            )));
        }
        debug!("Nothing found at path '{}'", path);
        Ok(())
    }

    fn no_filter_target(&self, path: &AttributePath, strict: bool) -> ScimResult<()> {
        if strict && !self.config.do_not_fail_on_no_target {
            return Err(ScimError::no_target(format!(
                "No target found for path-filter '{}'",
                path
            )));
        }
        debug!("Nothing matched path-filter '{}'", path);
        Ok(())
    }

    // ----- document layout -----

    /// The object holding the attributes of `schema_id`: the document itself
    /// for the main schema, the object under the URI for an extension.
    fn container<'d>(
        &self,
        document: &'d Map<String, Value>,
        schema_id: &str,
    ) -> Option<&'d Map<String, Value>> {
        if !self.resource_type.is_extension(schema_id) {
            return Some(document);
        }
        get_ignore_case(document, schema_id)?.as_object()
    }

    fn container_mut<'d>(
        &self,
        document: &'d mut Map<String, Value>,
        schema_id: &str,
    ) -> Option<&'d mut Map<String, Value>> {
        if !self.resource_type.is_extension(schema_id) {
            return Some(document);
        }
        get_ignore_case_mut(document, schema_id)?.as_object_mut()
    }

    fn container_or_insert<'d>(
        &self,
        document: &'d mut Map<String, Value>,
        schema_id: &str,
    ) -> ScimResult<&'d mut Map<String, Value>> {
        if !self.resource_type.is_extension(schema_id) {
            return Ok(document);
        }
        let key = find_key(document, schema_id).unwrap_or_else(|| schema_id.to_string());
        document
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                ScimError::invalid_value(format!(
                    "Extension '{}' of the resource is not a JSON object",
                    schema_id
                ))
            })
    }

    /// Keep `schemas` in line with the extension object: an emptied
    /// extension is dropped together with its URI, a filled one is declared.
    fn sync_extension(&self, document: &mut Map<String, Value>, schema_id: &str) {
        if !self.resource_type.is_extension(schema_id) {
            return;
        }
        match get_ignore_case(document, schema_id).map(is_empty_value) {
            None => {}
            Some(true) => {
                debug!("Dropping emptied extension '{}'", schema_id);
                remove_ignore_case(document, schema_id);
                self.remove_schema_uri(document, schema_id);
            }
            Some(false) => self.add_schema_uri(document, schema_id),
        }
    }

    fn add_schema_uri(&self, document: &mut Map<String, Value>, schema_id: &str) {
        let key = find_key(document, SCHEMAS).unwrap_or_else(|| SCHEMAS.to_string());
        let schemas = document
            .entry(key)
            .or_insert_with(|| Value::Array(vec![Value::String(self.resource_type.schema.clone())]));
        if let Value::Array(uris) = schemas {
            if !uris.iter().any(|uri| same_uri(uri, schema_id)) {
                uris.push(Value::String(schema_id.to_string()));
            }
        }
    }

    fn remove_schema_uri(&self, document: &mut Map<String, Value>, schema_id: &str) {
        if let Some(Value::Array(uris)) = get_ignore_case_mut(document, SCHEMAS) {
            uris.retain(|uri| !same_uri(uri, schema_id));
        }
    }

    fn coercer(&self) -> ValueCoercer<'r> {
        ValueCoercer::new(self.registry, self.config.ignore_unknown_attributes)
    }

    fn enforcer(&self) -> MutabilityEnforcer<'r> {
        MutabilityEnforcer::new(self.registry)
    }

    fn evaluator(&self, id: AttributeId) -> FilterEvaluator<'r> {
        FilterEvaluator::new(self.registry, FilterScope::Attribute(id))
    }
}

fn same_uri(uri: &Value, schema_id: &str) -> bool {
    uri.as_str()
        .is_some_and(|uri| uri.eq_ignore_ascii_case(schema_id))
}

/// Null, or an array or object without content.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.values().all(Value::is_null),
        _ => false,
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(members) => Value::Object(
            members
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect(),
        ),
        other => other,
    }
}

/// Merge `incoming` into `target`. A `null` member removes the key.
fn merge_members(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (name, value) in incoming {
        if value.is_null() {
            remove_ignore_case(target, &name);
        } else {
            insert_ignore_case(target, &name, value);
        }
    }
}

/// Value of a sub-attribute after a write: ADD appends to a multi-valued
/// sub-attribute, everything else overwrites.
fn merge_leaf(
    attribute: &SchemaAttribute,
    op: PatchOp,
    current: Option<&Value>,
    value: Value,
) -> Value {
    if attribute.multi_valued && op == PatchOp::Add {
        let mut items = current.cloned().map(into_items).unwrap_or_default();
        items.extend(into_items(value));
        return Value::Array(items);
    }
    value
}

fn matching_indices(
    evaluator: &FilterEvaluator<'_>,
    filter: &FilterExpression,
    items: &[Value],
) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| evaluator.matches(filter, item))
        .map(|(index, _)| index)
        .collect()
}

/// Remove the elements at the sorted `indices`.
fn remove_indices(items: &mut Vec<Value>, indices: &[usize]) {
    let mut index = 0;
    items.retain(|_| {
        let keep = indices.binary_search(&index).is_err();
        index += 1;
        keep
    });
}

/// Remove the elements at the sorted `indices` and insert `incoming` where
/// the first of them was.
fn replace_indices(items: &mut Vec<Value>, indices: &[usize], incoming: Vec<Value>) {
    let Some(first) = indices.first().copied() else {
        return;
    };
    remove_indices(items, indices);
    items.splice(first..first, incoming);
}

/// Drop `key` when it was emptied, and emptied elements of an array under it.
fn drop_emptied(container: &mut Map<String, Value>, key: &str) {
    let Some(value) = container.get_mut(key) else {
        return;
    };
    if let Value::Array(items) = value {
        items.retain(|item| !(item.is_object() && is_empty_value(item)));
    }
    if is_empty_value(value) {
        container.shift_remove(key);
    }
}
