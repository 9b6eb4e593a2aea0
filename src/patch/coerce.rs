//! Conversion of raw JSON values into schema-conformant values.
//!
//! Type mismatches are collected in a [`ValidationContext`] so that a
//! multi-valued attribute reports its aggregate message before the message of
//! the offending element. Unknown and READ_ONLY sub-attributes abort at once.

use crate::document::{json_kind, literal};
use crate::error::{ScimError, ScimResult, ValidationContext};
use crate::schema::registry::parse_date_time;
use crate::schema::{AttributeId, AttributeType, Mutability, SchemaAttribute, SchemaRegistry};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::debug;
use serde_json::{Map, Value};

/// Coerces values for one registry.
#[derive(Debug, Clone, Copy)]
pub struct ValueCoercer<'r> {
    registry: &'r SchemaRegistry,
    ignore_unknown_attributes: bool,
}

impl<'r> ValueCoercer<'r> {
    pub fn new(registry: &'r SchemaRegistry, ignore_unknown_attributes: bool) -> Self {
        Self {
            registry,
            ignore_unknown_attributes,
        }
    }

    /// Coerce `raw` into a value of attribute `id`.
    ///
    /// Multi-valued attributes always produce an array; a bare value is
    /// wrapped into a one-element array. Complex values come back with
    /// canonical sub-attribute names, explicit `null` members are kept so
    /// callers can treat them as removals. `Ok(None)` means `raw` was null.
    pub fn coerce(&self, id: AttributeId, raw: &Value) -> ScimResult<Option<Value>> {
        let mut ctx = ValidationContext::new();
        let value = self.coerce_attribute(id, raw, &mut ctx)?;
        ctx.into_result()?;
        Ok(value)
    }

    fn coerce_attribute(
        &self,
        id: AttributeId,
        raw: &Value,
        ctx: &mut ValidationContext,
    ) -> ScimResult<Option<Value>> {
        let attribute = self.registry.attribute(id);
        match raw {
            Value::Null => Ok(None),
            _ if attribute.multi_valued => self.coerce_multi_valued(attribute, id, raw, ctx),
            _ => self.coerce_single(attribute, id, raw, ctx),
        }
    }

    fn coerce_multi_valued(
        &self,
        attribute: &SchemaAttribute,
        id: AttributeId,
        raw: &Value,
        ctx: &mut ValidationContext,
    ) -> ScimResult<Option<Value>> {
        let elements = match raw {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };

        let mut coerced = Vec::with_capacity(elements.len());
        let mut reported = false;
        for element in elements.iter().filter(|element| !element.is_null()) {
            let mut element_ctx = ValidationContext::new();
            let value = self.coerce_single(attribute, id, element, &mut element_ctx)?;
            if element_ctx.has_errors() {
                if !reported {
                    let kind = if attribute.is_complex() {
                        "multivalued complex attribute"
                    } else {
                        "multivalued attribute"
                    };
                    ctx.add_error(
                        &attribute.full_name,
                        format!("Found unsupported value in {} '{}'", kind, raw),
                    );
                    reported = true;
                }
                ctx.merge(element_ctx);
            } else if let Some(value) = value {
                coerced.push(value);
            }
        }
        Ok(Some(Value::Array(coerced)))
    }

    fn coerce_single(
        &self,
        attribute: &SchemaAttribute,
        id: AttributeId,
        raw: &Value,
        ctx: &mut ValidationContext,
    ) -> ScimResult<Option<Value>> {
        if attribute.is_complex() {
            return match raw {
                Value::Object(members) => self.coerce_complex(attribute, id, members, ctx),
                other => {
                    type_mismatch(attribute, other, ctx);
                    Ok(None)
                }
            };
        }

        let valid = match attribute.data_type {
            AttributeType::String | AttributeType::Reference => raw.is_string(),
            AttributeType::Boolean => raw.is_boolean(),
            AttributeType::Integer => raw.is_i64() || raw.is_u64(),
            AttributeType::Decimal => raw.is_number(),
            AttributeType::DateTime => raw.as_str().and_then(parse_date_time).is_some(),
            AttributeType::Binary => raw
                .as_str()
                .is_some_and(|text| BASE64.decode(text).is_ok()),
            AttributeType::Complex => false,
        };
        if !valid {
            type_mismatch(attribute, raw, ctx);
            return Ok(None);
        }

        if let (Some(text), false) = (raw.as_str(), attribute.canonical_values.is_empty()) {
            let known = attribute.canonical_values.iter().any(|canonical| {
                if attribute.case_exact {
                    canonical == text
                } else {
                    canonical.eq_ignore_ascii_case(text)
                }
            });
            if !known {
                ctx.add_error(
                    &attribute.full_name,
                    format!(
                        "Attribute '{}' does not match one of its canonicalValues '[{}]' actual value is '{}'",
                        attribute.full_name,
                        attribute.canonical_values.join(", "),
                        text
                    ),
                );
                return Ok(None);
            }
        }
        Ok(Some(raw.clone()))
    }

    fn coerce_complex(
        &self,
        attribute: &SchemaAttribute,
        id: AttributeId,
        members: &Map<String, Value>,
        ctx: &mut ValidationContext,
    ) -> ScimResult<Option<Value>> {
        let mut coerced = Map::new();
        for (name, raw) in members {
            let Some(sub_id) = self.registry.sub_attribute(id, name) else {
                if self.ignore_unknown_attributes {
                    debug!(
                        "Ignoring unknown sub-attribute '{}' of '{}'",
                        name, attribute.full_name
                    );
                    continue;
                }
                return Err(ScimError::unknown_attribute(format!(
                    "Attribute '{}.{}' is unknown to '{}'",
                    attribute.full_name, name, attribute.schema_id
                )));
            };
            let sub = self.registry.attribute(sub_id);
            if sub.mutability == Mutability::ReadOnly {
                return Err(ScimError::mutability(format!(
                    "the attribute '{}' is a '{}' attribute and cannot be changed",
                    sub.full_name, sub.mutability
                )));
            }

            let mut sub_ctx = ValidationContext::new();
            let value = self.coerce_attribute(sub_id, raw, &mut sub_ctx)?;
            if sub_ctx.has_errors() {
                ctx.merge(sub_ctx);
                continue;
            }
            coerced.insert(sub.name.clone(), value.unwrap_or(Value::Null));
        }
        Ok(Some(Value::Object(coerced)))
    }
}

fn type_mismatch(attribute: &SchemaAttribute, raw: &Value, ctx: &mut ValidationContext) {
    ctx.add_error(
        &attribute.full_name,
        format!(
            "Value of attribute '{}' is not of type '{}' but of type '{}' with value '{}'",
            attribute.full_name,
            attribute.data_type,
            json_kind(raw),
            literal(raw)
        ),
    );
}
