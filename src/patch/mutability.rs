//! Mutability, uniqueness and primary-value rules applied before a new value
//! is written into a resource.

use crate::document::{get_ignore_case, literal};
use crate::error::{ScimError, ScimResult};
use crate::schema::{AttributeId, Mutability, SchemaAttribute, SchemaRegistry, Uniqueness};
use serde_json::{Map, Value};

const PRIMARY: &str = "primary";

/// Enforces write rules for one registry.
#[derive(Debug, Clone, Copy)]
pub struct MutabilityEnforcer<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> MutabilityEnforcer<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Reject any write to a READ_ONLY attribute.
    pub fn check_writable(&self, id: AttributeId) -> ScimResult<()> {
        let attribute = self.registry.attribute(id);
        if attribute.mutability == Mutability::ReadOnly {
            return Err(read_only(attribute));
        }
        Ok(())
    }

    /// Check that replacing `current` with `new` is allowed.
    ///
    /// An assigned IMMUTABLE attribute may be removed (`new` is `None`) or
    /// re-assigned the identical value, nothing else. A READ_ONLY attribute
    /// may only keep the value it has. For a single-valued
    /// complex attribute the rule is applied to every sub-attribute present
    /// on both sides as well.
    pub fn check_assignment(
        &self,
        id: AttributeId,
        current: Option<&Value>,
        new: Option<&Value>,
    ) -> ScimResult<()> {
        let attribute = self.registry.attribute(id);
        let current = current.filter(|value| !value.is_null());
        let new = new.filter(|value| !value.is_null());
        let (Some(current), Some(new)) = (current, new) else {
            return Ok(());
        };

        match attribute.mutability {
            Mutability::ReadOnly if !self.same_value(attribute, current, new) => {
                return Err(read_only(attribute));
            }
            Mutability::Immutable if !self.same_value(attribute, current, new) => {
                return Err(ScimError::mutability(format!(
                    "attribute with name '{}' cannot be written it has a mutability of '{}'",
                    attribute.full_name, attribute.mutability
                )));
            }
            _ => {}
        }

        if attribute.is_complex() && !attribute.multi_valued {
            if let (Value::Object(current), Value::Object(new)) = (current, new) {
                self.check_members(id, current, new)?;
            }
        }
        Ok(())
    }

    /// Apply [`check_assignment`](Self::check_assignment) to every
    /// sub-attribute of a complex value.
    pub fn check_members(
        &self,
        id: AttributeId,
        current: &Map<String, Value>,
        new: &Map<String, Value>,
    ) -> ScimResult<()> {
        for sub_id in &self.registry.attribute(id).sub_attributes {
            let name = &self.registry.attribute(*sub_id).name;
            self.check_assignment(
                *sub_id,
                get_ignore_case(current, name),
                get_ignore_case(new, name),
            )?;
        }
        Ok(())
    }

    /// Reject duplicate elements for multi-valued attributes declared unique.
    pub fn check_unique_values(&self, id: AttributeId, values: &[Value]) -> ScimResult<()> {
        let attribute = self.registry.attribute(id);
        if attribute.uniqueness == Uniqueness::None {
            return Ok(());
        }
        for (index, value) in values.iter().enumerate() {
            if values[..index]
                .iter()
                .any(|earlier| self.same_value(attribute, earlier, value))
            {
                return Err(ScimError::invalid_value(format!(
                    "Attribute '{}' must not contain duplicate values but '{}' was found more than once",
                    attribute.full_name,
                    literal(value)
                )));
            }
        }
        Ok(())
    }

    /// Keep at most one element with `primary: true`.
    ///
    /// `touched` lists the indices written by the current operation. Two
    /// touched primaries are an error. One touched primary wins: the
    /// `primary` key is removed from every other element.
    pub fn enforce_single_primary(
        &self,
        id: AttributeId,
        items: &mut [Value],
        touched: &[usize],
    ) -> ScimResult<()> {
        let attribute = self.registry.attribute(id);
        if !attribute.is_multi_valued_complex() {
            return Ok(());
        }

        let primaries: Vec<usize> = touched
            .iter()
            .copied()
            .filter(|index| items.get(*index).is_some_and(is_primary))
            .collect();
        match primaries.as_slice() {
            [] => Ok(()),
            [winner] => {
                for (index, item) in items.iter_mut().enumerate() {
                    if index != *winner {
                        if let Value::Object(members) = item {
                            if let Some(key) = members
                                .keys()
                                .find(|key| key.eq_ignore_ascii_case(PRIMARY))
                                .cloned()
                            {
                                members.shift_remove(&key);
                            }
                        }
                    }
                }
                Ok(())
            }
            _ => Err(ScimError::invalid_value(format!(
                "Attribute '{}' has at least two primary values but only one primary is allowed '{}'",
                attribute.full_name,
                Value::Array(primaries.iter().map(|index| items[*index].clone()).collect())
            ))),
        }
    }

    fn same_value(&self, attribute: &SchemaAttribute, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::String(left), Value::String(right)) if !attribute.case_exact => {
                left.eq_ignore_ascii_case(right)
            }
            (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
            (left, right) => left == right,
        }
    }
}

fn is_primary(item: &Value) -> bool {
    item.as_object()
        .and_then(|members| get_ignore_case(members, PRIMARY))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn read_only(attribute: &SchemaAttribute) -> ScimError {
    ScimError::mutability(format!(
        "the attribute '{}' is a '{}' attribute and cannot be changed",
        attribute.full_name, attribute.mutability
    ))
}
