//! Evaluation of filter expressions against JSON values.
//!
//! Comparisons are typed by the schema attribute they address: strings
//! compare case-insensitively unless the attribute is `caseExact`, numbers
//! compare numerically and dateTime values compare as instants. A comparison
//! on an absent attribute never matches.

use super::{ComparisonOperator, FilterExpression};
use crate::document::{get_ignore_case, is_present};
use crate::error::{ScimError, ScimResult};
use crate::schema::registry::parse_date_time;
use crate::schema::{AttributeId, AttributeType, ResourceType, SchemaAttribute, SchemaRegistry};
use serde_json::Value;
use std::cmp::Ordering;

/// What the values handed to [`FilterEvaluator::matches`] are.
#[derive(Debug, Clone, Copy)]
pub enum FilterScope<'r> {
    /// Whole resources of a resource type
    Resource(&'r ResourceType),
    /// Elements of a multi-valued attribute, or the value of a complex attribute
    Attribute(AttributeId),
}

/// Attribute a comparison path resolved to, and where to find its values.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The evaluated value itself (elements of a simple multi-valued attribute)
    Element(AttributeId),
    /// A sub-attribute of the evaluated object
    Member(AttributeId),
    /// An attribute of a whole resource
    Resource(AttributeId),
}

impl Target {
    fn attribute(self) -> AttributeId {
        match self {
            Self::Element(id) | Self::Member(id) | Self::Resource(id) => id,
        }
    }
}

/// Evaluates filters within one scope.
#[derive(Debug, Clone, Copy)]
pub struct FilterEvaluator<'r> {
    registry: &'r SchemaRegistry,
    scope: FilterScope<'r>,
}

impl<'r> FilterEvaluator<'r> {
    pub fn new(registry: &'r SchemaRegistry, scope: FilterScope<'r>) -> Self {
        Self { registry, scope }
    }

    /// Check that every attribute path of `expr` exists in this scope.
    pub fn validate(&self, expr: &FilterExpression) -> ScimResult<()> {
        for path in expr.attribute_paths() {
            if self.resolve(path).is_none() {
                return Err(ScimError::invalid_filter(format!(
                    "Attribute '{}' used in filter '{}' is unknown to '{}'",
                    path,
                    expr,
                    self.scope_name()
                )));
            }
        }
        Ok(())
    }

    /// Whether `value` satisfies `expr`.
    pub fn matches(&self, expr: &FilterExpression, value: &Value) -> bool {
        match expr {
            FilterExpression::MatchAll => true,
            FilterExpression::And(left, right) => {
                self.matches(left, value) && self.matches(right, value)
            }
            FilterExpression::Or(left, right) => {
                self.matches(left, value) || self.matches(right, value)
            }
            FilterExpression::Not(inner) => !self.matches(inner, value),
            FilterExpression::Comparison {
                path,
                operator,
                value: literal,
            } => self.compare(path, *operator, literal, value),
        }
    }

    fn scope_name(&self) -> &str {
        match self.scope {
            FilterScope::Resource(resource_type) => &resource_type.name,
            FilterScope::Attribute(id) => &self.registry.attribute(id).full_name,
        }
    }

    fn resolve(&self, path: &str) -> Option<Target> {
        match self.scope {
            FilterScope::Resource(resource_type) => self
                .registry
                .resolve_attribute_name(resource_type, path)
                .map(Target::Resource),
            FilterScope::Attribute(id) => {
                let attribute = self.registry.attribute(id);
                // `emails[emails.type eq "work"]` names the sub-attribute with its parent
                let relative = path
                    .split_once('.')
                    .filter(|(head, _)| head.eq_ignore_ascii_case(&attribute.name))
                    .map_or(path, |(_, rest)| rest);
                if attribute.is_complex() {
                    self.registry
                        .sub_attribute(id, relative)
                        .map(Target::Member)
                } else if relative.eq_ignore_ascii_case("value")
                    || relative.eq_ignore_ascii_case(&attribute.name)
                {
                    Some(Target::Element(id))
                } else {
                    None
                }
            }
        }
    }

    /// Non-null values the target holds within `value`, arrays flattened.
    fn candidates<'v>(&self, target: Target, value: &'v Value) -> Vec<&'v Value> {
        let mut found = Vec::new();
        match target {
            Target::Element(_) => flatten(value, &mut found),
            Target::Member(id) => {
                let attribute = self.registry.attribute(id);
                if let Some(member) = value
                    .as_object()
                    .and_then(|map| get_ignore_case(map, &attribute.name))
                {
                    flatten(member, &mut found);
                }
            }
            Target::Resource(id) => self.resource_values(id, value, &mut found),
        }

        // a complex attribute compared directly is compared by its value sub-attribute
        if self.registry.attribute(target.attribute()).is_complex() {
            found = found
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => get_ignore_case(map, "value"),
                    other => Some(other),
                })
                .filter(|item| !item.is_null())
                .collect();
        }
        found
    }

    fn resource_values<'v>(&self, id: AttributeId, resource: &'v Value, found: &mut Vec<&'v Value>) {
        let FilterScope::Resource(resource_type) = self.scope else {
            return;
        };
        let attribute = self.registry.attribute(id);
        let Some(root) = resource.as_object() else {
            return;
        };
        let container = if attribute.schema_id.eq_ignore_ascii_case(&resource_type.schema) {
            Some(root)
        } else {
            get_ignore_case(root, &attribute.schema_id).and_then(Value::as_object)
        };
        let Some(container) = container else {
            return;
        };

        match attribute.parent {
            None => {
                if let Some(value) = get_ignore_case(container, &attribute.name) {
                    flatten(value, found);
                }
            }
            Some(parent) => {
                let parent = self.registry.attribute(parent);
                let mut parents = Vec::new();
                if let Some(value) = get_ignore_case(container, &parent.name) {
                    flatten(value, &mut parents);
                }
                for item in parents {
                    if let Some(value) = item
                        .as_object()
                        .and_then(|map| get_ignore_case(map, &attribute.name))
                    {
                        flatten(value, found);
                    }
                }
            }
        }
    }

    fn compare(
        &self,
        path: &str,
        operator: ComparisonOperator,
        literal: &Value,
        value: &Value,
    ) -> bool {
        let Some(target) = self.resolve(path) else {
            return false;
        };
        let attribute = self.registry.attribute(target.attribute());
        let candidates = self.candidates(target, value);

        match operator {
            ComparisonOperator::Pr => candidates.into_iter().any(is_present),
            ComparisonOperator::Eq if literal.is_null() => candidates.is_empty(),
            ComparisonOperator::Ne if literal.is_null() => !candidates.is_empty(),
            ComparisonOperator::Ne => {
                !candidates.is_empty()
                    && !candidates
                        .iter()
                        .any(|candidate| equals(attribute, candidate, literal))
            }
            operator => candidates
                .iter()
                .any(|candidate| compare_value(attribute, operator, candidate, literal)),
        }
    }
}

fn flatten<'v>(value: &'v Value, found: &mut Vec<&'v Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|item| flatten(item, found)),
        other => found.push(other),
    }
}

fn fold(attribute: &SchemaAttribute, text: &str) -> String {
    if attribute.case_exact {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

fn equals(attribute: &SchemaAttribute, candidate: &Value, literal: &Value) -> bool {
    match (candidate, literal) {
        (Value::String(left), Value::String(right)) => {
            if attribute.data_type == AttributeType::DateTime {
                if let (Some(left), Some(right)) = (parse_date_time(left), parse_date_time(right)) {
                    return left == right;
                }
            }
            fold(attribute, left) == fold(attribute, right)
        }
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        (left, right) => left == right,
    }
}

fn ordering(attribute: &SchemaAttribute, candidate: &Value, literal: &Value) -> Option<Ordering> {
    match (candidate, literal) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => {
            if attribute.data_type == AttributeType::DateTime {
                if let (Some(left), Some(right)) = (parse_date_time(left), parse_date_time(right)) {
                    return Some(left.cmp(&right));
                }
            }
            Some(fold(attribute, left).cmp(&fold(attribute, right)))
        }
        _ => None,
    }
}

fn compare_value(
    attribute: &SchemaAttribute,
    operator: ComparisonOperator,
    candidate: &Value,
    literal: &Value,
) -> bool {
    match operator {
        ComparisonOperator::Eq => equals(attribute, candidate, literal),
        ComparisonOperator::Co | ComparisonOperator::Sw | ComparisonOperator::Ew => {
            let (Value::String(text), Value::String(needle)) = (candidate, literal) else {
                return false;
            };
            let (text, needle) = (fold(attribute, text), fold(attribute, needle));
            match operator {
                ComparisonOperator::Co => text.contains(&needle),
                ComparisonOperator::Sw => text.starts_with(&needle),
                _ => text.ends_with(&needle),
            }
        }
        ComparisonOperator::Gt => ordering(attribute, candidate, literal) == Some(Ordering::Greater),
        ComparisonOperator::Ge => matches!(
            ordering(attribute, candidate, literal),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOperator::Lt => ordering(attribute, candidate, literal) == Some(Ordering::Less),
        ComparisonOperator::Le => matches!(
            ordering(attribute, candidate, literal),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ComparisonOperator::Ne | ComparisonOperator::Pr => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::with_embedded_schemas().unwrap()
    }

    fn element_matches(registry: &SchemaRegistry, attribute: &str, filter: &str, value: Value) -> bool {
        let id = registry.get_schema_attribute("User", attribute).unwrap();
        let evaluator = FilterEvaluator::new(registry, FilterScope::Attribute(id));
        let expr = parse(filter).unwrap();
        evaluator.validate(&expr).unwrap();
        evaluator.matches(&expr, &value)
    }

    #[test]
    fn test_sub_attribute_comparison_ignores_case() {
        let registry = registry();
        let email = json!({"value": "Bjensen@Example.com", "type": "work"});
        assert!(element_matches(&registry, "emails", r#"type eq "WORK""#, email.clone()));
        assert!(element_matches(&registry, "emails", r#"value ew "example.COM""#, email.clone()));
        assert!(element_matches(&registry, "emails", r#"value sw "bjen""#, email.clone()));
        assert!(element_matches(&registry, "emails", r#"value co "@""#, email.clone()));
        assert!(!element_matches(&registry, "emails", r#"type eq "home""#, email));
    }

    #[test]
    fn test_case_exact_attribute() {
        let registry = registry();
        let resource_type = registry.resource_type("User").unwrap();
        let evaluator = FilterEvaluator::new(&registry, FilterScope::Resource(resource_type));
        let user = json!({"externalId": "AbC"});
        assert!(evaluator.matches(&parse(r#"externalId eq "AbC""#).unwrap(), &user));
        assert!(!evaluator.matches(&parse(r#"externalId eq "abc""#).unwrap(), &user));
    }

    #[test]
    fn test_absent_attribute_matches_nothing() {
        let registry = registry();
        let email = json!({"value": "a@b.c"});
        assert!(!element_matches(&registry, "emails", r#"type eq "work""#, email.clone()));
        assert!(!element_matches(&registry, "emails", r#"type ne "work""#, email.clone()));
        assert!(!element_matches(&registry, "emails", "type pr", email.clone()));
        assert!(element_matches(&registry, "emails", "not (type pr)", email.clone()));
        assert!(element_matches(&registry, "emails", "type eq null", email));
    }

    #[test]
    fn test_boolean_supports_only_equality() {
        let registry = registry();
        let email = json!({"value": "a@b.c", "primary": true});
        assert!(element_matches(&registry, "emails", "primary eq true", email.clone()));
        assert!(element_matches(&registry, "emails", "primary ne false", email.clone()));
        assert!(!element_matches(&registry, "emails", "primary gt false", email));
    }

    #[test]
    fn test_resource_scope_with_extension_and_multi_valued() {
        let registry = registry();
        let resource_type = registry.resource_type("User").unwrap();
        let evaluator = FilterEvaluator::new(&registry, FilterScope::Resource(resource_type));
        let user = json!({
            "userName": "bjensen",
            "name": {"givenName": "Barbara"},
            "emails": [{"value": "a@example.com", "type": "home"}, {"value": "b@example.org", "type": "work"}],
            "meta": {"lastModified": "2011-05-13T04:42:34Z"},
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "employeeNumber": "701984",
                "manager": {"value": "26118915-6090-4610-87e4-49d8ca9f808d"}
            }
        });

        for filter in [
            r#"userName eq "BJENSEN""#,
            r#"name.givenName sw "Bar""#,
            r#"emails.value ew "example.org""#,
            r#"emails.type eq "work" and emails.value co "example.com""#,
            r#"employeeNumber eq "701984""#,
            r#"urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value pr"#,
            r#"meta.lastModified gt "2011-05-13T04:42:34+01:00""#,
            r#"meta.lastModified lt "2011-05-13T05:00:00Z""#,
            "title eq null",
        ] {
            let expr = parse(filter).unwrap();
            evaluator.validate(&expr).unwrap();
            assert!(evaluator.matches(&expr, &user), "{} should match", filter);
        }
        for filter in [r#"userName ne "bjensen""#, "title pr", r#"emails.value eq "c@example.com""#] {
            assert!(!evaluator.matches(&parse(filter).unwrap(), &user), "{} should not match", filter);
        }
    }

    #[test]
    fn test_simple_multi_valued_element_scope() {
        let mut registry = SchemaRegistry::new();
        registry
            .load_schema_from_str(
                r#"{"id": "urn:example:Numbers", "attributes": [
                    {"name": "numbers", "type": "integer", "multiValued": true}
                ]}"#,
            )
            .unwrap();
        let id = registry.find_attribute("urn:example:Numbers", "numbers").unwrap();
        let evaluator = FilterEvaluator::new(&registry, FilterScope::Attribute(id));
        let expr = parse("value gt 2 and value le 4.0").unwrap();
        evaluator.validate(&expr).unwrap();
        assert!(!evaluator.matches(&expr, &json!(2)));
        assert!(evaluator.matches(&expr, &json!(3)));
        assert!(evaluator.matches(&expr, &json!(4)));
        assert!(!evaluator.matches(&expr, &json!(5)));
        assert!(!evaluator.matches(&parse(r#"value co "1""#).unwrap(), &json!(1)));
    }

    #[test]
    fn test_unknown_filter_attribute_is_rejected() {
        let registry = registry();
        let id = registry.get_schema_attribute("User", "emails").unwrap();
        let evaluator = FilterEvaluator::new(&registry, FilterScope::Attribute(id));
        let error = evaluator
            .validate(&parse(r#"unknown eq "x""#).unwrap())
            .unwrap_err();
        assert!(matches!(error, ScimError::InvalidFilter { .. }));
        assert!(evaluator.validate(&parse(r#"emails.type eq "x""#).unwrap()).is_ok());
    }
}
