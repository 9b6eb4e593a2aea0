//! Resolution of PATCH attribute paths against the schemas of a resource type.
//!
//! A path is one of
//!
//! - a bare or dotted name: `userName`, `name.givenName`
//! - a fully qualified name: `urn:ietf:params:scim:schemas:core:2.0:User:userName`
//! - a value path with a filter: `emails[type eq "work"].value`
//! - an extension schema URI, addressing the whole extension object

use crate::error::{ScimError, ScimResult};
use crate::filter::{self, FilterEvaluator, FilterExpression, FilterScope};
use crate::schema::{AttributeId, Mutability, ResourceType, SchemaRegistry};
use std::fmt;

/// What a PATCH path addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PathTarget {
    /// The whole object of an extension schema
    Extension { schema_id: String },
    Attribute(AttributePath),
}

/// A resolved attribute path.
///
/// `attribute` is always a top-level attribute of one of the resource
/// type's schemas. SCIM complex attributes do not nest, so at most one
/// sub-attribute follows.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub raw: String,
    pub attribute: AttributeId,
    pub filter: Option<FilterExpression>,
    pub sub_attribute: Option<AttributeId>,
}

impl AttributePath {
    /// The attribute values are written to: the sub-attribute if any.
    pub fn leaf(&self) -> AttributeId {
        self.sub_attribute.unwrap_or(self.attribute)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves paths for one resource type.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'r> {
    registry: &'r SchemaRegistry,
    resource_type: &'r ResourceType,
}

impl<'r> PathResolver<'r> {
    pub fn new(registry: &'r SchemaRegistry, resource_type: &'r ResourceType) -> Self {
        Self {
            registry,
            resource_type,
        }
    }

    /// Resolve a path. READ_ONLY attributes anywhere on the path are rejected.
    ///
    /// Names no schema of the resource type declares fail with
    /// [`ScimError::UnknownAttribute`], every other malformed path with
    /// [`ScimError::InvalidPath`] or, for filter syntax, [`ScimError::InvalidFilter`].
    pub fn resolve(&self, path: &str) -> ScimResult<PathTarget> {
        let target = self.resolve_unchecked(path)?;
        if let PathTarget::Attribute(resolved) = &target {
            for id in [Some(resolved.attribute), resolved.sub_attribute]
                .into_iter()
                .flatten()
            {
                let attribute = self.registry.attribute(id);
                if attribute.mutability == Mutability::ReadOnly {
                    return Err(ScimError::invalid_path(format!(
                        "the attribute '{}' is a '{}' attribute and cannot be changed",
                        attribute.full_name, attribute.mutability
                    )));
                }
            }
        }
        Ok(target)
    }

    /// Resolve a path without the mutability check.
    pub fn resolve_unchecked(&self, path: &str) -> ScimResult<PathTarget> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ScimError::invalid_path("Attribute path must not be empty"));
        }
        if let Some(extension) = self.resource_type.extension(path) {
            return Ok(PathTarget::Extension {
                schema_id: extension.schema.clone(),
            });
        }

        let (head, filter_text, tail) = split_value_path(path)?;
        let (schema_id, attribute_path) = match head.rsplit_once(':') {
            Some((uri, rest)) => {
                let schema_id = self
                    .registry
                    .resolve_schema_uri(self.resource_type, uri)
                    .ok_or_else(|| self.unknown(path))?;
                (Some(schema_id), rest)
            }
            None => (None, head),
        };

        let mut segments = attribute_path.split('.');
        let root_name = segments.next().unwrap_or_default();
        let dotted_sub = segments.next();
        if segments.next().is_some() {
            return Err(self.unknown(path));
        }

        let attribute = match schema_id {
            Some(schema_id) => self.registry.find_attribute(schema_id, root_name),
            None => self
                .registry
                .find_resource_attribute(self.resource_type, root_name),
        }
        .ok_or_else(|| self.unknown(path))?;

        let sub_name = match (dotted_sub, tail) {
            (Some(_), Some(_)) => return Err(self.unknown(path)),
            (Some(_), None) if filter_text.is_some() => {
                return Err(ScimError::invalid_path(format!(
                    "Invalid path '{}': a filter must directly follow the attribute name",
                    path
                )));
            }
            (sub, None) | (None, sub) => sub,
        };
        let sub_attribute = match sub_name {
            None => None,
            Some(sub) => self.sub_attribute(path, attribute, sub)?,
        };

        let filter = match filter_text {
            None => None,
            Some(text) => Some(self.parse_filter(path, attribute, text)?),
        };

        Ok(PathTarget::Attribute(AttributePath {
            raw: path.to_string(),
            attribute,
            filter,
            sub_attribute,
        }))
    }

    fn sub_attribute(
        &self,
        path: &str,
        attribute: AttributeId,
        sub: &str,
    ) -> ScimResult<Option<AttributeId>> {
        let definition = self.registry.attribute(attribute);
        if definition.is_complex() {
            return self
                .registry
                .sub_attribute(attribute, sub)
                .map(Some)
                .ok_or_else(|| self.unknown(path));
        }
        // `numbers.value` addresses the elements of a simple multi-valued attribute
        if definition.multi_valued && sub.eq_ignore_ascii_case("value") {
            return Ok(None);
        }
        Err(ScimError::invalid_path(format!(
            "Attribute '{}' is not complex and has no sub-attribute '{}'",
            definition.full_name, sub
        )))
    }

    fn parse_filter(
        &self,
        path: &str,
        attribute: AttributeId,
        text: &str,
    ) -> ScimResult<FilterExpression> {
        let definition = self.registry.attribute(attribute);
        if !definition.multi_valued && !definition.is_complex() {
            return Err(ScimError::invalid_path(format!(
                "Invalid path '{}': filters are only allowed on multi-valued or complex attributes but '{}' is neither",
                path, definition.full_name
            )));
        }
        let expr = filter::parse(text)?;
        FilterEvaluator::new(self.registry, FilterScope::Attribute(attribute)).validate(&expr)?;
        Ok(expr)
    }

    fn unknown(&self, path: &str) -> ScimError {
        ScimError::unknown_attribute(format!(
            "Attribute '{}' is unknown to resource type '{}'",
            path, self.resource_type.name
        ))
    }
}

/// Split `attr[filter].sub` into `("attr", Some("filter"), Some("sub"))`.
fn split_value_path(path: &str) -> ScimResult<(&str, Option<&str>, Option<&str>)> {
    let Some(open) = path.find('[') else {
        if path.contains(']') {
            return Err(ScimError::invalid_filter(format!(
                "Invalid path '{}': unbalanced brackets",
                path
            )));
        }
        return Ok((path, None, None));
    };
    let close = path.rfind(']').filter(|close| *close > open).ok_or_else(|| {
        ScimError::invalid_filter(format!("Invalid path '{}': unbalanced brackets", path))
    })?;

    let head = &path[..open];
    let filter_text = &path[open + 1..close];
    let rest = &path[close + 1..];
    let tail = if rest.is_empty() {
        None
    } else {
        match rest.strip_prefix('.') {
            Some(sub) if !sub.is_empty() && !sub.contains(['.', '[', ']']) => Some(sub),
            _ => {
                return Err(ScimError::invalid_path(format!(
                    "Invalid path '{}': unexpected '{}' after filter",
                    path, rest
                )));
            }
        }
    };
    Ok((head, Some(filter_text), tail))
}
