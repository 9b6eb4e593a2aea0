//! PATCH request body as defined by RFC 7644 §3.5.2.

use crate::error::{ScimError, ScimResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Schema URI every PATCH request body declares.
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A PATCH request: an ordered list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOpRequest {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations", alias = "operations", default)]
    pub operations: Vec<PatchRequestOperation>,
}

impl PatchOpRequest {
    pub fn new(operations: Vec<PatchRequestOperation>) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA.to_string()],
            operations,
        }
    }

    /// Decode a request body.
    pub fn from_json(value: &Value) -> ScimResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ScimError::invalid_syntax(format!("Invalid PATCH request body: {}", e))
        })
    }

    /// Check the request envelope: the PatchOp schema (when schemas are
    /// given) and at least one operation.
    pub fn validate(&self) -> ScimResult<()> {
        if !self.schemas.is_empty()
            && !self
                .schemas
                .iter()
                .any(|schema| schema.eq_ignore_ascii_case(PATCH_OP_SCHEMA))
        {
            return Err(ScimError::invalid_syntax(format!(
                "PATCH request must declare the schema '{}' but declared {:?}",
                PATCH_OP_SCHEMA, self.schemas
            )));
        }
        if self.operations.is_empty() {
            return Err(ScimError::invalid_syntax(
                "PATCH request must contain at least one operation",
            ));
        }
        Ok(())
    }
}

/// One operation of a PATCH request.
///
/// `value` keeps an explicit JSON `null` as `Some(Value::Null)` so that it
/// can be told apart from a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequestOperation {
    pub op: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl PatchRequestOperation {
    pub fn add(path: Option<&str>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.map(str::to_string),
            value: Some(value),
        }
    }

    pub fn replace(path: Option<&str>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.map(str::to_string),
            value: Some(value),
        }
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: Some(path.to_string()),
            value: None,
        }
    }

    /// The path, if present and not blank.
    pub fn target_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// Check the operation-level rules that do not depend on the schema.
    pub fn validate(&self) -> ScimResult<()> {
        match self.op {
            PatchOp::Remove => {
                if self.target_path().is_none() {
                    return Err(ScimError::no_target("Missing target for remove operation"));
                }
                if let Some(value) = self.value.as_ref().filter(|value| !value.is_null()) {
                    return Err(ScimError::invalid_value(format!(
                        "Values must not be set for remove operation but was: {}",
                        value
                    )));
                }
            }
            PatchOp::Add | PatchOp::Replace => {
                if self.value.is_none() {
                    return Err(ScimError::invalid_value(format!(
                        "Missing value for '{}' operation on path '{}'",
                        self.op,
                        self.target_path().unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The three PATCH verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl FromStr for PatchOp {
    type Err = ScimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            "remove" => Ok(Self::Remove),
            _ => Err(ScimError::invalid_syntax(format!(
                "Unknown PATCH operation '{}'",
                s
            ))),
        }
    }
}

// Clients send "Add", "REPLACE" and friends, so accept any case.
impl<'de> Deserialize<'de> for PatchOp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        f.write_str(name)
    }
}
