//! Tool input schemas
//!
//! Each tool declares a JSON Schema for its arguments. Validation runs before
//! the handler touches credentials or the network.

use std::fmt;

use jsonschema::JSONSchema;
use serde_json::{Value, json};

use crate::error::ToolError;

/// How many individual schema violations are listed in one message.
const MAX_REPORTED_ERRORS: usize = 5;

/// A compiled JSON Schema plus its source, for listing.
pub struct InputSchema {
    raw: Value,
    compiled: JSONSchema,
}

impl InputSchema {
    /// Compile `raw`. Fails if it is not a valid JSON Schema.
    pub fn new(raw: Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(&raw).map_err(|e| e.to_string())?;
        Ok(Self { raw, compiled })
    }

    /// Schema accepting any JSON object.
    pub fn any_object() -> Self {
        Self::new(json!({"type": "object"})).expect("object schema literal compiles")
    }

    pub fn as_json(&self) -> &Value {
        &self.raw
    }

    /// Check `args` against the schema, listing the first few violations.
    pub fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let Err(errors) = self.compiled.validate(args) else {
            return Ok(());
        };
        let problems: Vec<String> = errors
            .take(MAX_REPORTED_ERRORS)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{path}: {err}")
                }
            })
            .collect();
        Err(ToolError::validation(problems.join("; ")))
    }
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema").field("raw", &self.raw).finish()
    }
}
