//! Declarative REST tool
//!
//! Most connector tools are one HTTP call: fill a path template from the
//! arguments, send the rest as query string or JSON body, return the JSON.
//! `RestTool` covers that shape from a definition, so adding a provider
//! operation is configuration rather than a new handler.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{DefinitionError, ToolError};
use crate::schema::InputSchema;
use crate::tool::{Tool, ToolFuture};

/// Serializable tool definition, as found in connector config.
#[derive(Debug, Clone, Deserialize)]
pub struct RestToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Verb phrase for failure text; defaults to the name with spaces.
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    /// Path relative to the API base URL, with `{param}` placeholders.
    pub path: String,
    /// JSON Schema for the arguments; derived from the path when absent.
    #[serde(default)]
    pub input_schema: Option<Value>,
}

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Tool backed by a single templated provider request.
#[derive(Debug)]
pub struct RestTool {
    name: String,
    description: String,
    operation: String,
    method: Method,
    template: Vec<Segment>,
    schema: InputSchema,
}

impl RestTool {
    pub fn new(def: RestToolDef) -> Result<Self, DefinitionError> {
        let method = match def.method.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            _ => {
                return Err(DefinitionError::Method {
                    tool: def.name,
                    method: def.method,
                });
            }
        };

        let template = parse_template(&def.path).map_err(|message| DefinitionError::Path {
            tool: def.name.clone(),
            message,
        })?;

        let raw_schema = def
            .input_schema
            .unwrap_or_else(|| schema_from_params(&template));
        let schema = InputSchema::new(raw_schema).map_err(|message| DefinitionError::Schema {
            tool: def.name.clone(),
            message,
        })?;

        let operation = def
            .operation
            .filter(|op| !op.trim().is_empty())
            .unwrap_or_else(|| def.name.replace('_', " "));

        Ok(Self {
            name: def.name,
            description: def.description,
            operation,
            method,
            template,
            schema,
        })
    }

    fn params(&self) -> impl Iterator<Item = &str> {
        self.template.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Turn validated arguments into a request.
    fn build_request(&self, args: &Value) -> Result<ApiRequest, ToolError> {
        let empty = Map::new();
        let args = args.as_object().unwrap_or(&empty);

        let mut path = String::new();
        for segment in &self.template {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) => {
                    let value = args.get(name).ok_or_else(|| {
                        ToolError::validation(format!("missing path parameter `{name}`"))
                    })?;
                    let text = scalar_to_string(value).ok_or_else(|| {
                        ToolError::validation(format!(
                            "path parameter `{name}` must be a string, number or boolean"
                        ))
                    })?;
                    if text.is_empty() {
                        return Err(ToolError::validation(format!(
                            "path parameter `{name}` must not be empty"
                        )));
                    }
                    // Dot segments survive percent-encoding and are collapsed
                    // by URL resolution, escaping the declared path.
                    if text == "." || text == ".." {
                        return Err(ToolError::validation(format!(
                            "path parameter `{name}` must not be `{text}`"
                        )));
                    }
                    path.push_str(&urlencoding::encode(&text));
                }
            }
        }

        let params: Vec<&str> = self.params().collect();
        let rest: Map<String, Value> = args
            .iter()
            .filter(|(key, value)| !params.contains(&key.as_str()) && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut request = ApiRequest::new(self.method.clone(), path);
        if sends_body(&self.method) {
            if !rest.is_empty() {
                request = request.with_body(Value::Object(rest));
            }
        } else {
            for (key, value) in rest {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            request = request.with_query(key.clone(), query_value(&item));
                        }
                    }
                    other => request = request.with_query(key, query_value(&other)),
                }
            }
        }
        Ok(request)
    }
}

impl Tool for RestTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn operation(&self) -> &str {
        &self.operation
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    fn call<'a>(&'a self, client: &'a ApiClient, args: &'a Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let request = self.build_request(args)?;
            client.send(request).await
        })
    }
}

fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn parse_template(path: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(format!("unclosed `{{` in `{path}`")),
                        Some(ch) => name.push(ch),
                    }
                }
                let name = name.trim().to_owned();
                if name.is_empty() {
                    return Err(format!("empty placeholder in `{path}`"));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Param(name));
            }
            '}' => return Err(format!("unmatched `}}` in `{path}`")),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn schema_from_params(template: &[Segment]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for segment in template {
        if let Segment::Param(name) = segment {
            properties.insert(
                name.clone(),
                json!({"type": ["string", "integer"]}),
            );
            required.push(Value::String(name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn query_value(value: &Value) -> String {
    scalar_to_string(value).unwrap_or_else(|| value.to_string())
}
