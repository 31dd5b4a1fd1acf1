//! Tool abstraction
//!
//! A tool is a named, schema-checked operation backed by one or more provider
//! calls. Handlers return typed `Result`s; the `Connector` owns the boundary
//! that turns those into text.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ToolError;
use crate::schema::InputSchema;

/// Boxed handler future, so `Arc<dyn Tool>` stays dyn-compatible.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// One callable operation exposed by a connector.
pub trait Tool: Send + Sync {
    /// Registered name, e.g. `get_activity`.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Verb phrase used in failure text: `Failed to <operation>: ...`.
    fn operation(&self) -> &str;

    fn input_schema(&self) -> &InputSchema;

    /// Run the handler. `args` has already passed `input_schema()`.
    fn call<'a>(&'a self, client: &'a ApiClient, args: &'a Value) -> ToolFuture<'a>;
}

/// Listing entry for a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_owned(),
            description: tool.description().to_owned(),
            input_schema: tool.input_schema().as_json().clone(),
        }
    }
}
