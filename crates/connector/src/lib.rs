//! Connector tool runtime
//!
//! A connector exposes provider operations as tools. Each call goes through
//! the same pipeline:
//!
//! 1. `InputSchema::validate()` rejects bad arguments (no credential or network work)
//! 2. `ApiClient::send()` asks the `CredentialManager` for a valid token, refreshing if needed
//! 3. Non-success provider responses become `ToolError::Http`
//! 4. `Connector::call_tool()` turns the result (or a panic) into a `ToolOutcome`
//!
//! Failures always read `Failed to <operation>: <message>` with token values
//! masked. Tool handlers never surface an error to the agent any other way.

pub mod client;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod rest;
pub mod schema;
pub mod tool;

#[cfg(test)]
mod test_support;

pub use client::{ApiClient, ApiRequest, DEFAULT_REQUEST_TIMEOUT, HeaderInjection};
pub use error::{DefinitionError, ErrorKind, ToolError};
pub use normalize::{CallToolResult, TextContent, ToolOutcome, format_failure, format_success};
pub use registry::Connector;
pub use rest::{RestTool, RestToolDef};
pub use schema::InputSchema;
pub use tool::{Tool, ToolDescriptor, ToolFuture};
