//! Connector: a named set of tools sharing one authenticated client
//!
//! `call_tool` is the normalization boundary. Whatever happens inside a
//! handler, the caller gets a `ToolOutcome` back and never an `Err` or a
//! panic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::client::ApiClient;
use crate::error::{DefinitionError, ToolError};
use crate::normalize::{ToolOutcome, catch_panics, format_failure};
use crate::tool::{Tool, ToolDescriptor};

pub struct Connector {
    id: String,
    client: ApiClient,
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl Connector {
    pub fn new(id: impl Into<String>, client: ApiClient) -> Self {
        Self {
            id: id.into(),
            client,
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a tool. Names are unique within a connector.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), DefinitionError> {
        let name = tool.name().to_owned();
        if self.index.contains_key(&name) {
            return Err(DefinitionError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Registered tools in registration order.
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor::of(tool.as_ref()))
            .collect()
    }

    /// Run one tool and normalize the result.
    ///
    /// `null` arguments are treated as `{}`. Arguments are checked against the
    /// tool's schema before credentials or the network are touched.
    #[instrument(skip(self, args), fields(connector = %self.id))]
    pub async fn call_tool(&self, name: &str, args: Value) -> ToolOutcome {
        let args = match args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let Some(tool) = self.tool(name) else {
            metrics::counter!(
                "connector_tool_calls_total",
                "tool" => "unknown",
                "outcome" => "validation"
            )
            .increment(1);
            let err = ToolError::validation(format!("unknown tool `{name}`"));
            return self.failure(&format!("call {name}"), err, Vec::new()).await;
        };

        let secrets_before = self.client.credentials().secret_values().await;
        let started = Instant::now();

        let result = match tool.input_schema().validate(&args) {
            Err(e) => Err(e),
            Ok(()) => catch_panics(async { tool.call(&self.client, &args).await }).await,
        };

        let tool_label = tool.name().to_owned();
        metrics::histogram!("connector_tool_call_duration_seconds", "tool" => tool_label.clone())
            .record(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().label(),
        };
        metrics::counter!(
            "connector_tool_calls_total",
            "tool" => tool_label,
            "outcome" => outcome
        )
        .increment(1);

        match result {
            Ok(value) => {
                debug!(tool = name, "tool call succeeded");
                ToolOutcome::Success(value)
            }
            Err(err) => self.failure(tool.operation(), err, secrets_before).await,
        }
    }

    /// `call_tool`, reduced to the string handed back to the agent.
    pub async fn invoke(&self, name: &str, args: Value) -> String {
        self.call_tool(name, args).await.text()
    }

    /// `secrets` holds values seen before the call; a refresh during the call
    /// may have replaced them, so the current ones are added too.
    async fn failure(
        &self,
        operation: &str,
        err: ToolError,
        mut secrets: Vec<String>,
    ) -> ToolOutcome {
        secrets.extend(self.client.credentials().secret_values().await);
        let kind = err.kind();
        let message = format_failure(operation, &err, &secrets);
        warn!(kind = kind.label(), error = %message, "tool call failed");
        ToolOutcome::Failure { kind, message }
    }
}
