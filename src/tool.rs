//! Tool integration (§4.C, §15): a single polymorphic call point over three
//! transport variants — local in-process callables, HTTP/OpenAPI services,
//! and long-lived plugin RPC.
//!
//! Generalizes the teacher's `ToolRegistry`/`Tool` pair: the registry becomes
//! [`LocalToolService`], `Tool::execute` becomes [`LocalTool::execute`], and
//! every transport variant is unified behind one [`ToolService`] capability
//! trait so the [`ToolInvoker`] stays generic over `Arc<dyn ToolService>` the
//! way the teacher's `Agent` is generic over `Box<dyn LLMProvider>`.

use crate::error::{ToolInvokerError, ToolInvokerResult};
use crate::event::ToolControl;
use crate::types::{AgentId, CorrelationId, CustomerId, SessionId, ToolId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Default cap on a tool result's serialized size (§3 invariant).
pub const DEFAULT_TOOL_RESULT_MAX_BYTES: usize = 16 * 1024;

/// Parameter schema for one tool argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub param_type: String,
    pub required: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// A tool's signature, independent of which transport hosts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub id: ToolId,
    pub description: String,
    pub parameters: HashMap<String, ParameterSchema>,
}

/// Raw execution result from a transport, before the invoker's size cap and
/// failure-recording wrap it into a [`crate::event::ToolCallOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Control signal a tool attaches to hand a session to manual mode
    /// (§4.I.3); `None` for an ordinary result.
    #[serde(default)]
    pub control: Option<ToolControl>,
}

/// Context passed to a tool call so it can attribute itself and emit
/// intermediate events into the session's log under the same correlation id
/// as the batch that invoked it (§4.C).
#[derive(Clone)]
pub struct ToolContext {
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub customer_id: CustomerId,
    pub correlation_id: CorrelationId,
    emit: Arc<dyn Fn(serde_json::Value) + Send + Sync>,
}

impl ToolContext {
    pub fn new(
        agent_id: AgentId,
        session_id: SessionId,
        customer_id: CustomerId,
        correlation_id: CorrelationId,
        emit: Arc<dyn Fn(serde_json::Value) + Send + Sync>,
    ) -> Self {
        Self {
            agent_id,
            session_id,
            customer_id,
            correlation_id,
            emit,
        }
    }

    /// Lets a tool emit an intermediate `message`/`status` payload while it
    /// runs; the caller is responsible for wrapping this into a proper event.
    pub fn emit_intermediate(&self, payload: serde_json::Value) {
        (self.emit)(payload)
    }
}

fn validate_type(value: &serde_json::Value, expected_type: &str) -> bool {
    use serde_json::Value;

    match expected_type {
        "string" => matches!(value, Value::String(_)),
        "number" => matches!(value, Value::Number(_)),
        "boolean" => matches!(value, Value::Bool(_)),
        "object" => matches!(value, Value::Object(_)),
        "array" => matches!(value, Value::Array(_)),
        "null" => matches!(value, Value::Null),
        _ => true,
    }
}

/// Validates `arguments` against `schema`'s parameter constraints (§4.F):
/// required parameters must be present, enumerated parameters must match an
/// allowed value.
fn validate_arguments(schema: &ToolSchema, arguments: &HashMap<String, serde_json::Value>) -> Result<(), String> {
    for (name, param) in &schema.parameters {
        if param.required && !arguments.contains_key(name) {
            return Err(format!("missing required parameter: {name}"));
        }
    }

    for (name, value) in arguments {
        let Some(param) = schema.parameters.get(name) else {
            continue;
        };

        if !validate_type(value, &param.param_type) {
            return Err(format!("parameter '{name}' has wrong type, expected {}", param.param_type));
        }

        if let Some(allowed) = &param.enum_values {
            if let Some(s) = value.as_str() {
                if !allowed.iter().any(|a| a == s) {
                    return Err(format!("parameter '{name}' must be one of {allowed:?}"));
                }
            }
        }
    }

    Ok(())
}

/// A tool runnable in-process, the local transport's unit of work.
#[async_trait]
pub trait LocalTool: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> &ToolSchema;
    async fn execute(
        &self,
        context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> ToolInvokerResult<ToolResult>;
}

/// Capability common to every tool transport (§15's "model as a capability
/// set" design note).
#[async_trait]
pub trait ToolService: Send + Sync {
    fn service_name(&self) -> &str;
    async fn list_tools(&self) -> ToolInvokerResult<Vec<ToolSchema>>;
    async fn read_tool(&self, tool_id: &ToolId) -> ToolInvokerResult<ToolSchema>;
    async fn call(
        &self,
        tool_id: &ToolId,
        context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> ToolInvokerResult<ToolResult>;
}

/// In-process tool service, generalizing the teacher's `ToolRegistry`.
pub struct LocalToolService {
    service_name: String,
    tools: HashMap<ToolId, Arc<dyn LocalTool>>,
}

impl LocalToolService {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn LocalTool>) {
        let tool_id = ToolId::new(self.service_name.clone(), tool.name().to_string());
        debug!(%tool_id, "registering local tool");
        self.tools.insert(tool_id, tool);
    }
}

#[async_trait]
impl ToolService for LocalToolService {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn list_tools(&self) -> ToolInvokerResult<Vec<ToolSchema>> {
        Ok(self.tools.values().map(|t| t.schema().clone()).collect())
    }

    async fn read_tool(&self, tool_id: &ToolId) -> ToolInvokerResult<ToolSchema> {
        self.tools
            .get(tool_id)
            .map(|t| t.schema().clone())
            .ok_or_else(|| ToolInvokerError::NotFound(tool_id.clone()))
    }

    async fn call(
        &self,
        tool_id: &ToolId,
        context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> ToolInvokerResult<ToolResult> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolInvokerError::NotFound(tool_id.clone()))?;

        if let Err(reason) = validate_arguments(tool.schema(), &arguments) {
            return Err(ToolInvokerError::Transport {
                tool_id: tool_id.clone(),
                message: reason,
            });
        }

        tool.execute(context, arguments).await
    }
}

/// Thin `reqwest`-based client over a pre-parsed OpenAPI document. Schema
/// derivation from the raw OpenAPI spec is an authoring-time concern out of
/// scope here (§15); this service consumes already-parsed [`ToolSchema`]s and
/// issues plain HTTP calls against `base_url`.
pub struct OpenApiToolService {
    service_name: String,
    base_url: String,
    schemas: HashMap<ToolId, ToolSchema>,
    client: reqwest::Client,
}

impl OpenApiToolService {
    pub fn new(service_name: impl Into<String>, base_url: impl Into<String>, schemas: Vec<ToolSchema>) -> Self {
        let service_name = service_name.into();
        Self {
            schemas: schemas.into_iter().map(|s| (s.id.clone(), s)).collect(),
            service_name,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ToolService for OpenApiToolService {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn list_tools(&self) -> ToolInvokerResult<Vec<ToolSchema>> {
        Ok(self.schemas.values().cloned().collect())
    }

    async fn read_tool(&self, tool_id: &ToolId) -> ToolInvokerResult<ToolSchema> {
        self.schemas
            .get(tool_id)
            .cloned()
            .ok_or_else(|| ToolInvokerError::NotFound(tool_id.clone()))
    }

    async fn call(
        &self,
        tool_id: &ToolId,
        _context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> ToolInvokerResult<ToolResult> {
        let schema = self.read_tool(tool_id).await?;
        if let Err(reason) = validate_arguments(&schema, &arguments) {
            return Err(ToolInvokerError::Transport {
                tool_id: tool_id.clone(),
                message: reason,
            });
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), tool_id.tool_name);
        trace!(%tool_id, %url, "calling openapi tool");

        let response = self
            .client
            .post(&url)
            .json(&arguments)
            .send()
            .await
            .map_err(|e| ToolInvokerError::Transport {
                tool_id: tool_id.clone(),
                message: e.to_string(),
            })?;

        let output = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ToolInvokerError::ResultSchema {
                tool_id: tool_id.clone(),
                message: e.to_string(),
            })?;

        Ok(ToolResult {
            output,
            metadata: HashMap::new(),
            control: None,
        })
    }
}

/// One plugin RPC call, as a caller-supplied transport function. Tests and
/// embedders provide a channel-backed implementation; this keeps the
/// long-lived RPC connection itself out of this crate's scope.
pub type PluginTransport =
    Arc<dyn Fn(ToolId, ToolContext, HashMap<String, serde_json::Value>) -> PluginCallFuture + Send + Sync>;

pub type PluginCallFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = ToolInvokerResult<ToolResult>> + Send>>;

/// Long-lived plugin RPC transport (§15). Intermediate events flow through
/// the same [`ToolContext`] callback local tools use.
pub struct PluginToolService {
    service_name: String,
    schemas: HashMap<ToolId, ToolSchema>,
    transport: PluginTransport,
}

impl PluginToolService {
    pub fn new(service_name: impl Into<String>, schemas: Vec<ToolSchema>, transport: PluginTransport) -> Self {
        let service_name = service_name.into();
        Self {
            schemas: schemas.into_iter().map(|s| (s.id.clone(), s)).collect(),
            service_name,
            transport,
        }
    }
}

#[async_trait]
impl ToolService for PluginToolService {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn list_tools(&self) -> ToolInvokerResult<Vec<ToolSchema>> {
        Ok(self.schemas.values().cloned().collect())
    }

    async fn read_tool(&self, tool_id: &ToolId) -> ToolInvokerResult<ToolSchema> {
        self.schemas
            .get(tool_id)
            .cloned()
            .ok_or_else(|| ToolInvokerError::NotFound(tool_id.clone()))
    }

    async fn call(
        &self,
        tool_id: &ToolId,
        context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> ToolInvokerResult<ToolResult> {
        let schema = self.read_tool(tool_id).await?;
        if let Err(reason) = validate_arguments(&schema, &arguments) {
            return Err(ToolInvokerError::Transport {
                tool_id: tool_id.clone(),
                message: reason,
            });
        }

        (self.transport)(tool_id.clone(), context.clone(), arguments).await
    }
}

/// Dispatches calls to the service registered for a tool's `service_name`
/// and enforces the result size cap and non-fatal failure recording (§4.C).
pub struct ToolInvoker {
    services: HashMap<String, Arc<dyn ToolService>>,
    result_max_bytes: usize,
    call_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(result_max_bytes: usize, call_timeout: Duration) -> Self {
        Self {
            services: HashMap::new(),
            result_max_bytes,
            call_timeout,
        }
    }

    pub fn register_service(&mut self, service: Arc<dyn ToolService>) {
        self.services.insert(service.service_name().to_string(), service);
    }

    pub async fn list_tools(&self, service_name: &str) -> ToolInvokerResult<Vec<ToolSchema>> {
        let service = self
            .services
            .get(service_name)
            .ok_or_else(|| ToolInvokerError::NotFound(ToolId::new(service_name, "")))?;
        service.list_tools().await
    }

    pub async fn read_tool(&self, tool_id: &ToolId) -> ToolInvokerResult<ToolSchema> {
        let service = self
            .services
            .get(&tool_id.service_name)
            .ok_or_else(|| ToolInvokerError::NotFound(tool_id.clone()))?;
        service.read_tool(tool_id).await
    }

    /// Calls `tool_id`, never raising a transport/schema/size error to the
    /// caller: every failure mode is folded into a failed
    /// [`crate::event::ToolCallOutcome`] so a bad tool call can't abort the
    /// run that issued it (§4.C, §7).
    pub async fn call(
        &self,
        tool_id: &ToolId,
        context: &ToolContext,
        arguments: HashMap<String, serde_json::Value>,
    ) -> crate::event::ToolCallOutcome {
        let Some(service) = self.services.get(&tool_id.service_name) else {
            warn!(%tool_id, "no service registered for tool");
            return crate::event::ToolCallOutcome::failed(format!("no service registered for {tool_id}"));
        };

        let call = service.call(tool_id, context, arguments);
        let outcome = match timeout(self.call_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(%tool_id, error = %err, "tool call failed");
                return crate::event::ToolCallOutcome::failed(err.to_string());
            }
            Err(_) => {
                warn!(%tool_id, timeout_ms = self.call_timeout.as_millis(), "tool call timed out");
                return crate::event::ToolCallOutcome::failed(format!(
                    "tool call timed out after {}ms",
                    self.call_timeout.as_millis()
                ));
            }
        };

        match serde_json::to_vec(&outcome.output) {
            Ok(bytes) if bytes.len() > self.result_max_bytes => {
                warn!(%tool_id, actual_bytes = bytes.len(), limit_bytes = self.result_max_bytes, "tool result too large");
                crate::event::ToolCallOutcome::failed(format!(
                    "result of {} bytes exceeds the {}-byte cap",
                    bytes.len(),
                    self.result_max_bytes
                ))
            }
            Ok(_) => crate::event::ToolCallOutcome {
                data: outcome.output,
                control: outcome.control,
                metadata: if outcome.metadata.is_empty() {
                    None
                } else {
                    Some(serde_json::to_value(outcome.metadata).unwrap_or(serde_json::Value::Null))
                },
                error: None,
            },
            Err(e) => crate::event::ToolCallOutcome::failed(format!("result is not valid JSON: {e}")),
        }
    }
}
