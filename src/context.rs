//! Context variables (§3): named, per-customer data points an agent can
//! read while composing a reply (e.g. subscription tier, account balance).

use crate::types::{AgentId, ContextVariableId, ToolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The definition of a context variable owned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVariable {
    pub id: ContextVariableId,
    pub set: AgentId,
    pub name: String,
    pub description: Option<String>,
    /// If set, this tool is invoked to (re)compute the variable's value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<ToolId>,
    /// Opaque freshness policy (e.g. "max-age: 1h"); interpreted by whatever
    /// schedules tool-backed refreshes, outside this crate's scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_rules: Option<String>,
}

impl ContextVariable {
    pub fn new(set: AgentId, name: impl Into<String>) -> Self {
        Self {
            id: ContextVariableId::new(),
            set,
            name: name.into(),
            description: None,
            tool_id: None,
            freshness_rules: None,
        }
    }

    pub fn with_tool(mut self, tool_id: ToolId) -> Self {
        self.tool_id = Some(tool_id);
        self
    }
}

/// A value bound to a context variable for a particular key, usually a
/// customer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVariableValue {
    pub variable_id: ContextVariableId,
    pub key: String,
    pub data: serde_json::Value,
    pub last_modified: DateTime<Utc>,
}

impl ContextVariableValue {
    pub fn new(variable_id: ContextVariableId, key: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            variable_id,
            key: key.into(),
            data,
            last_modified: Utc::now(),
        }
    }
}
