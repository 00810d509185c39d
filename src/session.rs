//! The Session entity (§3): the exclusive owner of one customer's event log
//! with an agent.

use crate::types::{AgentId, CustomerId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether the engine runs automatically on new customer messages, or a
/// human has taken over (§4.I.3, §8 scenario 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Auto,
    Manual,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// A conversation between one customer and one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: AgentId,
    pub customer_id: CustomerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub mode: SessionMode,
    /// Per-consumer cursor into this session's event stream, recording the
    /// last offset each named consumer has acknowledged.
    #[serde(default)]
    pub consumption_offsets: HashMap<String, u64>,
    pub creation_time: DateTime<Utc>,
}

impl Session {
    pub fn new(agent_id: AgentId, customer_id: CustomerId) -> Self {
        Self {
            id: SessionId::new(),
            agent_id,
            customer_id,
            title: None,
            mode: SessionMode::Auto,
            consumption_offsets: HashMap::new(),
            creation_time: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_auto(&self) -> bool {
        self.mode == SessionMode::Auto
    }

    /// Invoked by the controller when a tool result carries `control.mode =
    /// manual` (§4.I.3): disables automatic engine runs until reset.
    pub fn switch_to_manual(&mut self) {
        self.mode = SessionMode::Manual;
    }

    pub fn reset_to_auto(&mut self) {
        self.mode = SessionMode::Auto;
    }

    pub fn set_consumption_offset(&mut self, consumer: impl Into<String>, offset: u64) {
        self.consumption_offsets.insert(consumer.into(), offset);
    }

    pub fn consumption_offset(&self, consumer: &str) -> u64 {
        self.consumption_offsets.get(consumer).copied().unwrap_or(0)
    }
}
