//! The Agent entity (§3): operator-configured identity that owns a
//! guideline/glossary/context-variable set, addressed by [`AgentId`].

use crate::types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selects the message-generation strategy an agent uses. This crate
/// implements `Fluid`; other strategies are pluggable but not provided here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    Fluid,
}

impl Default for CompositionMode {
    fn default() -> Self {
        Self::Fluid
    }
}

/// An operator-configured conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub description: Option<String>,
    /// Upper bound on proposer→tools rounds per processing run (§4.H).
    /// `<= 0` is defined to mean "one iteration" (§9).
    pub max_iterations: i32,
    pub composition_mode: CompositionMode,
    pub creation_time: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            description: None,
            max_iterations: 3,
            composition_mode: CompositionMode::default(),
            creation_time: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: i32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Effective iteration cap, normalizing the `<= 0` open question (§9).
    pub fn effective_max_iterations(&self) -> u32 {
        if self.max_iterations <= 0 {
            1
        } else {
            self.max_iterations as u32
        }
    }
}
