//! Guidelines (§3): condition → action behavioral rules owned by an agent,
//! the directed connections between them, and their tool associations.
//!
//! This supersedes the teacher's Aho-Corasick/regex literal-pattern matcher:
//! a guideline's condition here is a natural-language applicability
//! predicate scored by an LLM (§4.D), not a compiled pattern, so there is no
//! pattern-compilation step left to generalize. See DESIGN.md for the full
//! rationale.

use crate::types::{AgentId, AssociationId, ConnectionId, GuidelineId, ToolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The natural-language condition/action pair defining a guideline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineContent {
    /// Applicability predicate, e.g. "the customer hasn't engaged yet".
    pub condition: String,
    /// Instruction to the agent, e.g. "Greet the customer".
    pub action: String,
}

/// A behavioral guideline owned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub id: GuidelineId,
    pub set: AgentId,
    pub content: GuidelineContent,
    pub creation_time: DateTime<Utc>,
}

impl Guideline {
    pub fn new(set: AgentId, condition: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: GuidelineId::new(),
            set,
            content: GuidelineContent {
                condition: condition.into(),
                action: action.into(),
            },
            creation_time: Utc::now(),
        }
    }
}

/// The kind of a directed edge between two guidelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Strict follow-up: the target must be included whenever the source is proposed.
    Entails,
    /// Soft follow-up: the target is worth surfacing but not mandatory.
    Suggests,
}

/// A directed relation from one guideline's applicability to another's
/// inclusion. The connection graph may contain cycles (§9); traversal must
/// use a visited set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineConnection {
    pub id: ConnectionId,
    pub source_guideline_id: GuidelineId,
    pub target_guideline_id: GuidelineId,
    pub kind: ConnectionKind,
}

/// A link permitting a tool to be called while a guideline is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineToolAssociation {
    pub id: AssociationId,
    pub guideline_id: GuidelineId,
    pub tool_id: ToolId,
}

/// A runtime judgement that a guideline applies now (§4.D). Transient:
/// lives only inside one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineProposition {
    pub guideline: Guideline,
    /// 1..=10; only propositions with score >= threshold are emitted.
    pub score: u8,
    pub rationale: String,
}

impl GuidelineProposition {
    pub fn meets_threshold(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}
