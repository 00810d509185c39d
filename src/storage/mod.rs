//! Read-access store contracts (§4.B, §14). From the engine's viewpoint
//! during a run these are read-only; authoring-time writes are outside this
//! crate's scope.
//!
//! This module mirrors the teacher's `storage::SessionStore`/`storage::memory`
//! split, generalized to the full set of stores the engine depends on.

pub mod memory;

use crate::agent::Agent;
use crate::context::{ContextVariable, ContextVariableValue};
use crate::customer::Customer;
use crate::glossary::Term;
use crate::guideline::{Guideline, GuidelineConnection, GuidelineToolAssociation};
use crate::session::Session;
use crate::types::{AgentId, ContextVariableId, CustomerId, GuidelineId, SessionId};
use async_trait::async_trait;
pub use thiserror::Error;

/// Storage-layer errors, generalizing the teacher's `StorageError`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, id: AgentId) -> Result<Option<Agent>, StoreError>;
    async fn insert(&self, agent: Agent) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    async fn insert(&self, customer: Customer) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GuidelineStore: Send + Sync {
    async fn list_for_agent(&self, agent_id: AgentId) -> Result<Vec<Guideline>, StoreError>;
    async fn get(&self, id: GuidelineId) -> Result<Option<Guideline>, StoreError>;
    async fn insert(&self, guideline: Guideline) -> Result<(), StoreError>;
}

/// Connections are indexed both directions (§9) so expansion can traverse
/// forward without scanning the whole store.
#[async_trait]
pub trait GuidelineConnectionStore: Send + Sync {
    async fn connections_from(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineConnection>, StoreError>;
    async fn connections_to(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineConnection>, StoreError>;
    async fn insert(&self, connection: GuidelineConnection) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ToolAssociationStore: Send + Sync {
    async fn associations_for(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineToolAssociation>, StoreError>;
    async fn insert(&self, association: GuidelineToolAssociation) -> Result<(), StoreError>;
}

#[async_trait]
pub trait GlossaryStore: Send + Sync {
    /// Terms ranked by similarity to `query_text`, best first, capped at `top_k`.
    async fn find_relevant(
        &self,
        agent_id: AgentId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<Term>, StoreError>;
    async fn insert(&self, term: Term) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ContextVariableStore: Send + Sync {
    async fn value(
        &self,
        agent_id: AgentId,
        variable_id: ContextVariableId,
        key: &str,
    ) -> Result<Option<ContextVariableValue>, StoreError>;

    async fn list_for_customer(
        &self,
        agent_id: AgentId,
        customer_id: CustomerId,
    ) -> Result<Vec<(ContextVariable, ContextVariableValue)>, StoreError>;

    async fn insert_variable(&self, variable: ContextVariable) -> Result<(), StoreError>;
    async fn insert_value(&self, value: ContextVariableValue) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: Session) -> Result<SessionId, StoreError>;
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError>;
    async fn update(&self, session: Session) -> Result<(), StoreError>;
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;
    async fn list(&self, agent_id: Option<AgentId>, customer_id: Option<CustomerId>) -> Result<Vec<Session>, StoreError>;
}
