//! In-memory implementations of every store trait in [`super`]. Thread-safe
//! via `Arc<RwLock<HashMap<..>>>`, following the teacher's
//! `InMemorySessionStore` — suitable for tests and for running the engine
//! standalone, not a persistent backend.

use super::{
    AgentStore, ContextVariableStore, CustomerStore, GlossaryStore, GuidelineConnectionStore,
    GuidelineStore, SessionStore, StoreError, ToolAssociationStore,
};
use crate::agent::Agent;
use crate::context::{ContextVariable, ContextVariableValue};
use crate::customer::Customer;
use crate::glossary::{rank_by_relevance, LexicalOverlapScorer, Term};
use crate::guideline::{Guideline, GuidelineConnection, GuidelineToolAssociation};
use crate::session::Session;
use crate::types::{AgentId, ContextVariableId, CustomerId, GuidelineId, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryAgentStore {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn insert(&self, agent: Agent) -> Result<(), StoreError> {
        self.agents.write().await.insert(agent.id, agent);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCustomerStore {
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().await.get(&id).cloned())
    }

    async fn insert(&self, customer: Customer) -> Result<(), StoreError> {
        self.customers.write().await.insert(customer.id, customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryGuidelineStore {
    guidelines: Arc<RwLock<HashMap<GuidelineId, Guideline>>>,
}

impl InMemoryGuidelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GuidelineStore for InMemoryGuidelineStore {
    async fn list_for_agent(&self, agent_id: AgentId) -> Result<Vec<Guideline>, StoreError> {
        Ok(self
            .guidelines
            .read()
            .await
            .values()
            .filter(|g| g.set == agent_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: GuidelineId) -> Result<Option<Guideline>, StoreError> {
        Ok(self.guidelines.read().await.get(&id).cloned())
    }

    async fn insert(&self, guideline: Guideline) -> Result<(), StoreError> {
        self.guidelines.write().await.insert(guideline.id, guideline);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryGuidelineConnectionStore {
    connections: Arc<RwLock<Vec<GuidelineConnection>>>,
}

impl InMemoryGuidelineConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GuidelineConnectionStore for InMemoryGuidelineConnectionStore {
    async fn connections_from(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineConnection>, StoreError> {
        Ok(self
            .connections
            .read()
            .await
            .iter()
            .filter(|c| c.source_guideline_id == guideline_id)
            .cloned()
            .collect())
    }

    async fn connections_to(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineConnection>, StoreError> {
        Ok(self
            .connections
            .read()
            .await
            .iter()
            .filter(|c| c.target_guideline_id == guideline_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, connection: GuidelineConnection) -> Result<(), StoreError> {
        self.connections.write().await.push(connection);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryToolAssociationStore {
    associations: Arc<RwLock<Vec<GuidelineToolAssociation>>>,
}

impl InMemoryToolAssociationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolAssociationStore for InMemoryToolAssociationStore {
    async fn associations_for(&self, guideline_id: GuidelineId) -> Result<Vec<GuidelineToolAssociation>, StoreError> {
        Ok(self
            .associations
            .read()
            .await
            .iter()
            .filter(|a| a.guideline_id == guideline_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, association: GuidelineToolAssociation) -> Result<(), StoreError> {
        self.associations.write().await.push(association);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryGlossaryStore {
    terms: Arc<RwLock<Vec<Term>>>,
}

impl InMemoryGlossaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GlossaryStore for InMemoryGlossaryStore {
    async fn find_relevant(
        &self,
        agent_id: AgentId,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<Term>, StoreError> {
        let terms = self.terms.read().await;
        let for_agent: Vec<Term> = terms.iter().filter(|t| t.set == agent_id).cloned().collect();
        let ranked = rank_by_relevance(&LexicalOverlapScorer, query_text, &for_agent, top_k);
        Ok(ranked.into_iter().cloned().collect())
    }

    async fn insert(&self, term: Term) -> Result<(), StoreError> {
        self.terms.write().await.push(term);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContextVariableStore {
    variables: Arc<RwLock<HashMap<ContextVariableId, ContextVariable>>>,
    values: Arc<RwLock<HashMap<(ContextVariableId, String), ContextVariableValue>>>,
}

impl InMemoryContextVariableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextVariableStore for InMemoryContextVariableStore {
    async fn value(
        &self,
        _agent_id: AgentId,
        variable_id: ContextVariableId,
        key: &str,
    ) -> Result<Option<ContextVariableValue>, StoreError> {
        Ok(self
            .values
            .read()
            .await
            .get(&(variable_id, key.to_string()))
            .cloned())
    }

    async fn list_for_customer(
        &self,
        agent_id: AgentId,
        customer_id: CustomerId,
    ) -> Result<Vec<(ContextVariable, ContextVariableValue)>, StoreError> {
        let key = customer_id.to_string();
        let variables = self.variables.read().await;
        let values = self.values.read().await;

        Ok(variables
            .values()
            .filter(|v| v.set == agent_id)
            .filter_map(|v| {
                values
                    .get(&(v.id, key.clone()))
                    .map(|value| (v.clone(), value.clone()))
            })
            .collect())
    }

    async fn insert_variable(&self, variable: ContextVariable) -> Result<(), StoreError> {
        self.variables.write().await.insert(variable.id, variable);
        Ok(())
    }

    async fn insert_value(&self, value: ContextVariableValue) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert((value.variable_id, value.key.clone()), value);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<SessionId, StoreError> {
        let id = session.id;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            return Err(StoreError::AlreadyExists(format!("session {id}")));
        }
        sessions.insert(id, session);
        Ok(id)
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn update(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(StoreError::NotFound(format!("session {}", session.id)));
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    async fn list(&self, agent_id: Option<AgentId>, customer_id: Option<CustomerId>) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| agent_id.map_or(true, |a| s.agent_id == a))
            .filter(|s| customer_id.map_or(true, |c| s.customer_id == c))
            .cloned()
            .collect())
    }
}
