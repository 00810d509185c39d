//! Session controller (§4.I): the boundary between posted events and the
//! processing engine. Owns exactly one in-flight run per session, coalesces
//! rapid customer messages by cancelling and restarting, and exposes
//! `wait_for_update` for long-poll style consumers.

use crate::cancellation::CancellationToken;
use crate::customer::Customer;
use crate::engine::{ProcessContext, ProcessingEngine};
use crate::error::{ControllerError, ControllerResult, EngineError, Result};
use crate::event::{EventData, EventFilters, EventKind, EventLog, EventPredicate, EventSource};
use crate::session::Session;
use crate::storage::{CustomerStore, SessionStore};
use crate::types::{AgentId, CustomerId, EventId, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The in-flight run for one session, if any.
struct RunHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the set of sessions and dispatches processing runs in response to
/// posted events (§4.I). One [`SessionController`] is shared across all
/// sessions an embedder serves; runs are tracked per [`SessionId`].
pub struct SessionController {
    engine: Arc<ProcessingEngine>,
    session_store: Arc<dyn SessionStore>,
    customer_store: Arc<dyn CustomerStore>,
    event_log: Arc<dyn EventLog>,
    runs: Mutex<HashMap<SessionId, RunHandle>>,
    cancellation_grace_period: Duration,
}

impl SessionController {
    /// The grace period is read from `engine.config.cancellation_grace_period_ms`
    /// (§12), not passed separately, so a single `EngineConfig` governs both
    /// the engine and the controller built on top of it.
    pub fn new(
        engine: Arc<ProcessingEngine>,
        session_store: Arc<dyn SessionStore>,
        customer_store: Arc<dyn CustomerStore>,
        event_log: Arc<dyn EventLog>,
    ) -> Self {
        let cancellation_grace_period = engine.config.cancellation_grace_period();
        Self {
            engine,
            session_store,
            customer_store,
            event_log,
            runs: Mutex::new(HashMap::new()),
            cancellation_grace_period,
        }
    }

    /// Creates a session for `agent_id`/`customer_id`. When `allow_greeting`
    /// is set, immediately schedules one engine run against an empty
    /// interaction history — the sole case where the engine may emit a
    /// message without a prior triggering customer event (§4.I.4).
    pub async fn create_session(
        &self,
        agent_id: AgentId,
        customer_id: CustomerId,
        title: Option<String>,
        allow_greeting: bool,
    ) -> Result<SessionId> {
        let mut session = Session::new(agent_id, customer_id);
        if let Some(title) = title {
            session = session.with_title(title);
        }
        let session_id = self.session_store.create(session).await?;

        if allow_greeting {
            self.spawn_run(session_id, agent_id, None).await;
        }

        Ok(session_id)
    }

    pub async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        self.session_store
            .get(session_id)
            .await?
            .ok_or(EngineError::Controller(ControllerError::SessionNotFound(session_id)))
    }

    pub async fn list_sessions(&self, agent_id: Option<AgentId>, customer_id: Option<CustomerId>) -> Result<Vec<Session>> {
        Ok(self.session_store.list(agent_id, customer_id).await?)
    }

    pub async fn update_session(&self, session: Session) -> Result<()> {
        Ok(self.session_store.update(session).await?)
    }

    /// Deletes a session, cancelling any in-flight run and cascading to its
    /// event log (§4.I.5).
    pub async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.cancel_run(session_id).await;
        self.event_log.delete_session_events(session_id).await?;
        self.session_store.delete(session_id).await?;
        Ok(())
    }

    /// Deletes every session matching either filter, cascading each one
    /// (§4.I.5's bulk variant).
    pub async fn delete_sessions(&self, agent_id: Option<AgentId>, customer_id: Option<CustomerId>) -> Result<usize> {
        let sessions = self.session_store.list(agent_id, customer_id).await?;
        let count = sessions.len();
        for session in sessions {
            self.delete_session(session.id).await?;
        }
        Ok(count)
    }

    async fn cancel_run(&self, session_id: SessionId) {
        let mut runs = self.runs.lock().await;
        if let Some(handle) = runs.remove(&session_id) {
            handle.cancellation.cancel();
            let grace = self.cancellation_grace_period;
            tokio::spawn(async move {
                let _ = tokio::time::timeout(grace, handle.task).await;
            });
        }
    }

    async fn spawn_run(&self, session_id: SessionId, agent_id: AgentId, triggering_offset: Option<u64>) {
        self.cancel_run(session_id).await;

        let cancellation = CancellationToken::new();
        let engine = self.engine.clone();
        let ctx = ProcessContext {
            session_id,
            agent_id,
            triggering_offset,
        };
        let run_cancellation = cancellation.clone();

        let task = tokio::spawn(async move {
            if let Err(err) = engine.process(ctx, run_cancellation).await {
                warn!(%session_id, %err, "processing run exited with an error");
            }
        });

        self.runs.lock().await.insert(session_id, RunHandle { cancellation, task });
    }

    /// Appends `data` from `source` into `session_id`'s log and, for an
    /// automatic-mode session receiving a customer message, cancels any
    /// in-flight run and schedules a fresh one carrying the new triggering
    /// offset (§4.I.2's coalescing behavior — rapid successive customer
    /// messages collapse into a single run against the latest state).
    pub async fn post_event(&self, session_id: SessionId, source: EventSource, data: EventData) -> Result<EventId> {
        let session = self.get_session(session_id).await?;
        let correlation_id = crate::types::CorrelationId::generate();

        let event = self.event_log.append(session_id, source, correlation_id, data).await?;

        let should_run = session.is_auto() && source == EventSource::Customer && event.kind() == EventKind::Message;

        if should_run {
            self.spawn_run(session_id, session.agent_id, Some(event.offset)).await;
        }

        Ok(event.id)
    }

    /// Blocks until `session_id` has a new event at or beyond `min_offset`
    /// matching `kinds` (or any kind, if empty), or `timeout` elapses
    /// (§4.I.6's long-poll consumer contract).
    pub async fn wait_for_update(
        &self,
        session_id: SessionId,
        min_offset: u64,
        kinds: Vec<EventKind>,
        timeout: Duration,
    ) -> bool {
        let predicate: EventPredicate = if kinds.is_empty() {
            Arc::new(move |e| e.offset >= min_offset)
        } else {
            Arc::new(move |e| e.offset >= min_offset && kinds.contains(&e.kind()))
        };

        self.event_log.wait(session_id, predicate, timeout).await
    }

    /// Returns every event in `session_id` sharing `correlation_id`, useful
    /// for inspecting one processing run end-to-end (§8's interaction
    /// inspection scenario).
    pub async fn events_for_correlation(
        &self,
        session_id: SessionId,
        correlation_id: crate::types::CorrelationId,
    ) -> Result<Vec<crate::event::Event>> {
        Ok(self
            .event_log
            .list(session_id, EventFilters::new().correlation_id(correlation_id))
            .await?)
    }

    pub async fn ensure_customer(&self, customer_id: CustomerId, default_name: impl Into<String>) -> Result<Customer> {
        if let Some(customer) = self.customer_store.get(customer_id).await? {
            return Ok(customer);
        }

        let customer = Customer::new(default_name);
        self.customer_store.insert(customer.clone()).await?;
        debug!(%customer_id, "auto-registered customer on first contact");
        Ok(customer)
    }

    /// Switches `session_id` to manual mode, e.g. in response to an operator
    /// request or a tool-driven handoff observed outside a processing run.
    pub async fn switch_to_manual(&self, session_id: SessionId) -> Result<()> {
        let mut session = self.get_session(session_id).await?;
        session.switch_to_manual();
        self.session_store.update(session).await?;
        self.cancel_run(session_id).await;
        Ok(())
    }

    pub async fn reset_to_auto(&self, session_id: SessionId) -> Result<()> {
        let mut session = self.get_session(session_id).await?;
        session.reset_to_auto();
        self.session_store.update(session).await?;
        Ok(())
    }
}
