//! The event log (§4.A): an append-only, offset-dense, per-session ordered
//! sequence of events. Both the session controller and the processing engine
//! consume it exclusively through the [`EventLog`] trait.

use crate::error::{EventLogError, EventLogResult};
use crate::types::{CorrelationId, EventId, SessionId, ToolId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, trace};

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Customer,
    AiAgent,
    HumanAgentOnBehalfOfAiAgent,
    System,
}

/// The kind tag of an event, used for filtering `list`/`wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Tool,
    Status,
    Custom,
}

/// Who a message event is attributed to, for display purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParticipant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub message: String,
    pub participant: MessageParticipant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Control signal a tool can attach to its result, e.g. to hand a session
/// over to a human agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolControl {
    pub mode: ToolControlMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolControlMode {
    Manual,
    Auto,
}

/// The outcome of one tool invocation as recorded in a tool event. `error`
/// is populated instead of `data` when the call failed (§4.C: failures are
/// non-fatal and recorded inline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<ToolControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            data,
            control: None,
            metadata: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: serde_json::Value::Null,
            control: None,
            metadata: None,
            error: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_id: ToolId,
    pub arguments: serde_json::Value,
    pub result: ToolCallOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolData {
    pub tool_calls: Vec<ToolCallRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Acknowledged,
    Processing,
    Typing,
    Cancelled,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventData {
    Message(MessageData),
    Tool(ToolData),
    Status(StatusData),
    Custom(serde_json::Value),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Message(_) => EventKind::Message,
            EventData::Tool(_) => EventKind::Tool,
            EventData::Status(_) => EventKind::Status,
            EventData::Custom(_) => EventKind::Custom,
        }
    }
}

/// A single, immutable (except for the `deleted` tombstone flag) entry in a
/// session's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub session_id: SessionId,
    pub source: EventSource,
    /// 0-based, dense, monotonic within the session.
    pub offset: u64,
    pub correlation_id: CorrelationId,
    pub creation_time: DateTime<Utc>,
    pub data: EventData,
    pub deleted: bool,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }
}

/// Filters accepted by [`EventLog::list`].
#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    pub min_offset: Option<u64>,
    pub source: Option<EventSource>,
    pub kinds: Option<Vec<EventKind>>,
    pub correlation_id: Option<CorrelationId>,
    pub exclude_deleted: bool,
}

impl EventFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_offset(mut self, offset: u64) -> Self {
        self.min_offset = Some(offset);
        self
    }

    pub fn kinds(mut self, kinds: Vec<EventKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn exclude_deleted(mut self) -> Self {
        self.exclude_deleted = true;
        self
    }

    fn matches(&self, event: &Event) -> bool {
        if self.exclude_deleted && event.deleted {
            return false;
        }
        if let Some(min_offset) = self.min_offset {
            if event.offset < min_offset {
                return false;
            }
        }
        if let Some(source) = self.source {
            if event.source != source {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        if let Some(correlation_id) = self.correlation_id {
            if event.correlation_id != correlation_id {
                return false;
            }
        }
        true
    }
}

/// A totalized predicate used by [`EventLog::wait`]; must never panic.
pub type EventPredicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// The append-only, offset-ordered, per-session event sequence (§4.A).
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(
        &self,
        session_id: SessionId,
        source: EventSource,
        correlation_id: CorrelationId,
        data: EventData,
    ) -> EventLogResult<Event>;

    async fn list(&self, session_id: SessionId, filters: EventFilters) -> EventLogResult<Vec<Event>>;

    async fn delete(&self, event_id: EventId) -> EventLogResult<()>;

    /// Blocks until a newly appended event to `session_id` matches
    /// `predicate`, or `timeout` elapses. `timeout = 0` is a non-blocking poll.
    async fn wait(
        &self,
        session_id: SessionId,
        predicate: EventPredicate,
        timeout: Duration,
    ) -> bool;

    /// Deletes every event belonging to `session_id`. Used by session
    /// deletion to cascade atomically from the consumer's perspective.
    async fn delete_session_events(&self, session_id: SessionId) -> EventLogResult<()>;
}

#[derive(Default)]
struct SessionLog {
    events: Vec<Event>,
    notify: Arc<Notify>,
}

/// In-memory, single-process implementation of [`EventLog`]. Sufficient for
/// tests and for running the engine standalone; not a durable backend.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    sessions: Arc<RwLock<HashMap<SessionId, SessionLog>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(
        &self,
        session_id: SessionId,
        source: EventSource,
        correlation_id: CorrelationId,
        data: EventData,
    ) -> EventLogResult<Event> {
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id).or_default();

        let offset = log.events.len() as u64;
        let event = Event {
            id: EventId::new(),
            session_id,
            source,
            offset,
            correlation_id,
            creation_time: Utc::now(),
            data,
            deleted: false,
        };

        trace!(%session_id, offset, kind = ?event.kind(), "appending event");
        log.events.push(event.clone());
        log.notify.notify_waiters();

        Ok(event)
    }

    async fn list(&self, session_id: SessionId, filters: EventFilters) -> EventLogResult<Vec<Event>> {
        let sessions = self.sessions.read().await;
        let Some(log) = sessions.get(&session_id) else {
            return Ok(Vec::new());
        };

        Ok(log
            .events
            .iter()
            .filter(|e| filters.matches(e))
            .cloned()
            .collect())
    }

    async fn delete(&self, event_id: EventId) -> EventLogResult<()> {
        let mut sessions = self.sessions.write().await;
        for log in sessions.values_mut() {
            if let Some(event) = log.events.iter_mut().find(|e| e.id == event_id) {
                event.deleted = true;
                return Ok(());
            }
        }
        Err(EventLogError::NotFound(event_id))
    }

    async fn wait(
        &self,
        session_id: SessionId,
        predicate: EventPredicate,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut observed = {
            let sessions = self.sessions.read().await;
            sessions.get(&session_id).map(|l| l.events.len()).unwrap_or(0)
        };

        loop {
            {
                let sessions = self.sessions.read().await;
                if let Some(log) = sessions.get(&session_id) {
                    if log.events[observed..].iter().any(|e| predicate(e)) {
                        return true;
                    }
                    observed = log.events.len();
                }
            }

            if timeout.is_zero() {
                return false;
            }

            let notify = {
                let mut sessions = self.sessions.write().await;
                sessions.entry(session_id).or_default().notify.clone()
            };

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }

            if tokio::time::timeout(remaining, notify.notified()).await.is_err() {
                return false;
            }
        }
    }

    async fn delete_session_events(&self, session_id: SessionId) -> EventLogResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&session_id);
        debug!(%session_id, "deleted session event log");
        Ok(())
    }
}
