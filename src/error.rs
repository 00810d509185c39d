//! Error types for the crate
//!
//! One `thiserror::Error` enum per subsystem, rolled up into a single
//! top-level [`EngineError`] via `#[from]`, following the same shape across
//! every subsystem so callers can match on either the specific or the
//! umbrella type.

use crate::types::{AgentId, EventId, GuidelineId, SessionId, ToolId};
use thiserror::Error;

/// Errors from the event log (§4.A).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EventLogError {
    #[error("storage error appending to session {session_id}: {message}")]
    Append {
        session_id: SessionId,
        message: String,
    },

    #[error("event not found: {0}")]
    NotFound(EventId),

    #[error("storage backend error: {0}")]
    Storage(String),
}

/// Errors from the tool invoker (§4.C).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToolInvokerError {
    #[error("tool not found: {0}")]
    NotFound(ToolId),

    #[error("tool transport error calling {tool_id}: {message}")]
    Transport { tool_id: ToolId, message: String },

    #[error("tool {tool_id} result is not valid JSON: {message}")]
    ResultSchema { tool_id: ToolId, message: String },

    #[error("tool {tool_id} result of {actual_bytes} bytes exceeds the {limit_bytes}-byte cap")]
    ResultTooLarge {
        tool_id: ToolId,
        actual_bytes: usize,
        limit_bytes: usize,
    },

    #[error("tool {tool_id} call timed out after {timeout_ms}ms")]
    Timeout { tool_id: ToolId, timeout_ms: u64 },
}

/// Errors from an LLM provider call (§16), shared by every subsystem that
/// issues schematic completions. Each subsystem wraps this into its own
/// error kind via `From` rather than exposing it directly through
/// [`EngineError`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("no content in provider response")]
    EmptyResponse,

    #[error("streaming not supported: {0}")]
    StreamingUnsupported(String),
}

impl From<ProviderError> for GuidelineProposalError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<ProviderError> for ToolCallError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<ProviderError> for MessageGenerationError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// Errors from guideline proposition (§4.D).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GuidelineProposalError {
    #[error("LLM schema/validation error proposing guidelines: {0}")]
    SchemaValidation(String),

    #[error("LLM provider error proposing guidelines: {0}")]
    Provider(String),
}

/// Errors from connection expansion (§4.E).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectionExpansionError {
    #[error("guideline not found while expanding connections: {0}")]
    GuidelineNotFound(GuidelineId),

    #[error("store error expanding connections: {0}")]
    Store(String),
}

/// Errors from tool call inference (§4.F).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToolCallError {
    #[error("LLM schema/validation error inferring tool calls: {0}")]
    SchemaValidation(String),

    #[error("LLM provider error inferring tool calls: {0}")]
    Provider(String),
}

/// Errors from message generation (§4.G). Fatal to the run that raised them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MessageGenerationError {
    #[error("LLM schema/validation error after {attempts} attempts: {message}")]
    SchemaValidation { attempts: u8, message: String },

    #[error("LLM provider error generating message: {0}")]
    Provider(String),
}

/// Errors from the session controller (§4.I).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("session {0} is already being processed")]
    AlreadyProcessing(SessionId),
}

/// Top-level error type for the whole engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] crate::storage::StoreError),

    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    #[error("tool invoker error: {0}")]
    ToolInvoker(#[from] ToolInvokerError),

    #[error("guideline proposal error: {0}")]
    GuidelineProposal(#[from] GuidelineProposalError),

    #[error("connection expansion error: {0}")]
    ConnectionExpansion(#[from] ConnectionExpansionError),

    #[error("tool call inference error: {0}")]
    ToolCall(#[from] ToolCallError),

    #[error("message generation error: {0}")]
    MessageGeneration(#[from] MessageGenerationError),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for the whole engine.
pub type Result<T> = std::result::Result<T, EngineError>;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
pub type EventLogResult<T> = std::result::Result<T, EventLogError>;
pub type ToolInvokerResult<T> = std::result::Result<T, ToolInvokerError>;
pub type GuidelineProposalResult<T> = std::result::Result<T, GuidelineProposalError>;
pub type ConnectionExpansionResult<T> = std::result::Result<T, ConnectionExpansionError>;
pub type ToolCallResult<T> = std::result::Result<T, ToolCallError>;
pub type MessageGenerationResult<T> = std::result::Result<T, MessageGenerationError>;
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_error_display() {
        let session_id = SessionId::new();
        let err = ControllerError::SessionNotFound(session_id);
        let display = format!("{}", err);
        assert!(display.contains("session not found"));
        assert!(display.contains(&session_id.to_string()));
    }

    #[test]
    fn test_tool_invoker_error_too_large() {
        let tool_id = ToolId::new("local", "dump");
        let err = ToolInvokerError::ResultTooLarge {
            tool_id: tool_id.clone(),
            actual_bytes: 20_000,
            limit_bytes: 16 * 1024,
        };
        let display = format!("{}", err);
        assert!(display.contains("exceeds"));
        assert!(display.contains(&tool_id.to_string()));
    }

    #[test]
    fn test_error_conversion_into_engine_error() {
        let err: EngineError = ControllerError::AgentNotFound(AgentId::new()).into();
        assert!(matches!(err, EngineError::Controller(_)));

        let err: EngineError = ToolInvokerError::NotFound(ToolId::new("local", "x")).into();
        assert!(matches!(err, EngineError::ToolInvoker(_)));

        let err: EngineError = EventLogError::NotFound(EventId::new()).into();
        assert!(matches!(err, EngineError::EventLog(_)));
    }

    #[test]
    fn test_result_type_aliases() {
        fn returns_result() -> Result<()> {
            Ok(())
        }
        fn returns_event_log_result() -> EventLogResult<()> {
            Ok(())
        }
        fn returns_controller_result() -> ControllerResult<()> {
            Ok(())
        }

        assert!(returns_result().is_ok());
        assert!(returns_event_log_result().is_ok());
        assert!(returns_controller_result().is_ok());
    }
}
