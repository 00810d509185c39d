//! # Conversant - Guided Conversational Agent Runtime for Rust
//!
//! Conversant is a Rust runtime core for building guided conversational
//! agents: behavioral guidelines scored by an LLM rather than pattern
//! matching, a connection graph that expands a proposed guideline into
//! everything it entails or suggests, tool calling inferred per active
//! guideline, and a single-reply message generator that critiques its own
//! draft against the active guidelines before settling on one.
//!
//! ## Architecture
//!
//! ```text
//! post_event ──> SessionController ──spawns──> ProcessingEngine::process
//!                     │                              │
//!                     │                    propose_guidelines (§4.D)
//!                     │                    expand_connections  (§4.E)
//!                     │                    call_tools          (§4.F)
//!                     │                    generate_message    (§4.G)
//!                     │                              │
//!                     └──────── EventLog (append-only, per session) ◄───┘
//! ```
//!
//! A session runs in automatic mode by default: every customer message
//! cancels whatever run is in flight and starts a fresh one against the
//! latest state, so rapid successive messages coalesce into a single reply
//! instead of racing. A tool result can hand a session to manual mode, at
//! which point the controller stops scheduling runs until an operator (or
//! the embedder) resets it.
//!
//! ## Module overview
//!
//! - [`types`], [`error`]: identifiers and the crate's error taxonomy.
//! - [`agent`], [`customer`], [`session`], [`context`]: the core entities.
//! - [`event`]: the append-only event log (§4.A).
//! - [`storage`]: read/write contracts for every entity, plus in-memory
//!   implementations under [`storage::memory`].
//! - [`guideline`], [`glossary`]: guidelines, their connections and tool
//!   associations, and the glossary of agent-specific terms.
//! - [`tool`]: the tool invoker and its three transport variants (§4.C).
//! - [`provider`]: LLM provider abstraction plus the schematic
//!   structured-output layer built on top of it.
//! - [`interaction`]: the per-run context snapshot every pipeline phase reads.
//! - [`proposer`], [`connection`], [`tool_caller`], [`message`]: the four
//!   pipeline phases (§4.D-G).
//! - [`cancellation`]: the cooperative cancellation token checked between
//!   phases.
//! - [`engine`]: the processing engine that orchestrates one run (§4.H).
//! - [`controller`]: the session controller that owns in-flight runs and
//!   exposes the public entry points (§4.I).
//! - [`config`]: process-wide tunables.
//!
//! ## License
//!
//! Licensed under either of Apache License 2.0 or MIT license at your option.

pub mod agent;
pub mod cancellation;
pub mod config;
pub mod connection;
pub mod context;
pub mod controller;
pub mod customer;
pub mod engine;
pub mod error;
pub mod event;
pub mod glossary;
pub mod guideline;
pub mod interaction;
pub mod message;
pub mod proposer;
pub mod provider;
pub mod session;
pub mod storage;
pub mod tool;
pub mod tool_caller;
pub mod types;

pub use agent::{Agent, CompositionMode};
pub use connection::expand_connections;
pub use context::{ContextVariable, ContextVariableValue};
pub use controller::SessionController;
pub use customer::Customer;
pub use engine::{ProcessContext, ProcessingEngine};
pub use error::{EngineError, ProviderResult, Result};
pub use event::{
    Event, EventData, EventFilters, EventKind, EventLog, EventPredicate, EventSource, InMemoryEventLog,
    MessageData, MessageParticipant, StatusData, StatusKind, ToolCallOutcome, ToolCallRecord, ToolControl,
    ToolControlMode, ToolData,
};
pub use glossary::{rank_by_relevance, LexicalOverlapScorer, Term, TermRelevanceScorer};
pub use guideline::{
    ConnectionKind, Guideline, GuidelineConnection, GuidelineContent, GuidelineProposition,
    GuidelineToolAssociation,
};
pub use interaction::RunContext;
pub use message::generate_message;
pub use provider::anthropic::AnthropicProvider;
pub use provider::openai::OpenAIProvider;
pub use provider::schematic::SchematicGenerator;
pub use provider::{LLMProvider, Message, ProviderConfig, StreamChunk};
pub use proposer::propose_guidelines;
pub use session::{Session, SessionMode};
pub use tool::{
    LocalTool, LocalToolService, OpenApiToolService, ParameterSchema, PluginToolService, ToolContext,
    ToolInvoker, ToolResult, ToolSchema, ToolService,
};
pub use tool_caller::call_tools;
pub use types::*;
