//! Processing engine (§4.H): orchestrates proposer → expander → tool caller
//! over up to `max_iterations` rounds, then the message generator, emitting
//! status events and a single correlation id across the whole run.

use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::connection::expand_connections;
use crate::error::{EngineError, Result};
use crate::event::{EventData, EventLog, EventSource, StatusData, StatusKind};
use crate::guideline::GuidelineProposition;
use crate::interaction::RunContext;
use crate::message::{generate_message, MessageEventSchema};
use crate::proposer::{propose_guidelines, ProposerBatchResponse};
use crate::provider::schematic::SchematicGenerator;
use crate::session::SessionMode;
use crate::storage::{
    AgentStore, ContextVariableStore, CustomerStore, GlossaryStore, GuidelineConnectionStore,
    GuidelineStore, SessionStore, ToolAssociationStore,
};
use crate::tool::ToolInvoker;
use crate::tool_caller::{call_tools, ToolCallInferenceResponse};
use crate::types::{AgentId, CorrelationId, SessionId, ToolId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The context a `process()` call runs against; `triggering_offset` is
/// `None` for the greeting-on-create path, which has no prior customer
/// event to acknowledge (§4.I's "sole case where the engine may emit a
/// message without a prior customer event").
#[derive(Debug, Clone)]
pub struct ProcessContext {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub triggering_offset: Option<u64>,
}

/// Every collaborator the engine depends on (§4.A–§4.C stores and
/// invoker), wired together once at construction.
pub struct ProcessingEngine {
    pub event_log: Arc<dyn EventLog>,
    pub agent_store: Arc<dyn AgentStore>,
    pub customer_store: Arc<dyn CustomerStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub guideline_store: Arc<dyn GuidelineStore>,
    pub connection_store: Arc<dyn GuidelineConnectionStore>,
    pub association_store: Arc<dyn ToolAssociationStore>,
    pub glossary_store: Arc<dyn GlossaryStore>,
    pub context_variable_store: Arc<dyn ContextVariableStore>,
    pub tool_invoker: Arc<ToolInvoker>,
    pub proposer_generator: Arc<SchematicGenerator<ProposerBatchResponse>>,
    pub tool_call_generator: Arc<SchematicGenerator<ToolCallInferenceResponse>>,
    pub message_generator: Arc<SchematicGenerator<MessageEventSchema>>,
    pub config: EngineConfig,
}

impl ProcessingEngine {
    async fn emit_status(
        &self,
        session_id: SessionId,
        correlation_id: CorrelationId,
        status: StatusKind,
        acknowledged_offset: Option<u64>,
    ) -> Result<()> {
        self.event_log
            .append(
                session_id,
                EventSource::System,
                correlation_id,
                EventData::Status(StatusData {
                    status,
                    acknowledged_offset,
                    data: None,
                }),
            )
            .await?;
        Ok(())
    }

    /// Splits accepted propositions into ordinary vs tool-enabled, looking
    /// up each guideline's tool associations (§4.F input shape).
    async fn partition_tool_enabled(
        &self,
        propositions: Vec<GuidelineProposition>,
    ) -> Result<(Vec<GuidelineProposition>, Vec<(GuidelineProposition, Vec<ToolId>)>)> {
        let mut ordinary = Vec::new();
        let mut tool_enabled = Vec::new();

        for proposition in propositions {
            let associations = self.association_store.associations_for(proposition.guideline.id).await?;
            if associations.is_empty() {
                ordinary.push(proposition);
            } else {
                let tool_ids = associations.into_iter().map(|a| a.tool_id).collect();
                tool_enabled.push((proposition, tool_ids));
            }
        }

        Ok((ordinary, tool_enabled))
    }

    /// Runs the full pipeline for one triggering update (§4.H). Returns
    /// `Ok(true)` if a reply message was emitted, `Ok(false)` otherwise
    /// (including manual mode, cancellation, and no-reply outcomes). Only
    /// an event-log append failure (fatal per §7) propagates as `Err`.
    pub async fn process(&self, ctx: ProcessContext, cancellation: CancellationToken) -> Result<bool> {
        let Some(session) = self.session_store.get(ctx.session_id).await? else {
            return Err(EngineError::Controller(crate::error::ControllerError::SessionNotFound(
                ctx.session_id,
            )));
        };

        if session.mode == SessionMode::Manual {
            info!(session_id = %ctx.session_id, "session is in manual mode, skipping run");
            return Ok(false);
        }

        let correlation_id = CorrelationId::generate();
        info!(session_id = %ctx.session_id, %correlation_id, "starting processing run");

        self.emit_status(ctx.session_id, correlation_id, StatusKind::Acknowledged, ctx.triggering_offset)
            .await?;
        self.emit_status(ctx.session_id, correlation_id, StatusKind::Processing, ctx.triggering_offset)
            .await?;

        let agent = self
            .agent_store
            .get(ctx.agent_id)
            .await?
            .ok_or(EngineError::Controller(crate::error::ControllerError::AgentNotFound(ctx.agent_id)))?;
        let customer = self.customer_store.get(session.customer_id).await?.ok_or_else(|| {
            EngineError::Internal(format!("customer {} referenced by session not found", session.customer_id))
        })?;

        let context_variables = self
            .context_variable_store
            .list_for_customer(ctx.agent_id, session.customer_id)
            .await?;

        let interaction_history = self
            .event_log
            .list(ctx.session_id, crate::event::EventFilters::new().exclude_deleted())
            .await?;

        let query_text = interaction_history
            .iter()
            .rev()
            .find_map(|e| match &e.data {
                EventData::Message(m) => Some(m.message.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let terms = self.glossary_store.find_relevant(ctx.agent_id, &query_text, 10).await?;

        let mut run_ctx = RunContext::new(agent.clone(), customer, context_variables, terms, interaction_history);

        let candidate_guidelines = self.guideline_store.list_for_agent(ctx.agent_id).await?;

        let mut last_ordinary: Vec<GuidelineProposition> = Vec::new();
        let mut last_tool_enabled: Vec<(GuidelineProposition, Vec<ToolId>)> = Vec::new();

        for iteration in 0..agent.effective_max_iterations() {
            if cancellation.is_cancelled() {
                warn!(session_id = %ctx.session_id, iteration, "cancellation observed before proposer");
                self.emit_status(ctx.session_id, correlation_id, StatusKind::Cancelled, ctx.triggering_offset)
                    .await?;
                return Ok(false);
            }

            let proposed = match propose_guidelines(
                &self.proposer_generator,
                &run_ctx,
                &candidate_guidelines,
                self.config.guideline_batch_size,
                self.config.proposition_threshold,
            )
            .await
            {
                Ok(p) => p,
                Err(err) => {
                    error!(session_id = %ctx.session_id, %err, "guideline proposal failed");
                    self.emit_status(ctx.session_id, correlation_id, StatusKind::Error, ctx.triggering_offset)
                        .await?;
                    return Ok(false);
                }
            };

            let expanded = match expand_connections(self.connection_store.as_ref(), self.guideline_store.as_ref(), &proposed).await {
                Ok(e) => e,
                Err(err) => {
                    error!(session_id = %ctx.session_id, %err, "connection expansion failed");
                    self.emit_status(ctx.session_id, correlation_id, StatusKind::Error, ctx.triggering_offset)
                        .await?;
                    return Ok(false);
                }
            };

            let mut all_propositions = proposed;
            all_propositions.extend(expanded);

            let (ordinary, tool_enabled) = self.partition_tool_enabled(all_propositions).await?;

            if cancellation.is_cancelled() {
                warn!(session_id = %ctx.session_id, iteration, "cancellation observed before tool batch");
                self.emit_status(ctx.session_id, correlation_id, StatusKind::Cancelled, ctx.triggering_offset)
                    .await?;
                return Ok(false);
            }

            let tool_context = crate::tool::ToolContext::new(
                ctx.agent_id,
                ctx.session_id,
                session.customer_id,
                correlation_id,
                Arc::new(|_| {}),
            );

            let tool_data = match call_tools(
                &self.tool_call_generator,
                self.tool_invoker.as_ref(),
                &tool_context,
                &run_ctx,
                &tool_enabled,
            )
            .await
            {
                Ok(data) => data,
                Err(err) => {
                    error!(session_id = %ctx.session_id, %err, "tool call inference failed");
                    self.emit_status(ctx.session_id, correlation_id, StatusKind::Error, ctx.triggering_offset)
                        .await?;
                    return Ok(false);
                }
            };

            last_ordinary = ordinary;
            last_tool_enabled = tool_enabled;

            match tool_data {
                Some(data) => {
                    if cancellation.is_cancelled() {
                        warn!(session_id = %ctx.session_id, "cancellation observed after tool batch, discarding results");
                        self.emit_status(ctx.session_id, correlation_id, StatusKind::Cancelled, ctx.triggering_offset)
                            .await?;
                        return Ok(false);
                    }

                    let manual_handoff = data
                        .tool_calls
                        .iter()
                        .any(|call| matches!(&call.result.control, Some(c) if c.mode == crate::event::ToolControlMode::Manual));

                    let event = self
                        .event_log
                        .append(ctx.session_id, EventSource::AiAgent, correlation_id, EventData::Tool(data))
                        .await?;
                    run_ctx.push_staged_event(event);

                    if manual_handoff {
                        let mut updated = self.session_store.get(ctx.session_id).await?.ok_or(EngineError::Controller(
                            crate::error::ControllerError::SessionNotFound(ctx.session_id),
                        ))?;
                        updated.switch_to_manual();
                        self.session_store.update(updated).await?;
                    }
                }
                None => break,
            }
        }

        if cancellation.is_cancelled() {
            warn!(session_id = %ctx.session_id, "cancellation observed before typing status");
            self.emit_status(ctx.session_id, correlation_id, StatusKind::Cancelled, ctx.triggering_offset)
                .await?;
            return Ok(false);
        }

        self.emit_status(ctx.session_id, correlation_id, StatusKind::Typing, ctx.triggering_offset)
            .await?;

        let message_result = generate_message(
            &self.message_generator,
            &run_ctx,
            &last_ordinary,
            &last_tool_enabled,
            agent.name.clone(),
        )
        .await;

        let emitted = match message_result {
            Ok(Some(data)) => {
                if cancellation.is_cancelled() {
                    warn!(session_id = %ctx.session_id, "cancellation observed after message generation, discarding draft");
                    self.emit_status(ctx.session_id, correlation_id, StatusKind::Cancelled, ctx.triggering_offset)
                        .await?;
                    return Ok(false);
                }

                self.event_log
                    .append(ctx.session_id, EventSource::AiAgent, correlation_id, EventData::Message(data))
                    .await?;
                true
            }
            Ok(None) => false,
            Err(err) => {
                error!(session_id = %ctx.session_id, %err, "message generation failed");
                self.emit_status(ctx.session_id, correlation_id, StatusKind::Error, ctx.triggering_offset)
                    .await?;
                return Ok(false);
            }
        };

        self.emit_status(ctx.session_id, correlation_id, StatusKind::Ready, ctx.triggering_offset)
            .await?;

        info!(session_id = %ctx.session_id, %correlation_id, emitted, "processing run complete");
        Ok(emitted)
    }
}
