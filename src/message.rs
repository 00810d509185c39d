//! Message generator (§4.G): produces at most one outgoing reply per
//! processing run through a single schematic completion carrying a bounded
//! revision/critique loop.
//!
//! Grounded in the original's `MessageEventGenerator`
//! (`core/engines/alpha/message_event_generator.py`): same field names
//! (`last_message_of_customer`, `produced_reply`, `rationale`,
//! `instructions`, `evaluation_for_each_instruction`, `revisions`) and the
//! same empty-interaction short-circuit.

use crate::error::{MessageGenerationError, MessageGenerationResult};
use crate::event::{MessageData, MessageParticipant};
use crate::guideline::GuidelineProposition;
use crate::interaction::RunContext;
use crate::provider::schematic::SchematicGenerator;
use crate::provider::Message as ProviderMessage;
use crate::types::ToolId;
use serde::Deserialize;
use tracing::{debug, info};

/// Hard cap on the revision list (§4.G.5).
pub const MAX_REVISIONS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Revision {
    pub revision_number: u32,
    pub content: String,
    #[serde(default)]
    pub instructions_followed: Vec<String>,
    #[serde(default)]
    pub instructions_broken: Vec<String>,
    #[serde(default)]
    pub is_repeat_message: bool,
    #[serde(default)]
    pub followed_all_instructions: bool,
    #[serde(default)]
    pub instructions_broken_only_due_to_prioritization: Option<bool>,
    #[serde(default)]
    pub prioritization_rationale: Option<String>,
    #[serde(default)]
    pub instructions_broken_due_to_missing_data: Option<bool>,
    #[serde(default)]
    pub missing_data_rationale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructionEvaluation {
    pub number: u32,
    pub instruction: String,
    pub evaluation: String,
    pub data_available: String,
}

/// The model's structured response for one message-generation call (§4.G.2).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEventSchema {
    #[serde(default)]
    pub last_message_of_customer: Option<String>,
    #[serde(default = "default_true")]
    pub produced_reply: bool,
    pub rationale: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub evaluation_for_each_instruction: Vec<InstructionEvaluation>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

fn default_true() -> bool {
    true
}

/// Selects the earliest revision satisfying one of §4.G.3's three
/// conditions, falling back to the last revision otherwise.
fn select_revision(revisions: &[Revision]) -> Option<&Revision> {
    revisions
        .iter()
        .find(|r| {
            (r.followed_all_instructions && !r.is_repeat_message)
                || (r.instructions_broken_only_due_to_prioritization.unwrap_or(false) && !r.is_repeat_message)
                || (r.instructions_broken_due_to_missing_data.unwrap_or(false) && !r.is_repeat_message)
        })
        .or_else(|| revisions.last())
}

fn render_propositions(
    ordinary: &[GuidelineProposition],
    tool_enabled: &[(GuidelineProposition, Vec<ToolId>)],
) -> String {
    let mut lines = Vec::new();
    for (i, p) in ordinary.iter().chain(tool_enabled.iter().map(|(p, _)| p)).enumerate() {
        lines.push(format!(
            "Guideline #{}) When {}, then {} [priority {}: {}]",
            i + 1,
            p.guideline.content.condition,
            p.guideline.content.action,
            p.score,
            p.rationale
        ));
    }
    if lines.is_empty() {
        "(no applicable guidelines)".to_string()
    } else {
        lines.join("\n")
    }
}

fn render_history(ctx: &RunContext) -> String {
    ctx.interaction_history
        .iter()
        .filter_map(|event| match &event.data {
            crate::event::EventData::Message(m) => {
                Some(format!("{:?} ({}): {}", event.source, m.participant.display_name, m.message))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(
    ctx: &RunContext,
    ordinary: &[GuidelineProposition],
    tool_enabled: &[(GuidelineProposition, Vec<ToolId>)],
) -> Vec<ProviderMessage> {
    let system = ProviderMessage::system(
        "You are an AI agent replying to a customer. Produce at most one reply. \
         You are required to adhere to the listed guidelines unless they contradict \
         a prior customer request, contradict a higher-or-equal priority guideline, \
         or are absolutely inappropriate given the conversation. Produce a short \
         revision history (at most 5 revisions) critiquing your own draft against \
         the guidelines, then settle on a final revision. Respond with JSON matching: \
         {\"last_message_of_customer\": \"...\"|null, \"produced_reply\": bool, \
         \"rationale\": \"...\", \"instructions\": [\"...\"], \
         \"evaluation_for_each_instruction\": [{\"number\": n, \"instruction\": \"...\", \
         \"evaluation\": \"...\", \"data_available\": \"...\"}], \"revisions\": \
         [{\"revision_number\": n, \"content\": \"...\", \"instructions_followed\": [], \
         \"instructions_broken\": [], \"is_repeat_message\": bool, \
         \"followed_all_instructions\": bool}]}",
    );

    let terms_text = ctx
        .terms
        .iter()
        .map(|t| format!("{}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let variables_text = ctx
        .context_variables
        .iter()
        .map(|(v, value)| format!("{} = {}", v.name, value.data))
        .collect::<Vec<_>>()
        .join("\n");

    let user = ProviderMessage::user(format!(
        "Agent: {}\n\nGlossary:\n{terms_text}\n\nContext variables:\n{variables_text}\n\n\
         Guidelines:\n{}\n\nInteraction so far:\n{}\n\nStaged tool results: {} event(s) available.",
        ctx.agent.name,
        render_propositions(ordinary, tool_enabled),
        render_history(ctx),
        ctx.staged_events.len(),
    ));

    vec![system, user]
}

/// Runs the revision loop once (§4.G.2-3) and returns the reply message data
/// to append, or `None` when no reply should be emitted (§4.G.6-7).
pub async fn generate_message(
    generator: &SchematicGenerator<MessageEventSchema>,
    ctx: &RunContext,
    ordinary_propositions: &[GuidelineProposition],
    tool_enabled_propositions: &[(GuidelineProposition, Vec<ToolId>)],
    agent_display_name: impl Into<String>,
) -> MessageGenerationResult<Option<MessageData>> {
    if !ctx.has_any_message() && ordinary_propositions.is_empty() && tool_enabled_propositions.is_empty() {
        debug!("skipping message generation: empty interaction and no applicable guidelines");
        return Ok(None);
    }

    let prompt = build_prompt(ctx, ordinary_propositions, tool_enabled_propositions);
    let schema = generator.generate(prompt).await.map_err(|err| MessageGenerationError::SchemaValidation {
        attempts: 3,
        message: err.to_string(),
    })?;

    if !schema.produced_reply {
        info!(rationale = %schema.rationale, "message generator decided not to reply");
        return Ok(None);
    }

    let mut revisions = schema.revisions;
    revisions.truncate(MAX_REVISIONS);

    let Some(chosen) = select_revision(&revisions) else {
        debug!("produced_reply=true but no revisions were returned");
        return Ok(None);
    };

    Ok(Some(MessageData {
        message: chosen.content.clone(),
        participant: MessageParticipant {
            id: None,
            display_name: agent_display_name.into(),
        },
        flagged: None,
        tags: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::context::ContextVariable;
    use crate::customer::Customer;
    use crate::provider::{LLMProvider, ProviderConfig, ProviderResult, StreamChunk};
    use async_trait::async_trait;
    use futures::Stream;
    use std::pin::Pin;
    use std::sync::Arc;

    struct ScriptedProvider {
        response: String,
        config: ProviderConfig,
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, messages: Vec<ProviderMessage>) -> ProviderResult<String> {
            self.complete_at_temperature(messages, self.config.temperature).await
        }
        async fn complete_at_temperature(&self, _m: Vec<ProviderMessage>, _t: f32) -> ProviderResult<String> {
            Ok(self.response.clone())
        }
        async fn stream(&self, _m: Vec<ProviderMessage>) -> ProviderResult<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>> {
            unimplemented!()
        }
        fn name(&self) -> &str {
            "scripted"
        }
        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    fn ctx_with_history(history: Vec<crate::event::Event>) -> RunContext {
        let mut ctx = RunContext::new(
            Agent::new("Bot"),
            Customer::new("Ada"),
            Vec::<(ContextVariable, crate::context::ContextVariableValue)>::new(),
            Vec::new(),
            history,
        );
        ctx.staged_events = Vec::new();
        ctx
    }

    fn message_event(source: crate::event::EventSource, text: &str, offset: u64) -> crate::event::Event {
        crate::event::Event {
            id: crate::types::EventId::new(),
            session_id: crate::types::SessionId::new(),
            source,
            offset,
            correlation_id: crate::types::CorrelationId::new(),
            creation_time: chrono::Utc::now(),
            data: crate::event::EventData::Message(MessageData {
                message: text.to_string(),
                participant: MessageParticipant {
                    id: None,
                    display_name: "customer".to_string(),
                },
                flagged: None,
                tags: None,
            }),
            deleted: false,
        }
    }

    #[tokio::test]
    async fn test_empty_interaction_skips_generation_without_calling_model() {
        let provider = Arc::new(ScriptedProvider {
            response: "should never be parsed".to_string(),
            config: ProviderConfig::new("mock"),
        });
        let generator = SchematicGenerator::new(provider);

        let result = generate_message(&generator, &ctx_with_history(Vec::new()), &[], &[], "Bot")
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_produced_reply_false_yields_no_message() {
        let response = r#"{"produced_reply": false, "rationale": "nothing to say", "revisions": []}"#;
        let provider = Arc::new(ScriptedProvider {
            response: response.to_string(),
            config: ProviderConfig::new("mock"),
        });
        let generator = SchematicGenerator::new(provider);

        let history = vec![message_event(crate::event::EventSource::Customer, "hi", 0)];
        let result = generate_message(&generator, &ctx_with_history(history), &[], &[], "Bot")
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_selects_earliest_fully_followed_non_repeat_revision() {
        let response = r#"{
            "produced_reply": true,
            "rationale": "replying",
            "revisions": [
                {"revision_number": 1, "content": "draft one", "followed_all_instructions": false, "is_repeat_message": false},
                {"revision_number": 2, "content": "final draft", "followed_all_instructions": true, "is_repeat_message": false},
                {"revision_number": 3, "content": "unused", "followed_all_instructions": true, "is_repeat_message": false}
            ]
        }"#;
        let provider = Arc::new(ScriptedProvider {
            response: response.to_string(),
            config: ProviderConfig::new("mock"),
        });
        let generator = SchematicGenerator::new(provider);

        let history = vec![message_event(crate::event::EventSource::Customer, "hi", 0)];
        let result = generate_message(&generator, &ctx_with_history(history), &[], &[], "Bot")
            .await
            .unwrap()
            .expect("expected a message");

        assert_eq!(result.message, "final draft");
    }

    #[tokio::test]
    async fn test_falls_back_to_last_revision_when_none_qualify() {
        let response = r#"{
            "produced_reply": true,
            "rationale": "replying",
            "revisions": [
                {"revision_number": 1, "content": "draft one", "followed_all_instructions": false, "is_repeat_message": true},
                {"revision_number": 2, "content": "last resort", "followed_all_instructions": false, "is_repeat_message": true}
            ]
        }"#;
        let provider = Arc::new(ScriptedProvider {
            response: response.to_string(),
            config: ProviderConfig::new("mock"),
        });
        let generator = SchematicGenerator::new(provider);

        let history = vec![message_event(crate::event::EventSource::Customer, "hi", 0)];
        let result = generate_message(&generator, &ctx_with_history(history), &[], &[], "Bot")
            .await
            .unwrap()
            .expect("expected a message");

        assert_eq!(result.message, "last resort");
    }

    #[tokio::test]
    async fn test_prioritization_exception_is_accepted_over_literal_compliance() {
        let response = r#"{
            "produced_reply": true,
            "rationale": "replying",
            "revisions": [
                {"revision_number": 1, "content": "prioritized draft", "followed_all_instructions": false,
                 "instructions_broken_only_due_to_prioritization": true, "is_repeat_message": false},
                {"revision_number": 2, "content": "later draft", "followed_all_instructions": true, "is_repeat_message": false}
            ]
        }"#;
        let provider = Arc::new(ScriptedProvider {
            response: response.to_string(),
            config: ProviderConfig::new("mock"),
        });
        let generator = SchematicGenerator::new(provider);

        let history = vec![message_event(crate::event::EventSource::Customer, "hi", 0)];
        let result = generate_message(&generator, &ctx_with_history(history), &[], &[], "Bot")
            .await
            .unwrap()
            .expect("expected a message");

        assert_eq!(result.message, "prioritized draft");
    }

    #[test]
    fn test_revisions_hard_bound_truncated() {
        let revisions: Vec<Revision> = (1..=8)
            .map(|n| Revision {
                revision_number: n,
                content: format!("rev {n}"),
                instructions_followed: Vec::new(),
                instructions_broken: Vec::new(),
                is_repeat_message: false,
                followed_all_instructions: false,
                instructions_broken_only_due_to_prioritization: None,
                prioritization_rationale: None,
                instructions_broken_due_to_missing_data: None,
                missing_data_rationale: None,
            })
            .collect();

        let mut truncated = revisions;
        truncated.truncate(MAX_REVISIONS);
        assert_eq!(truncated.len(), MAX_REVISIONS);
    }
}
