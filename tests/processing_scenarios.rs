//! End-to-end scenarios driving the full pipeline through
//! [`conversant_core::ProcessingEngine`] and [`conversant_core::SessionController`]:
//! a scripted provider stands in for the LLM at each phase, and assertions
//! inspect the resulting event log rather than internal pipeline state.

use conversant_core::storage::memory::{
    InMemoryAgentStore, InMemoryContextVariableStore, InMemoryCustomerStore, InMemoryGlossaryStore,
    InMemoryGuidelineConnectionStore, InMemoryGuidelineStore, InMemorySessionStore, InMemoryToolAssociationStore,
};
use conversant_core::storage::{AgentStore, CustomerStore, GuidelineStore, SessionStore, ToolAssociationStore};
use conversant_core::cancellation::CancellationToken;
use conversant_core::config::EngineConfig;
use conversant_core::message::MessageEventSchema;
use conversant_core::proposer::ProposerBatchResponse;
use conversant_core::tool_caller::ToolCallInferenceResponse;
use conversant_core::{
    Agent, AssociationId, CorrelationId, Customer, Event, EventData, EventFilters, EventKind, EventLog,
    EventSource, Guideline, GuidelineToolAssociation, InMemoryEventLog, LLMProvider, LocalTool,
    LocalToolService, Message, MessageData, MessageParticipant, ProcessContext, ProcessingEngine,
    ProviderConfig, ProviderResult, SchematicGenerator, Session, SessionController, SessionMode, StatusKind,
    StreamChunk, ToolContext, ToolControl, ToolControlMode, ToolId, ToolInvoker, ToolResult, ToolSchema,
};
use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

struct ScriptedProvider {
    response: String,
    config: ProviderConfig,
}

impl ScriptedProvider {
    fn new(response: impl Into<String>) -> Arc<dyn LLMProvider> {
        Arc::new(Self {
            response: response.into(),
            config: ProviderConfig::new("mock"),
        })
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, messages: Vec<Message>) -> ProviderResult<String> {
        self.complete_at_temperature(messages, self.config.temperature).await
    }
    async fn complete_at_temperature(&self, _messages: Vec<Message>, _temperature: f32) -> ProviderResult<String> {
        Ok(self.response.clone())
    }
    async fn stream(&self, _messages: Vec<Message>) -> ProviderResult<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>> {
        unimplemented!("not exercised by these scenarios")
    }
    fn name(&self) -> &str {
        "scripted"
    }
    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

struct CowTool {
    schema: ToolSchema,
}

impl CowTool {
    fn new() -> Self {
        Self {
            schema: ToolSchema {
                id: ToolId::new("local", "get_cow_uttering"),
                description: "moos on command".to_string(),
                parameters: HashMap::new(),
            },
        }
    }
}

#[async_trait]
impl LocalTool for CowTool {
    fn name(&self) -> &str {
        "get_cow_uttering"
    }
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
    async fn execute(&self, _ctx: &ToolContext, _args: HashMap<String, serde_json::Value>) -> conversant_core::Result<ToolResult> {
        Ok(ToolResult {
            output: serde_json::json!("moo"),
            metadata: HashMap::new(),
            control: None,
        })
    }
}

struct EscalateTool {
    schema: ToolSchema,
}

impl EscalateTool {
    fn new() -> Self {
        Self {
            schema: ToolSchema {
                id: ToolId::new("local", "escalate_to_human"),
                description: "hands the session to a human agent".to_string(),
                parameters: HashMap::new(),
            },
        }
    }
}

#[async_trait]
impl LocalTool for EscalateTool {
    fn name(&self) -> &str {
        "escalate_to_human"
    }
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }
    async fn execute(&self, _ctx: &ToolContext, _args: HashMap<String, serde_json::Value>) -> conversant_core::Result<ToolResult> {
        Ok(ToolResult {
            output: serde_json::json!("a human agent will take over from here"),
            metadata: HashMap::new(),
            control: Some(ToolControl { mode: ToolControlMode::Manual }),
        })
    }
}

struct Harness {
    engine: Arc<ProcessingEngine>,
    event_log: Arc<dyn EventLog>,
    guideline_store: Arc<InMemoryGuidelineStore>,
    agent_store: Arc<InMemoryAgentStore>,
    customer_store: Arc<InMemoryCustomerStore>,
    session_store: Arc<InMemorySessionStore>,
    association_store: Arc<InMemoryToolAssociationStore>,
}

fn build_harness(proposer_response: &str, tool_call_response: &str, message_response: &str) -> Harness {
    let event_log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
    let agent_store = Arc::new(InMemoryAgentStore::new());
    let customer_store = Arc::new(InMemoryCustomerStore::new());
    let session_store = Arc::new(InMemorySessionStore::new());
    let guideline_store = Arc::new(InMemoryGuidelineStore::new());
    let connection_store = Arc::new(InMemoryGuidelineConnectionStore::new());
    let glossary_store = Arc::new(InMemoryGlossaryStore::new());
    let context_variable_store = Arc::new(InMemoryContextVariableStore::new());
    let association_store = Arc::new(InMemoryToolAssociationStore::new());

    let mut tool_service = LocalToolService::new("local");
    tool_service.register(Arc::new(CowTool::new()));
    tool_service.register(Arc::new(EscalateTool::new()));
    let mut tool_invoker = ToolInvoker::new(16 * 1024, Duration::from_secs(5));
    tool_invoker.register_service(Arc::new(tool_service));

    let engine = Arc::new(ProcessingEngine {
        event_log: event_log.clone(),
        agent_store: agent_store.clone(),
        customer_store: customer_store.clone(),
        session_store: session_store.clone(),
        guideline_store: guideline_store.clone(),
        connection_store,
        association_store: association_store.clone(),
        glossary_store,
        context_variable_store,
        tool_invoker: Arc::new(tool_invoker),
        proposer_generator: Arc::new(SchematicGenerator::<ProposerBatchResponse>::new(ScriptedProvider::new(
            proposer_response,
        ))),
        tool_call_generator: Arc::new(SchematicGenerator::<ToolCallInferenceResponse>::new(ScriptedProvider::new(
            tool_call_response,
        ))),
        message_generator: Arc::new(SchematicGenerator::<MessageEventSchema>::new(ScriptedProvider::new(
            message_response,
        ))),
        config: EngineConfig::default(),
    });

    Harness {
        engine,
        event_log,
        guideline_store,
        agent_store,
        customer_store,
        session_store,
        association_store,
    }
}

#[tokio::test]
async fn test_greeting_scenario_emits_single_reply_with_no_triggering_event() {
    let h = build_harness(
        r#"{"propositions": []}"#,
        r#"{"calls": []}"#,
        r#"{"produced_reply": true, "rationale": "first contact", "revisions": [
            {"revision_number": 1, "content": "Welcome! How can I help?", "followed_all_instructions": true, "is_repeat_message": false}
        ]}"#,
    );

    let agent = Agent::new("Support Bot");
    let agent_id = agent.id;
    h.agent_store.insert(agent).await.unwrap();

    let customer = Customer::new("Ada");
    let customer_id = customer.id;
    h.customer_store.insert(customer).await.unwrap();

    let session = Session::new(agent_id, customer_id);
    let session_id = h.session_store.create(session).await.unwrap();

    let emitted = h
        .engine
        .process(
            ProcessContext {
                session_id,
                agent_id,
                triggering_offset: None,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(emitted);

    let events = h.event_log.list(session_id, EventFilters::new()).await.unwrap();
    let statuses: Vec<_> = events.iter().filter(|e| e.kind() == EventKind::Status).collect();
    assert!(statuses.len() >= 3, "expected acknowledged/processing/.../ready sequence");

    let messages: Vec<&Event> = events.iter().filter(|e| e.kind() == EventKind::Message).collect();
    assert_eq!(messages.len(), 1);
    match &messages[0].data {
        EventData::Message(m) => assert_eq!(m.message, "Welcome! How can I help?"),
        _ => panic!("expected a message event"),
    }
}

#[tokio::test]
async fn test_tool_enabled_guideline_produces_correlated_tool_and_message_events() {
    let h = build_harness(
        r#"{"propositions": [{"index": 0, "score": 9, "rationale": "customer asked what a cow says", "still_applicable": true}]}"#,
        r#"{"calls": [{"service_name": "local", "tool_name": "get_cow_uttering", "arguments": {}}]}"#,
        r#"{"produced_reply": true, "rationale": "answering with tool result", "revisions": [
            {"revision_number": 1, "content": "A cow says moo!", "followed_all_instructions": true, "is_repeat_message": false}
        ]}"#,
    );

    let agent = Agent::new("Zoo Bot");
    let agent_id = agent.id;
    h.agent_store.insert(agent).await.unwrap();

    let customer = Customer::new("Theo");
    let customer_id = customer.id;
    h.customer_store.insert(customer).await.unwrap();

    let guideline = Guideline::new(agent_id, "customer asks what a cow says", "look up the cow's uttering and report it");
    let guideline_id = guideline.id;
    h.guideline_store.insert(guideline).await.unwrap();

    h.association_store
        .insert(GuidelineToolAssociation {
            id: AssociationId::new(),
            guideline_id,
            tool_id: ToolId::new("local", "get_cow_uttering"),
        })
        .await
        .unwrap();

    let session = Session::new(agent_id, customer_id);
    let session_id = h.session_store.create(session).await.unwrap();

    let triggering = h
        .event_log
        .append(
            session_id,
            EventSource::Customer,
            CorrelationId::generate(),
            EventData::Message(MessageData {
                message: "what does a cow say?".to_string(),
                participant: MessageParticipant {
                    id: None,
                    display_name: "Theo".to_string(),
                },
                flagged: None,
                tags: None,
            }),
        )
        .await
        .unwrap();

    let emitted = h
        .engine
        .process(
            ProcessContext {
                session_id,
                agent_id,
                triggering_offset: Some(triggering.offset),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(emitted);

    let events = h.event_log.list(session_id, EventFilters::new()).await.unwrap();
    let tool_event = events.iter().find(|e| e.kind() == EventKind::Tool).expect("expected a tool event");
    let reply_event = events
        .iter()
        .find(|e| e.kind() == EventKind::Message && e.source == EventSource::AiAgent)
        .expect("expected a reply message");

    assert_eq!(tool_event.correlation_id, reply_event.correlation_id);

    match &tool_event.data {
        EventData::Tool(data) => {
            assert_eq!(data.tool_calls.len(), 1);
            assert_eq!(data.tool_calls[0].result.data, serde_json::json!("moo"));
        }
        _ => panic!("expected tool data"),
    }
}

#[tokio::test]
async fn test_superseding_customer_messages_coalesce_into_one_run() {
    let h = build_harness(
        r#"{"propositions": []}"#,
        r#"{"calls": []}"#,
        r#"{"produced_reply": true, "rationale": "answering the latest message", "revisions": [
            {"revision_number": 1, "content": "Got it, on it now.", "followed_all_instructions": true, "is_repeat_message": false}
        ]}"#,
    );

    let agent = Agent::new("Bot");
    let agent_id = agent.id;
    h.agent_store.insert(agent).await.unwrap();

    let customer = Customer::new("Mara");
    let customer_id = customer.id;
    h.customer_store.insert(customer).await.unwrap();

    let session_store: Arc<dyn SessionStore> = h.session_store.clone();
    let controller = SessionController::new(h.engine.clone(), session_store, h.customer_store.clone(), h.event_log.clone());

    let session_id = controller.create_session(agent_id, customer_id, None, false).await.unwrap();

    for text in ["hi", "actually never mind", "wait, one more question"] {
        controller
            .post_event(
                session_id,
                EventSource::Customer,
                EventData::Message(MessageData {
                    message: text.to_string(),
                    participant: MessageParticipant {
                        id: None,
                        display_name: "Mara".to_string(),
                    },
                    flagged: None,
                    tags: None,
                }),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for _ in 0..100 {
        let events = h.event_log.list(session_id, EventFilters::new()).await.unwrap();
        let ready_count = events
            .iter()
            .filter(|e| matches!(&e.data, EventData::Status(s) if s.status == StatusKind::Ready))
            .count();
        if ready_count >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let events = h.event_log.list(session_id, EventFilters::new()).await.unwrap();
    let reply_events: Vec<_> = events
        .iter()
        .filter(|e| e.kind() == EventKind::Message && e.source == EventSource::AiAgent)
        .collect();
    assert!(
        reply_events.len() <= 1,
        "rapid messages should coalesce into at most one reply, got {}",
        reply_events.len()
    );
}

#[tokio::test]
async fn test_tool_manual_control_switches_session_to_manual() {
    let h = build_harness(
        r#"{"propositions": [{"index": 0, "score": 9, "rationale": "customer is extremely dissatisfied", "still_applicable": true}]}"#,
        r#"{"calls": [{"service_name": "local", "tool_name": "escalate_to_human", "arguments": {}}]}"#,
        r#"{"produced_reply": true, "rationale": "acknowledging the handoff", "revisions": [
            {"revision_number": 1, "content": "I'm connecting you with a human agent now.", "followed_all_instructions": true, "is_repeat_message": false}
        ]}"#,
    );

    let agent = Agent::new("Support Bot");
    let agent_id = agent.id;
    h.agent_store.insert(agent).await.unwrap();

    let customer = Customer::new("Priya");
    let customer_id = customer.id;
    h.customer_store.insert(customer).await.unwrap();

    let guideline = Guideline::new(agent_id, "customer is extremely dissatisfied", "escalate to a human agent");
    let guideline_id = guideline.id;
    h.guideline_store.insert(guideline).await.unwrap();

    h.association_store
        .insert(GuidelineToolAssociation {
            id: AssociationId::new(),
            guideline_id,
            tool_id: ToolId::new("local", "escalate_to_human"),
        })
        .await
        .unwrap();

    let session = Session::new(agent_id, customer_id);
    let session_id = h.session_store.create(session).await.unwrap();

    let triggering = h
        .event_log
        .append(
            session_id,
            EventSource::Customer,
            CorrelationId::generate(),
            EventData::Message(MessageData {
                message: "I'm extremely dissatisfied".to_string(),
                participant: MessageParticipant {
                    id: None,
                    display_name: "Priya".to_string(),
                },
                flagged: None,
                tags: None,
            }),
        )
        .await
        .unwrap();

    let emitted = h
        .engine
        .process(
            ProcessContext {
                session_id,
                agent_id,
                triggering_offset: Some(triggering.offset),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(emitted, "the engine should still acknowledge the handoff with a reply");

    let events = h.event_log.list(session_id, EventFilters::new()).await.unwrap();
    let tool_event = events.iter().find(|e| e.kind() == EventKind::Tool).expect("expected a tool event");
    match &tool_event.data {
        EventData::Tool(data) => {
            let control = data.tool_calls[0].result.control.as_ref().expect("expected a control signal");
            assert_eq!(control.mode, ToolControlMode::Manual);
        }
        _ => panic!("expected tool data"),
    }

    let session = h.session_store.get(session_id).await.unwrap().expect("session should still exist");
    assert_eq!(session.mode, SessionMode::Manual, "session should switch to manual before ready is emitted");
}
