//! Guideline proposer (§4.D): scores candidate guidelines for applicability
//! to the current interaction and returns those at or above threshold.
//!
//! Grounded in the original's `GuidelineProposer`
//! (`core/engines/alpha/guideline_proposer.py`, exercised by
//! `test_guideline_proposer.py`): candidates are batched, each batch goes
//! through one schematic completion, and results are concatenated and
//! deduplicated before thresholding.

use crate::error::{GuidelineProposalError, GuidelineProposalResult};
use crate::guideline::{Guideline, GuidelineProposition};
use crate::interaction::RunContext;
use crate::provider::schematic::SchematicGenerator;
use crate::provider::Message;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, trace};

/// One guideline's scored outcome as returned by a single batch completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposerBatchItem {
    /// Position of the candidate within the batch sent to the model (§4.D.2).
    pub index: usize,
    /// 1..=10.
    pub score: u8,
    pub rationale: String,
    /// Whether the guideline's action still needs to be taken given the
    /// interaction so far (§4.D.2's re-applicability flag). `false` means
    /// the guideline is relevant but already satisfied and must be
    /// suppressed (§4.D constraints).
    #[serde(default = "default_true")]
    pub still_applicable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProposerBatchResponse {
    propositions: Vec<ProposerBatchItem>,
}

fn render_guideline(index: usize, guideline: &Guideline) -> String {
    format!(
        "Guideline #{index}) condition: \"{}\"; action: \"{}\"",
        guideline.content.condition, guideline.content.action
    )
}

fn render_interaction_history(ctx: &RunContext) -> String {
    if ctx.interaction_history.is_empty() {
        return "(no prior interaction)".to_string();
    }

    ctx.interaction_history
        .iter()
        .filter_map(|event| match &event.data {
            crate::event::EventData::Message(m) => {
                Some(format!("[{:?}] {}: {}", event.source, m.participant.display_name, m.message))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_batch_prompt(ctx: &RunContext, batch: &[&Guideline]) -> Vec<Message> {
    let guidelines_text = batch
        .iter()
        .enumerate()
        .map(|(i, g)| render_guideline(i, g))
        .collect::<Vec<_>>()
        .join("\n");

    let terms_text = ctx
        .terms
        .iter()
        .map(|t| format!("{}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let system = Message::system(
        "You score behavioral guidelines for relevance to a customer conversation. \
         You do not judge coherence between guidelines - conflicts are resolved elsewhere. \
         Score each candidate 1-10 for how applicable it is right now, explain why, and say \
         whether its action still needs to be taken given what has already happened. \
         Respond with JSON: {\"propositions\": [{\"index\": n, \"score\": n, \"rationale\": \"...\", \"still_applicable\": bool}]}",
    );

    let user = Message::user(format!(
        "Agent: {}\n\nGlossary:\n{terms_text}\n\nInteraction so far:\n{}\n\nCandidates:\n{guidelines_text}",
        ctx.agent.name,
        render_interaction_history(ctx),
    ));

    vec![system, user]
}

/// Scores `candidate_guidelines` against `ctx` and returns propositions at
/// or above `threshold`, one per accepted guideline (§4.D.4).
pub async fn propose_guidelines(
    generator: &SchematicGenerator<ProposerBatchResponse>,
    ctx: &RunContext,
    candidate_guidelines: &[Guideline],
    batch_size: usize,
    threshold: u8,
) -> GuidelineProposalResult<Vec<GuidelineProposition>> {
    if candidate_guidelines.is_empty() {
        return Ok(Vec::new());
    }

    let mut all_propositions = Vec::new();

    for batch in candidate_guidelines.chunks(batch_size.max(1)) {
        let refs: Vec<&Guideline> = batch.iter().collect();
        trace!(batch_len = batch.len(), "proposing guideline batch");

        let prompt = build_batch_prompt(ctx, &refs);
        let response = generator
            .generate(prompt)
            .await
            .map_err(GuidelineProposalError::from)?;

        for item in response.propositions {
            let Some(guideline) = batch.get(item.index) else {
                continue;
            };

            if !item.still_applicable {
                debug!(guideline_id = %guideline.id, "suppressing already-satisfied proposition");
                continue;
            }

            all_propositions.push(GuidelineProposition {
                guideline: guideline.clone(),
                score: item.score,
                rationale: item.rationale,
            });
        }
    }

    // Stable input order is preserved by iterating batches/items in order
    // above; here we only deduplicate identical (condition, score) pairs
    // that the model might rank inconsistently across batches (§4.D.3).
    let mut seen: HashSet<(String, u8)> = HashSet::new();
    let deduped: Vec<GuidelineProposition> = all_propositions
        .into_iter()
        .filter(|p| seen.insert((p.guideline.content.condition.clone(), p.score)))
        .collect();

    Ok(deduped
        .into_iter()
        .filter(|p| p.meets_threshold(threshold))
        .collect())
}
