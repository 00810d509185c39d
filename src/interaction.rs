//! The bundle of read-only state every pipeline phase (§4.D–§4.G) consumes:
//! the agent/customer being served, the context available to them, and the
//! interaction so far including events staged by earlier iterations of the
//! current run.

use crate::agent::Agent;
use crate::context::{ContextVariable, ContextVariableValue};
use crate::customer::Customer;
use crate::event::Event;
use crate::glossary::Term;

/// Snapshot of everything a proposer/expander/tool-caller/generator phase
/// needs, assembled once per `process()` run and refreshed with
/// [`RunContext::with_staged_events`] between iterations (§4.F's iteration
/// loop: "staged tool results added to the context").
#[derive(Debug, Clone)]
pub struct RunContext {
    pub agent: Agent,
    pub customer: Customer,
    pub context_variables: Vec<(ContextVariable, ContextVariableValue)>,
    pub terms: Vec<Term>,
    pub interaction_history: Vec<Event>,
    /// Tool events produced earlier in the current run (§9 glossary: "staged events").
    pub staged_events: Vec<Event>,
}

impl RunContext {
    pub fn new(
        agent: Agent,
        customer: Customer,
        context_variables: Vec<(ContextVariable, ContextVariableValue)>,
        terms: Vec<Term>,
        interaction_history: Vec<Event>,
    ) -> Self {
        Self {
            agent,
            customer,
            context_variables,
            terms,
            interaction_history,
            staged_events: Vec::new(),
        }
    }

    pub fn push_staged_event(&mut self, event: Event) {
        self.staged_events.push(event);
    }

    pub fn has_any_message(&self) -> bool {
        self.interaction_history
            .iter()
            .any(|e| e.kind() == crate::event::EventKind::Message)
    }
}
