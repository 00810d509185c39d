//! Process-wide engine configuration (§12), generalizing the teacher's
//! `AgentConfig`: serde-default fields, builder-style setters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_proposition_threshold() -> u8 {
    7
}

fn default_tool_result_max_bytes() -> usize {
    16 * 1024
}

fn default_cancellation_grace_period_ms() -> u64 {
    250
}

fn default_guideline_batch_size() -> usize {
    20
}

fn default_llm_retry_temperatures() -> [f32; 3] {
    [0.5, 1.0, 0.1]
}

fn default_tool_call_timeout_ms() -> u64 {
    30_000
}

/// Process-wide settings read by the proposer, tool caller, message
/// generator, tool invoker and controller. An agent's own `max_iterations`
/// still bounds each individual run (§4.H); nothing here overrides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum score (1-10) for a guideline proposition to be accepted (§4.D, §9).
    #[serde(default = "default_proposition_threshold")]
    pub proposition_threshold: u8,

    /// Cap on a tool result's serialized size, in bytes (§3 invariant).
    #[serde(default = "default_tool_result_max_bytes")]
    pub tool_result_max_bytes: usize,

    /// How long the controller waits for an in-flight run to observe
    /// cancellation before scheduling a new one (§4.I.2a).
    #[serde(default = "default_cancellation_grace_period_ms")]
    pub cancellation_grace_period_ms: u64,

    /// Candidate guidelines per proposer batch (§4.D.1).
    #[serde(default = "default_guideline_batch_size")]
    pub guideline_batch_size: usize,

    /// Temperatures tried in order across the 3 retry attempts for any
    /// schematic generation (§4.G.4).
    #[serde(default = "default_llm_retry_temperatures")]
    pub llm_retry_temperatures: [f32; 3],

    /// Per-call timeout passed to the tool invoker (§5).
    #[serde(default = "default_tool_call_timeout_ms")]
    pub tool_call_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proposition_threshold: default_proposition_threshold(),
            tool_result_max_bytes: default_tool_result_max_bytes(),
            cancellation_grace_period_ms: default_cancellation_grace_period_ms(),
            guideline_batch_size: default_guideline_batch_size(),
            llm_retry_temperatures: default_llm_retry_temperatures(),
            tool_call_timeout_ms: default_tool_call_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proposition_threshold(mut self, threshold: u8) -> Self {
        self.proposition_threshold = threshold;
        self
    }

    pub fn with_tool_result_max_bytes(mut self, max_bytes: usize) -> Self {
        self.tool_result_max_bytes = max_bytes;
        self
    }

    pub fn with_cancellation_grace_period(mut self, period: Duration) -> Self {
        self.cancellation_grace_period_ms = period.as_millis() as u64;
        self
    }

    pub fn cancellation_grace_period(&self) -> Duration {
        Duration::from_millis(self.cancellation_grace_period_ms)
    }

    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_call_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_spec_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.proposition_threshold, 7);
        assert_eq!(config.tool_result_max_bytes, 16 * 1024);
        assert_eq!(config.cancellation_grace_period(), Duration::from_millis(250));
        assert_eq!(config.llm_retry_temperatures, [0.5, 1.0, 0.1]);
    }

    #[test]
    fn test_config_deserializes_with_partial_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.proposition_threshold, 7);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::new()
            .with_proposition_threshold(8)
            .with_tool_result_max_bytes(32 * 1024);
        assert_eq!(config.proposition_threshold, 8);
        assert_eq!(config.tool_result_max_bytes, 32 * 1024);
    }
}
