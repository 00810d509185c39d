//! The Customer entity (§3): the end user a session is held with.

use crate::types::CustomerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An end user referenced by one or more sessions.
///
/// [SUPPLEMENT] `extra_metadata` is a free-form bag kept for downstream
/// personalization (e.g. plan tier, locale) — present in the original
/// customer store but not spelled out by the distilled spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub extra_metadata: HashMap<String, serde_json::Value>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            extra_metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_metadata.insert(key.into(), value);
        self
    }
}
