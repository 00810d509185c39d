//! Common type definitions used throughout the crate
//!
//! Newtype wrappers around UUID for type-safe identifiers, plus the composite
//! tool identifier (a tool is addressed by `(service_name, tool_name)`, not a
//! single opaque id, since tools live behind heterogeneous services).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an Agent.
    AgentId
);
uuid_id!(
    /// Unique identifier for a Customer.
    CustomerId
);
uuid_id!(
    /// Unique identifier for a Session.
    SessionId
);
uuid_id!(
    /// Unique identifier for an Event.
    EventId
);
uuid_id!(
    /// Unique identifier for a Guideline.
    GuidelineId
);
uuid_id!(
    /// Unique identifier for a GuidelineConnection.
    ConnectionId
);
uuid_id!(
    /// Unique identifier for a GuidelineToolAssociation.
    AssociationId
);
uuid_id!(
    /// Unique identifier for a glossary Term.
    TermId
);
uuid_id!(
    /// Unique identifier for a ContextVariable.
    ContextVariableId
);
uuid_id!(
    /// Opaque identifier uniting every event produced by a single processing run.
    CorrelationId
);

impl CorrelationId {
    /// A fresh correlation id, one per processing run (or per customer-posted event).
    pub fn generate() -> Self {
        Self::new()
    }
}

/// Identifies a tool within a service: tools are not globally unique by a
/// single id, they're addressed by the service that hosts them plus their
/// name within that service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolId {
    pub service_name: String,
    pub tool_name: String,
}

impl ToolId {
    pub fn new(service_name: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tool_name: tool_name.into(),
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service_name, self.tool_name)
    }
}
