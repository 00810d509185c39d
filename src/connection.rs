//! Connection expander (§4.E): given proposed guidelines G0, follows
//! `entails`/`suggests` edges forward to add every guideline reachable from
//! them, terminating on a visited-set since the connection graph may
//! contain cycles (§9).
//!
//! Grounded in the original's connection-proposition machinery
//! (`core/services/indexing/guideline_connection_proposer.py`), generalized
//! here to the runtime-side traversal the distilled spec actually asks for.

use crate::error::{ConnectionExpansionError, ConnectionExpansionResult};
use crate::guideline::GuidelineProposition;
use crate::storage::{GuidelineConnectionStore, GuidelineStore};
use crate::types::GuidelineId;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// Walks forward from `proposed` along stored connections and returns the
/// additional reachable propositions (not including `proposed` itself).
/// Each inherited proposition carries the *same* score as the nearest
/// originating proposition that reached it (§9 Open Question, resolved in
/// DESIGN.md: same score, not decayed, so a guideline reached through a
/// short chain from a high-priority proposition keeps that priority
/// instead of silently losing urgency), and a rationale citing the path.
pub async fn expand_connections(
    connection_store: &dyn GuidelineConnectionStore,
    guideline_store: &dyn GuidelineStore,
    proposed: &[GuidelineProposition],
) -> ConnectionExpansionResult<Vec<GuidelineProposition>> {
    let mut visited: HashSet<GuidelineId> = proposed.iter().map(|p| p.guideline.id).collect();
    let mut queue: VecDeque<(GuidelineId, f32, Vec<String>)> = proposed
        .iter()
        .map(|p| (p.guideline.id, p.score as f32, vec![p.guideline.content.condition.clone()]))
        .collect();

    let mut expanded = Vec::new();

    while let Some((source_id, score, path)) = queue.pop_front() {
        let edges = connection_store
            .connections_from(source_id)
            .await
            .map_err(|e| ConnectionExpansionError::Store(e.to_string()))?;

        for edge in edges {
            if visited.contains(&edge.target_guideline_id) {
                continue;
            }
            visited.insert(edge.target_guideline_id);

            let target = guideline_store
                .get(edge.target_guideline_id)
                .await
                .map_err(|e| ConnectionExpansionError::Store(e.to_string()))?
                .ok_or(ConnectionExpansionError::GuidelineNotFound(edge.target_guideline_id))?;

            let mut new_path = path.clone();
            new_path.push(format!("--[{:?}]-->", edge.kind));
            new_path.push(target.content.condition.clone());

            trace!(guideline_id = %target.id, path = %new_path.join(" "), "expanded connection");

            expanded.push(GuidelineProposition {
                rationale: format!("reached via connection path: {}", new_path.join(" ")),
                score: score as u8,
                guideline: target,
            });

            queue.push_back((edge.target_guideline_id, score, new_path));
        }
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guideline::{ConnectionKind, Guideline, GuidelineConnection};
    use crate::storage::memory::{InMemoryGuidelineConnectionStore, InMemoryGuidelineStore};
    use crate::types::{AgentId, ConnectionId};

    async fn seed(
        conn_store: &InMemoryGuidelineConnectionStore,
        guideline_store: &InMemoryGuidelineStore,
        agent_id: AgentId,
    ) -> (Guideline, Guideline, Guideline) {
        let a = Guideline::new(agent_id, "a", "do a");
        let b = Guideline::new(agent_id, "b", "do b");
        let c = Guideline::new(agent_id, "c", "do c");

        guideline_store.insert(a.clone()).await.unwrap();
        guideline_store.insert(b.clone()).await.unwrap();
        guideline_store.insert(c.clone()).await.unwrap();

        conn_store
            .insert(GuidelineConnection {
                id: ConnectionId::new(),
                source_guideline_id: a.id,
                target_guideline_id: b.id,
                kind: ConnectionKind::Entails,
            })
            .await
            .unwrap();
        conn_store
            .insert(GuidelineConnection {
                id: ConnectionId::new(),
                source_guideline_id: b.id,
                target_guideline_id: c.id,
                kind: ConnectionKind::Suggests,
            })
            .await
            .unwrap();

        (a, b, c)
    }

    #[tokio::test]
    async fn test_expand_follows_multi_hop_chain() {
        let conn_store = InMemoryGuidelineConnectionStore::new();
        let guideline_store = InMemoryGuidelineStore::new();
        let agent_id = AgentId::new();
        let (a, _b, c) = seed(&conn_store, &guideline_store, agent_id).await;

        let proposed = vec![GuidelineProposition {
            guideline: a,
            score: 9,
            rationale: "matched".to_string(),
        }];

        let expanded = expand_connections(&conn_store, &guideline_store, &proposed).await.unwrap();

        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().any(|p| p.guideline.id == c.id));
        assert!(expanded.iter().all(|p| p.score == 9));
    }

    #[tokio::test]
    async fn test_expand_terminates_on_cycle() {
        let conn_store = InMemoryGuidelineConnectionStore::new();
        let guideline_store = InMemoryGuidelineStore::new();
        let agent_id = AgentId::new();

        let a = Guideline::new(agent_id, "a", "do a");
        let b = Guideline::new(agent_id, "b", "do b");
        guideline_store.insert(a.clone()).await.unwrap();
        guideline_store.insert(b.clone()).await.unwrap();

        conn_store
            .insert(GuidelineConnection {
                id: ConnectionId::new(),
                source_guideline_id: a.id,
                target_guideline_id: b.id,
                kind: ConnectionKind::Entails,
            })
            .await
            .unwrap();
        conn_store
            .insert(GuidelineConnection {
                id: ConnectionId::new(),
                source_guideline_id: b.id,
                target_guideline_id: a.id,
                kind: ConnectionKind::Entails,
            })
            .await
            .unwrap();

        let proposed = vec![GuidelineProposition {
            guideline: a,
            score: 8,
            rationale: "matched".to_string(),
        }];

        let expanded = expand_connections(&conn_store, &guideline_store, &proposed).await.unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].guideline.id, b.id);
    }

    #[tokio::test]
    async fn test_expand_no_connections_returns_empty() {
        let conn_store = InMemoryGuidelineConnectionStore::new();
        let guideline_store = InMemoryGuidelineStore::new();
        let a = Guideline::new(AgentId::new(), "a", "do a");
        guideline_store.insert(a.clone()).await.unwrap();

        let proposed = vec![GuidelineProposition {
            guideline: a,
            score: 8,
            rationale: "matched".to_string(),
        }];

        let expanded = expand_connections(&conn_store, &guideline_store, &proposed).await.unwrap();
        assert!(expanded.is_empty());
    }
}
