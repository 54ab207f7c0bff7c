//! # Specialist Boundary
//!
//! The only interface the coordinator consumes from the specialist
//! execution mechanism: a single request/response call carrying the
//! original request, accumulated constraints, and (on follow-up rounds)
//! a summary of conflicting or incomplete prior replies.
//!
//! Model calling, prompt templates, and tool invocation live behind this
//! trait and are external collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod scripted;

pub use scripted::{ScriptedReply, ScriptedSpecialist};

/// Context handed to a specialist for one invocation. Owned by the
/// invocation; specialists never see or mutate shared conversation state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationPayload {
    /// Original user request text
    pub request: String,
    /// Accumulated constraints the reply must respect
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Summary of conflicting or incomplete prior replies (follow-up
    /// rounds only)
    #[serde(default)]
    pub prior_summary: Option<String>,
    /// Specific clarifying question for this specialist (follow-up
    /// rounds only)
    #[serde(default)]
    pub follow_up: Option<String>,
    /// Round this invocation belongs to (1-based)
    pub round: u32,
}

/// A named responder invoked by the coordinator with bounded context to
/// answer one sub-question.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Answer one delegation request. Errors are contained by the
    /// coordinator and recorded as failed replies.
    async fn respond(&self, payload: DelegationPayload) -> anyhow::Result<String>;
}

/// Registry of specialists keyed by identifier. Populated once at
/// startup; read-only during coordination.
#[derive(Default)]
pub struct SpecialistRegistry {
    entries: HashMap<String, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a specialist under an identifier, replacing any previous
    /// entry with the same id
    pub fn register(&mut self, id: impl Into<String>, specialist: Arc<dyn Specialist>) {
        self.entries.insert(id.into(), specialist);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Specialist>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Specialist for Echo {
        async fn respond(&self, payload: DelegationPayload) -> anyhow::Result<String> {
            Ok(format!("echo: {}", payload.request))
        }
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = SpecialistRegistry::new();
        registry.register("echo", Arc::new(Echo));

        assert!(registry.contains("echo"));
        assert!(!registry.contains("missing"));

        let specialist = registry.get("echo").unwrap();
        let reply = specialist
            .respond(DelegationPayload {
                request: "hello".to_string(),
                round: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reply, "echo: hello");
    }

    #[test]
    fn test_payload_serialization() {
        let payload = DelegationPayload {
            request: "pick a queue".to_string(),
            constraints: vec!["must be self-hosted".to_string()],
            prior_summary: None,
            follow_up: None,
            round: 1,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("pick a queue"));
        assert!(json.contains("self-hosted"));
    }
}
