//! # Roundtable Models
//!
//! Core data types shared by routing, delegation, review, and synthesis.
//! Replies are immutable once constructed; the coordinator only appends
//! them to the conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user request plus the topic tags derived from it during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Original request text (opaque to the engine)
    pub text: String,
    /// Topic keywords that matched the routing table, in rule order
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Request {
    /// Create a request with no derived tags yet
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tags: Vec::new(),
        }
    }

    /// Attach the topic tags derived by the routing table
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Outcome of a single specialist invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyStatus {
    /// Specialist returned content
    Ok,
    /// Invocation errored or timed out
    Failed { reason: String },
}

impl ReplyStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReplyStatus::Failed { .. })
    }
}

/// One reply from one specialist in one round. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistReply {
    /// Specialist that produced this reply
    pub specialist: String,
    /// Round in which the reply was produced (1-based)
    pub round: u32,
    /// Reply text; empty for failed invocations
    pub content: String,
    /// Whether the invocation succeeded
    pub status: ReplyStatus,
    /// When the reply was recorded
    pub timestamp: DateTime<Utc>,
}

impl SpecialistReply {
    /// A successful reply
    pub fn ok(specialist: &str, round: u32, content: impl Into<String>) -> Self {
        Self {
            specialist: specialist.to_string(),
            round,
            content: content.into(),
            status: ReplyStatus::Ok,
            timestamp: Utc::now(),
        }
    }

    /// A failed invocation, recorded so review can treat it as a gap
    pub fn failed(specialist: &str, round: u32, reason: impl Into<String>) -> Self {
        Self {
            specialist: specialist.to_string(),
            round,
            content: String::new(),
            status: ReplyStatus::Failed {
                reason: reason.into(),
            },
            timestamp: Utc::now(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }
}

/// The single synthesized answer produced per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Synthesized answer text, grouped by specialist, ending with a
    /// recommendation
    pub text: String,
    /// Unresolved conflicts and gaps, enumerated rather than dropped
    pub caveats: Vec<String>,
    /// Number of delegation rounds that ran (0 for direct answers)
    pub rounds_used: u32,
    /// Number of specialist invocations recorded across all rounds
    pub invocations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_constructors() {
        let ok = SpecialistReply::ok("backend", 1, "Use connection pooling.");
        assert_eq!(ok.specialist, "backend");
        assert_eq!(ok.round, 1);
        assert!(!ok.is_failed());

        let failed = SpecialistReply::failed("backend", 2, "timed out");
        assert!(failed.is_failed());
        assert!(failed.content.is_empty());
    }

    #[test]
    fn test_reply_status_serialization() {
        let status = ReplyStatus::Failed {
            reason: "timed out".to_string(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        assert!(json.contains("timed out"));
    }

    #[test]
    fn test_request_tags() {
        let request = Request::new("pick a database").with_tags(vec!["database".to_string()]);
        assert_eq!(request.tags, vec!["database"]);
    }
}
