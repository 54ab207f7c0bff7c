//! # Coordination Events
//!
//! Event log for the delegation loop. Events accumulate in the run
//! outcome and stream over an optional channel for UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of coordination event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationEventKind {
    /// Request accepted, analysis starting
    RequestReceived,
    /// Request satisfied without any delegation
    DirectAnswer,
    /// Delegation round started
    RoundStarted,
    /// Specialist invocation dispatched
    SpecialistStarted,
    /// Specialist replied
    SpecialistCompleted,
    /// Specialist invocation errored or timed out
    SpecialistFailed,
    /// Review requested another round with clarifying questions
    FollowUpIssued,
    /// Round ceiling reached; synthesis is forced
    CeilingReached,
    /// Synthesis started
    SynthesisStarted,
    /// Final answer produced
    Completed,
}

/// An event in the coordination loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: CoordinationEventKind,
    /// Component that produced this event (coordinator or a specialist id)
    pub source: String,
    /// Round the event belongs to, if any
    #[serde(default)]
    pub round: Option<u32>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CoordinationEvent {
    /// Create a new event
    pub fn new(kind: CoordinationEventKind, source: &str) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            source: source.to_string(),
            round: None,
            data: None,
        }
    }

    /// Tag the event with a round number
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Generate a simple unique event id
fn event_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = CoordinationEvent::new(CoordinationEventKind::SpecialistStarted, "backend")
            .with_round(2);

        assert_eq!(event.source, "backend");
        assert_eq!(event.round, Some(2));
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_event_kind_serialization() {
        let event = CoordinationEvent::new(CoordinationEventKind::FollowUpIssued, "coordinator");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("follow_up_issued"));
    }
}
