//! # Conversation State
//!
//! Per-request state owned and mutated exclusively by the coordinator.
//! Created for each incoming request, advanced between rounds, discarded
//! once the final answer is returned.

use serde::{Deserialize, Serialize};

use crate::models::{Request, SpecialistReply};

/// Phase of the coordination state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a request
    Idle,
    /// Matching the request against the routing table
    Analyzing,
    /// Specialist invocations in flight
    Delegating,
    /// Inspecting the latest round's replies
    Reviewing,
    /// Integrating all replies into the final answer
    Synthesizing,
    /// Terminal; no transitions out
    Done,
}

impl Phase {
    /// Whether `next` is a legal transition from this phase
    pub fn can_transition(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Analyzing)
                | (Phase::Analyzing, Phase::Delegating)
                | (Phase::Analyzing, Phase::Synthesizing)
                | (Phase::Delegating, Phase::Reviewing)
                | (Phase::Reviewing, Phase::Delegating)
                | (Phase::Reviewing, Phase::Synthesizing)
                | (Phase::Synthesizing, Phase::Done)
        )
    }
}

/// Ordered reply log, round counter, and completion flag for one request
#[derive(Debug)]
pub struct ConversationState {
    /// The request being coordinated
    pub request: Request,
    replies: Vec<SpecialistReply>,
    round: u32,
    ceiling: u32,
    complete: bool,
    phase: Phase,
}

impl ConversationState {
    /// Fresh state at round zero
    pub fn new(request: Request, ceiling: u32) -> Self {
        Self {
            request,
            replies: Vec::new(),
            round: 0,
            ceiling: ceiling.max(1),
            complete: false,
            phase: Phase::Idle,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether another delegation round may start
    pub fn can_start_round(&self) -> bool {
        !self.complete && self.round < self.ceiling
    }

    /// Start the next round. Returns the new round number, or `None` when
    /// the ceiling is reached or the conversation is complete.
    pub fn begin_round(&mut self) -> Option<u32> {
        if !self.can_start_round() {
            return None;
        }
        self.round += 1;
        Some(self.round)
    }

    /// Move to the next phase; illegal transitions are rejected
    pub fn transition(&mut self, next: Phase) -> bool {
        if !self.phase.can_transition(next) {
            tracing::warn!(current = ?self.phase, requested = ?next, "Rejected illegal phase transition");
            return false;
        }
        self.phase = next;
        if next == Phase::Done {
            self.complete = true;
        }
        true
    }

    /// Append a reply. Replies stamped with a future round are rejected;
    /// insertion order is round order.
    pub fn record(&mut self, reply: SpecialistReply) {
        if self.complete {
            tracing::warn!(
                specialist = %reply.specialist,
                "Dropped reply recorded after completion"
            );
            return;
        }
        if reply.round > self.round {
            tracing::warn!(
                specialist = %reply.specialist,
                reply_round = reply.round,
                current_round = self.round,
                "Dropped reply stamped with a future round"
            );
            return;
        }
        self.replies.push(reply);
    }

    /// All replies across all rounds, in insertion order
    pub fn replies(&self) -> &[SpecialistReply] {
        &self.replies
    }

    /// Replies produced in the current round
    pub fn latest_round_replies(&self) -> Vec<&SpecialistReply> {
        self.replies
            .iter()
            .filter(|r| r.round == self.round)
            .collect()
    }
}
