//! # Synthesis
//!
//! Integrates all replies across all rounds into one coherent answer:
//! grouped by specialist, ending with an explicit recommendation, with
//! any unresolved conflicts or gaps enumerated rather than dropped.

use crate::models::{FinalAnswer, ReplyStatus, SpecialistReply};

use super::state::ConversationState;

/// Build the final answer from the full conversation
pub fn synthesize(state: &ConversationState, caveats: Vec<String>) -> FinalAnswer {
    let mut text = format!("# Answer: {}\n", state.request.text.trim());

    // Group replies by specialist, preserving first-appearance order
    let mut specialists: Vec<&str> = Vec::new();
    for reply in state.replies() {
        if !specialists.contains(&reply.specialist.as_str()) {
            specialists.push(&reply.specialist);
        }
    }

    for specialist in &specialists {
        text.push_str(&format!("\n## {}\n", specialist));
        for reply in state
            .replies()
            .iter()
            .filter(|r| r.specialist.as_str() == *specialist)
        {
            match &reply.status {
                ReplyStatus::Ok => {
                    text.push_str(&format!("- (round {}) {}\n", reply.round, reply.content));
                }
                ReplyStatus::Failed { reason } => {
                    text.push_str(&format!("- (round {}) no reply: {}\n", reply.round, reason));
                }
            }
        }
    }

    text.push_str("\n## Recommendation\n");
    text.push_str(&recommendation(state));

    if !caveats.is_empty() {
        text.push_str("\n## Caveats\n");
        for caveat in &caveats {
            text.push_str(&format!("- {}\n", caveat));
        }
    }

    FinalAnswer {
        text,
        caveats,
        rounds_used: state.round(),
        invocations: state.replies().len(),
    }
}

/// Answer for a request satisfied without delegation
pub fn direct_answer(state: &ConversationState) -> FinalAnswer {
    let domain = state
        .request
        .tags
        .first()
        .map(|t| format!(" (domain: {})", t))
        .unwrap_or_default();
    FinalAnswer {
        text: format!(
            "# Answer: {}\n\nHandled directly without delegation{}.\n",
            state.request.text.trim(),
            domain
        ),
        caveats: Vec::new(),
        rounds_used: 0,
        invocations: 0,
    }
}

/// Explicit closing recommendation: the latest round's successful replies
/// carry the most refined guidance.
fn recommendation(state: &ConversationState) -> String {
    let latest: Vec<&SpecialistReply> = state
        .latest_round_replies()
        .into_iter()
        .filter(|r| !r.is_failed())
        .collect();

    if latest.is_empty() {
        return "No specialist produced a usable reply; see caveats.\n".to_string();
    }

    let mut out = String::new();
    for reply in latest {
        out.push_str(&format!("- {}: {}\n", reply.specialist, reply.content));
    }
    out
}
