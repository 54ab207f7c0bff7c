//! # Coordinator
//!
//! Owns the round-by-round delegation loop and produces exactly one final
//! answer per request. Within a round all specialist invocations run
//! concurrently; rounds themselves are strictly sequential because review
//! needs every reply from the prior round.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::CoordinationError;
use crate::models::{FinalAnswer, Request, SpecialistReply};
use crate::routing::RoutingTable;
use crate::specialists::{DelegationPayload, SpecialistRegistry};

use super::events::{CoordinationEvent, CoordinationEventKind};
use super::review::{Analysis, ConflictRule, Decision, FollowUpTarget, KeywordAnalyzer, ReplyAnalyzer};
use super::state::{ConversationState, Phase};
use super::synthesis;

/// Configuration for the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Hard upper bound on delegation rounds per request
    pub round_ceiling: u32,
    /// Per-invocation timeout in milliseconds
    pub specialist_timeout_ms: u64,
    /// Replies shorter than this are flagged shallow
    pub min_reply_chars: usize,
    /// Requests at most this long that match a single topic are answered
    /// directly, with zero delegation. 0 disables the heuristic.
    #[serde(default)]
    pub direct_answer_max_chars: usize,
    /// Mutually exclusive recommendation pairs for conflict detection
    #[serde(default)]
    pub conflict_rules: Vec<ConflictRule>,
    /// Baseline constraints included in every delegation payload
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            round_ceiling: 3,
            specialist_timeout_ms: 30_000,
            min_reply_chars: 20,
            direct_answer_max_chars: 0,
            conflict_rules: Vec::new(),
            constraints: Vec::new(),
        }
    }
}

/// Result of coordinating one request
#[derive(Debug)]
pub struct RunOutcome {
    /// The single synthesized answer
    pub answer: FinalAnswer,
    /// Events that occurred, in order
    pub events: Vec<CoordinationEvent>,
}

/// The delegation coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    routing: RoutingTable,
    registry: SpecialistRegistry,
    analyzer: Box<dyn ReplyAnalyzer>,
    events: Vec<CoordinationEvent>,
    event_tx: Option<mpsc::Sender<CoordinationEvent>>,
}

impl Coordinator {
    /// Create a coordinator with the default keyword-heuristic analyzer
    pub fn new(
        config: CoordinatorConfig,
        routing: RoutingTable,
        registry: SpecialistRegistry,
    ) -> Result<Self> {
        let analyzer = KeywordAnalyzer::new(config.conflict_rules.clone(), config.min_reply_chars)?;
        Ok(Self {
            config,
            routing,
            registry,
            analyzer: Box::new(analyzer),
            events: Vec::new(),
            event_tx: None,
        })
    }

    /// Swap in a different adequacy-detection strategy
    pub fn with_analyzer(mut self, analyzer: Box<dyn ReplyAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<CoordinationEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Specialists routed for a request. Deterministic: the same request
    /// always yields the same set.
    pub fn analyze(&self, text: &str) -> BTreeSet<String> {
        self.routing.route(text)
    }

    /// Emit an event
    async fn emit(&mut self, event: CoordinationEvent) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Coordinate one request to one final answer
    #[tracing::instrument(skip(self), fields(request_preview = %text.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, text: &str) -> Result<RunOutcome> {
        if text.trim().is_empty() {
            return Err(CoordinationError::EmptyRequest.into());
        }

        self.events.clear();

        let tags = self.routing.matched_tags(text);
        let request = Request::new(text).with_tags(tags);
        let mut state = ConversationState::new(request, self.config.round_ceiling);

        state.transition(Phase::Analyzing);
        self.emit(CoordinationEvent::new(
            CoordinationEventKind::RequestReceived,
            "coordinator",
        ))
        .await;

        let specialists = self.analyze(text);
        self.ensure_registered(&specialists, state.request.tags.is_empty())?;

        // Direct-answer heuristic: short, single-domain requests skip
        // delegation entirely
        if self.config.direct_answer_max_chars > 0
            && state.request.tags.len() == 1
            && text.trim().chars().count() <= self.config.direct_answer_max_chars
        {
            state.transition(Phase::Synthesizing);
            self.emit(CoordinationEvent::new(
                CoordinationEventKind::DirectAnswer,
                "coordinator",
            ))
            .await;
            let answer = synthesis::direct_answer(&state);
            state.transition(Phase::Done);
            self.emit(CoordinationEvent::new(
                CoordinationEventKind::Completed,
                "coordinator",
            ))
            .await;
            return Ok(RunOutcome {
                answer,
                events: self.events.clone(),
            });
        }

        let mut targets: Vec<(String, DelegationPayload)> = specialists
            .iter()
            .map(|id| (id.clone(), self.base_payload(&state, 1, None)))
            .collect();

        let caveats = loop {
            // First round starts from Analyzing, follow-ups from Reviewing;
            // begin_round cannot fail here because the loop only continues
            // while another round is allowed
            let round = match state.begin_round() {
                Some(round) => round,
                None => break self.caveats_for(&state),
            };
            state.transition(Phase::Delegating);
            self.emit(
                CoordinationEvent::new(CoordinationEventKind::RoundStarted, "coordinator")
                    .with_round(round),
            )
            .await;

            let replies = self.delegate(round, &mut targets).await;
            for reply in replies {
                state.record(reply);
            }

            state.transition(Phase::Reviewing);
            match self.review(&state) {
                Decision::Synthesize => {
                    if state.can_start_round() {
                        // Adequacy path: nothing unresolved
                        break Vec::new();
                    }
                    let caveats = self.caveats_for(&state);
                    if !caveats.is_empty() {
                        self.emit(
                            CoordinationEvent::new(
                                CoordinationEventKind::CeilingReached,
                                "coordinator",
                            )
                            .with_round(round),
                        )
                        .await;
                    }
                    break caveats;
                }
                Decision::FollowUp(follow_ups) => {
                    self.emit(
                        CoordinationEvent::new(
                            CoordinationEventKind::FollowUpIssued,
                            "coordinator",
                        )
                        .with_round(round)
                        .with_data(serde_json::json!({
                            "targets": follow_ups
                                .iter()
                                .map(|t| t.specialist.clone())
                                .collect::<Vec<_>>()
                        })),
                    )
                    .await;

                    let summary = self.round_summary(&state);
                    targets = follow_ups
                        .into_iter()
                        .map(|target| {
                            let mut payload =
                                self.base_payload(&state, round + 1, Some(summary.clone()));
                            payload.follow_up = Some(target.question);
                            (target.specialist, payload)
                        })
                        .collect();
                }
            }
        };

        state.transition(Phase::Synthesizing);
        self.emit(CoordinationEvent::new(
            CoordinationEventKind::SynthesisStarted,
            "coordinator",
        ))
        .await;

        let answer = synthesis::synthesize(&state, caveats);

        state.transition(Phase::Done);
        self.emit(
            CoordinationEvent::new(CoordinationEventKind::Completed, "coordinator")
                .with_data(serde_json::json!({
                    "rounds_used": answer.rounds_used,
                    "invocations": answer.invocations,
                    "caveats": answer.caveats.len()
                })),
        )
        .await;

        Ok(RunOutcome {
            answer,
            events: self.events.clone(),
        })
    }

    /// Fail fast when routing names specialists the registry lacks
    fn ensure_registered(&self, specialists: &BTreeSet<String>, used_fallback: bool) -> Result<()> {
        for id in specialists {
            if !self.registry.contains(id) {
                if used_fallback {
                    return Err(CoordinationError::NoRouteFound {
                        default: id.clone(),
                    }
                    .into());
                }
                return Err(CoordinationError::UnknownSpecialist {
                    specialist: id.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn base_payload(
        &self,
        state: &ConversationState,
        round: u32,
        prior_summary: Option<String>,
    ) -> DelegationPayload {
        DelegationPayload {
            request: state.request.text.clone(),
            constraints: self.config.constraints.clone(),
            prior_summary,
            follow_up: None,
            round,
        }
    }

    /// Invoke every target concurrently; one failure or timeout never
    /// blocks the others. Replies come back sorted by specialist id so
    /// review and synthesis are deterministic.
    async fn delegate(
        &mut self,
        round: u32,
        targets: &mut Vec<(String, DelegationPayload)>,
    ) -> Vec<SpecialistReply> {
        let timeout = Duration::from_millis(self.config.specialist_timeout_ms);
        let mut join_set = JoinSet::new();

        for (id, payload) in targets.drain(..) {
            self.emit(
                CoordinationEvent::new(CoordinationEventKind::SpecialistStarted, &id)
                    .with_round(round),
            )
            .await;

            // Registered ids were validated before the first round and
            // follow-up targets only name prior participants
            let specialist = match self.registry.get(&id) {
                Some(specialist) => specialist,
                None => {
                    join_set.spawn(async move {
                        SpecialistReply::failed(&id, round, "specialist not registered")
                    });
                    continue;
                }
            };

            join_set.spawn(async move {
                match tokio::time::timeout(timeout, specialist.respond(payload)).await {
                    Ok(Ok(content)) => SpecialistReply::ok(&id, round, content),
                    Ok(Err(e)) => {
                        let err = CoordinationError::SpecialistUnavailable {
                            specialist: id.clone(),
                            reason: e.to_string(),
                        };
                        SpecialistReply::failed(&id, round, err.to_string())
                    }
                    Err(_) => {
                        let err = CoordinationError::SpecialistUnavailable {
                            specialist: id.clone(),
                            reason: format!("timed out after {}ms", timeout.as_millis()),
                        };
                        SpecialistReply::failed(&id, round, err.to_string())
                    }
                }
            });
        }

        let mut replies = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(reply) => replies.push(reply),
                Err(e) => tracing::warn!("Specialist task panicked: {}", e),
            }
        }
        replies.sort_by(|a, b| a.specialist.cmp(&b.specialist));

        for reply in &replies {
            let event = if reply.is_failed() {
                CoordinationEvent::new(CoordinationEventKind::SpecialistFailed, &reply.specialist)
                    .with_round(round)
                    .with_data(serde_json::json!({ "status": reply.status }))
            } else {
                CoordinationEvent::new(
                    CoordinationEventKind::SpecialistCompleted,
                    &reply.specialist,
                )
                .with_round(round)
            };
            self.emit(event).await;
        }

        replies
    }

    /// Inspect the latest round. Adequacy checks run in order (conflicts,
    /// gaps, depth); failed invocations always count as gaps. At the
    /// ceiling the decision is forced to `Synthesize`.
    pub fn review(&self, state: &ConversationState) -> Decision {
        let latest = state.latest_round_replies();
        let analysis = self.analyzer.inspect(&state.request, &latest);
        let failed = failed_replies(&latest);

        if analysis.is_clean() && failed.is_empty() {
            return Decision::Synthesize;
        }
        if !state.can_start_round() {
            return Decision::Synthesize;
        }
        Decision::FollowUp(self.follow_up_targets(state, &analysis, &failed))
    }

    /// One target per specialist with something to resolve; the first
    /// issue found for a specialist decides its clarifying question.
    fn follow_up_targets(
        &self,
        state: &ConversationState,
        analysis: &Analysis,
        failed: &[(String, String)],
    ) -> Vec<FollowUpTarget> {
        let mut targets: Vec<FollowUpTarget> = Vec::new();
        let mut push = |specialist: &str, question: String| {
            if !targets.iter().any(|t| t.specialist == specialist) {
                targets.push(FollowUpTarget {
                    specialist: specialist.to_string(),
                    question,
                });
            }
        };

        for conflict in &analysis.conflicts {
            push(
                &conflict.left_specialist,
                format!(
                    "Your recommendation of '{}' conflicts with {}'s recommendation of '{}'. \
                     Reconcile or justify your choice.",
                    conflict.left_term, conflict.right_specialist, conflict.right_term
                ),
            );
            push(
                &conflict.right_specialist,
                format!(
                    "Your recommendation of '{}' conflicts with {}'s recommendation of '{}'. \
                     Reconcile or justify your choice.",
                    conflict.right_term, conflict.left_specialist, conflict.left_term
                ),
            );
        }

        for (specialist, reason) in failed {
            push(
                specialist,
                format!(
                    "Your previous invocation produced no reply ({}). Please answer: {}",
                    reason, state.request.text
                ),
            );
        }

        for tag in &analysis.gaps {
            let specialist = self
                .routing
                .specialist_for(tag)
                .unwrap_or_else(|| self.routing.default_specialist())
                .to_string();
            push(
                &specialist,
                format!("No reply addressed '{}'. Cover it explicitly.", tag),
            );
        }

        for specialist in &analysis.shallow {
            push(
                specialist,
                format!(
                    "Your reply was too brief. Expand with concrete guidance on: {}",
                    state.request.text
                ),
            );
        }

        targets
    }

    /// Caveats for everything still unresolved in the final round
    fn caveats_for(&self, state: &ConversationState) -> Vec<String> {
        let latest = state.latest_round_replies();
        let analysis = self.analyzer.inspect(&state.request, &latest);
        let mut caveats = Vec::new();

        for conflict in &analysis.conflicts {
            caveats.push(format!(
                "unresolved conflict: {} recommends '{}' while {} recommends '{}'",
                conflict.left_specialist,
                conflict.left_term,
                conflict.right_specialist,
                conflict.right_term
            ));
        }
        for (specialist, reason) in failed_replies(&latest) {
            caveats.push(format!(
                "unresolved: {} produced no usable reply ({})",
                specialist, reason
            ));
        }
        for tag in &analysis.gaps {
            caveats.push(format!("unaddressed aspect: '{}'", tag));
        }
        for specialist in &analysis.shallow {
            caveats.push(format!("reply from {} remained shallow", specialist));
        }
        caveats
    }

    /// Summary of conflicting or incomplete replies carried into the next
    /// round's payloads
    fn round_summary(&self, state: &ConversationState) -> String {
        let issues = self.caveats_for(state);
        format!(
            "Round {} left open issues: {}",
            state.round(),
            issues.join("; ")
        )
    }
}

/// Specialists whose latest-round invocation failed, with reasons
fn failed_replies(replies: &[&SpecialistReply]) -> Vec<(String, String)> {
    replies
        .iter()
        .filter_map(|r| match &r.status {
            crate::models::ReplyStatus::Failed { reason } => {
                Some((r.specialist.clone(), reason.clone()))
            }
            crate::models::ReplyStatus::Ok => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RouteRule, RoutingConfig};
    use crate::specialists::{ScriptedReply, ScriptedSpecialist};
    use std::sync::Arc;

    fn routing() -> RoutingTable {
        RoutingTable::new(RoutingConfig {
            rules: vec![
                RouteRule {
                    keyword: "storage".to_string(),
                    specialist: "storage_eng".to_string(),
                },
                RouteRule {
                    keyword: "search".to_string(),
                    specialist: "search_eng".to_string(),
                },
                RouteRule {
                    keyword: "deploy".to_string(),
                    specialist: "slowpoke".to_string(),
                },
            ],
            default_specialist: "generalist".to_string(),
        })
        .unwrap()
    }

    fn config() -> CoordinatorConfig {
        CoordinatorConfig {
            specialist_timeout_ms: 1_000,
            conflict_rules: vec![ConflictRule {
                left: "technology A".to_string(),
                right: "technology B".to_string(),
            }],
            ..CoordinatorConfig::default()
        }
    }

    fn count(events: &[CoordinationEvent], kind: CoordinationEventKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }

    #[test]
    fn test_coordinator_config_default() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.round_ceiling, 3);
        assert_eq!(config.specialist_timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let coordinator =
            Coordinator::new(config(), routing(), SpecialistRegistry::new()).unwrap();
        let text = "storage and search question";
        assert_eq!(coordinator.analyze(text), coordinator.analyze(text));
    }

    #[tokio::test]
    async fn test_analyze_falls_back_to_default() {
        let coordinator =
            Coordinator::new(config(), routing(), SpecialistRegistry::new()).unwrap();
        let specialists = coordinator.analyze("asdkjasd random text");
        assert_eq!(specialists.len(), 1);
        assert!(specialists.contains("generalist"));
    }

    #[tokio::test]
    async fn test_unknown_specialist_is_an_error() {
        // Routing names storage_eng but nothing is registered
        let mut coordinator =
            Coordinator::new(config(), routing(), SpecialistRegistry::new()).unwrap();
        let err = coordinator.run("a storage question").await.unwrap_err();
        assert!(err.to_string().contains("storage_eng"));
    }

    #[tokio::test]
    async fn test_conflict_then_agreement_resolves_in_two_rounds() {
        let mut registry = SpecialistRegistry::new();
        registry.register(
            "storage_eng",
            Arc::new(ScriptedSpecialist::new(vec![
                ScriptedReply::Reply(
                    "For storage and search workloads you should use technology A.".to_string(),
                ),
                ScriptedReply::Reply(
                    "Agreed: standardize on technology B for storage and search.".to_string(),
                ),
            ])),
        );
        registry.register(
            "search_eng",
            Arc::new(ScriptedSpecialist::new(vec![
                ScriptedReply::Reply(
                    "I recommend technology B for both storage and search.".to_string(),
                ),
                ScriptedReply::Reply(
                    "technology B covers storage and search needs at this scale.".to_string(),
                ),
            ])),
        );

        let mut coordinator = Coordinator::new(config(), routing(), registry).unwrap();
        let outcome = coordinator
            .run("Pick the storage and search stack for the catalog")
            .await
            .unwrap();

        assert_eq!(outcome.answer.rounds_used, 2);
        assert_eq!(outcome.answer.invocations, 4);
        assert!(outcome.answer.caveats.is_empty());
        assert_eq!(count(&outcome.events, CoordinationEventKind::FollowUpIssued), 1);
        assert_eq!(count(&outcome.events, CoordinationEventKind::CeilingReached), 0);
    }

    #[tokio::test]
    async fn test_ceiling_forces_synthesis_with_conflict_caveat() {
        let mut registry = SpecialistRegistry::new();
        // Both stubs repeat the same conflicting recommendation forever
        registry.register(
            "storage_eng",
            Arc::new(ScriptedSpecialist::replying(
                "The storage and search layer must be built on technology A.",
            )),
        );
        registry.register(
            "search_eng",
            Arc::new(ScriptedSpecialist::replying(
                "The storage and search layer must be built on technology B.",
            )),
        );

        let mut coordinator = Coordinator::new(config(), routing(), registry).unwrap();
        let outcome = coordinator
            .run("Pick the storage and search stack for the catalog")
            .await
            .unwrap();

        // Exactly `ceiling` rounds, then forced synthesis with caveats
        assert_eq!(outcome.answer.rounds_used, 3);
        assert_eq!(count(&outcome.events, CoordinationEventKind::RoundStarted), 3);
        assert_eq!(count(&outcome.events, CoordinationEventKind::CeilingReached), 1);
        assert!(outcome
            .answer
            .caveats
            .iter()
            .any(|c| c.contains("unresolved conflict")));
        assert!(outcome.answer.text.contains("## Caveats"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_reply_and_caveat() {
        let mut registry = SpecialistRegistry::new();
        registry.register(
            "slowpoke",
            Arc::new(
                ScriptedSpecialist::replying("A detailed deploy runbook that never arrives.")
                    .with_delay(Duration::from_millis(200)),
            ),
        );

        let mut coordinator = Coordinator::new(
            CoordinatorConfig {
                round_ceiling: 2,
                specialist_timeout_ms: 20,
                ..config()
            },
            routing(),
            registry,
        )
        .unwrap();

        let outcome = coordinator
            .run("How should we deploy the new build?")
            .await
            .unwrap();

        // One follow-up retry, then the ceiling surfaces the failure
        assert_eq!(outcome.answer.rounds_used, 2);
        assert_eq!(count(&outcome.events, CoordinationEventKind::SpecialistFailed), 2);
        assert_eq!(count(&outcome.events, CoordinationEventKind::FollowUpIssued), 1);
        assert!(outcome
            .answer
            .caveats
            .iter()
            .any(|c| c.contains("unresolved: slowpoke")));
    }

    #[tokio::test]
    async fn test_direct_answer_records_zero_invocations() {
        let mut registry = SpecialistRegistry::new();
        registry.register(
            "storage_eng",
            Arc::new(ScriptedSpecialist::replying("unused scripted reply")),
        );

        let mut coordinator = Coordinator::new(
            CoordinatorConfig {
                direct_answer_max_chars: 80,
                ..config()
            },
            routing(),
            registry,
        )
        .unwrap();

        let outcome = coordinator.run("Is the storage volume full?").await.unwrap();

        assert_eq!(outcome.answer.invocations, 0);
        assert_eq!(outcome.answer.rounds_used, 0);
        assert_eq!(count(&outcome.events, CoordinationEventKind::DirectAnswer), 1);
        assert_eq!(count(&outcome.events, CoordinationEventKind::SpecialistStarted), 0);
    }

    #[tokio::test]
    async fn test_adequate_first_round_synthesizes_immediately() {
        let mut registry = SpecialistRegistry::new();
        registry.register(
            "generalist",
            Arc::new(ScriptedSpecialist::replying(
                "A reasonable general-purpose answer with enough substance to pass review.",
            )),
        );

        let mut coordinator = Coordinator::new(config(), routing(), registry).unwrap();
        let outcome = coordinator.run("asdkjasd random text").await.unwrap();

        assert_eq!(outcome.answer.rounds_used, 1);
        assert_eq!(outcome.answer.invocations, 1);
        assert!(outcome.answer.caveats.is_empty());
        assert!(outcome.answer.text.contains("## generalist"));
        assert!(outcome.answer.text.contains("## Recommendation"));
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let mut coordinator =
            Coordinator::new(config(), routing(), SpecialistRegistry::new()).unwrap();
        assert!(coordinator.run("   ").await.is_err());
    }
}
