//! # Review
//!
//! Adequacy checks over the latest round's replies. Detection strategy is
//! pluggable behind [`ReplyAnalyzer`]; the shipped implementation uses
//! deterministic keyword heuristics. Checks run in order: conflicts,
//! gaps, depth.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{Request, SpecialistReply};

/// A configured pair of mutually exclusive recommendations. Two replies
/// conflict when one mentions `left` and another mentions `right`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRule {
    pub left: String,
    pub right: String,
}

/// A detected conflict between two replies in the same round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Specialist recommending the left term
    pub left_specialist: String,
    pub left_term: String,
    /// Specialist recommending the right term
    pub right_specialist: String,
    pub right_term: String,
}

/// Result of inspecting one round's replies
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Pairwise mutually exclusive recommendations
    pub conflicts: Vec<Conflict>,
    /// Request aspects no reply addressed
    pub gaps: Vec<String>,
    /// Specialists whose replies fell below the depth threshold
    pub shallow: Vec<String>,
}

impl Analysis {
    /// All adequacy checks passed
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.gaps.is_empty() && self.shallow.is_empty()
    }
}

/// One follow-up target: a specialist and a specific clarifying question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpTarget {
    pub specialist: String,
    pub question: String,
}

/// Outcome of the review step. Replaces textual done-markers with an
/// explicit, type-checked contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// All replies adequate (or ceiling reached): integrate and finish
    Synthesize,
    /// Run another round against the named specialists
    FollowUp(Vec<FollowUpTarget>),
}

/// Pluggable adequacy detection over one round of replies. Failed
/// invocations are handled by the coordinator itself; analyzers only see
/// content-level adequacy.
pub trait ReplyAnalyzer: Send + Sync {
    fn inspect(&self, request: &Request, replies: &[&SpecialistReply]) -> Analysis;
}

/// Deterministic keyword-heuristic analyzer: configured conflict term
/// pairs, routing-tag gap detection, and a character-count depth check.
pub struct KeywordAnalyzer {
    rules: Vec<(Regex, Regex, ConflictRule)>,
    min_reply_chars: usize,
}

impl KeywordAnalyzer {
    pub fn new(rules: Vec<ConflictRule>, min_reply_chars: usize) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let left = word_pattern(&rule.left)
                .with_context(|| format!("Invalid conflict term '{}'", rule.left))?;
            let right = word_pattern(&rule.right)
                .with_context(|| format!("Invalid conflict term '{}'", rule.right))?;
            compiled.push((left, right, rule));
        }
        Ok(Self {
            rules: compiled,
            min_reply_chars,
        })
    }

    fn detect_conflicts(&self, replies: &[&SpecialistReply]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for (left_re, right_re, rule) in &self.rules {
            // Pairwise inspection: a conflict needs the two terms to come
            // from two different specialists
            for a in replies.iter().filter(|r| !r.is_failed()) {
                for b in replies.iter().filter(|r| !r.is_failed()) {
                    if a.specialist == b.specialist {
                        continue;
                    }
                    if left_re.is_match(&a.content) && right_re.is_match(&b.content) {
                        conflicts.push(Conflict {
                            left_specialist: a.specialist.clone(),
                            left_term: rule.left.clone(),
                            right_specialist: b.specialist.clone(),
                            right_term: rule.right.clone(),
                        });
                    }
                }
            }
        }
        conflicts
    }

    fn detect_gaps(&self, request: &Request, replies: &[&SpecialistReply]) -> Vec<String> {
        request
            .tags
            .iter()
            .filter(|tag| {
                let pattern = match word_pattern(tag) {
                    Ok(p) => p,
                    Err(_) => return false,
                };
                !replies
                    .iter()
                    .any(|r| !r.is_failed() && pattern.is_match(&r.content))
            })
            .cloned()
            .collect()
    }

    fn detect_shallow(&self, replies: &[&SpecialistReply]) -> Vec<String> {
        replies
            .iter()
            .filter(|r| !r.is_failed() && r.content.trim().chars().count() < self.min_reply_chars)
            .map(|r| r.specialist.clone())
            .collect()
    }
}

impl ReplyAnalyzer for KeywordAnalyzer {
    fn inspect(&self, request: &Request, replies: &[&SpecialistReply]) -> Analysis {
        Analysis {
            conflicts: self.detect_conflicts(replies),
            gaps: self.detect_gaps(request, replies),
            shallow: self.detect_shallow(replies),
        }
    }
}

fn word_pattern(term: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).map_err(Into::into)
}
