//! # Routing Table
//!
//! Static keyword-to-specialist mapping consulted read-only during
//! analysis. Built once at startup from a `RoutingConfig`; requests that
//! match no keyword fall back to the configured default specialist.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One keyword-to-specialist rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    /// Topic keyword matched against request text (case-insensitive,
    /// whole-word)
    pub keyword: String,
    /// Specialist that handles this topic
    pub specialist: String,
}

/// Deserializable routing configuration, loaded once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub rules: Vec<RouteRule>,
    /// Specialist used when no keyword matches
    pub default_specialist: String,
}

impl RoutingConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse routing config")
    }
}

/// Compiled routing table. Read-only after construction.
pub struct RoutingTable {
    rules: Vec<(Regex, RouteRule)>,
    default_specialist: String,
}

impl RoutingTable {
    /// Compile keyword patterns from a routing config
    pub fn new(config: RoutingConfig) -> Result<Self> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in config.rules {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&rule.keyword));
            let regex = Regex::new(&pattern)
                .with_context(|| format!("Invalid routing keyword '{}'", rule.keyword))?;
            rules.push((regex, rule));
        }
        Ok(Self {
            rules,
            default_specialist: config.default_specialist,
        })
    }

    pub fn default_specialist(&self) -> &str {
        &self.default_specialist
    }

    /// Topic keywords that match the given text, in rule order, deduplicated
    pub fn matched_tags(&self, text: &str) -> Vec<String> {
        let mut tags = Vec::new();
        for (regex, rule) in &self.rules {
            if regex.is_match(text) && !tags.contains(&rule.keyword) {
                tags.push(rule.keyword.clone());
            }
        }
        tags
    }

    /// Specialists routed for the given text. Always non-empty: an empty
    /// keyword match falls back to the single default specialist.
    pub fn route(&self, text: &str) -> BTreeSet<String> {
        let mut specialists = BTreeSet::new();
        for (regex, rule) in &self.rules {
            if regex.is_match(text) {
                specialists.insert(rule.specialist.clone());
            }
        }
        if specialists.is_empty() {
            specialists.insert(self.default_specialist.clone());
        }
        specialists
    }

    /// Specialist registered for a specific topic keyword
    pub fn specialist_for(&self, keyword: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.keyword.eq_ignore_ascii_case(keyword))
            .map(|(_, rule)| rule.specialist.as_str())
    }

    /// All distinct specialists named by the table, default included
    pub fn all_specialists(&self) -> BTreeSet<String> {
        let mut specialists: BTreeSet<String> = self
            .rules
            .iter()
            .map(|(_, rule)| rule.specialist.clone())
            .collect();
        specialists.insert(self.default_specialist.clone());
        specialists
    }
}
