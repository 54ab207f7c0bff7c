//! # Scripted Specialist
//!
//! A specialist that plays back canned replies in order, used by tests
//! and the CLI demo scenarios. The last reply repeats once the script is
//! exhausted, so a stub can keep answering across follow-up rounds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DelegationPayload, Specialist};

/// One scripted step: a reply or a simulated failure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedReply {
    /// Return this text
    Reply(String),
    /// Fail the invocation with this reason
    Fail(String),
}

/// Plays back a fixed script of replies, one per invocation
pub struct ScriptedSpecialist {
    script: Vec<ScriptedReply>,
    cursor: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedSpecialist {
    pub fn new(script: Vec<ScriptedReply>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Single canned reply, repeated on every invocation
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedReply::Reply(text.into())])
    }

    /// Fail every invocation with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new(vec![ScriptedReply::Fail(reason.into())])
    }

    /// Sleep before answering, to exercise invocation timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Specialist for ScriptedSpecialist {
    async fn respond(&self, _payload: DelegationPayload) -> anyhow::Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.script.is_empty() {
            anyhow::bail!("scripted specialist has no replies configured");
        }

        let index = self
            .cursor
            .fetch_add(1, Ordering::SeqCst)
            .min(self.script.len() - 1);

        match &self.script[index] {
            ScriptedReply::Reply(text) => Ok(text.clone()),
            ScriptedReply::Fail(reason) => anyhow::bail!("{}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> DelegationPayload {
        DelegationPayload {
            request: "question".to_string(),
            round: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_script_plays_in_order_and_repeats_last() {
        let specialist = ScriptedSpecialist::new(vec![
            ScriptedReply::Reply("first".to_string()),
            ScriptedReply::Reply("second".to_string()),
        ]);

        assert_eq!(specialist.respond(payload()).await.unwrap(), "first");
        assert_eq!(specialist.respond(payload()).await.unwrap(), "second");
        // Script exhausted: last reply repeats
        assert_eq!(specialist.respond(payload()).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let specialist = ScriptedSpecialist::failing("service offline");
        let err = specialist.respond(payload()).await.unwrap_err();
        assert!(err.to_string().contains("service offline"));
    }

    #[test]
    fn test_scripted_reply_deserialization() {
        let script: Vec<ScriptedReply> =
            serde_json::from_str(r#"[{"reply": "use Postgres"}, {"fail": "offline"}]"#).unwrap();
        assert_eq!(script.len(), 2);
        assert!(matches!(script[0], ScriptedReply::Reply(_)));
        assert!(matches!(script[1], ScriptedReply::Fail(_)));
    }
}
