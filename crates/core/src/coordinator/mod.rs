//! # Coordination
//!
//! Round-by-round delegation loop for Roundtable.
//!
//! ## Flow
//!
//! ```text
//! Request → Analyze → Delegate (parallel) → Review ⟷ Delegate → Synthesize
//! ```
//!
//! Rounds are strictly sequential; invocations within a round run
//! concurrently. The round ceiling is the sole bound on total work.

pub mod coordinator;
pub mod events;
pub mod review;
pub mod state;
pub mod synthesis;

pub use coordinator::{Coordinator, CoordinatorConfig, RunOutcome};
pub use events::{CoordinationEvent, CoordinationEventKind};
pub use review::{Analysis, Conflict, ConflictRule, Decision, FollowUpTarget, KeywordAnalyzer, ReplyAnalyzer};
pub use state::{ConversationState, Phase};
