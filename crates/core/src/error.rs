//! # Coordination Errors
//!
//! Typed error taxonomy for the delegation loop. Specialist failures and
//! the round ceiling are handled inside the loop and never reach the
//! caller; only configuration mistakes surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinationError {
    /// A specialist invocation errored or timed out. Contained by the
    /// coordinator: recorded as a failed reply and retried via follow-up
    /// within the round budget.
    #[error("specialist '{specialist}' unavailable: {reason}")]
    SpecialistUnavailable { specialist: String, reason: String },

    /// No routing keyword matched and no usable default specialist exists.
    /// Keyword misses alone are recovered by the default specialist; this
    /// only fires when the fallback itself is unregistered.
    #[error("no route found and default specialist '{default}' is not registered")]
    NoRouteFound { default: String },

    /// The routing table names a specialist the registry does not contain
    #[error("routing selected unknown specialist '{specialist}'")]
    UnknownSpecialist { specialist: String },

    /// The request text was empty after trimming
    #[error("request text is empty")]
    EmptyRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoordinationError::UnknownSpecialist {
            specialist: "frontend".to_string(),
        };
        assert!(err.to_string().contains("frontend"));

        let err = CoordinationError::NoRouteFound {
            default: "generalist".to_string(),
        };
        assert!(err.to_string().contains("generalist"));
    }
}
