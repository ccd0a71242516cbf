//! # Action Errors
//!
//! Failures raised while routing or handling an action. The engine turns every
//! one of these into a failed `ActionResult`; none of them reach its caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("User rejected the action")]
    Rejected,

    #[error("{reason}")]
    Blocked { reason: String, guidance: String },

    #[error("Sandbox is not running")]
    SandboxNotRunning,

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unknown action type: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl ActionError {
    /// Policy rejections are final; retrying them cannot change the outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected | Self::Blocked { .. })
    }

    /// What the model should do instead, for policy blocks.
    pub fn guidance(&self) -> Option<&str> {
        match self {
            Self::Blocked { guidance, .. } => Some(guidance),
            _ => None,
        }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_are_not_retryable() {
        assert!(!ActionError::Rejected.is_retryable());
        let blocked = ActionError::Blocked {
            reason: "nope".into(),
            guidance: "do it differently".into(),
        };
        assert!(!blocked.is_retryable());
        assert_eq!(blocked.to_string(), "nope");
        assert!(ActionError::SandboxNotRunning.is_retryable());
    }

    #[test]
    fn test_collaborator_error_is_transparent() {
        let err: ActionError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
