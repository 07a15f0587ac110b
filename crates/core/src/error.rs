use crate::labels;
use crate::lifecycle::Action;
use crate::model::InstanceState;
use crate::validation::ValidationErrors;
use thiserror::Error;

/// Errors surfaced by the console, from local form checks up to backend rejections.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The request never reached the backend.
    #[error("network error: {0}")]
    Network(String),
    /// Client-side form input was rejected before any request was made.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Action(#[from] ActionError),
    /// The backend answered 401. The session has already been torn down by the HTTP layer.
    #[error("authentication required: {0}")]
    Auth(String),
    /// Any other non-success answer from the backend.
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("session storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reasons a lifecycle action is refused, locally or by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("cannot {action} instance {id} while it is {state}")]
    NotEligible {
        id: String,
        action: Action,
        state: InstanceState,
    },
    #[error("an action is already in progress for instance {id}")]
    InProgress { id: String },
    #[error("instance {id} is not loaded")]
    UnknownInstance { id: String },
    #[error("instance {id} has no elastic IP bound")]
    NoElasticIp { id: String },
    #[error("allocation {requested} is not bound to instance {id} (bound: {bound})")]
    AllocationMismatch {
        id: String,
        requested: String,
        bound: String,
    },
    #[error("backend rejected {action} ({status}): {message}")]
    Rejected {
        action: Action,
        status: u16,
        message: String,
    },
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// The message shown to the user for this error.
    pub fn localized(&self) -> String {
        match self {
            ConsoleError::Network(_) => labels::NETWORK_FAILURE.to_string(),
            ConsoleError::Validation(errors) => errors.summary(),
            ConsoleError::Action(err) => err.localized(),
            ConsoleError::Auth(_) => labels::SESSION_EXPIRED.to_string(),
            ConsoleError::Backend { message, .. } if !message.is_empty() => message.clone(),
            ConsoleError::Backend { .. } | ConsoleError::InvalidResponse(_) => {
                labels::UNEXPECTED_RESPONSE.to_string()
            }
            ConsoleError::Storage(_) => labels::SESSION_STORAGE_FAILURE.to_string(),
            ConsoleError::Config(msg) => msg.clone(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ConsoleError::Auth(_))
    }

    /// Reinterpret a backend rejection as a rejection of `action`.
    pub(crate) fn into_action_error(self, action: Action) -> ConsoleError {
        match self {
            ConsoleError::Backend { status, message } => ConsoleError::Action(ActionError::Rejected {
                action,
                status,
                message,
            }),
            other => other,
        }
    }
}

impl ActionError {
    pub fn localized(&self) -> String {
        match self {
            ActionError::NotEligible { action, state, .. } => {
                format!("{}（現在の状態: {}）", labels::not_eligible(*action), labels::status_text(state))
            }
            ActionError::InProgress { .. } => labels::ACTION_IN_PROGRESS.to_string(),
            ActionError::UnknownInstance { .. } => labels::INSTANCE_NOT_FOUND.to_string(),
            ActionError::NoElasticIp { .. } => labels::NO_ELASTIC_IP.to_string(),
            ActionError::AllocationMismatch { .. } => labels::STALE_ALLOCATION.to_string(),
            ActionError::Rejected { action, .. } => action.failure_message().to_string(),
        }
    }
}

impl From<ValidationErrors> for ConsoleError {
    fn from(errors: ValidationErrors) -> Self {
        ConsoleError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_rejection_becomes_action_error() {
        let err = ConsoleError::Backend {
            status: 409,
            message: "IncorrectInstanceState".to_string(),
        }
        .into_action_error(Action::Stop);

        match err {
            ConsoleError::Action(ActionError::Rejected { action, status, .. }) => {
                assert_eq!(action, Action::Stop);
                assert_eq!(status, 409);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_network_error_is_not_reinterpreted() {
        let err = ConsoleError::Network("connection refused".to_string()).into_action_error(Action::Start);
        assert!(matches!(err, ConsoleError::Network(_)));
    }

    #[test]
    fn test_rejected_action_uses_failure_message() {
        let err = ActionError::Rejected {
            action: Action::Start,
            status: 500,
            message: String::new(),
        };
        assert_eq!(err.localized(), "インスタンスの起動中にエラーが発生しました。");
    }

    #[test]
    fn test_not_eligible_mentions_current_state() {
        let err = ActionError::NotEligible {
            id: "i-1".to_string(),
            action: Action::Start,
            state: InstanceState::Running,
        };
        assert!(err.localized().contains("実行中"));
        assert!(err.to_string().contains("cannot start"));
    }

    #[test]
    fn test_auth_error_localizes_to_session_expired() {
        let err = ConsoleError::Auth("401".to_string());
        assert!(err.is_auth());
        assert_eq!(err.localized(), labels::SESSION_EXPIRED);
    }
}
