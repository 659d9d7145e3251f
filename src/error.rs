use thiserror::Error;

/// Everything that can end a turn early. A declined confirmation is not an
/// error; see [`crate::orchestrator::TurnOutcome::Declined`].
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unsupported browser engine: {0}")]
    UnsupportedBrowser(String),

    #[error("invalid {action} action: {reason}")]
    InvalidAction { action: String, reason: String },

    #[error("no tool call returned by the model")]
    NoToolCall,

    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("browser error: {0:#}")]
    Browser(anyhow::Error),

    #[error("page changed during extraction: {before} -> {after}")]
    PageChanged { before: String, after: String },

    #[error("credential store: {0}")]
    Credentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_action(action: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Model or browser I/O failed. Callers do not retry these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Provider { .. }
                | Self::NoToolCall
                | Self::Browser(_)
                | Self::PageChanged { .. }
        )
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction(_)
                | Self::UnknownProvider(_)
                | Self::UnsupportedBrowser(_)
                | Self::InvalidAction { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
