use serde_json::Value;
use thiserror::Error;

pub const TRANSITION_UNAVAILABLE: &str = "Transition not available for this status";

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("invalid Jira base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("failed to build Jira HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect failure, timeout).
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    /// Jira answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        details: Value,
    },

    #[error("failed to decode Jira response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{}", TRANSITION_UNAVAILABLE)]
    TransitionUnavailable,

    #[error("comment body cannot be empty")]
    EmptyComment,
}

impl JiraError {
    pub(crate) fn upstream(status: u16, body: &str) -> Self {
        let details = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        Self::Upstream {
            status,
            message: format!("Request failed with status code {status}"),
            details,
        }
    }

    /// HTTP status the proxy should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::TransitionUnavailable | Self::EmptyComment => 400,
            Self::InvalidBaseUrl(_) | Self::Client(_) | Self::Transport(_) | Self::Decode(_) => 500,
        }
    }

    /// Upstream response body, when there was one.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Upstream { details, .. } => Some(details),
            _ => None,
        }
    }
}
