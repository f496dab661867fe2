use crate::session::Stage;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

/// High-level error category, used when reporting a failure to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// DNS, connect, TLS or timeout failures talking to the gateway
    Transport,
    /// The gateway answered, but not with what the handshake expects
    Protocol,
    /// The browser could not be launched, driven or waited on
    Environment,
    /// The credential file could not be written
    Filesystem,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Environment => "environment",
            ErrorCategory::Filesystem => "filesystem",
        }
    }
}

/// Error types returned by every stage of the SSO flow.
#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    #[error("could not build HTTP client: {0}")]
    ClientSetup(#[source] reqwest::Error),

    #[error("{stage} request to {url} failed: {source}")]
    Transport {
        stage: Stage,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {stage} response: {reason}")]
    Protocol {
        stage: Stage,
        reason: String,
        body: String,
    },

    #[error("gateway rejected the {stage} request: {message}")]
    GatewayRejected { stage: Stage, message: String },

    #[error("browser error: {message}")]
    Browser { message: String },

    #[error("no SSO token cookie appeared within {0:?}")]
    LoginTimeout(Duration),

    #[error("{0} cancelled by user")]
    Cancelled(Stage),

    #[error("failed to write {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SsoError {
    pub(crate) fn browser(action: &str, err: impl Display) -> Self {
        SsoError::Browser {
            message: format!("{action}: {err}"),
        }
    }

    pub(crate) fn protocol(stage: Stage, reason: impl Into<String>, body: &str) -> Self {
        SsoError::Protocol {
            stage,
            reason: reason.into(),
            body: body.to_string(),
        }
    }

    /// Returns the high-level category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            SsoError::ClientSetup(_) | SsoError::Transport { .. } => ErrorCategory::Transport,
            SsoError::Protocol { .. } | SsoError::GatewayRejected { .. } => {
                ErrorCategory::Protocol
            }
            SsoError::Browser { .. } | SsoError::LoginTimeout(_) | SsoError::Cancelled(_) => {
                ErrorCategory::Environment
            }
            SsoError::Filesystem { .. } => ErrorCategory::Filesystem,
        }
    }

    /// The raw gateway response, when the failure was caused by its content.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            SsoError::Protocol { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The stage the error was raised in, when it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SsoError::Transport { stage, .. }
            | SsoError::Protocol { stage, .. }
            | SsoError::GatewayRejected { stage, .. }
            | SsoError::Cancelled(stage) => Some(*stage),
            SsoError::Browser { .. } | SsoError::LoginTimeout(_) => Some(Stage::Login),
            _ => None,
        }
    }
}
