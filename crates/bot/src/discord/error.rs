//! Discord-related errors.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when interacting with Discord.
#[derive(Debug, Error)]
pub enum DiscordError {
    /// HTTP request failed before a response arrived.
    #[error("Discord request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Discord response error: {0}")]
    Response(String),

    /// Discord API returned a non-success status.
    #[error("Discord API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
}

impl DiscordError {
    /// HTTP status of an API error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(_) | Self::Response(_) => None,
        }
    }

    /// The bot lacks permission for the operation.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }

    /// The target resource (member, message, channel) does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let forbidden = DiscordError::Api {
            status: StatusCode::FORBIDDEN,
            message: "Missing Permissions".to_string(),
        };
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_not_found());

        let transport = DiscordError::Request("connection reset".to_string());
        assert_eq!(transport.status(), None);
        assert!(!transport.is_forbidden());
    }
}
