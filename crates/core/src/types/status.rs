//! Link application status and the decision state machine.
//!
//! ```text
//! Pending ──approve──▶ Approved
//!    │
//!    └────reject────▶ Rejected
//! ```
//!
//! Both outcomes are terminal.

use serde::{Deserialize, Serialize};

/// A staff decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Status an application ends up in after this decision.
    #[must_use]
    pub const fn outcome(self) -> ApplicationStatus {
        match self {
            Self::Approve => ApplicationStatus::Approved,
            Self::Reject => ApplicationStatus::Rejected,
        }
    }

    /// Stable lowercase name, used in button control IDs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("invalid decision: {s}")),
        }
    }
}

/// Lifecycle status of a link application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "application_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Error returned when a decision is applied to a decided application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("application already {0}")]
    AlreadyDecided(ApplicationStatus),
}

impl ApplicationStatus {
    /// Whether no further decision can be recorded.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply a decision.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::AlreadyDecided` unless the status is `Pending`.
    pub const fn decide(self, decision: Decision) -> Result<Self, TransitionError> {
        match self {
            Self::Pending => Ok(decision.outcome()),
            Self::Approved | Self::Rejected => Err(TransitionError::AlreadyDecided(self)),
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}
