//! Button control IDs for review cards.
//!
//! Each decision button carries `application:<decision>:<uuid>` as its
//! `custom_id`, so a click can be routed without any in-process state.

use crate::types::id::LinkApplicationId;
use crate::types::status::Decision;

const PREFIX: &str = "application";

/// Discord's limit on `custom_id` length.
pub const MAX_CUSTOM_ID_LEN: usize = 100;

/// Errors that can occur when parsing a control ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlIdError {
    #[error("not an application control: {0}")]
    UnknownPrefix(String),
    #[error("unknown decision in control: {0}")]
    UnknownDecision(String),
    #[error("invalid application id in control: {0}")]
    InvalidApplicationId(String),
}

/// A decoded decision button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationControl {
    pub decision: Decision,
    pub application_id: LinkApplicationId,
}

impl ApplicationControl {
    #[must_use]
    pub const fn new(decision: Decision, application_id: LinkApplicationId) -> Self {
        Self {
            decision,
            application_id,
        }
    }

    /// Encode as a Discord `custom_id`.
    #[must_use]
    pub fn custom_id(&self) -> String {
        format!("{PREFIX}:{}:{}", self.decision, self.application_id)
    }

    /// Decode a Discord `custom_id`.
    ///
    /// # Errors
    ///
    /// Returns `ControlIdError` if the ID was not produced by [`Self::custom_id`].
    pub fn parse(custom_id: &str) -> Result<Self, ControlIdError> {
        let mut parts = custom_id.splitn(3, ':');
        let (Some(PREFIX), Some(decision), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ControlIdError::UnknownPrefix(custom_id.to_owned()));
        };

        let decision = decision
            .parse::<Decision>()
            .map_err(|_| ControlIdError::UnknownDecision(decision.to_owned()))?;
        let application_id = id
            .parse::<LinkApplicationId>()
            .map_err(|_| ControlIdError::InvalidApplicationId(id.to_owned()))?;

        Ok(Self::new(decision, application_id))
    }
}
