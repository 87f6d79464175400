//! Business logic services for the verification workflow.
//!
//! # Services
//!
//! - `linker` - `/link`: bind an account and request review
//! - `notifier` - Post review cards to the staff channel
//! - `decisions` - Approve/reject: guard, claim, roles, card, DM
//! - `reconciler` - Bring cards in line with persisted decisions

pub mod decisions;
pub mod linker;
pub mod notifier;
pub mod reconciler;

pub use decisions::{DecisionError, DecisionReport, DecisionService};
pub use linker::{CardState, LinkError, LinkReceipt, LinkService};
pub use notifier::{ApplicationNotifier, NotifyError};
pub use reconciler::CardReconciler;
