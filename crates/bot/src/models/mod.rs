//! Domain models for the verification workflow.

pub mod account;
pub mod application;
pub mod member;

pub use account::Account;
pub use application::{LinkApplication, NewLinkApplication, RoleChange};
pub use member::{Actor, Requester};
