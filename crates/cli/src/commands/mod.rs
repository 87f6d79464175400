//! CLI subcommands.

pub mod migrate;
pub mod reconcile;
pub mod register;
