//! Waco Verify Core - Shared types library.
//!
//! This crate provides common types used across all Waco Verify components:
//! - `bot` - Discord interactions endpoint and review workflow
//! - `cli` - Command-line tools for migrations and command registration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Account and application IDs, Discord snowflakes, the
//!   application status machine, appearance descriptors and button control IDs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
