//! Waco Verify bot library.
//!
//! Serves the Discord interactions endpoint for the `/link` command and the
//! review cards staff use to approve or reject account links. Exposed as a
//! library so the router and services can be tested end to end.
//!
//! # Security
//!
//! This crate holds the bot token and write access to the game's `users`
//! table. Every interaction is verified against the application's Ed25519
//! public key before it is parsed.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod discord;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
