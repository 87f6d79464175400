//! Core types for Waco Verify.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod appearance;
pub mod control;
pub mod id;
pub mod snowflake;
pub mod status;

pub use appearance::{AppearanceError, skin_url_from_descriptor};
pub use control::{ApplicationControl, ControlIdError};
pub use id::*;
pub use snowflake::*;
pub use status::*;
