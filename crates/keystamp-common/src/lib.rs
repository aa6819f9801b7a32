//! # Keystamp Common
//!
//! Shared types, errors, and constants used across Keystamp components.
//!
//! ## Modules
//! - `types` - Core data structures (Challenge, VerifyOutcome, request/response bodies)
//! - `error` - Common error types
//! - `constants` - Shared configuration constants and caller-visible messages

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ChallengeError, KeystampError};
pub use types::*;
