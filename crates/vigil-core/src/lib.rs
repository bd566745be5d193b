//! vigil core: transport-agnostic error taxonomy, readiness state, and input
//! validation.
//!
//! This crate defines the contracts shared by the HTTP server and its tests.
//! It intentionally carries no transport or runtime dependencies so the same
//! rules apply no matter how a request arrives.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `VigilError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod readiness;
pub mod validation;

/// Shared result type.
pub use error::{ClientCode, FieldError, Result, VigilError};
pub use readiness::ReadyState;
pub use validation::{NewUser, User};
