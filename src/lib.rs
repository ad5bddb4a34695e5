//! # Gradebox
//!
//! A sandboxed code grading engine built with Rust.
//!
//! Gradebox runs an untrusted, user-submitted program inside an isolated
//! Docker container, feeds it a fixed input, enforces a wall-clock deadline
//! with a concurrent watchdog, and judges the produced output against an
//! expected reference.
//!
//! ## Features
//!
//! - **Isolated Execution:** Every grading run gets its own ephemeral container
//! - **Deadline Enforcement:** A concurrent watchdog force-terminates runs that
//!   exceed their time limit
//! - **Structured Verdicts:** Correct / Incorrect / Time limit exceeded /
//!   Runtime error, plus elapsed time, as machine-readable JSON
//! - **Pluggable Engine:** The container engine sits behind a narrow trait so
//!   tests can substitute a fake

pub mod bundle;
pub mod config;
pub mod error;
pub mod judge;
pub mod sandbox;

pub use config::{GraderConfig, Language};
pub use error::{Error, Result};
pub use judge::{Judge, Submission, Verdict};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
