//! # Relay Testkit
//!
//! Test utilities for Relay.
//!
//! This crate provides:
//! - Temporary project trees with file helpers
//! - Scripted collaborators (prompter, notification channel, shell, check
//!   runner) that record how they were called
//! - Property-based test generators using proptest
//! - A tracing subscriber wired to the test output
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_core::EngineConfig;
//! use relay_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn commits_a_write() {
//!     let project = TestProject::new();
//!     let coordinator = project.coordinator(EngineConfig::new(TEST_PROJECT_ID));
//!     // ... process transactions against project.path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collaborators;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collaborators::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use collaborators::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
