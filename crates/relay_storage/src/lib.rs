//! # Relay Storage
//!
//! Record backend trait and implementations for Relay.
//!
//! This crate provides the lowest-level persistence abstraction used by the
//! transaction store. Backends are **opaque keyed byte stores** - they do not
//! interpret the records they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple keyed stores (get, put, remove, keys)
//! - No knowledge of transaction records, statuses or serialization
//! - Must be `Send + Sync` for concurrent access
//! - `put` replaces a whole record atomically with respect to readers
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`DirectoryBackend`] - One file per record inside a directory
//!
//! ## Example
//!
//! ```rust
//! use relay_storage::{InMemoryBackend, RecordBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.put("a1", b"hello world").unwrap();
//! assert_eq!(backend.get("a1").unwrap().as_deref(), Some(&b"hello world"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod directory;
mod error;
mod memory;

pub use backend::{validate_key, RecordBackend};
pub use directory::DirectoryBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
