//! Record backend trait definition.

use crate::error::{StorageError, StorageResult};

/// A low-level keyed record backend for Relay.
///
/// Backends are **opaque byte stores**. They provide simple operations for
/// reading, replacing and removing whole records addressed by a string key.
/// Relay owns all record interpretation - backends do not understand
/// transaction statuses or their serialized layout.
///
/// # Invariants
///
/// - `get` returns exactly the bytes most recently `put` under that key
/// - `put` is all-or-nothing: a concurrent or later `get` never observes a
///   partially written record
/// - `remove` of a missing key is not an error
/// - Backends must be `Send + Sync` for concurrent access
///
/// Conditional updates (compare status, then write) are built on top of this
/// trait by the caller, which serializes its own read-modify-write cycles.
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::DirectoryBackend`] - For persistent storage
pub trait RecordBackend: Send + Sync {
    /// Reads the record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `data` under `key`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn put(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes the record stored under `key`.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Returns every key currently stored, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be listed.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Returns true if a record exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Checks that `key` can be used as a record name by every backend.
///
/// Keys are restricted to ASCII alphanumerics, `-` and `_` so they map onto
/// file names without escaping.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for empty keys, keys longer than 128
/// bytes, or keys containing other characters.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key, "key is empty"));
    }
    if key.len() > 128 {
        return Err(StorageError::invalid_key(key, "key is longer than 128 bytes"));
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(StorageError::invalid_key(
            key,
            "key may only contain ASCII alphanumerics, '-' and '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uuid_keys() {
        assert!(validate_key("0b6f5c1e-8d3a-4a57-9e49-2f1d0c6b7a10").is_ok());
        assert!(validate_key("record_1").is_ok());
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key(&"x".repeat(129)).is_err());
    }
}
