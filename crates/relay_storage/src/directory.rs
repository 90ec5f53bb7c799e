//! Directory-based record backend for persistent storage.

use crate::backend::{validate_key, RecordBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the scratch file used for atomic replacement.
const TEMP_SUFFIX: &str = "tmp";

/// A record backend storing one file per record in a directory.
///
/// ```text
/// <dir>/
/// ├─ <key>.<ext>        # one record
/// └─ <key>.<ext>.tmp    # scratch file, only present during a put
/// ```
///
/// # Durability
///
/// `put` writes the record to a scratch file, syncs it, then renames it over
/// the final name. A crash mid-write leaves either the old record or the new
/// one, never a torn record. Leftover scratch files are ignored by `keys`.
///
/// # Thread Safety
///
/// Writers are serialized by an internal mutex so two puts of the same key
/// never race on the scratch file.
///
/// # Example
///
/// ```no_run
/// use relay_storage::{DirectoryBackend, RecordBackend};
/// use std::path::Path;
///
/// let backend = DirectoryBackend::open(Path::new(".relay/transactions"), "json").unwrap();
/// backend.put("abc", b"{}").unwrap();
/// ```
#[derive(Debug)]
pub struct DirectoryBackend {
    dir: PathBuf,
    extension: String,
    write_lock: Mutex<()>,
}

impl DirectoryBackend {
    /// Opens a directory backend, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or if the path
    /// exists but is not a directory.
    pub fn open(dir: &Path, extension: &str) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        if !dir.is_dir() {
            return Err(StorageError::Corrupted(format!(
                "record path is not a directory: {}",
                dir.display()
            )));
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the backing directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    #[must_use]
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{}", self.extension))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{key}.{}.{TEMP_SUFFIX}", self.extension))
    }
}

impl RecordBackend for DirectoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.record_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp = self.temp_path(key);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, self.record_path(key))?;

        debug!(key, bytes = data.len(), "record written");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        match fs::remove_file(self.record_path(key)) {
            Ok(()) => {
                debug!(key, "record removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let suffix = format!(".{}", self.extension);
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(&suffix) {
                if validate_key(key).is_ok() {
                    keys.push(key.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("records");

        let backend = DirectoryBackend::open(&path, "json").unwrap();
        assert!(path.is_dir());
        assert_eq!(backend.path(), path);
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn directory_put_and_get() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path(), "json").unwrap();

        backend.put("alpha", b"{\"a\":1}").unwrap();
        assert_eq!(backend.get("alpha").unwrap(), Some(b"{\"a\":1}".to_vec()));
        assert!(dir.path().join("alpha.json").exists());
        assert!(!dir.path().join("alpha.json.tmp").exists());
    }

    #[test]
    fn directory_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path(), "json").unwrap();
        assert_eq!(backend.get("nothing").unwrap(), None);
        assert!(!backend.remove("nothing").unwrap());
    }

    #[test]
    fn directory_persistence() {
        let dir = tempdir().unwrap();

        {
            let backend = DirectoryBackend::open(dir.path(), "json").unwrap();
            backend.put("kept", b"persistent data").unwrap();
        }

        {
            let backend = DirectoryBackend::open(dir.path(), "json").unwrap();
            assert_eq!(backend.get("kept").unwrap(), Some(b"persistent data".to_vec()));
        }
    }

    #[test]
    fn directory_keys_ignore_foreign_and_scratch_files() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path(), "json").unwrap();

        backend.put("b", b"2").unwrap();
        backend.put("a", b"1").unwrap();
        fs::write(dir.path().join("c.json.tmp"), b"partial").unwrap();
        fs::write(dir.path().join("notes.txt"), b"other").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn directory_remove() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path(), ".json").unwrap();

        backend.put("gone", b"x").unwrap();
        assert!(backend.remove("gone").unwrap());
        assert!(!backend.record_path("gone").exists());
    }

    #[test]
    fn directory_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path(), "json").unwrap();

        let result = backend.put("../escape", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey { .. })));
    }

    #[test]
    fn directory_open_on_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        assert!(DirectoryBackend::open(&file, "json").is_err());
    }
}
