//! Async filesystem helpers shared by the snapshot manager and the applier.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Returns the key a project directory is registered under.
///
/// Existing directories are canonicalized so `..` segments and symlinks
/// resolve to one key; a missing directory falls back to its absolute path.
pub fn directory_key(dir: &Path) -> io::Result<PathBuf> {
    match std::fs::canonicalize(dir) {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => std::path::absolute(dir),
        Err(e) => Err(e),
    }
}

/// Reads a UTF-8 file, mapping a missing file to `None`.
pub async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Writes a file, creating missing parent directories.
pub async fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await
}

/// Deletes a file. A file that is already gone is not an error.
pub async fn delete_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Moves a file, creating missing parent directories of the destination.
pub async fn rename_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(from, to).await
}

/// Removes `dir` and its ancestors while they are empty, stopping at `root`.
///
/// `root` itself is never removed. Returns the number of directories
/// removed. Stops silently at the first directory that is not empty or
/// cannot be removed.
pub async fn remove_empty_parent_directories(dir: &Path, root: &Path) -> usize {
    let mut removed = 0;
    let mut current = dir.to_path_buf();

    while current.starts_with(root) && current != root {
        match is_empty_dir(&current).await {
            Ok(true) => {}
            _ => break,
        }
        if fs::remove_dir(&current).await.is_err() {
            break;
        }
        removed += 1;
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    removed
}

async fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}
