//! Durable, queryable transaction records.
//!
//! The store layers record semantics on top of an opaque
//! [`RecordBackend`]: one serialized [`TransactionRecord`] per id, status
//! transitions guarded by the expected prior status, and orphaned `pending`
//! rows superseded on insert.
//!
//! ```text
//! <project>/
//! └─ .relay/
//!    └─ transactions/
//!       ├─ <uuid>.json
//!       └─ ...
//! ```
//!
//! Every read-modify-write cycle runs under the store's write lock, which is
//! what makes a status check and the following write atomic within a process.

use crate::error::{CoreError, CoreResult};
use crate::record::TransactionRecord;
use crate::types::{is_hyphenated_uuid, TransactionId, TransactionStatus};
use chrono::Utc;
use parking_lot::Mutex;
use relay_storage::{DirectoryBackend, InMemoryBackend, RecordBackend};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// State directory inside a project.
pub const STATE_DIR: &str = ".relay";
/// Record directory inside [`STATE_DIR`].
pub const TRANSACTIONS_DIR: &str = "transactions";
const RECORD_EXTENSION: &str = "json";

/// Returns the record directory for a project.
#[must_use]
pub fn transactions_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(STATE_DIR).join(TRANSACTIONS_DIR)
}

/// Persistent store of [`TransactionRecord`]s for one project.
pub struct TransactionStore {
    backend: Arc<dyn RecordBackend>,
    write_lock: Mutex<()>,
}

impl TransactionStore {
    /// Creates a store over an existing backend.
    pub fn with_backend(backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the file-backed store of the project at `project_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record directory cannot be created.
    pub fn open(project_dir: &Path) -> CoreResult<Self> {
        let backend =
            DirectoryBackend::open(&transactions_dir(project_dir), RECORD_EXTENSION)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Creates an ephemeral store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()))
    }

    /// Inserts a record.
    ///
    /// A `pending` row with the same id is an orphan from an interrupted run
    /// and is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateRecord`] if the id already has a
    /// `committed` or `undone` row.
    pub fn insert(&self, record: &TransactionRecord) -> CoreResult<()> {
        let _guard = self.write_lock.lock();
        let key = record.id.to_string();

        if let Some(existing) = self.load(&key)? {
            if existing.status != TransactionStatus::Pending {
                return Err(CoreError::DuplicateRecord {
                    id: key,
                    status: existing.status,
                });
            }
            warn!(id = %record.id, "superseding orphaned pending transaction");
            self.backend.remove(&key)?;
        }

        self.save(record)?;
        debug!(id = %record.id, status = %record.status, "transaction inserted");
        Ok(())
    }

    /// Applies `patch` to the record if it is still `pending`.
    ///
    /// The id and status are restored after the patch runs, so a patch can
    /// change neither. Returns `false` (with a warning) if no pending row
    /// exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the row cannot be decoded.
    pub fn update_pending<F>(&self, id: &TransactionId, patch: F) -> CoreResult<bool>
    where
        F: FnOnce(&mut TransactionRecord),
    {
        let _guard = self.write_lock.lock();
        let key = id.to_string();

        let Some(mut record) = self
            .load(&key)?
            .filter(|r| r.status == TransactionStatus::Pending)
        else {
            warn!(id = %id, "could not find pending transaction to update");
            return Ok(false);
        };

        patch(&mut record);
        record.id = *id;
        record.status = TransactionStatus::Pending;
        self.save(&record)?;
        Ok(true)
    }

    /// Moves a record from `from` to `to`.
    ///
    /// Returns `false` with a warning if the row is missing or no longer has
    /// status `from`; this is how double-processing is absorbed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the lifecycle forbids the
    /// move, or a storage error.
    pub fn set_status(
        &self,
        id: &TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> CoreResult<bool> {
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition { from, to });
        }

        let _guard = self.write_lock.lock();
        let key = id.to_string();

        let Some(mut record) = self.load(&key)?.filter(|r| r.status == from) else {
            warn!(id = %id, %from, %to, "could not find transaction in expected status");
            return Ok(false);
        };

        record.status = to;
        self.save(&record)?;
        debug!(id = %id, %from, %to, "transaction status changed");
        Ok(true)
    }

    /// Fetches a record by id regardless of status.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the row cannot be decoded.
    pub fn find_by_id(&self, id: &TransactionId) -> CoreResult<Option<TransactionRecord>> {
        self.load(&id.to_string())
    }

    /// Returns every record matching `predicate`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn query<P>(&self, predicate: P) -> CoreResult<Vec<TransactionRecord>>
    where
        P: Fn(&TransactionRecord) -> bool,
    {
        let mut records = Vec::new();
        for key in self.backend.keys()? {
            if !is_hyphenated_uuid(&key) {
                continue;
            }
            if let Some(record) = self.load(&key)? {
                if predicate(&record) {
                    records.push(record);
                }
            }
        }
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Returns every record with `status`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn query_by_status(&self, status: TransactionStatus) -> CoreResult<Vec<TransactionRecord>> {
        self.query(|r| r.status == status)
    }

    /// Returns every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn all(&self) -> CoreResult<Vec<TransactionRecord>> {
        self.query(|_| true)
    }

    /// Returns true if `id` already reached `committed` or `undone`.
    ///
    /// `pending` rows do not count: they are reprocessed after a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the row cannot be decoded.
    pub fn has_been_processed(&self, id: &TransactionId) -> CoreResult<bool> {
        Ok(self
            .find_by_id(id)?
            .is_some_and(|r| r.status.is_terminal()))
    }

    /// Returns committed records, newest first.
    ///
    /// With `skip_reverts`, revert transactions and the transactions they
    /// reverted are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn committed(&self, skip_reverts: bool) -> CoreResult<Vec<TransactionRecord>> {
        let records = self.query_by_status(TransactionStatus::Committed)?;
        if !skip_reverts {
            return Ok(records);
        }

        let reverted: HashSet<TransactionId> =
            records.iter().filter_map(TransactionRecord::reverted_id).collect();
        Ok(records
            .into_iter()
            .filter(|r| !r.is_revert() && !reverted.contains(&r.id))
            .collect())
    }

    /// Looks up a committed record by UUID or by 1-based recency index.
    ///
    /// A UUID always resolves, reverts included. An integer `n` (or `-n`)
    /// selects the `n`-th most recent committed record, honoring
    /// `skip_reverts`. Anything else, or `0`, yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn find_by_identifier(
        &self,
        identifier: &str,
        skip_reverts: bool,
    ) -> CoreResult<Option<TransactionRecord>> {
        match Identifier::parse(identifier) {
            Some(Identifier::Id(id)) => Ok(self
                .find_by_id(&id)?
                .filter(|r| r.status == TransactionStatus::Committed)),
            Some(Identifier::Index(index)) => {
                Ok(self.committed(skip_reverts)?.into_iter().nth(index - 1))
            }
            None => Ok(None),
        }
    }

    /// Stamps committed records as recorded into external version control.
    ///
    /// Ids without a committed row are warned about and skipped. Returns the
    /// number of records stamped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a row cannot be decoded.
    pub fn mark_git_committed(&self, ids: &[TransactionId]) -> CoreResult<usize> {
        let _guard = self.write_lock.lock();
        let stamped_at = Utc::now();
        let mut stamped = 0;

        for id in ids {
            let key = id.to_string();
            match self
                .load(&key)?
                .filter(|r| r.status == TransactionStatus::Committed)
            {
                Some(mut record) => {
                    record.git_committed_at = Some(stamped_at);
                    self.save(&record)?;
                    stamped += 1;
                }
                None => {
                    warn!(id = %id, "could not find committed transaction to mark as git-committed");
                }
            }
        }

        Ok(stamped)
    }

    fn load(&self, key: &str) -> CoreResult<Option<TransactionRecord>> {
        match self.backend.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &TransactionRecord) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.backend.put(&record.id.to_string(), &bytes)?;
        Ok(())
    }
}

impl fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionStore").finish_non_exhaustive()
    }
}

/// A user-supplied reference to a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier {
    /// A transaction id.
    Id(TransactionId),
    /// 1-based position in the newest-first committed list.
    Index(usize),
}

impl Identifier {
    /// Parses a UUID or a non-zero integer (sign ignored).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if is_hyphenated_uuid(value) {
            return TransactionId::parse(value).ok().map(Self::Id);
        }
        let digits = value.strip_prefix('-').unwrap_or(value);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits
            .parse::<usize>()
            .ok()
            .filter(|index| *index > 0)
            .map(Self::Index)
    }
}

fn sort_newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
