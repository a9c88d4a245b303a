//! Raft log storage backed by a journal and a stable store.
//!
//! ## Storage Layout
//!
//! ```text
//! <node data dir>/
//! ├── log/
//! │   └── journal.ndjson   # Entry / truncate / purge records
//! └── stable/
//!     └── state.json       # Vote, committed log id, last purged log id
//! ```
//!
//! The live log is kept in memory as an index-ordered map and rebuilt from
//! the journal on open.

mod journal;
mod stable;

use crate::types::{ClusterEntry, ClusterLogId, ClusterStorageError, ClusterVote, TypeConfig};
use journal::Journal;
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, RaftLogReader, StorageIOError};
use stable::{StableState, StableStore};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io;
use std::ops::RangeBounds;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

struct LogStoreInner {
    logs: BTreeMap<u64, ClusterEntry>,
    journal: Journal,
    stable: StableStore,
    state: StableState,
}

impl LogStoreInner {
    fn save_state(&self) -> io::Result<()> {
        self.stable.save(&self.state)
    }
}

/// Persistent storage for Raft logs and vote state.
#[derive(Clone)]
pub struct LogStorage {
    inner: Arc<RwLock<LogStoreInner>>,
}

impl LogStorage {
    /// Create or open log storage under a node's data directory.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let (journal, logs) = Journal::open(dir.join("log"))?;
        let stable = StableStore::open(dir.join("stable"))?;
        let state = stable.load()?;

        tracing::debug!(
            entries = logs.len(),
            last_purged = ?state.last_purged_log_id,
            "opened raft log storage"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(LogStoreInner {
                logs,
                journal,
                stable,
                state,
            })),
        })
    }
}

impl RaftLogReader<TypeConfig> for LogStorage {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<ClusterEntry>, ClusterStorageError> {
        let inner = self.inner.read().await;
        Ok(inner.logs.range(range).map(|(_, e)| e.clone()).collect())
    }
}

impl RaftLogStorage<TypeConfig> for LogStorage {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, ClusterStorageError> {
        let inner = self.inner.read().await;

        let last_purged_log_id = inner.state.last_purged_log_id;
        let last_log_id = inner
            .logs
            .values()
            .next_back()
            .map(|e| e.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<ClusterLogId>,
    ) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner.state.committed = committed;
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<ClusterLogId>, ClusterStorageError> {
        Ok(self.inner.read().await.state.committed)
    }

    async fn save_vote(&mut self, vote: &ClusterVote) -> Result<(), ClusterStorageError> {
        let mut inner = self.inner.write().await;
        inner.state.vote = Some(*vote);
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_vote(&e))?;
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<ClusterVote>, ClusterStorageError> {
        Ok(self.inner.read().await.state.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry>,
    {
        let mut inner = self.inner.write().await;

        let entries: Vec<ClusterEntry> = entries.into_iter().collect();
        inner
            .journal
            .append(&entries)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        for entry in entries {
            inner.logs.insert(entry.log_id.index, entry);
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "truncating raft log");
        let mut inner = self.inner.write().await;
        inner
            .journal
            .truncate(log_id.index)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        inner.logs.retain(|&index, _| index < log_id.index);
        Ok(())
    }

    async fn purge(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "purging raft log");
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        // Record the watermark before dropping entries.
        inner.state.last_purged_log_id = Some(log_id);
        inner
            .save_state()
            .map_err(|e| StorageIOError::write_logs(&e))?;
        inner
            .journal
            .purge(log_id.index)
            .map_err(|e| StorageIOError::write_logs(&e))?;

        inner.logs.retain(|&index, _| index > log_id.index);
        inner
            .journal
            .maybe_compact(&inner.logs)
            .map_err(|e| StorageIOError::write_logs(&e))?;
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openraft::{CommittedLeaderId, Vote};
    use tempfile::TempDir;

    fn test_log_id(term: u64, index: u64) -> ClusterLogId {
        ClusterLogId::new(CommittedLeaderId::new(term, 0), index)
    }

    fn test_entries(term: u64, range: std::ops::RangeInclusive<u64>) -> Vec<ClusterEntry> {
        range
            .map(|i| ClusterEntry {
                log_id: test_log_id(term, i),
                payload: openraft::EntryPayload::Blank,
            })
            .collect()
    }

    /// Append entries directly (bypasses the flush callback).
    async fn append_test_entries(storage: &LogStorage, entries: Vec<ClusterEntry>) {
        let mut inner = storage.inner.write().await;
        inner.journal.append(&entries).expect("append should succeed");
        for entry in entries {
            inner.logs.insert(entry.log_id.index, entry);
        }
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");

        append_test_entries(&storage, test_entries(1, 1..=10)).await;

        let read_entries = storage
            .try_get_log_entries(1..=10)
            .await
            .expect("read entries");
        assert_eq!(read_entries.len(), 10);

        let state = storage.get_log_state().await.expect("log state");
        assert_eq!(state.last_log_id, Some(test_log_id(1, 10)));
        assert_eq!(state.last_purged_log_id, None);
    }

    #[tokio::test]
    async fn test_truncate() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");

        append_test_entries(&storage, test_entries(1, 1..=100)).await;
        storage
            .truncate(test_log_id(1, 50))
            .await
            .expect("truncate");

        let read_entries = storage
            .try_get_log_entries(1..50)
            .await
            .expect("read entries");
        assert_eq!(read_entries.len(), 49);

        let read_entries = storage
            .try_get_log_entries(50..=100)
            .await
            .expect("read entries");
        assert!(read_entries.is_empty());
    }

    #[tokio::test]
    async fn test_purge() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");

        append_test_entries(&storage, test_entries(1, 1..=2500)).await;
        storage.purge(test_log_id(1, 1500)).await.expect("purge");

        let read_entries = storage
            .try_get_log_entries(1..=1500)
            .await
            .expect("read entries");
        assert!(read_entries.is_empty(), "Purged entries should be gone");

        let read_entries = storage
            .try_get_log_entries(1501..=2500)
            .await
            .expect("read entries");
        assert_eq!(read_entries.len(), 1000);

        let state = storage.get_log_state().await.expect("log state");
        assert_eq!(state.last_purged_log_id, Some(test_log_id(1, 1500)));
    }

    #[tokio::test]
    async fn test_purge_everything_keeps_last_log_id() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");

        append_test_entries(&storage, test_entries(1, 1..=5)).await;
        storage.purge(test_log_id(1, 5)).await.expect("purge");

        let state = storage.get_log_state().await.expect("log state");
        assert_eq!(state.last_log_id, Some(test_log_id(1, 5)));
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().expect("create temp dir");

        {
            let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");
            append_test_entries(&storage, test_entries(1, 1..=100)).await;
            storage.truncate(test_log_id(1, 91)).await.expect("truncate");
            storage.purge(test_log_id(1, 10)).await.expect("purge");
            storage
                .save_committed(Some(test_log_id(1, 90)))
                .await
                .expect("save committed");
        }

        {
            let mut storage = LogStorage::open(temp_dir.path()).expect("reopen storage");
            let read_entries = storage
                .try_get_log_entries(..)
                .await
                .expect("read entries");
            assert_eq!(read_entries.len(), 80);
            assert_eq!(read_entries[0].log_id.index, 11);

            let committed = storage.read_committed().await.expect("read committed");
            assert_eq!(committed, Some(test_log_id(1, 90)));

            let state = storage.get_log_state().await.expect("log state");
            assert_eq!(state.last_purged_log_id, Some(test_log_id(1, 10)));
        }
    }

    #[tokio::test]
    async fn test_vote_persistence() {
        let temp_dir = TempDir::new().expect("create temp dir");

        {
            let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");
            let vote = Vote::new(5, 3);
            storage.save_vote(&vote).await.expect("save vote");
        }

        {
            let mut storage = LogStorage::open(temp_dir.path()).expect("reopen storage");
            let vote = storage
                .read_vote()
                .await
                .expect("read vote")
                .expect("vote should exist");
            assert_eq!(vote.leader_id().term, 5);
            assert_eq!(vote.leader_id().node_id, 3);
        }
    }

    #[tokio::test]
    async fn test_layout() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut storage = LogStorage::open(temp_dir.path()).expect("open storage");
        storage.save_vote(&Vote::new(1, 1)).await.expect("save vote");
        append_test_entries(&storage, test_entries(1, 1..=1)).await;

        assert!(temp_dir.path().join("log/journal.ndjson").exists());
        assert!(temp_dir.path().join("stable/state.json").exists());
    }
}
