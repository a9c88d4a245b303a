//! Trait implementations for OpenRaft integration.

use crate::command::decode;
use crate::types::{
    ClusterEntry, ClusterLogId, ClusterSnapshot, ClusterSnapshotMeta, ClusterStorageError,
    ClusterStoredMembership, TypeConfig,
};
use openraft::storage::RaftStateMachine;
use openraft::{
    EntryPayload, RaftSnapshotBuilder, RaftTypeConfig, StorageIOError, StoredMembership,
};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::KvStateMachine;
use super::apply::apply_command;
use super::state::{decode_values, encode_values};
use super::types::{KvResponse, StoredSnapshot};

impl KvStateMachine {
    fn persist(&self, snapshot: &StoredSnapshot) -> Result<(), ClusterStorageError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(snapshot).map_err(|e| {
            tracing::error!(
                snapshot_id = %snapshot.meta.snapshot_id,
                error = %e,
                "failed to persist snapshot"
            );
            StorageIOError::write_snapshot(Some(snapshot.meta.signature()), &e).into()
        })
    }
}

/// Builds a consistent snapshot of the map for log compaction and for
/// bringing lagging followers up to date.
impl RaftSnapshotBuilder<TypeConfig> for Arc<KvStateMachine> {
    async fn build_snapshot(&mut self) -> Result<ClusterSnapshot, ClusterStorageError> {
        let state = self.state.read().await;

        let data =
            encode_values(&state.values).map_err(|e| StorageIOError::read_state_machine(&e))?;

        let last_applied_log = state.last_applied_log;
        let last_membership = state.last_membership.clone();

        // Lock snapshot before releasing state lock
        let mut current_snapshot = self.current_snapshot.write().await;
        drop(state);

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = if let Some(last) = last_applied_log {
            format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx)
        } else {
            format!("--{}", snapshot_idx)
        };

        let meta = ClusterSnapshotMeta {
            last_log_id: last_applied_log,
            last_membership,
            snapshot_id,
        };

        let snapshot = StoredSnapshot {
            meta: meta.clone(),
            data: data.clone(),
        };
        self.persist(&snapshot)?;

        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            size = data.len(),
            "built snapshot"
        );
        *current_snapshot = Some(snapshot);

        Ok(ClusterSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

/// Applies committed log entries to the map.
///
/// A normal entry that does not decode is fatal: the error is returned to
/// openraft, which stops the Raft core instead of letting this replica
/// diverge from the others.
impl RaftStateMachine<TypeConfig> for Arc<KvStateMachine> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<ClusterLogId>, ClusterStoredMembership), ClusterStorageError> {
        let state = self.state.read().await;
        Ok((state.last_applied_log, state.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<KvResponse>, ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry> + Send,
    {
        let mut responses = Vec::new();
        let mut state = self.state.write().await;

        for entry in entries {
            tracing::debug!(%entry.log_id, "applying to state machine");

            match entry.payload {
                EntryPayload::Blank => {
                    responses.push(KvResponse::none());
                }
                EntryPayload::Normal(payload) => {
                    let command = decode(payload.as_bytes()).map_err(|e| {
                        tracing::error!(
                            log_id = %entry.log_id,
                            error = %e,
                            "failed to decode committed command"
                        );
                        StorageIOError::apply(entry.log_id, &e)
                    })?;
                    tracing::trace!(op = command.name(), key = command.key(), "applying command");
                    responses.push(apply_command(&mut state, command));
                }
                EntryPayload::Membership(membership) => {
                    state.last_membership = StoredMembership::new(Some(entry.log_id), membership);
                    responses.push(KvResponse::none());
                }
            }

            state.last_applied_log = Some(entry.log_id);
        }

        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<<TypeConfig as RaftTypeConfig>::SnapshotData>, ClusterStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &ClusterSnapshotMeta,
        snapshot: Box<<TypeConfig as RaftTypeConfig>::SnapshotData>,
    ) -> Result<(), ClusterStorageError> {
        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            snapshot_size = snapshot.get_ref().len(),
            "installing snapshot"
        );

        let new_snapshot = StoredSnapshot {
            meta: meta.clone(),
            data: snapshot.into_inner(),
        };

        // Parse before touching the live map.
        let values = decode_values(&new_snapshot.data)
            .map_err(|e| StorageIOError::read_snapshot(Some(new_snapshot.meta.signature()), &e))?;
        self.persist(&new_snapshot)?;

        let mut state = self.state.write().await;
        state.values = values;
        state.last_applied_log = meta.last_log_id;
        state.last_membership = meta.last_membership.clone();

        // Lock snapshot before releasing state lock
        let mut current_snapshot = self.current_snapshot.write().await;
        drop(state);

        *current_snapshot = Some(new_snapshot);
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<ClusterSnapshot>, ClusterStorageError> {
        match &*self.current_snapshot.read().await {
            Some(snapshot) => Ok(Some(ClusterSnapshot {
                meta: snapshot.meta.clone(),
                snapshot: Box::new(Cursor::new(snapshot.data.clone())),
            })),
            None => Ok(None),
        }
    }
}
