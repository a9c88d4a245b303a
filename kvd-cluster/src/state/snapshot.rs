//! On-disk snapshot persistence.
//!
//! The latest snapshot lives in a single JSON file:
//!
//! ```text
//! snapshot/
//! └── current.json    # {"meta": {...}, "values": {"key": "value", ...}}
//! ```
//!
//! Writes go to a temporary file that is synced and renamed over the
//! previous snapshot, so a crash leaves either the old or the new one.

use crate::types::ClusterSnapshotMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use super::machine::StoredSnapshot;

const SNAPSHOT_FILE: &str = "current.json";
const SNAPSHOT_TEMP_FILE: &str = "current.json.tmp";

#[derive(Serialize, Deserialize)]
struct PersistedSnapshot {
    meta: ClusterSnapshotMeta,
    values: BTreeMap<String, String>,
}

/// Directory holding the latest snapshot of one node.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open (creating if needed) a snapshot directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write `snapshot`, replacing the previous one.
    pub fn save(&self, snapshot: &StoredSnapshot) -> io::Result<()> {
        let values: BTreeMap<String, String> =
            serde_json::from_slice(&snapshot.data).map_err(invalid_data)?;
        let persisted = PersistedSnapshot {
            meta: snapshot.meta.clone(),
            values,
        };

        let temp_path = self.dir.join(SNAPSHOT_TEMP_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &persisted).map_err(invalid_data)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, self.dir.join(SNAPSHOT_FILE))?;
        Ok(())
    }

    /// Load the latest snapshot, if one was ever saved.
    pub fn load(&self) -> io::Result<Option<StoredSnapshot>> {
        let path = self.dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path)?);
        let persisted: PersistedSnapshot =
            serde_json::from_reader(reader).map_err(invalid_data)?;
        let data = serde_json::to_vec(&persisted.values).map_err(invalid_data)?;

        Ok(Some(StoredSnapshot {
            meta: persisted.meta,
            data,
        }))
    }
}

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
