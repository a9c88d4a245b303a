//! Stable store: vote, committed log id and purge watermark.

use crate::types::{ClusterLogId, ClusterVote};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

const STATE_FILE: &str = "state.json";
const STATE_TEMP_FILE: &str = "state.json.tmp";

/// Everything the log store must remember besides the entries themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableState {
    pub vote: Option<ClusterVote>,
    pub committed: Option<ClusterLogId>,
    pub last_purged_log_id: Option<ClusterLogId>,
}

/// One JSON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct StableStore {
    dir: PathBuf,
}

impl StableStore {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn load(&self) -> io::Result<StableState> {
        let path = self.dir.join(STATE_FILE);
        if !path.exists() {
            return Ok(StableState::default());
        }

        let reader = BufReader::new(File::open(&path)?);
        serde_json::from_reader(reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, state: &StableState) -> io::Result<()> {
        let temp_path = self.dir.join(STATE_TEMP_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, self.dir.join(STATE_FILE))?;
        Ok(())
    }
}
