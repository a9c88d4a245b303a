//! Append-only journal of log mutations.
//!
//! Each line of `journal.ndjson` is one record: an appended entry, a
//! truncation or a purge. Replaying the records in order rebuilds the log.
//! When dead records dominate, the journal is rewritten to hold only the
//! live entries.

use crate::types::ClusterEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const JOURNAL_FILE: &str = "journal.ndjson";
const JOURNAL_TEMP_FILE: &str = "journal.ndjson.tmp";

/// Dead records tolerated before a rewrite.
const COMPACTION_SLACK: usize = 1024;

/// One journal line. Must stay externally tagged: an internal tag routes the
/// entry through untyped content, where membership node ids become strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Record {
    Entry(ClusterEntry),
    /// Drop entries with index >= `since`.
    Truncate { since: u64 },
    /// Drop entries with index <= `upto`.
    Purge { upto: u64 },
}

/// Writer half of the journal. The replayed log is returned by [`Journal::open`].
#[derive(Debug)]
pub struct Journal {
    dir: PathBuf,
    writer: BufWriter<File>,
    records: usize,
}

impl Journal {
    /// Open the journal in `dir` and replay it into an index-ordered map.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<(Self, BTreeMap<u64, ClusterEntry>)> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let path = dir.join(JOURNAL_FILE);

        let mut logs = BTreeMap::new();
        let mut records = 0;
        let mut torn_tail = false;

        if path.exists() {
            let lines: Vec<String> = BufReader::new(File::open(&path)?)
                .lines()
                .collect::<io::Result<_>>()?;
            let last = lines.len().saturating_sub(1);

            for (n, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Record>(line) {
                    Ok(record) => {
                        replay(&mut logs, record);
                        records += 1;
                    }
                    // A crash mid-append leaves at most one partial line.
                    Err(e) if n == last => {
                        tracing::warn!(error = %e, "discarding torn journal tail");
                        torn_tail = true;
                    }
                    Err(e) => {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("journal line {}: {}", n + 1, e),
                        ));
                    }
                }
            }
        }

        let mut journal = Self {
            writer: BufWriter::new(open_append(&path)?),
            dir,
            records,
        };
        if torn_tail {
            journal.rewrite(&logs)?;
        }

        Ok((journal, logs))
    }

    /// Durably append entries.
    pub fn append<'a>(
        &mut self,
        entries: impl IntoIterator<Item = &'a ClusterEntry>,
    ) -> io::Result<()> {
        for entry in entries {
            self.write_record(&Record::Entry(entry.clone()))?;
        }
        self.sync()
    }

    /// Durably record a truncation of every entry at or after `since`.
    pub fn truncate(&mut self, since: u64) -> io::Result<()> {
        self.write_record(&Record::Truncate { since })?;
        self.sync()
    }

    /// Durably record a purge of every entry at or before `upto`.
    pub fn purge(&mut self, upto: u64) -> io::Result<()> {
        self.write_record(&Record::Purge { upto })?;
        self.sync()
    }

    /// Rewrite the journal if its dead records exceed the slack.
    pub fn maybe_compact(&mut self, logs: &BTreeMap<u64, ClusterEntry>) -> io::Result<bool> {
        if self.records <= logs.len() + COMPACTION_SLACK {
            return Ok(false);
        }
        self.rewrite(logs)?;
        Ok(true)
    }

    /// Replace the journal with one `Entry` record per live entry.
    pub fn rewrite(&mut self, logs: &BTreeMap<u64, ClusterEntry>) -> io::Result<()> {
        let path = self.dir.join(JOURNAL_FILE);
        let temp_path = self.dir.join(JOURNAL_TEMP_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);
        for entry in logs.values() {
            serde_json::to_writer(&mut writer, &Record::Entry(entry.clone()))
                .map_err(invalid_data)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(
            dropped = self.records.saturating_sub(logs.len()),
            live = logs.len(),
            "compacted raft journal"
        );
        self.writer = BufWriter::new(open_append(&path)?);
        self.records = logs.len();
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(invalid_data)?;
        self.writer.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}

fn replay(logs: &mut BTreeMap<u64, ClusterEntry>, record: Record) {
    match record {
        Record::Entry(entry) => {
            logs.insert(entry.log_id.index, entry);
        }
        Record::Truncate { since } => {
            logs.retain(|&index, _| index < since);
        }
        Record::Purge { upto } => {
            logs.retain(|&index, _| index > upto);
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
