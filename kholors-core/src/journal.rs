//! Append-only JSONL journal of delivered tasks, for debugging and replay.
//!
//! Attach it with [`ActivityManager::attach_journal`](crate::ActivityManager::attach_journal).
//! The manager logs each task once its listener pass is over, so tasks a
//! listener halted are logged too. Every line is either a session header or
//! one delivered task with its outcome flags.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kholors_types::Task;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no data directory available for the journal")]
    NoDataDir,
}

/// Default journal location: `~/.local/share/kholors/tasks.jsonl`.
pub fn default_journal_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("kholors").join("tasks.jsonl"))
}

#[derive(Serialize)]
struct SessionHeader {
    event: &'static str,
    epoch_ms: u128,
    pid: u32,
}

#[derive(Serialize)]
struct JournalEntry<'a> {
    t_ms: u128,
    name: &'a str,
    completed: bool,
    failed: bool,
    reversion: bool,
    task: &'a Task,
}

#[derive(Deserialize)]
struct ReplayEntry {
    task: Option<Task>,
}

pub struct TaskJournal {
    writer: BufWriter<File>,
    session_start: Instant,
    write_failed: bool,
}

impl TaskJournal {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        let header = SessionHeader {
            event: "session_start",
            epoch_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            pid: std::process::id(),
        };
        let json = serde_json::to_string(&header).map_err(std::io::Error::from)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        log::info!(target: "journal", "task journal at {}", path.display());
        Ok(Self {
            writer,
            session_start: Instant::now(),
            write_failed: false,
        })
    }

    pub fn in_data_dir() -> Result<Self, JournalError> {
        let path = default_journal_path().ok_or(JournalError::NoDataDir)?;
        Self::open(&path)
    }

    pub fn log_task(&mut self, task: &Task) {
        let entry = JournalEntry {
            t_ms: self.session_start.elapsed().as_millis(),
            name: task.name(),
            completed: task.is_completed(),
            failed: task.is_failed(),
            reversion: task.is_reversion(),
            task,
        };
        let result = serde_json::to_string(&entry)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                writeln!(self.writer, "{}", json)?;
                self.writer.flush()
            });
        if let Err(e) = result {
            // One warning per journal; the bus keeps running without it.
            if !self.write_failed {
                log::warn!(target: "journal", "could not write task journal: {}", e);
                self.write_failed = true;
            }
        }
    }
}

/// Read back every task recorded in a journal file, in order.
///
/// Session headers, blank lines and malformed lines are skipped.
pub fn read_journal(path: &Path) -> Result<Vec<Task>, JournalError> {
    let file = File::open(path)?;
    let mut tasks = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayEntry>(&line) {
            Ok(ReplayEntry { task: Some(task) }) => tasks.push(task),
            Ok(ReplayEntry { task: None }) => {}
            Err(e) => {
                log::warn!(target: "journal", "skipping line {}: {}", idx + 1, e);
            }
        }
    }
    Ok(tasks)
}
