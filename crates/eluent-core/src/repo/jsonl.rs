//! Append-only JSONL file operations: the on-disk format for
//! `.eluent/data.jsonl` and `.eluent/ephemeral.jsonl`.
//!
//! Every line is one JSON object tagged with `_type`. Appends take an
//! exclusive advisory lock and rely on POSIX single-`write` semantics for
//! a torn-write-free line; rewrites go through a sibling `.tmp` file and a
//! `rename`, which is the atomic commit point.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lock::FileLock;
use crate::model::{Atom, Bond, Comment};

/// The header record every data file begins with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// The repository this file belongs to.
    pub repo_name: String,
    /// Identifies the writer, e.g. `"eluent/0.1.0"`.
    pub generator: String,
    /// When the file was first created.
    pub created_at: DateTime<Utc>,
}

/// One line of a JSONL data file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
pub enum Record {
    /// The file's leading header.
    Header(Header),
    /// An atom.
    Atom(Atom),
    /// A bond.
    Bond(Bond),
    /// A comment.
    Comment(Comment),
}

/// The result of loading a JSONL file: every well-formed record plus a
/// count of lines that failed to parse (logged, not fatal — partial
/// recovery per §4.3).
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Records read in file order, header included if present.
    pub records: Vec<Record>,
    /// Number of lines skipped because they failed to parse.
    pub malformed_lines: usize,
}

/// Append one record to `path` under an exclusive lock. Creates the file
/// (without a header — callers are responsible for writing one first via
/// [`write_header_if_absent`]) if it doesn't exist.
///
/// # Errors
/// Returns an error if the lock cannot be acquired, the record cannot be
/// serialised, or the write fails.
pub fn append(path: &Path, record: &Record) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = lock_path_for(path);
    let _lock = FileLock::acquire(&lock_path)?;
    append_locked(path, record)
}

/// Append one record to `path`, assuming the caller already holds its lock.
fn append_locked(path: &Path, record: &Record) -> std::io::Result<()> {
    let mut line = serde_json::to_string(record)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    line.push('\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()
}

/// Write the header record if `path` does not exist yet or is empty.
///
/// The existence check and the write happen under one lock acquisition, so
/// two writers racing to initialize the same file can't both observe "no
/// header" and each append one.
///
/// # Errors
/// Propagates any I/O error from checking or writing the file.
pub fn write_header_if_absent(path: &Path, header: Header) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = lock_path_for(path);
    let _lock = FileLock::acquire(&lock_path)?;
    let needs_header = std::fs::metadata(path).is_ok_and(|m| m.len() == 0) || !path.exists();
    if needs_header {
        append_locked(path, &Record::Header(header))?;
    }
    Ok(())
}

/// Stream every line of `path`, parsing each as a [`Record`]. Lines that
/// fail to parse are counted and skipped with a `tracing::warn!` rather
/// than aborting the load (covers a crash mid-append leaving a partial
/// final line).
///
/// # Errors
/// Returns an error only if the file cannot be opened or read at all; a
/// missing file yields an empty, zero-malformed result.
pub fn load(path: &Path) -> std::io::Result<LoadResult> {
    let mut result = LoadResult::default();
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(result),
        Err(e) => return Err(e),
    };
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => result.records.push(record),
            Err(err) => {
                result.malformed_lines += 1;
                tracing::warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %err,
                    "skipping malformed JSONL line"
                );
            }
        }
    }
    Ok(result)
}

/// Replace the contents of `path` with `records`, via a sibling `.tmp`
/// file and an atomic rename. Acquires the same lock [`append`] uses so a
/// concurrent append cannot interleave with the rewrite.
///
/// # Errors
/// Returns an error if the lock cannot be acquired, serialisation fails,
/// or any filesystem operation fails.
pub fn rewrite(path: &Path, records: &[Record]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = lock_path_for(path);
    let _lock = FileLock::acquire(&lock_path)?;
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        for record in records {
            let mut line = serde_json::to_string(record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            line.push('\n');
            tmp.write_all(line.as_bytes())?;
        }
        tmp.flush()?;
    }
    std::fs::rename(&tmp_path, path)
}

fn lock_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    std::path::PathBuf::from(os)
}
