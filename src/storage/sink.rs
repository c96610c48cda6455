//! File-backed result sink
//!
//! Results are appended one line at a time to a UTF-8 text file
//! (`domain--entity_name`) and the domain alone to a companion file. Every
//! append is flushed and synced before it returns, so an interrupted run
//! always leaves a valid prefix that `load_existing` can recover.

use crate::storage::traits::{ResultSink, StorageError, StorageResult};
use crate::storage::ResultEntry;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// State recovered from a previous run's results file
#[derive(Debug, Clone, Default)]
pub struct PriorOutput {
    /// Every complete line of the results file, verbatim
    pub lines: HashSet<String>,
    /// Every `(domain, entity)` pair already persisted
    pub results: HashSet<ResultEntry>,
    /// Every entity name already persisted
    pub entities: HashSet<String>,
    /// Every domain already persisted
    pub domains: HashSet<String>,
    /// Lines that could not be parsed
    pub skipped_lines: usize,
    /// Whether the file ended in an unterminated line
    pub torn_tail: bool,
}

impl PriorOutput {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Loads prior results for crash recovery
///
/// A missing file is not an error and yields empty prior state. Lines that do
/// not parse as `domain--entity_name` are counted and skipped, and so is a
/// trailing line without a newline: it is the remains of an interrupted
/// write. The domains companion is only used to split lines whose domain
/// itself contains `--`.
pub fn load_existing(results_path: &Path, domains_path: &Path) -> StorageResult<PriorOutput> {
    let Some(content) = read_if_exists(results_path)? else {
        tracing::debug!("No prior results at {}", results_path.display());
        return Ok(PriorOutput::default());
    };

    let domains_text = read_if_exists(domains_path)?.unwrap_or_default();
    let known_domains: HashSet<String> = complete_lines(&domains_text)
        .0
        .into_iter()
        .map(str::to_string)
        .collect();

    let (lines, torn) = complete_lines(&content);
    let mut prior = PriorOutput::default();

    if let Some(torn) = torn {
        tracing::warn!("Ignoring unterminated last results line: {:?}", torn);
        prior.torn_tail = true;
    }

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match ResultEntry::parse_line_with_domains(line, &known_domains) {
            Some(entry) => {
                prior.lines.insert(line.to_string());
                // Lines written before field cleaning still suppress their
                // cleaned form
                prior.lines.insert(entry.to_line());
                prior.entities.insert(entry.entity_name.clone());
                prior.domains.insert(entry.domain.clone());
                prior.results.insert(entry);
            }
            None => {
                tracing::warn!("Skipping unparseable results line: {:?}", line);
                prior.skipped_lines += 1;
            }
        }
    }

    tracing::info!(
        "Recovered {} results ({} entities, {} domains) from {}",
        prior.results.len(),
        prior.entities.len(),
        prior.domains.len(),
        results_path.display()
    );

    Ok(prior)
}

fn read_if_exists(path: &Path) -> StorageResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(file_error(path, e)),
    }
}

/// Splits text into newline-terminated lines plus an unterminated remainder
fn complete_lines(text: &str) -> (Vec<&str>, Option<&str>) {
    let mut lines = Vec::new();
    let mut torn = None;
    for chunk in text.split_inclusive('\n') {
        match chunk.strip_suffix('\n') {
            Some(line) => lines.push(line.strip_suffix('\r').unwrap_or(line)),
            None => torn = Some(chunk),
        }
    }
    (lines, torn)
}

struct SinkInner {
    results: File,
    domains: File,
    /// Exact lines present in the results file
    seen: HashSet<String>,
}

/// Append-only results file plus domains companion
///
/// Duplicate detection compares serialized lines, so an entry is suppressed
/// exactly when its line is already in the file.
pub struct FileSink {
    results_path: PathBuf,
    domains_path: PathBuf,
    inner: Mutex<SinkInner>,
}

impl FileSink {
    /// Opens both files for appending, seeding the seen set with the lines
    /// recovered by [`load_existing`]
    pub fn open(
        results_path: &Path,
        domains_path: &Path,
        prior_lines: HashSet<String>,
    ) -> StorageResult<Self> {
        let results = open_append(results_path, false)?;
        let domains = open_append(domains_path, false)?;
        Self::from_files(results_path, domains_path, results, domains, prior_lines)
    }

    /// Truncates both files and starts from empty state
    pub fn create_fresh(results_path: &Path, domains_path: &Path) -> StorageResult<Self> {
        let results = open_append(results_path, true)?;
        let domains = open_append(domains_path, true)?;
        Self::from_files(results_path, domains_path, results, domains, HashSet::new())
    }

    fn from_files(
        results_path: &Path,
        domains_path: &Path,
        mut results: File,
        mut domains: File,
        seen: HashSet<String>,
    ) -> StorageResult<Self> {
        drop_torn_tail(&mut results).map_err(|e| file_error(results_path, e))?;
        drop_torn_tail(&mut domains).map_err(|e| file_error(domains_path, e))?;

        Ok(Self {
            results_path: results_path.to_path_buf(),
            domains_path: domains_path.to_path_buf(),
            inner: Mutex::new(SinkInner {
                results,
                domains,
                seen,
            }),
        })
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn domains_path(&self) -> &Path {
        &self.domains_path
    }
}

impl ResultSink for FileSink {
    fn append_if_new(&self, entry: &ResultEntry) -> StorageResult<bool> {
        let line = entry.to_line();
        let mut inner = self.inner.lock().map_err(|_| StorageError::LockPoisoned)?;
        if inner.seen.contains(&line) {
            return Ok(false);
        }

        write_durable(&mut inner.results, &line)
            .map_err(|e| file_error(&self.results_path, e))?;

        // The results file is the recovery source, so the entry counts as
        // persisted from here on even if the companion write fails.
        inner.seen.insert(line);

        write_durable(&mut inner.domains, &entry.domain)
            .map_err(|e| file_error(&self.domains_path, e))?;

        Ok(true)
    }

    fn known_entries(&self) -> usize {
        self.inner.lock().map(|inner| inner.seen.len()).unwrap_or(0)
    }
}

fn open_append(path: &Path, truncate: bool) -> StorageResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| file_error(parent, e))?;
        }
    }

    if truncate {
        File::create(path).map_err(|e| file_error(path, e))?;
    }

    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| file_error(path, e))
}

/// Cuts off an unterminated last line left behind by a crash
fn drop_torn_tail(file: &mut File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    let mut end = len;
    let mut keep = 0;
    let mut buf = [0u8; 4096];

    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        tracing::warn!("Dropping {} bytes of an interrupted write", len - keep);
        file.set_len(keep)?;
        file.sync_data()?;
    }
    Ok(())
}

fn write_durable(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_data()
}

fn file_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::File {
        path: path.display().to_string(),
        source,
    }
}
