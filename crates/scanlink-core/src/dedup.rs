//! # Dedup Store
//!
//! Append-only record of every identifier and every link seen so far.
//!
//! Each domain lives in its own flat file: UTF-8, one literal value per
//! line, no header. The file is loaded wholesale at open and every new
//! value is appended and synced before it is reported as recorded.
//!
//! ## Consistency
//!
//! - A value is inserted in memory only after its line reached the disk.
//! - A failed append is rolled back to the previous file length.
//! - A torn trailing fragment (crash mid-write) is cut off at open.

use crate::{LinkRecord, StorageError};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

// =============================================================================
// DEDUP LOG (one file, one domain)
// =============================================================================

/// One append-only, newline-delimited set of values.
#[derive(Debug)]
pub struct DedupLog {
    path: PathBuf,
    inner: Mutex<LogInner>,
}

#[derive(Debug)]
struct LogInner {
    file: File,
    /// Length of the file after the last complete line.
    len: u64,
    seen: BTreeSet<String>,
}

impl DedupLog {
    /// Open (or create) the record at `path` and load every value.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|source| StorageError::Open {
                path: path.clone(),
                source,
            })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|source| StorageError::Load {
                path: path.clone(),
                source,
            })?;

        // Cut a torn trailing fragment so the next append starts on a fresh line.
        let complete = contents.rfind('\n').map_or(0, |pos| pos + 1);
        if complete < contents.len() {
            file.set_len(complete as u64)
                .map_err(|source| StorageError::Open {
                    path: path.clone(),
                    source,
                })?;
            contents.truncate(complete);
        }

        let seen = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            path,
            inner: Mutex::new(LogInner {
                file,
                len: complete as u64,
                seen,
            }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Membership test. Never mutates.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        self.lock().seen.contains(value)
    }

    /// Record `value` if it is new.
    ///
    /// Returns `Ok(true)` exactly once per distinct value, after the line is
    /// durable. Concurrent callers with the same value serialize on the log
    /// lock; only the first observes `true`.
    pub fn record(&self, value: &str) -> Result<bool, StorageError> {
        if value.is_empty() || value.contains(['\n', '\r']) {
            return Err(StorageError::InvalidValue(value.to_string()));
        }

        let mut inner = self.lock();
        if inner.seen.contains(value) {
            return Ok(false);
        }

        let line = format!("{}\n", value);
        let written = inner
            .file
            .write_all(line.as_bytes())
            .and_then(|()| inner.file.sync_data());

        if let Err(source) = written {
            // Best effort: drop whatever part of the line made it out.
            let previous = inner.len;
            let _ = inner.file.set_len(previous);
            return Err(StorageError::Append {
                path: self.path.clone(),
                source,
            });
        }

        inner.len += line.len() as u64;
        inner.seen.insert(value.to_string());
        Ok(true)
    }

    /// Number of distinct values recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    /// Check whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().seen.is_empty()
    }

    /// All recorded values in sorted order.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        self.lock().seen.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        // Every mutation completes before the guard drops, so a poisoned
        // lock still guards a consistent set.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// DEDUP STORE (identifiers + links)
// =============================================================================

/// The two dedup domains of a station.
#[derive(Debug)]
pub struct DedupStore {
    identifiers: DedupLog,
    links: DedupLog,
}

impl DedupStore {
    /// Open both records, creating missing files.
    pub fn open(
        identifiers_path: impl AsRef<Path>,
        links_path: impl AsRef<Path>,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            identifiers: DedupLog::open(identifiers_path)?,
            links: DedupLog::open(links_path)?,
        })
    }

    /// Check whether an identifier was seen before.
    #[must_use]
    pub fn seen_identifier(&self, id: &str) -> bool {
        self.identifiers.contains(id)
    }

    /// Durably record an identifier; `true` if it was new.
    pub fn record_identifier(&self, id: &str) -> Result<bool, StorageError> {
        self.identifiers.record(id)
    }

    /// Check whether a link was recorded before.
    #[must_use]
    pub fn seen_link(&self, link: &LinkRecord) -> bool {
        self.links.contains(&link.serialize())
    }

    /// Durably record a link; `true` if it was new.
    pub fn record_link(&self, link: &LinkRecord) -> Result<bool, StorageError> {
        self.links.record(&link.serialize())
    }

    /// Number of distinct identifiers recorded.
    #[must_use]
    pub fn identifier_count(&self) -> usize {
        self.identifiers.len()
    }

    /// Number of distinct links recorded.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All recorded links, sorted by serialized form.
    ///
    /// Lines that do not parse as links (hand-edited files) are skipped.
    #[must_use]
    pub fn links(&self) -> Vec<LinkRecord> {
        self.links
            .values()
            .iter()
            .filter_map(|line| LinkRecord::parse(line).ok())
            .collect()
    }
}

#[cfg(test)]
impl DedupLog {
    /// Swap the backing file for a read-only handle so every append fails.
    pub(crate) fn make_read_only(&self) {
        if let Ok(file) = File::open(&self.path) {
            self.lock().file = file;
        }
    }
}

#[cfg(test)]
impl DedupStore {
    pub(crate) fn make_read_only(&self) {
        self.identifiers.make_read_only();
        self.links.make_read_only();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BarcodeIdentifier, RfidUid};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn link(barcode: &str, rfid: &str) -> LinkRecord {
        LinkRecord::new(
            BarcodeIdentifier::from_digits(barcode).expect("digits"),
            RfidUid::parse(rfid).expect("uid"),
        )
    }

    #[test]
    fn absent_file_is_empty_set() {
        let dir = TempDir::new().expect("tempdir");
        let log = DedupLog::open(dir.path().join("ids.txt")).expect("open");
        assert!(log.is_empty());
        assert!(!log.contains("150032"));
    }

    #[test]
    fn record_returns_true_once_and_persists_once() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");
        let log = DedupLog::open(&path).expect("open");

        assert!(log.record("150032").expect("first"));
        assert!(!log.record("150032").expect("second"));

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "150032\n");
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");

        {
            let log = DedupLog::open(&path).expect("open");
            log.record("150032").expect("record");
            log.record("0042").expect("record");
        }

        let log = DedupLog::open(&path).expect("reopen");
        assert_eq!(log.len(), 2);
        assert!(log.contains("0042"));
        assert!(!log.record("150032").expect("duplicate after reopen"));
    }

    #[test]
    fn blank_lines_and_whitespace_ignored_on_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "150032\n\n  0042 \n").expect("seed");

        let log = DedupLog::open(&path).expect("open");
        assert_eq!(log.values(), vec!["0042".to_string(), "150032".to_string()]);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "150032\n1500").expect("seed");

        let log = DedupLog::open(&path).expect("open");
        assert!(!log.contains("1500"));
        log.record("777").expect("record");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "150032\n777\n");
    }

    #[test]
    fn multiline_values_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let log = DedupLog::open(dir.path().join("ids.txt")).expect("open");
        assert!(matches!(
            log.record("1\n2"),
            Err(StorageError::InvalidValue(_))
        ));
        assert!(matches!(log.record(""), Err(StorageError::InvalidValue(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn failed_append_is_not_recorded_in_memory() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");
        let log = DedupLog::open(&path).expect("open");
        log.make_read_only();

        assert!(matches!(
            log.record("150032"),
            Err(StorageError::Append { .. })
        ));
        assert!(!log.contains("150032"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn concurrent_records_yield_single_winner() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("ids.txt");
        let log = Arc::new(DedupLog::open(&path).expect("open"));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let log = Arc::clone(&log);
                thread::spawn(move || log.record("150032").expect("record"))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|&new| new)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "150032\n");
    }

    #[test]
    fn store_keeps_domains_apart() {
        let dir = TempDir::new().expect("tempdir");
        let store = DedupStore::open(dir.path().join("ids.txt"), dir.path().join("links.txt"))
            .expect("open");

        let pair = link("150032", "04A3F21B");
        assert!(store.record_identifier("150032").expect("id"));
        assert!(!store.seen_link(&pair));
        assert!(store.record_link(&pair).expect("link"));
        assert!(!store.record_link(&pair).expect("dup link"));

        assert_eq!(store.identifier_count(), 1);
        assert_eq!(store.link_count(), 1);
        assert_eq!(store.links(), vec![pair]);

        let links = std::fs::read_to_string(dir.path().join("links.txt")).expect("read");
        assert_eq!(links, "150032;04A3F21B\n");
    }
}
