//! Blocklist store: an in-memory member set backed by an append-only text log.
//!
//! Reads go through an `ArcSwap` snapshot and never take a lock. Writers
//! serialize on a mutex that also owns the pending queue, so an `add`
//! followed by a `flush` can never interleave with another writer.
//!
//! The file only ever holds complete lines. A torn tail found on load is
//! cut off, and a failed append is rolled back before the next one.

use super::traits::BlocklistMatcher;
use crate::error::StoreError;
use arc_swap::ArcSwap;
use rustc_hash::FxHashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

type Members = FxHashSet<Box<str>>;

pub struct BlocklistStore {
    path: PathBuf,
    members: ArcSwap<Members>,
    log: Mutex<PendingLog>,
    // Mirrors `PendingLog::pending.len()` for readers that must not block.
    pending_count: AtomicUsize,
}

struct PendingLog {
    pending: Vec<Box<str>>,
    // Length of the last complete line. Set when the file may end in bytes
    // that must be cut off before the next append.
    truncate_to: Option<u64>,
}

impl BlocklistStore {
    /// Creates an empty store that appends to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self::with_members(path.into(), Members::default(), None)
    }

    fn with_members(path: PathBuf, members: Members, truncate_to: Option<u64>) -> Self {
        Self {
            path,
            members: ArcSwap::from_pointee(members),
            log: Mutex::new(PendingLog {
                pending: Vec::new(),
                truncate_to,
            }),
            pending_count: AtomicUsize::new(0),
        }
    }

    /// Loads the store from its backing file. A missing file yields an empty
    /// store; any other read failure is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "Blocklist file {} does not exist yet, starting empty.",
                    path.display()
                );
                return Ok(Self::empty(path));
            }
            Err(source) => {
                return Err(StoreError::Load {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let (members, torn_at) = Self::parse_log(&bytes);
        let mut truncate_to = None;
        if let Some(complete_len) = torn_at {
            let complete_len = complete_len as u64;
            match Self::truncate(path, complete_len) {
                Ok(()) => info!(
                    "Cut blocklist file {} back to {} bytes.",
                    path.display(),
                    complete_len
                ),
                Err(e) => {
                    warn!(
                        "Failed to cut partial line from {}, retrying on next flush: {}",
                        path.display(),
                        e
                    );
                    truncate_to = Some(complete_len);
                }
            }
        }

        info!(
            "Loaded {} identities from blocklist file {}.",
            members.len(),
            path.display()
        );
        Ok(Self::with_members(path.to_path_buf(), members, truncate_to))
    }

    fn parse_line(line: &str) -> Option<Box<str>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(line.into())
    }

    /// Parses the log contents. When the file ends in an unterminated line,
    /// left over from an interrupted append, that line is discarded and the
    /// length of the complete prefix is returned alongside the members.
    fn parse_log(bytes: &[u8]) -> (Members, Option<usize>) {
        let (complete, tail) = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(idx) => bytes.split_at(idx + 1),
            None => bytes.split_at(0),
        };

        if !tail.iter().all(u8::is_ascii_whitespace) {
            warn!(
                "Ignoring {} byte partial line at the end of the blocklist file.",
                tail.len()
            );
        }

        let mut members = Members::default();
        for line in complete.split(|&b| b == b'\n') {
            match std::str::from_utf8(line) {
                Ok(line) => {
                    if let Some(identity) = Self::parse_line(line) {
                        members.insert(identity);
                    }
                }
                Err(_) => warn!("Skipping blocklist line that is not valid UTF-8."),
            }
        }

        let torn_at = (!tail.is_empty()).then_some(complete.len());
        (members, torn_at)
    }

    fn truncate(path: &Path, len: u64) -> io::Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(len)?;
        file.sync_data()
    }

    fn lock(&self) -> MutexGuard<'_, PendingLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts an identity. Returns false, and queues nothing, if it was
    /// already a member or cannot be stored as a single log line.
    pub fn add(&self, identity: &str) -> bool {
        let mut log = self.lock();
        self.insert_locked(&mut log, identity)
    }

    /// Appends every pending identity to the backing file.
    ///
    /// Pending entries are only dropped once the write and sync succeed, so a
    /// failed flush is retried in full by the next one.
    pub fn flush(&self) -> Result<usize, StoreError> {
        let mut log = self.lock();
        self.flush_locked(&mut log)
    }

    /// `add` then `flush` as one critical section. Returns whether the
    /// identity was newly blocked. The in-memory block stands even if the
    /// flush fails.
    pub fn block(&self, identity: &str) -> Result<bool, StoreError> {
        let mut log = self.lock();
        let added = self.insert_locked(&mut log, identity);
        self.flush_locked(&mut log)?;
        Ok(added)
    }

    fn insert_locked(&self, log: &mut PendingLog, identity: &str) -> bool {
        if identity.is_empty() || identity.contains(['\n', '\r']) {
            warn!("Refusing to block malformed identity {:?}", identity);
            return false;
        }

        let current = self.members.load();
        if current.contains(identity) {
            return false;
        }

        let identity: Box<str> = identity.into();
        let mut next = Members::clone(&current);
        next.insert(identity.clone());
        self.members.store(Arc::new(next));
        log.pending.push(identity);
        self.pending_count.store(log.pending.len(), Ordering::Relaxed);
        true
    }

    fn flush_locked(&self, log: &mut PendingLog) -> Result<usize, StoreError> {
        if log.pending.is_empty() {
            return Ok(0);
        }

        let mut buf = String::new();
        for identity in &log.pending {
            buf.push_str(identity);
            buf.push('\n');
        }

        Self::append(&self.path, &mut log.truncate_to, buf.as_bytes()).map_err(|source| {
            StoreError::Flush {
                path: self.path.clone(),
                source,
            }
        })?;

        let count = log.pending.len();
        log.pending.clear();
        self.pending_count.store(0, Ordering::Relaxed);
        info!("Flushed {} new identities to blocklist file.", count);
        Ok(count)
    }

    /// Appends `buf` and syncs it. Before writing, the file is cut back to
    /// `truncate_to` if a previous append failed part way. On failure
    /// `truncate_to` holds the length to restore next time.
    fn append(path: &Path, truncate_to: &mut Option<u64>, buf: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let start = match *truncate_to {
            Some(len) => {
                file.set_len(len)?;
                len
            }
            None => file.metadata()?.len(),
        };
        *truncate_to = Some(start);

        file.write_all(buf)?;
        file.sync_data()?;
        *truncate_to = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }

    /// Number of identities blocked in memory but not yet on disk. Never
    /// waits on a flush in progress.
    pub fn pending_len(&self) -> usize {
        self.pending_count.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlocklistMatcher for BlocklistStore {
    fn contains(&self, identity: &str) -> bool {
        self.members.load().contains(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = BlocklistStore::load(dir.path().join("blocklist.txt")).unwrap();
        assert!(store.is_empty());
        assert!(!store.contains("1.2.3.4"));
    }

    #[test]
    fn test_load_unreadable_file_fails() {
        let dir = TempDir::new().unwrap();
        // A directory exists at the path but cannot be read as a file.
        let result = BlocklistStore::load(dir.path());
        assert!(matches!(result, Err(StoreError::Load { .. })));
    }

    #[test]
    fn test_parse_log_skips_blank_lines_and_dedups() {
        let content = b"1.2.3.4\n\n  \r\n5.6.7.8\r\n1.2.3.4\n";
        let (members, torn_at) = BlocklistStore::parse_log(content);
        assert_eq!(torn_at, None);
        assert_eq!(members.len(), 2);
        assert!(members.contains("1.2.3.4"));
        assert!(members.contains("5.6.7.8"));
    }

    #[test]
    fn test_parse_log_ignores_torn_tail() {
        let (members, torn_at) = BlocklistStore::parse_log(b"1.2.3.4\n5.6.");
        assert_eq!(torn_at, Some(8));
        assert_eq!(members.len(), 1);
        assert!(!members.contains("5.6."));

        let (members, torn_at) = BlocklistStore::parse_log(b"9.9.9");
        assert_eq!(torn_at, Some(0));
        assert!(members.is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = BlocklistStore::empty(dir.path().join("blocklist.txt"));

        assert!(store.add("1.2.3.4"));
        assert!(!store.add("1.2.3.4"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_len(), 1);
    }

    #[test]
    fn test_add_rejects_malformed_identity() {
        let dir = TempDir::new().unwrap();
        let store = BlocklistStore::empty(dir.path().join("blocklist.txt"));

        assert!(!store.add(""));
        assert!(!store.add("1.2.3.4\n5.6.7.8"));
        assert!(store.is_empty());
        assert_eq!(store.pending_len(), 0);
    }

    #[test]
    fn test_block_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.txt");
        let store = BlocklistStore::load(&path).unwrap();

        assert!(!store.contains("1.2.3.4"));
        assert!(store.block("1.2.3.4").unwrap());
        assert!(store.contains("1.2.3.4"));
        assert_eq!(store.pending_len(), 0);

        assert!(store.block("5.6.7.8").unwrap());
        assert!(!store.block("1.2.3.4").unwrap());

        assert_eq!(lines(&path), vec!["1.2.3.4", "5.6.7.8"]);

        let reloaded = BlocklistStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("1.2.3.4"));
        assert!(reloaded.contains("5.6.7.8"));
    }

    #[test]
    fn test_flush_without_pending_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.txt");
        let store = BlocklistStore::empty(&path);

        assert_eq!(store.flush().unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_torn_tail_is_cut_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.txt");
        // "10.0.0.123\n" cut short by a crash.
        std::fs::write(&path, "1.2.3.4\n10.0.0.1").unwrap();

        let store = BlocklistStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.contains("10.0.0.1"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.2.3.4\n");

        store.block("9.9.9.9").unwrap();
        assert_eq!(lines(&path), vec!["1.2.3.4", "9.9.9.9"]);

        let reloaded = BlocklistStore::load(&path).unwrap();
        assert!(reloaded.contains("1.2.3.4"));
        assert!(reloaded.contains("9.9.9.9"));
        assert!(!reloaded.contains("10.0.0.1"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_retry_drops_partial_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.txt");
        let store = BlocklistStore::empty(&path);
        store.block("1.2.3.4").unwrap();

        // An append that died after writing part of its line.
        let good_len = std::fs::metadata(&path).unwrap().len();
        store.lock().truncate_to = Some(good_len);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"5.6.").unwrap();
        drop(file);

        store.block("9.9.9.9").unwrap();
        assert_eq!(lines(&path), vec!["1.2.3.4", "9.9.9.9"]);
        assert_eq!(store.lock().truncate_to, None);

        let reloaded = BlocklistStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(!reloaded.contains("5.6."));
    }

    #[test]
    fn test_failed_flush_keeps_pending_and_membership() {
        let dir = TempDir::new().unwrap();
        let missing_dir = dir.path().join("missing");
        let path = missing_dir.join("blocklist.txt");
        let store = BlocklistStore::empty(&path);

        assert!(matches!(
            store.block("1.2.3.4"),
            Err(StoreError::Flush { .. })
        ));
        assert!(store.contains("1.2.3.4"));
        assert_eq!(store.pending_len(), 1);

        std::fs::create_dir(&missing_dir).unwrap();
        assert_eq!(store.flush().unwrap(), 1);
        assert_eq!(store.pending_len(), 0);
        assert_eq!(lines(&path), vec!["1.2.3.4"]);

        let reloaded = BlocklistStore::load(&path).unwrap();
        assert!(reloaded.contains("1.2.3.4"));
    }

    #[test]
    fn test_pending_len_does_not_wait_for_writer() {
        let dir = TempDir::new().unwrap();
        let store = BlocklistStore::empty(dir.path().join("blocklist.txt"));
        store.add("1.2.3.4");

        // A writer mid-flush holds the lock.
        let _guard = store.lock();
        assert_eq!(store.pending_len(), 1);
        assert!(store.contains("1.2.3.4"));
    }

    #[test]
    fn test_concurrent_blocks_are_all_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blocklist.txt");
        let store = BlocklistStore::empty(&path);

        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..25 {
                        // Every thread also hammers one shared identity.
                        store.block(&format!("10.0.{t}.{i}")).unwrap();
                        store.block("192.168.0.1").unwrap();
                    }
                });
            }
        });

        assert_eq!(store.len(), 8 * 25 + 1);
        let on_disk = lines(&path);
        assert_eq!(on_disk.len(), 8 * 25 + 1);

        let reloaded = BlocklistStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), store.len());
    }
}
