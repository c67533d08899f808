//! Persistent exclusion list.
//!
//! A small set of identifiers (senders or destinations) whose audio
//! messages are never transcribed. The set is held in memory behind a
//! single mutex and written through to a flat file, one identifier per
//! line, on every effective mutation. The rewrite goes to a sibling temp
//! file first and is renamed over the target, so a concurrent reader of
//! the file never observes a partial write.
//!
//! Persistence failures are logged and do not propagate: the in-memory
//! set keeps operating for the rest of the process lifetime even if
//! durability is lost.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error, info};

/// A concurrency-safe, file-backed set of excluded identifiers.
pub struct ExclusionList {
    entries: Mutex<BTreeSet<String>>,
    path: PathBuf,
}

impl ExclusionList {
    /// Open the list at `path`, creating the backing directory and file
    /// if absent and loading every non-empty line as one entry.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => {
                info!(path = %path.display(), count = entries.len(), "exclusion list loaded");
                entries
            }
            Err(err) => {
                error!(path = %path.display(), %err, "failed to load exclusion list");
                BTreeSet::new()
            }
        };
        Self {
            entries: Mutex::new(entries),
            path,
        }
    }

    /// Whether `id` is currently excluded.
    pub fn is_excluded(&self, id: &str) -> bool {
        self.entries.lock().contains(id)
    }

    /// Add `id`. Idempotent; the file is rewritten only when the set
    /// actually changed. Returns true when the entry was newly added.
    pub fn add(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        if !entries.insert(id.to_string()) {
            debug!(id, "already in exclusion list");
            return false;
        }
        info!(id, count = entries.len(), "added to exclusion list");
        self.save(&entries);
        true
    }

    /// Remove `id`. Idempotent; returns true when the entry was present.
    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        if !entries.remove(id) {
            debug!(id, "not in exclusion list");
            return false;
        }
        info!(id, count = entries.len(), "removed from exclusion list");
        self.save(&entries);
        true
    }

    /// All entries, in sorted order.
    pub fn all(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Serialize the full set back to the file. Called with the entry
    /// lock held so mutation and rewrite are one atomic sequence.
    fn save(&self, entries: &BTreeSet<String>) {
        if let Err(err) = write_entries(&self.path, entries) {
            error!(path = %self.path.display(), %err, "failed to save exclusion list");
        }
    }
}

fn load_entries(path: &Path) -> io::Result<BTreeSet<String>> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::write(path, "")?;
            Ok(BTreeSet::new())
        }
        Err(err) => Err(err),
    }
}

fn write_entries(path: &Path, entries: &BTreeSet<String>) -> io::Result<()> {
    let mut contents = String::new();
    for entry in entries {
        contents.push_str(entry);
        contents.push('\n');
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
