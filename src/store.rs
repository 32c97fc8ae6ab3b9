use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::{DupError, Result};
use crate::identity::{self, FileRecord};

const MEGABYTE: u64 = 1024 * 1024;

/// Which digest a store groups its records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Prefix,
    Content,
}

/// Records share a group only when both their size and their digest match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub size: u64,
    pub digest: u64,
}

/// Aggregate figures of a store taken under one lock acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub files: usize,
    pub groups: usize,
    pub duplicated_bytes: u64,
}

impl StoreStats {
    /// `"<files> files (in <groups> sets), occupying <megabytes> megabytes"`
    pub fn summary(&self) -> String {
        format!(
            "{} files (in {} sets), occupying {} megabytes",
            self.files,
            self.groups,
            self.duplicated_bytes / MEGABYTE
        )
    }
}

#[derive(Debug, Default)]
struct Groups {
    by_key: HashMap<GroupKey, Vec<FileRecord>>,
    added: HashSet<PathBuf>,
}

/// Candidate duplicate groups at one tier.
///
/// The map and the set of inserted paths sit behind a single mutex. Inserts
/// do their file I/O outside the lock, so the lock is only held for the map
/// update itself. Every read query takes the lock once and answers from that
/// snapshot.
#[derive(Debug)]
pub struct CandidateStore {
    tier: Tier,
    // Only prefix-tier stores extract identities themselves.
    prefix_bytes: Option<usize>,
    state: Mutex<Groups>,
}

impl CandidateStore {
    /// A prefix-tier store whose inserts digest the first `prefix_bytes` bytes.
    pub fn new(prefix_bytes: usize) -> Self {
        Self::with_tier(Tier::Prefix, Some(prefix_bytes))
    }

    /// A content-tier store, filled through [`CandidateStore::insert_record`].
    pub fn content() -> Self {
        Self::with_tier(Tier::Content, None)
    }

    fn with_tier(tier: Tier, prefix_bytes: Option<usize>) -> Self {
        Self {
            tier,
            prefix_bytes,
            state: Mutex::new(Groups::default()),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// `None` for a content-tier store.
    pub fn prefix_bytes(&self) -> Option<usize> {
        self.prefix_bytes
    }

    // A panic while holding the lock can only interrupt a single push or
    // insert, which never leaves the map half-updated.
    fn state(&self) -> MutexGuard<'_, Groups> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.state().added.contains(path)
    }

    /// Extracts the identity of `path` and files it under its prefix group.
    ///
    /// Fails with [`DupError::DuplicatePath`] if `path` was inserted before,
    /// or with the extractor's error. A failed insert leaves the store as it
    /// was. A content-tier store rejects the path with
    /// [`DupError::MissingContentDigest`] without opening it.
    pub fn insert(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let Some(prefix_bytes) = self.prefix_bytes else {
            return Err(DupError::MissingContentDigest(path.to_path_buf()));
        };
        if self.contains(path) {
            return Err(DupError::DuplicatePath(path.to_path_buf()));
        }
        let record = identity::extract(path, prefix_bytes)?;
        self.insert_record(record)
    }

    /// Files an already-built record under the group for this store's tier.
    pub fn insert_record(&self, record: FileRecord) -> Result<()> {
        let key = self.key_of(&record)?;
        let mut state = self.state();
        if !state.added.insert(record.path.clone()) {
            return Err(DupError::DuplicatePath(record.path));
        }
        state.by_key.entry(key).or_default().push(record);
        Ok(())
    }

    fn key_of(&self, record: &FileRecord) -> Result<GroupKey> {
        let digest = match self.tier {
            Tier::Prefix => record.prefix_digest,
            Tier::Content => record
                .content_digest
                .ok_or_else(|| DupError::MissingContentDigest(record.path.clone()))?,
        };
        Ok(GroupKey {
            size: record.size,
            digest,
        })
    }

    /// A new store holding only the groups with two or more members.
    pub fn prune(&self) -> Self {
        let state = self.state();
        let mut pruned = Groups::default();
        for (key, records) in state.by_key.iter().filter(|(_, v)| v.len() > 1) {
            pruned
                .added
                .extend(records.iter().map(|r| r.path.clone()));
            pruned.by_key.insert(*key, records.clone());
        }
        Self {
            tier: self.tier,
            prefix_bytes: self.prefix_bytes,
            state: Mutex::new(pruned),
        }
    }

    pub fn all_records(&self) -> Vec<FileRecord> {
        self.state().by_key.values().flatten().cloned().collect()
    }

    /// Consumes the store, handing its records over by value.
    pub fn into_records(self) -> Vec<FileRecord> {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        state.by_key.into_values().flatten().collect()
    }

    pub fn groups(&self) -> Vec<(GroupKey, Vec<FileRecord>)> {
        self.state()
            .by_key
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.state().by_key.values().map(Vec::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.state().by_key.len()
    }

    pub fn empty_file_records(&self) -> Vec<FileRecord> {
        self.state()
            .by_key
            .values()
            .flatten()
            .filter(|r| r.is_empty())
            .cloned()
            .collect()
    }

    /// Combined size of every record, duplicates included.
    pub fn total_bytes(&self) -> u64 {
        self.state().by_key.values().flatten().map(|r| r.size).sum()
    }

    /// Sum over groups of `(members - 1) * size`: every member past the first
    /// counts as duplicate weight.
    pub fn total_duplicated_bytes(&self) -> u64 {
        duplicated_bytes(&self.state().by_key)
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state();
        StoreStats {
            files: state.by_key.values().map(Vec::len).sum(),
            groups: state.by_key.len(),
            duplicated_bytes: duplicated_bytes(&state.by_key),
        }
    }

    pub fn summarize(&self) -> String {
        self.stats().summary()
    }
}

fn duplicated_bytes(by_key: &HashMap<GroupKey, Vec<FileRecord>>) -> u64 {
    by_key
        .values()
        .filter_map(|records| {
            let first = records.first()?;
            Some((records.len() as u64 - 1) * first.size)
        })
        .sum()
}
