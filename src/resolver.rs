use std::path::PathBuf;

use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::hasher::{ConfirmationHasher, HashFailure};
use crate::store::{CandidateStore, StoreStats};

/// A set of files whose full contents hashed identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub size: u64,
    pub digest: u64,
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Bytes held by every copy past the first.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.paths.len() as u64).saturating_sub(1)
    }
}

/// Outcome of the confirmation stage.
#[derive(Debug)]
pub struct Resolution {
    /// Every confirmed record, singletons included.
    pub hashed: CandidateStore,
    /// Only the groups with two or more members.
    pub confirmed: CandidateStore,
    /// Files skipped under the report failure policy.
    pub failures: Vec<HashFailure>,
}

impl Resolution {
    pub fn stats(&self) -> StoreStats {
        self.confirmed.stats()
    }

    /// Confirmed groups, largest waste first. Ties are broken by size and
    /// digest, and paths inside a group are sorted, so two runs over the
    /// same files list the same output.
    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = self
            .confirmed
            .groups()
            .into_iter()
            .map(|(key, records)| {
                let mut paths: Vec<PathBuf> = records.into_iter().map(|r| r.path).collect();
                paths.sort();
                DuplicateGroup {
                    size: key.size,
                    digest: key.digest,
                    paths,
                }
            })
            .collect();
        groups.sort_by(|a, b| {
            b.wasted_bytes()
                .cmp(&a.wasted_bytes())
                .then(b.size.cmp(&a.size))
                .then(a.digest.cmp(&b.digest))
        });
        groups
    }
}

/// Regroups prefix candidates by full-content digest.
#[derive(Clone)]
pub struct DuplicateResolver {
    hasher: ConfirmationHasher,
}

impl DuplicateResolver {
    pub fn new(hasher: ConfirmationHasher) -> Self {
        Self { hasher }
    }

    /// Hashes every record of `candidates`, which should be a pruned prefix
    /// store, into a fresh content-tier store and prunes it.
    pub fn resolve(&self, candidates: CandidateStore) -> Result<Resolution> {
        let hashed = CandidateStore::content();
        let failures = self
            .hasher
            .run(candidates.into_records(), |record| hashed.insert_record(record))?;
        let confirmed = hashed.prune();
        info!(
            "Resolved {} duplicate sets out of {} hashed files",
            confirmed.group_count(),
            hashed.file_count()
        );
        Ok(Resolution {
            hashed,
            confirmed,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_separates_same_prefix_different_content() {
        let dir = tempdir().unwrap();
        let store = CandidateStore::new(4);
        for (name, body) in [("a", "abcd-one"), ("b", "abcd-one"), ("c", "abcd-two")] {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            store.insert(&path).unwrap();
        }
        let candidates = store.prune();
        assert_eq!(candidates.file_count(), 3);

        let resolution = DuplicateResolver::new(ConfirmationHasher::new(2))
            .resolve(candidates)
            .unwrap();

        assert_eq!(resolution.hashed.file_count(), 3);
        let groups = resolution.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].paths,
            vec![dir.path().join("a"), dir.path().join("b")]
        );
        assert_eq!(resolution.stats().duplicated_bytes, 8);
    }

    #[test]
    fn test_duplicate_groups_sorted_by_waste() {
        let dir = tempdir().unwrap();
        let store = CandidateStore::new(4096);
        for (name, body) in [("s1", "x"), ("s2", "x"), ("l1", "yyyy"), ("l2", "yyyy")] {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            store.insert(&path).unwrap();
        }

        let resolution = DuplicateResolver::new(ConfirmationHasher::new(1))
            .resolve(store.prune())
            .unwrap();
        let groups = resolution.duplicate_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].size, 4);
        assert_eq!(groups[1].size, 1);
    }

    #[test]
    fn test_wasted_bytes() {
        let group = DuplicateGroup {
            size: 10,
            digest: 0,
            paths: vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")],
        };
        assert_eq!(group.wasted_bytes(), 20);
    }
}
