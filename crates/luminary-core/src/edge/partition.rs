//! Named cache partitions backed by one JSON file per response.
//!
//! A partition is a directory under the cache root; an entry's file name is
//! the hex SHA-256 of its URL. There is no per-entry eviction: partitions
//! are dropped wholesale when their name stops matching the current version
//! (see activation in [`worker`](super::worker)).

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{CachedResponse, EdgeError};

/// A named, independently versioned bucket of cached HTTP responses.
#[derive(Debug, Clone)]
pub struct CachePartition {
    name: String,
    dir: PathBuf,
}

impl CachePartition {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Look up a snapshot by exact URL.
    pub fn get(&self, url: &str) -> Result<Option<CachedResponse>, EdgeError> {
        let path = self.entry_path(url);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    /// Store (or overwrite) a snapshot under its URL.
    pub fn put(&self, response: &CachedResponse) -> Result<(), EdgeError> {
        let path = self.entry_path(&response.url);
        let contents = serde_json::to_vec(response)?;
        std::fs::write(&path, contents)?;
        debug!(partition = %self.name, url = %response.url, "Cached response");
        Ok(())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entry_path(url).exists()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> Result<usize, EdgeError> {
        Ok(std::fs::read_dir(&self.dir)?.count())
    }

    pub fn is_empty(&self) -> Result<bool, EdgeError> {
        Ok(self.len()? == 0)
    }
}

/// Manages the set of partitions under one cache root directory.
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: PathBuf) -> Result<Self, EdgeError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open (creating if needed) a partition by name.
    pub fn partition(&self, name: &str) -> Result<CachePartition, EdgeError> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(CachePartition {
            name: name.to_string(),
            dir,
        })
    }

    /// Names of every partition that currently exists on disk.
    pub fn partition_names(&self) -> Result<Vec<String>, EdgeError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete a whole partition. The only invalidation granularity there is.
    pub fn delete_partition(&self, name: &str) -> Result<(), EdgeError> {
        let dir = self.root.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn response(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: 200,
            headers: vec![],
            body: body.to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().to_path_buf()).unwrap();
        let partition = store.partition("luminary-study-v1").unwrap();

        assert!(partition.get("/index.html").unwrap().is_none());
        partition.put(&response("/index.html", b"<html>")).unwrap();

        let cached = partition.get("/index.html").unwrap().unwrap();
        assert_eq!(cached.body, b"<html>");
        assert!(partition.contains("/index.html"));
        assert_eq!(partition.len().unwrap(), 1);
    }

    #[test]
    fn test_put_overwrites_same_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().to_path_buf()).unwrap();
        let partition = store.partition("luminary-study-v1").unwrap();

        partition.put(&response("/app.js", b"v1")).unwrap();
        partition.put(&response("/app.js", b"v2")).unwrap();
        assert_eq!(partition.len().unwrap(), 1);
        assert_eq!(partition.get("/app.js").unwrap().unwrap().body, b"v2");
    }

    #[test]
    fn test_partitions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().to_path_buf()).unwrap();
        let static_partition = store.partition("luminary-study-v1").unwrap();
        let offline = store.partition("luminary-offline-v1").unwrap();

        static_partition.put(&response("/a", b"a")).unwrap();
        assert!(offline.get("/a").unwrap().is_none());
    }

    #[test]
    fn test_delete_partition() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path().to_path_buf()).unwrap();
        store.partition("luminary-study-v0").unwrap();
        store.partition("luminary-study-v1").unwrap();

        store.delete_partition("luminary-study-v0").unwrap();
        assert_eq!(store.partition_names().unwrap(), vec!["luminary-study-v1"]);
        // Deleting a partition that is already gone is fine.
        store.delete_partition("luminary-study-v0").unwrap();
    }
}
