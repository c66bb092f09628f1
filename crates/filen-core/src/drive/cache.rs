//! Listing and path-resolution caches.
//!
//! Two maps keyed by folder UUID (child folders, child files) with a
//! 10-minute freshness window, plus a derived map from canonical path
//! strings to resolved nodes. Invalidation is deliberately coarse: any
//! mutation through a folder drops that folder's two entries and wipes the
//! entire path cache. Partial path invalidation is tempting but unsound
//! under renames.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;

use super::node::{FileNode, FolderNode, Node};

/// Freshness window for listing entries.
pub const LISTING_TTL: Duration = Duration::from_secs(600);

/// Maximum cached folders; listings beyond this just refetch.
const MAX_ENTRIES: u64 = 16_384;

/// Thread-safe TTL caches shared by every accessor of a [`super::DriveClient`].
pub struct ListingCache {
    folders: Cache<String, Arc<Vec<FolderNode>>>,
    files: Cache<String, Arc<Vec<FileNode>>>,
    paths: Cache<String, Node>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::with_ttl(LISTING_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            folders: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            files: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            paths: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn folders(&self, folder_uuid: &str) -> Option<Arc<Vec<FolderNode>>> {
        self.folders.get(folder_uuid)
    }

    pub fn files(&self, folder_uuid: &str) -> Option<Arc<Vec<FileNode>>> {
        self.files.get(folder_uuid)
    }

    pub fn store_listing(
        &self,
        folder_uuid: &str,
        folders: Arc<Vec<FolderNode>>,
        files: Arc<Vec<FileNode>>,
    ) {
        self.folders.insert(folder_uuid.to_string(), folders);
        self.files.insert(folder_uuid.to_string(), files);
    }

    pub fn path(&self, canonical: &str) -> Option<Node> {
        self.paths.get(canonical)
    }

    pub fn store_path(&self, canonical: &str, node: Node) {
        self.paths.insert(canonical.to_string(), node);
    }

    /// Drop the listing entries for one folder and wipe the whole path
    /// cache. Called after every mutation through that folder.
    pub fn invalidate_folder(&self, folder_uuid: &str) {
        self.folders.invalidate(folder_uuid);
        self.files.invalidate(folder_uuid);
        self.paths.invalidate_all();
        debug!(folder_uuid, "listing cache invalidated");
    }

    /// Drop everything. Used when the identity behind the cache changes.
    pub fn clear(&self) {
        self.folders.invalidate_all();
        self.files.invalidate_all();
        self.paths.invalidate_all();
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::node::FolderNode;

    fn folder(uuid: &str, name: &str) -> FolderNode {
        FolderNode {
            uuid: uuid.into(),
            name: name.into(),
            parent: None,
            timestamp: 0,
        }
    }

    #[test]
    fn listing_round_trip() {
        let cache = ListingCache::new();
        assert!(cache.folders("f1").is_none());

        cache.store_listing(
            "f1",
            Arc::new(vec![folder("c1", "docs")]),
            Arc::new(Vec::new()),
        );
        let folders = cache.folders("f1").unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "docs");
        assert!(cache.files("f1").unwrap().is_empty());
    }

    #[test]
    fn folder_invalidation_wipes_all_paths() {
        let cache = ListingCache::new();
        cache.store_listing("f1", Arc::new(Vec::new()), Arc::new(Vec::new()));
        cache.store_listing("f2", Arc::new(Vec::new()), Arc::new(Vec::new()));
        cache.store_path("a/b", Node::Folder(folder("c1", "b")));
        cache.store_path("x/y", Node::Folder(folder("c2", "y")));

        cache.invalidate_folder("f1");
        // moka invalidate_all applies on next read; run pending tasks first.
        cache.paths.run_pending_tasks();

        assert!(cache.folders("f1").is_none());
        assert!(cache.folders("f2").is_some(), "other folders stay cached");
        assert!(cache.path("a/b").is_none());
        assert!(cache.path("x/y").is_none(), "entire path cache is wiped");
    }

    #[test]
    fn expired_entries_are_refetched() {
        let cache = ListingCache::with_ttl(Duration::from_millis(10));
        cache.store_listing("f1", Arc::new(Vec::new()), Arc::new(Vec::new()));
        assert!(cache.folders("f1").is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.folders("f1").is_none(), "entry older than TTL is stale");
    }
}
