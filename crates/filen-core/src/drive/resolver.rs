//! Path traversal over the UUID-addressed tree.

use tokio::time::{sleep, Duration};
use tracing::{debug, instrument, trace};

use crate::api::ApiError;

use super::node::{FolderNode, Node};
use super::{canonical_path, path_segments, DriveClient, DriveError};

impl DriveClient {
    /// Resolve a `/`-separated path to a node.
    ///
    /// Non-terminal segments must match folders. On the last segment a
    /// folder match wins over a file with the same name (the pathological
    /// duplicate case). Failures carry the deepest prefix that resolved.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve_path(&self, path: &str) -> Result<Node, DriveError> {
        let canonical = canonical_path(path);
        if canonical.is_empty() {
            return Ok(self.root_node());
        }

        if let Some(node) = self.cache().path(&canonical) {
            trace!(path = %canonical, "path cache hit");
            return Ok(node);
        }

        let segments = path_segments(&canonical);
        let mut current_uuid = self.base_folder_uuid().to_string();

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();

            let folders = self.list_folders(&current_uuid).await?;
            let folder_match = folders.iter().find(|f| f.name == *segment).cloned();

            if is_last {
                // Folder wins a name tie; a file only resolves terminally.
                if let Some(folder) = folder_match {
                    let node = Node::Folder(folder);
                    self.cache().store_path(&canonical, node.clone());
                    return Ok(node);
                }
                let files = self.list_files(&current_uuid).await?;
                if let Some(file) = files.iter().find(|f| f.name == *segment).cloned() {
                    let node = Node::File(file);
                    self.cache().store_path(&canonical, node.clone());
                    return Ok(node);
                }
            } else if let Some(folder) = folder_match {
                current_uuid = folder.uuid;
                continue;
            }

            return Err(DriveError::NotFound {
                partial: format!("/{}", segments[..=i].join("/")),
            });
        }

        // Every segment consumed the `continue` branch or returned.
        Err(DriveError::NotFound {
            partial: format!("/{canonical}"),
        })
    }

    /// Resolve a path that must be a folder.
    pub async fn resolve_folder(&self, path: &str) -> Result<FolderNode, DriveError> {
        match self.resolve_path(path).await? {
            Node::Folder(folder) => Ok(folder),
            Node::File(_) => Err(DriveError::WrongKind {
                path: path.to_string(),
                expected: "folder",
            }),
        }
    }

    /// Walk `path`, creating any missing folders, and return the leaf.
    ///
    /// Existing children are reused by name. A 409 from the server means a
    /// concurrent creator won the race: sleep a second, drop the cached
    /// listing, and adopt whatever is there now.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_folder_recursive(&self, path: &str) -> Result<FolderNode, DriveError> {
        let canonical = canonical_path(path);
        let root = FolderNode {
            uuid: self.base_folder_uuid().to_string(),
            name: String::new(),
            parent: None,
            timestamp: 0,
        };
        if canonical.is_empty() {
            return Ok(root);
        }

        let mut current = root;
        let mut walked = String::new();

        for segment in path_segments(&canonical) {
            if walked.is_empty() {
                walked.push_str(segment);
            } else {
                walked.push('/');
                walked.push_str(segment);
            }

            if let Some(Node::Folder(folder)) = self.cache().path(&walked) {
                trace!(path = %walked, "folder path cache hit");
                current = folder;
                continue;
            }

            let folders = self.list_folders(&current.uuid).await?;
            if let Some(found) = folders.iter().find(|f| f.name == *segment).cloned() {
                self.cache()
                    .store_path(&walked, Node::Folder(found.clone()));
                current = found;
                continue;
            }

            debug!(segment, parent = %current.uuid, "creating missing folder");
            match self.create_folder(segment, &current.uuid).await {
                Ok(()) => {}
                Err(DriveError::Api(ApiError::Conflict { .. })) => {
                    debug!(segment, "folder creation raced, refetching");
                    sleep(Duration::from_secs(1)).await;
                    self.invalidate(&current.uuid);
                }
                Err(e) => return Err(e),
            }

            // The create already invalidated the parent; this refetch sees
            // the new child (freshness over staleness).
            let folders = self.list_folders(&current.uuid).await?;
            let created = folders
                .iter()
                .find(|f| f.name == *segment)
                .cloned()
                .ok_or_else(|| DriveError::CreatedFolderMissing {
                    name: segment.to_string(),
                })?;

            self.cache()
                .store_path(&walked, Node::Folder(created.clone()));
            current = created;
        }

        Ok(current)
    }
}
