//! Listing, mutation and maintenance operations on the remote tree.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::api::types::RawFile;
use crate::crypto::envelope::encrypt_metadata;
use crate::crypto::hash::{hash_filename, sha512_file};

use super::node::{FileMetadata, FileNode, FolderNode, Node, ENCRYPTED_SENTINEL};
use super::{DriveClient, DriveError};

impl DriveClient {
    /// Fetch one folder's listing from the API, decrypt it, and fill both
    /// cache maps.
    async fn fetch_listing(
        &self,
        folder_uuid: &str,
    ) -> Result<(Arc<Vec<FolderNode>>, Arc<Vec<FileNode>>), DriveError> {
        let content = self.api().dir_content(folder_uuid, false).await?;

        let mut folders = Vec::with_capacity(content.folders.len());
        for raw in &content.folders {
            let name = self.decrypt_folder_name(&raw.name).unwrap_or_else(|| {
                debug!(uuid = %raw.uuid, "folder name undecryptable, keeping sentinel");
                ENCRYPTED_SENTINEL.to_string()
            });
            folders.push(FolderNode {
                uuid: raw.uuid.clone(),
                name,
                parent: raw.parent.clone(),
                timestamp: raw.timestamp,
            });
        }

        let mut files = Vec::with_capacity(content.uploads.len());
        for raw in &content.uploads {
            files.push(self.file_node_from_raw(raw));
        }

        let folders = Arc::new(folders);
        let files = Arc::new(files);
        self.cache()
            .store_listing(folder_uuid, folders.clone(), files.clone());
        Ok((folders, files))
    }

    /// Build a [`FileNode`] from the raw server record, decrypting its
    /// metadata envelope. Undecryptable entries keep the sentinel name.
    pub(crate) fn file_node_from_raw(&self, raw: &RawFile) -> FileNode {
        let meta = self.decrypt_file_metadata(&raw.metadata);
        let meta = meta.unwrap_or_else(|| {
            debug!(uuid = %raw.uuid, "file metadata undecryptable, keeping sentinel");
            FileMetadata {
                name: ENCRYPTED_SENTINEL.to_string(),
                size: 0,
                mime: String::new(),
                key: String::new(),
                hash: String::new(),
                last_modified: 0,
            }
        });
        FileNode {
            uuid: raw.uuid.clone(),
            name: meta.name,
            size: meta.size,
            mime: meta.mime,
            key: meta.key,
            hash: meta.hash,
            last_modified: meta.last_modified,
            parent: raw.parent.clone(),
            chunks: raw.chunks,
            region: raw.region.clone(),
            bucket: raw.bucket.clone(),
            timestamp: raw.timestamp,
        }
    }

    /// List child folders, served from cache within the freshness window.
    pub async fn list_folders(
        &self,
        folder_uuid: &str,
    ) -> Result<Arc<Vec<FolderNode>>, DriveError> {
        if let Some(cached) = self.cache().folders(folder_uuid) {
            return Ok(cached);
        }
        Ok(self.fetch_listing(folder_uuid).await?.0)
    }

    /// List child files, served from cache within the freshness window.
    pub async fn list_files(&self, folder_uuid: &str) -> Result<Arc<Vec<FileNode>>, DriveError> {
        if let Some(cached) = self.cache().files(folder_uuid) {
            return Ok(cached);
        }
        Ok(self.fetch_listing(folder_uuid).await?.1)
    }

    /// Fetch a single file's record by UUID and decrypt its metadata.
    pub async fn file_node(&self, uuid: &str) -> Result<FileNode, DriveError> {
        let raw = self.api().file_info(uuid).await?;
        Ok(self.file_node_from_raw(&raw))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a single folder under `parent_uuid`.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_folder(&self, name: &str, parent_uuid: &str) -> Result<(), DriveError> {
        let uuid = Uuid::new_v4().to_string();
        let master_key = self.master_key();

        let name_json = serde_json::json!({ "name": name }).to_string();
        let name_encrypted = encrypt_metadata(&name_json, master_key)?;
        let name_hashed = hash_filename(name, self.email(), master_key);

        self.api()
            .dir_create(&uuid, &name_encrypted, &name_hashed, parent_uuid)
            .await?;
        self.invalidate(parent_uuid);
        Ok(())
    }

    /// Rename a node in place. Folders re-encrypt the name JSON under the
    /// master key; files re-encrypt the bare name under the file key and the
    /// updated metadata record under the master key.
    pub async fn rename_node(&self, node: &Node, new_name: &str) -> Result<(), DriveError> {
        let master_key = self.master_key();
        let name_hashed = hash_filename(new_name, self.email(), master_key);

        match node {
            Node::Folder(folder) => {
                let name_json = serde_json::json!({ "name": new_name }).to_string();
                let name_encrypted = encrypt_metadata(&name_json, master_key)?;
                self.api()
                    .dir_rename(&folder.uuid, &name_encrypted, &name_hashed)
                    .await?;
            }
            Node::File(file) => {
                let meta = FileMetadata {
                    name: new_name.to_string(),
                    size: file.size,
                    mime: file.mime.clone(),
                    key: file.key.clone(),
                    hash: file.hash.clone(),
                    last_modified: file.last_modified,
                };
                let name_encrypted = encrypt_metadata(new_name, &file.key)?;
                let metadata_json =
                    serde_json::to_string(&meta).expect("file metadata serializes infallibly");
                let metadata_encrypted = encrypt_metadata(&metadata_json, master_key)?;
                self.api()
                    .file_rename(&file.uuid, &name_encrypted, &metadata_encrypted, &name_hashed)
                    .await?;
            }
        }

        if let Some(parent) = node.parent() {
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Move a node into another folder.
    pub async fn move_node(&self, node: &Node, to_folder_uuid: &str) -> Result<(), DriveError> {
        match node {
            Node::Folder(folder) => self.api().dir_move(&folder.uuid, to_folder_uuid).await?,
            Node::File(file) => self.api().file_move(&file.uuid, to_folder_uuid).await?,
        }
        if let Some(parent) = node.parent() {
            self.invalidate(parent);
        }
        self.invalidate(to_folder_uuid);
        Ok(())
    }

    /// Move a node to the trash.
    pub async fn trash_node(&self, node: &Node) -> Result<(), DriveError> {
        match node {
            Node::Folder(folder) => self.api().dir_trash(&folder.uuid).await?,
            Node::File(file) => self.api().file_trash(&file.uuid).await?,
        }
        if let Some(parent) = node.parent() {
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Restore a trashed node.
    pub async fn restore_node(&self, kind_is_folder: bool, uuid: &str) -> Result<(), DriveError> {
        if kind_is_folder {
            self.api().dir_restore(uuid).await?;
        } else {
            self.api().file_restore(uuid).await?;
        }
        self.cache().clear();
        Ok(())
    }

    /// Permanently delete a node. Irreversible.
    pub async fn delete_node_permanent(&self, node: &Node) -> Result<(), DriveError> {
        match node {
            Node::Folder(folder) => self.api().dir_delete_permanent(&folder.uuid).await?,
            Node::File(file) => self.api().file_delete_permanent(&file.uuid).await?,
        }
        if let Some(parent) = node.parent() {
            self.invalidate(parent);
        }
        Ok(())
    }

    // ========================================================================
    // Trash
    // ========================================================================

    /// List the trash. The server exposes it as a folder with the sentinel
    /// UUID `trash`.
    pub async fn trash_content(&self) -> Result<Vec<Node>, DriveError> {
        let content = self.api().dir_content("trash", false).await?;

        let mut nodes = Vec::new();
        for raw in &content.folders {
            let name = self
                .decrypt_folder_name(&raw.name)
                .unwrap_or_else(|| ENCRYPTED_SENTINEL.to_string());
            nodes.push(Node::Folder(FolderNode {
                uuid: raw.uuid.clone(),
                name,
                parent: raw.parent.clone(),
                timestamp: raw.timestamp,
            }));
        }
        for raw in &content.uploads {
            nodes.push(Node::File(self.file_node_from_raw(raw)));
        }
        Ok(nodes)
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Recursively find files whose name matches a shell glob, starting at
    /// `start_path`. `max_depth < 0` means unbounded.
    pub async fn find_files(
        &self,
        start_path: &str,
        pattern: &str,
        max_depth: i32,
    ) -> Result<Vec<(String, FileNode)>, DriveError> {
        let matcher = glob::Pattern::new(pattern)
            .map_err(|_| DriveError::BadPattern(pattern.to_string()))?;

        let start = super::canonical_path(start_path);
        let root = self.resolve_path(&start).await?;
        let Node::Folder(root) = root else {
            return Err(DriveError::WrongKind {
                path: start_path.to_string(),
                expected: "folder",
            });
        };

        let mut results = Vec::new();
        let mut stack: Vec<(String, String, i32)> = vec![(start, root.uuid, 0)];

        while let Some((path, uuid, depth)) = stack.pop() {
            if max_depth >= 0 && depth >= max_depth {
                continue;
            }

            match self.list_files(&uuid).await {
                Ok(files) => {
                    for file in files.iter() {
                        if matcher.matches(&file.name) {
                            let full = if path.is_empty() {
                                file.name.clone()
                            } else {
                                format!("{path}/{}", file.name)
                            };
                            results.push((format!("/{full}"), file.clone()));
                        }
                    }
                }
                Err(e) => warn!(path, error = %e, "could not list files, skipping"),
            }

            if max_depth < 0 || depth + 1 < max_depth {
                match self.list_folders(&uuid).await {
                    Ok(folders) => {
                        for folder in folders.iter() {
                            let sub = if path.is_empty() {
                                folder.name.clone()
                            } else {
                                format!("{path}/{}", folder.name)
                            };
                            stack.push((sub, folder.uuid.clone(), depth + 1));
                        }
                    }
                    Err(e) => warn!(path, error = %e, "could not list folders, skipping"),
                }
            }
        }

        Ok(results)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Compare the server-stored plaintext SHA-512 against a local file.
    ///
    /// No download happens: the hash travels inside the encrypted metadata.
    /// An empty server hash means an empty file; then only sizes are
    /// compared.
    pub async fn verify_upload(
        &self,
        file_uuid: &str,
        local_path: &std::path::Path,
    ) -> Result<bool, DriveError> {
        let node = self.file_node(file_uuid).await?;

        if node.hash.is_empty() {
            let len = std::fs::metadata(local_path)
                .map_err(|e| DriveError::Io {
                    path: local_path.to_path_buf(),
                    source: e,
                })?
                .len();
            return Ok(len == 0);
        }

        let local_hash = sha512_file(local_path).map_err(|e| DriveError::Io {
            path: local_path.to_path_buf(),
            source: e,
        })?;
        debug!(server = %node.hash, local = %local_hash, "verify digests");
        Ok(local_hash == node.hash)
    }
}
