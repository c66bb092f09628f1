//! `DavFileSystem` implementation over the remote drive.

use std::sync::Arc;

use dav_server::davpath::DavPath;
use dav_server::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, FsError, FsFuture, FsStream, OpenOptions,
    ReadDirMeta,
};
use filen_core::drive::{base_name, canonical_path, parent_path, DriveClient, DriveError, Node};
use filen_core::transfer::RemoteFileReader;
use futures::stream;
use tracing::{debug, instrument, trace, warn};

use crate::error::{drive_error_to_fs_error, transfer_error_to_fs_error};
use crate::file::FilenDavFile;
use crate::metadata::FilenMetaData;

/// WebDAV filesystem backed by the encrypted drive.
///
/// Clones share the drive client (and with it the listing caches); each
/// request handler clones its own handle so request state never crosses
/// HTTP requests.
#[derive(Clone)]
pub struct FilenDavFs {
    drive: Arc<DriveClient>,
}

/// One directory listing entry.
struct FilenDirEntry {
    name: String,
    meta: FilenMetaData,
}

impl DavDirEntry for FilenDirEntry {
    fn name(&self) -> Vec<u8> {
        self.name.clone().into_bytes()
    }

    fn metadata(&self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        let meta = self.meta.clone();
        Box::pin(async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) })
    }
}

impl FilenDavFs {
    pub fn new(drive: Arc<DriveClient>) -> Self {
        Self { drive }
    }

    /// Normalize a WebDAV path to the drive's canonical form (no leading or
    /// trailing slash; empty string for the root).
    fn parse_path(path: &DavPath) -> String {
        let raw = path.as_url_string();
        let normalized = canonical_path(&raw);
        trace!(raw = %raw, normalized = %normalized, "parse_path");
        normalized
    }

    async fn resolve(&self, vault_path: &str) -> Result<Node, FsError> {
        if vault_path.is_empty() {
            return Ok(self.drive.root_node());
        }
        self.drive
            .resolve_path(vault_path)
            .await
            .map_err(|e| match e {
                DriveError::NotFound { .. } => FsError::NotFound,
                other => drive_error_to_fs_error(other),
            })
    }
}

impl DavFileSystem for FilenDavFs {
    #[instrument(level = "debug", skip(self, options), fields(path = %path.as_url_string()))]
    fn open<'a>(
        &'a self,
        path: &'a DavPath,
        options: OpenOptions,
    ) -> FsFuture<'a, Box<dyn DavFile>> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            debug!(path = %remote_path, ?options, "opening file");

            if options.write || options.create || options.create_new || options.truncate {
                // Write mode: find what (if anything) currently occupies the
                // path, then buffer into a temp sink.
                let existing = match self.resolve(&remote_path).await {
                    Ok(Node::File(file)) => Some(file),
                    Ok(Node::Folder(_)) => return Err(FsError::Forbidden),
                    Err(FsError::NotFound) => None,
                    Err(e) => return Err(e),
                };

                if options.create_new && existing.is_some() {
                    return Err(FsError::Exists);
                }
                if existing.is_none() && !(options.create || options.create_new) {
                    return Err(FsError::NotFound);
                }

                let name = base_name(&remote_path);
                if name.is_empty() {
                    return Err(FsError::Forbidden);
                }

                let start_dirty = existing.is_none() || options.truncate;
                let file = FilenDavFile::writer(
                    self.drive.clone(),
                    remote_path,
                    name,
                    existing.map(|f| f.uuid),
                    start_dirty,
                )?;
                Ok(Box::new(file) as Box<dyn DavFile>)
            } else {
                // Read mode: a seekable decrypted stream over the remote
                // chunks. Nothing is fetched until the first read.
                match self.resolve(&remote_path).await? {
                    Node::File(file) => {
                        let reader = RemoteFileReader::new(self.drive.clone(), file)
                            .map_err(transfer_error_to_fs_error)?;
                        Ok(Box::new(FilenDavFile::reader(reader)) as Box<dyn DavFile>)
                    }
                    Node::Folder(_) => Err(FsError::Forbidden),
                }
            }
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        _meta: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            debug!(path = %remote_path, "reading directory");

            let node = self.resolve(&remote_path).await?;
            let Node::Folder(folder) = node else {
                return Err(FsError::Forbidden);
            };

            let folders = self
                .drive
                .list_folders(&folder.uuid)
                .await
                .map_err(drive_error_to_fs_error)?;
            let files = self
                .drive
                .list_files(&folder.uuid)
                .await
                .map_err(drive_error_to_fs_error)?;

            let mut entries: Vec<Box<dyn DavDirEntry>> = Vec::new();
            for child in folders.iter() {
                entries.push(Box::new(FilenDirEntry {
                    name: child.name.clone(),
                    meta: FilenMetaData::from_folder(child),
                }));
            }
            for child in files.iter() {
                entries.push(Box::new(FilenDirEntry {
                    name: child.name.clone(),
                    meta: FilenMetaData::from_file(child),
                }));
            }

            trace!(count = entries.len(), "directory entries");
            Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))) as FsStream<_>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            if remote_path.is_empty() {
                return Ok(Box::new(FilenMetaData::root()) as Box<dyn DavMetaData>);
            }
            let node = self.resolve(&remote_path).await?;
            Ok(Box::new(FilenMetaData::from_node(&node)) as Box<dyn DavMetaData>)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            debug!(path = %remote_path, "creating collection");

            // MKCOL on an existing resource is 405.
            if self.resolve(&remote_path).await.is_ok() {
                return Err(FsError::Exists);
            }

            let parent = self
                .drive
                .resolve_folder(&parent_path(&remote_path))
                .await
                .map_err(|e| match e {
                    DriveError::NotFound { .. } => FsError::NotFound,
                    other => drive_error_to_fs_error(other),
                })?;

            let name = base_name(&remote_path);
            if name.is_empty() {
                return Err(FsError::Forbidden);
            }

            self.drive
                .create_folder(&name, &parent.uuid)
                .await
                .map_err(drive_error_to_fs_error)
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            if remote_path.is_empty() {
                warn!("refusing to delete the root collection");
                return Err(FsError::Forbidden);
            }

            match self.resolve(&remote_path).await? {
                node @ Node::Folder(_) => self
                    .drive
                    .trash_node(&node)
                    .await
                    .map_err(drive_error_to_fs_error),
                Node::File(_) => Err(FsError::Forbidden),
            }
        })
    }

    #[instrument(level = "debug", skip(self), fields(path = %path.as_url_string()))]
    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let remote_path = Self::parse_path(path);
            match self.resolve(&remote_path).await? {
                node @ Node::File(_) => self
                    .drive
                    .trash_node(&node)
                    .await
                    .map_err(drive_error_to_fs_error),
                Node::Folder(_) => Err(FsError::Forbidden),
            }
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let from_path = Self::parse_path(from);
            let to_path = Self::parse_path(to);
            if from_path.is_empty() {
                return Err(FsError::Forbidden);
            }
            debug!(from = %from_path, to = %to_path, "moving node");

            let node = self.resolve(&from_path).await?;
            let dest_parent = self
                .drive
                .resolve_folder(&parent_path(&to_path))
                .await
                .map_err(|e| match e {
                    DriveError::NotFound { .. } => FsError::NotFound,
                    other => drive_error_to_fs_error(other),
                })?;

            // Server-side move, plus a rename when the leaf name changed.
            if node.parent() != Some(dest_parent.uuid.as_str()) {
                self.drive
                    .move_node(&node, &dest_parent.uuid)
                    .await
                    .map_err(drive_error_to_fs_error)?;
            }

            let new_name = base_name(&to_path);
            if !new_name.is_empty() && new_name != node.name() {
                self.drive
                    .rename_node(&node, &new_name)
                    .await
                    .map_err(drive_error_to_fs_error)?;
            }

            Ok(())
        })
    }

    #[instrument(level = "debug", skip(self), fields(from = %from.as_url_string(), to = %to.as_url_string()))]
    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        Box::pin(async move {
            let from_path = Self::parse_path(from);
            let to_path = Self::parse_path(to);
            debug!(from = %from_path, to = %to_path, "copying file");

            let node = self.resolve(&from_path).await?;
            let Node::File(file) = node else {
                // There is no server-side copy, and no folder copy at all.
                return Err(FsError::NotImplemented);
            };

            let dest_parent = self
                .drive
                .resolve_folder(&parent_path(&to_path))
                .await
                .map_err(|e| match e {
                    DriveError::NotFound { .. } => FsError::NotFound,
                    other => drive_error_to_fs_error(other),
                })?;

            let new_name = base_name(&to_path);
            let new_name = if new_name.is_empty() {
                None
            } else {
                Some(new_name)
            };

            // Copy is download-then-reupload by definition.
            self.drive
                .copy_file(&file, &dest_parent.uuid, new_name.as_deref())
                .await
                .map(|_| ())
                .map_err(transfer_error_to_fs_error)
        })
    }
}
