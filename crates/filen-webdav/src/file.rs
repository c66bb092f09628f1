//! WebDAV file handles: streaming reads and temp-file-buffered writes.

use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use dav_server::fs::{DavFile, DavMetaData, FsError, FsFuture};
use filen_core::drive::{parent_path, DriveClient};
use filen_core::transfer::{RemoteFileReader, UploadOutcome, UploadRequest};
use tracing::{debug, warn};

use crate::error::{drive_error_to_fs_error, transfer_error_to_fs_error};
use crate::metadata::FilenMetaData;

/// A file handle for one WebDAV request.
///
/// - **Reader** (GET): a seekable decrypted stream over the remote file.
///   Only whole chunks cross the wire; byte ranges are served from memory.
/// - **Writer** (PUT): bytes land in a private temp file; the encrypted
///   upload happens on `flush`. If the path already existed, the old UUID is
///   trashed first - from the client's view the overwrite is atomic, server
///   side it is trash-then-create.
pub enum FilenDavFile {
    Reader(ReaderHandle),
    Writer(WriterHandle),
}

pub struct ReaderHandle {
    reader: RemoteFileReader,
    name: String,
}

pub struct WriterHandle {
    drive: Arc<DriveClient>,
    /// Temp sink; owns the backing file until flush.
    temp: tempfile::NamedTempFile,
    /// Canonical remote path being written.
    remote_path: String,
    name: String,
    /// UUID of the entry previously at this path, trashed on flush.
    existing_uuid: Option<String>,
    position: u64,
    dirty: bool,
    uploaded: bool,
}

impl FilenDavFile {
    pub fn reader(reader: RemoteFileReader) -> Self {
        let name = reader.file().name.clone();
        FilenDavFile::Reader(ReaderHandle { reader, name })
    }

    /// `start_dirty` marks the buffer as needing a flush even with no bytes
    /// written - that is how zero-byte PUTs and truncations materialize
    /// empty files.
    pub fn writer(
        drive: Arc<DriveClient>,
        remote_path: String,
        name: String,
        existing_uuid: Option<String>,
        start_dirty: bool,
    ) -> Result<Self, FsError> {
        let temp = tempfile::NamedTempFile::new().map_err(|e| {
            warn!(error = %e, "could not create upload temp file");
            FsError::GeneralFailure
        })?;
        Ok(FilenDavFile::Writer(WriterHandle {
            drive,
            temp,
            remote_path,
            name,
            existing_uuid,
            position: 0,
            dirty: start_dirty,
            uploaded: false,
        }))
    }
}

impl std::fmt::Debug for FilenDavFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilenDavFile::Reader(h) => f
                .debug_struct("FilenDavFile::Reader")
                .field("name", &h.name)
                .field("position", &h.reader.position())
                .field("size", &h.reader.size())
                .finish(),
            FilenDavFile::Writer(h) => f
                .debug_struct("FilenDavFile::Writer")
                .field("name", &h.name)
                .field("remote_path", &h.remote_path)
                .field("position", &h.position)
                .finish(),
        }
    }
}

impl WriterHandle {
    fn len(&self) -> u64 {
        self.temp
            .as_file()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Upload the buffered bytes to the drive. Runs at most once.
    async fn upload(&mut self) -> Result<(), FsError> {
        if self.uploaded || !self.dirty {
            return Ok(());
        }

        self.temp.as_file_mut().flush().map_err(|e| {
            warn!(error = %e, "temp flush failed");
            FsError::GeneralFailure
        })?;

        let parent = self
            .drive
            .resolve_folder(&parent_path(&self.remote_path))
            .await
            .map_err(drive_error_to_fs_error)?;

        // Overwrite = trash the old entry, then create the new one.
        if let Some(old_uuid) = self.existing_uuid.take() {
            debug!(path = %self.remote_path, %old_uuid, "trashing overwritten file");
            if let Err(e) = self.drive.api().file_trash(&old_uuid).await {
                warn!(%old_uuid, error = %e, "failed to trash previous version");
            }
        }

        let temp_path: PathBuf = self.temp.path().to_path_buf();
        let request = UploadRequest {
            local_path: &temp_path,
            parent_uuid: &parent.uuid,
            remote_name: &self.name,
            resume: None,
            preserve_timestamps: true,
        };

        debug!(path = %self.remote_path, size = self.len(), "flushing write buffer to drive");
        let outcome = self
            .drive
            .upload_file(request, &mut |_| {})
            .await
            .map_err(transfer_error_to_fs_error)?;

        match outcome {
            UploadOutcome::Completed(receipt) => {
                debug!(path = %self.remote_path, uuid = %receipt.uuid, "write flushed");
                self.uploaded = true;
                self.drive.invalidate(&parent.uuid);
                Ok(())
            }
            // A PUT has no resume surface; an interrupted upload is an error
            // to the HTTP client, which will retry the whole request.
            UploadOutcome::Interrupted(state) => {
                warn!(path = %self.remote_path, last_chunk = state.last_chunk, "PUT upload interrupted");
                Err(FsError::GeneralFailure)
            }
        }
    }
}

impl DavFile for FilenDavFile {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        Box::pin(async move {
            let meta = match self {
                FilenDavFile::Reader(h) => FilenMetaData::from_file(h.reader.file()),
                FilenDavFile::Writer(h) => {
                    FilenMetaData::file_with_size(h.name.clone(), h.len())
                }
            };
            Ok(Box::new(meta) as Box<dyn DavMetaData>)
        })
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes> {
        Box::pin(async move {
            match self {
                FilenDavFile::Reader(h) => h.reader.read(count).await.map_err(|e| {
                    warn!(name = %h.name, error = %e, "streaming read failed");
                    transfer_error_to_fs_error(e)
                }),
                FilenDavFile::Writer(_) => Err(FsError::Forbidden),
            }
        })
    }

    fn write_bytes(&mut self, buf: Bytes) -> FsFuture<'_, ()> {
        Box::pin(async move {
            match self {
                FilenDavFile::Reader(_) => Err(FsError::Forbidden),
                FilenDavFile::Writer(h) => {
                    let file = h.temp.as_file_mut();
                    file.seek(SeekFrom::Start(h.position))
                        .and_then(|_| file.write_all(&buf))
                        .map_err(|e| {
                            warn!(error = %e, "temp write failed");
                            FsError::GeneralFailure
                        })?;
                    h.position += buf.len() as u64;
                    h.dirty = true;
                    Ok(())
                }
            }
        })
    }

    fn write_buf(&mut self, mut buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()> {
        Box::pin(async move {
            let bytes = buf.copy_to_bytes(buf.remaining());
            self.write_bytes(bytes).await
        })
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        Box::pin(async move {
            match self {
                FilenDavFile::Reader(h) => Ok(h.reader.seek(pos)),
                FilenDavFile::Writer(h) => {
                    let (base, offset) = match pos {
                        SeekFrom::Start(n) => (0i64, n as i64),
                        SeekFrom::End(n) => (h.len() as i64, n),
                        SeekFrom::Current(n) => (h.position as i64, n),
                    };
                    h.position = (base + offset).max(0) as u64;
                    Ok(h.position)
                }
            }
        })
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        Box::pin(async move {
            match self {
                FilenDavFile::Reader(_) => Ok(()),
                FilenDavFile::Writer(h) => h.upload().await,
            }
        })
    }
}
