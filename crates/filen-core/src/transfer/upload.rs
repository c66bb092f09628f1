//! Chunked upload with durable resume.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha512};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::crypto::bulk::encrypt_chunk;
use crate::crypto::envelope::encrypt_metadata;
use crate::crypto::hash::{hash_filename, sha512_hex};
use crate::crypto::random_token;
use crate::drive::{DriveClient, FileMetadata};

use super::{chunk_count, ResumeState, TransferError, CHUNK_SIZE, DEFAULT_MIME};

/// One upload invocation.
pub struct UploadRequest<'a> {
    pub local_path: &'a Path,
    pub parent_uuid: &'a str,
    /// Name to record remotely. The CLI passes the local basename; WebDAV
    /// passes the request's target name.
    pub remote_name: &'a str,
    /// Session to resume, if a previous attempt was interrupted.
    pub resume: Option<ResumeState>,
    /// Record the local mtime instead of "now" as `lastModified`.
    pub preserve_timestamps: bool,
}

/// Progress notifications during an upload.
///
/// `Session` fires once, before the first chunk of a fresh session, carrying
/// the coordinates the orchestrator must persist for resume. `Chunk` fires
/// after each accepted chunk.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Session {
        file_uuid: String,
        upload_key: String,
    },
    Chunk {
        /// Index of the chunk just accepted.
        index: u64,
        total: u64,
        bytes_done: u64,
        bytes_total: u64,
    },
}

/// A finished upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub uuid: String,
    /// Plaintext SHA-512, empty for the empty file.
    pub hash: String,
    pub size: u64,
}

/// How an upload attempt ended, short of a hard error.
///
/// Interruption is data, not an exception: the orchestrator pattern-matches
/// and commits the resume coordinates to the batch state.
#[derive(Debug)]
pub enum UploadOutcome {
    Completed(UploadReceipt),
    Interrupted(ResumeState),
}

/// Fill `buf` from `file`, tolerating short reads. Returns bytes read; less
/// than `buf.len()` only at EOF.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn mtime_millis(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

impl DriveClient {
    /// Upload one local file in 1 MiB chunks.
    ///
    /// Chunks go out strictly in index order. When a chunk PUT fails after
    /// the wire client's own retries, the attempt ends with
    /// [`UploadOutcome::Interrupted`] carrying `(fileUuid, uploadKey,
    /// lastSuccessfulChunk)` - the resume contract. A later call with that
    /// state re-reads the already-accepted chunks through the SHA-512 hasher
    /// only (the final hash must cover the whole plaintext) and resumes the
    /// network at the failed index.
    #[instrument(level = "debug", skip(self, request, on_event), fields(path = %request.local_path.display()))]
    pub async fn upload_file(
        &self,
        request: UploadRequest<'_>,
        on_event: &mut (dyn FnMut(UploadEvent) + Send),
    ) -> Result<UploadOutcome, TransferError> {
        let path = request.local_path;
        let file_size = std::fs::metadata(path)
            .map_err(|e| TransferError::io(path, e))?
            .len();

        let uuid = request
            .resume
            .as_ref()
            .map(|r| r.file_uuid.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let master_key = self.master_key().to_string();
        let file_key = random_token(32);
        let file_key_bytes: [u8; 32] = file_key
            .as_bytes()
            .try_into()
            .expect("random_token(32) is 32 ASCII bytes");

        let last_modified = if request.preserve_timestamps {
            mtime_millis(path).unwrap_or_else(now_millis)
        } else {
            now_millis()
        };

        // Empty files bypass the chunk pipeline entirely.
        if file_size == 0 {
            debug!(name = request.remote_name, "uploading empty file");
            self.finalize_empty(
                &uuid,
                request.remote_name,
                request.parent_uuid,
                &file_key,
                &master_key,
                last_modified,
            )
            .await?;
            return Ok(UploadOutcome::Completed(UploadReceipt {
                uuid,
                hash: String::new(),
                size: 0,
            }));
        }

        let upload_key = request
            .resume
            .as_ref()
            .map(|r| r.upload_key.clone())
            .unwrap_or_else(|| random_token(32));
        let resume_from = request.resume.as_ref().map_or(0, ResumeState::next_chunk);
        let total_chunks = chunk_count(file_size);

        if resume_from == 0 {
            on_event(UploadEvent::Session {
                file_uuid: uuid.clone(),
                upload_key: upload_key.clone(),
            });
            debug!(%uuid, total_chunks, "starting upload");
        } else {
            info!(%uuid, resume_from, total_chunks, "resuming upload");
        }

        let mut file = File::open(path).map_err(|e| TransferError::io(path, e))?;
        let mut hasher = Sha512::new();
        let mut buf = vec![0u8; CHUNK_SIZE as usize];

        // Re-hash the chunks the server already holds; they are neither
        // re-encrypted nor re-sent.
        for _ in 0..resume_from {
            let n = read_full(&mut file, &mut buf).map_err(|e| TransferError::io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let mut index = resume_from;
        loop {
            let n = read_full(&mut file, &mut buf).map_err(|e| TransferError::io(path, e))?;
            if n == 0 {
                break;
            }
            let plaintext = &buf[..n];
            hasher.update(plaintext);

            let sealed = encrypt_chunk(plaintext, &file_key_bytes)?;
            let chunk_hash = sha512_hex(&sealed);

            let result = self
                .api()
                .upload_chunk(
                    &uuid,
                    index,
                    request.parent_uuid,
                    &upload_key,
                    &chunk_hash,
                    sealed,
                )
                .await;

            if let Err(e) = result {
                warn!(%uuid, index, error = %e, "chunk rejected, recording resume point");
                return Ok(UploadOutcome::Interrupted(ResumeState {
                    file_uuid: uuid,
                    upload_key,
                    last_chunk: index as i64 - 1,
                }));
            }

            on_event(UploadEvent::Chunk {
                index,
                total: total_chunks,
                bytes_done: ((index + 1) * CHUNK_SIZE).min(file_size),
                bytes_total: file_size,
            });
            index += 1;
        }

        let total_hash = hex::encode(hasher.finalize());

        let metadata = FileMetadata {
            name: request.remote_name.to_string(),
            size: file_size,
            mime: DEFAULT_MIME.to_string(),
            key: file_key.clone(),
            hash: total_hash.clone(),
            last_modified,
        };
        let metadata_json =
            serde_json::to_string(&metadata).expect("file metadata serializes infallibly");

        let name_encrypted = encrypt_metadata(request.remote_name, &file_key)?;
        let size_encrypted = encrypt_metadata(&file_size.to_string(), &file_key)?;
        let mime_encrypted = encrypt_metadata(DEFAULT_MIME, &file_key)?;
        let metadata_encrypted = encrypt_metadata(&metadata_json, &master_key)?;
        let name_hashed = hash_filename(request.remote_name, self.email(), &master_key);

        // Server-side role of `rm` is not observable; the contract is just
        // "random, per finalize".
        let rm = random_token(32);

        self.api()
            .upload_done(
                &uuid,
                &name_encrypted,
                &name_hashed,
                &size_encrypted,
                index,
                &mime_encrypted,
                &metadata_encrypted,
                &upload_key,
                &rm,
            )
            .await?;

        self.invalidate(request.parent_uuid);
        info!(%uuid, chunks = index, size = file_size, "upload complete");

        Ok(UploadOutcome::Completed(UploadReceipt {
            uuid,
            hash: total_hash,
            size: file_size,
        }))
    }

    async fn finalize_empty(
        &self,
        uuid: &str,
        name: &str,
        parent_uuid: &str,
        file_key: &str,
        master_key: &str,
        last_modified: i64,
    ) -> Result<(), TransferError> {
        let metadata = FileMetadata {
            name: name.to_string(),
            size: 0,
            mime: DEFAULT_MIME.to_string(),
            key: file_key.to_string(),
            hash: String::new(),
            last_modified,
        };
        let metadata_json =
            serde_json::to_string(&metadata).expect("file metadata serializes infallibly");

        let name_encrypted = encrypt_metadata(name, file_key)?;
        let size_encrypted = encrypt_metadata("0", file_key)?;
        let mime_encrypted = encrypt_metadata(DEFAULT_MIME, file_key)?;
        let metadata_encrypted = encrypt_metadata(&metadata_json, master_key)?;
        let name_hashed = hash_filename(name, self.email(), master_key);

        self.api()
            .upload_empty(
                uuid,
                &name_encrypted,
                &name_hashed,
                &size_encrypted,
                parent_uuid,
                &mime_encrypted,
                &metadata_encrypted,
            )
            .await?;

        self.invalidate(parent_uuid);
        Ok(())
    }
}
