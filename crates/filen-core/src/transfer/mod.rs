//! Chunked transfer engine: resumable upload, sequential download, and a
//! seekable decrypted reader.
//!
//! Files move over the wire in fixed 1 MiB plaintext chunks, each sealed
//! independently (`nonce12 ‖ ct ‖ tag16`). Chunk indices are strictly
//! sequential per file: the resume model is "last successful chunk", which
//! requires monotone progress, so per-file chunk parallelism is deliberately
//! absent.

mod download;
mod stream;
mod upload;

pub use download::apply_timestamp;
pub use stream::RemoteFileReader;
pub use upload::{UploadEvent, UploadOutcome, UploadReceipt, UploadRequest};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ApiError;
use crate::crypto::CryptoError;
use crate::drive::{DriveClient, DriveError, FileNode};

/// Fixed plaintext chunk size: 1 MiB. The unit of network transfer and GCM
/// sealing; must match the server exactly.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Default MIME recorded for uploads unless the caller overrides it.
pub const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error("local IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's content key is unusable in either of its known encodings.
    #[error("file {uuid} has no usable content key")]
    BadFileKey { uuid: String },
}

impl TransferError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Resume coordinates for an interrupted upload. Persisted verbatim into the
/// batch state (`fileUuid`, `uploadKey`, `lastChunk`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub file_uuid: String,
    pub upload_key: String,
    /// Index of the last chunk the server accepted; `-1` when none were.
    pub last_chunk: i64,
}

impl ResumeState {
    /// First chunk index the next attempt should send.
    pub fn next_chunk(&self) -> u64 {
        (self.last_chunk + 1).max(0) as u64
    }
}

/// Decode a file's content key.
///
/// Current files carry a 32-character ASCII token whose UTF-8 bytes are the
/// AES key; some legacy entries base64-encode the 32 raw bytes instead.
pub(crate) fn file_key_bytes(file: &FileNode) -> Result<[u8; 32], TransferError> {
    if let Some(key) = file.key_bytes() {
        return Ok(key);
    }
    if let Ok(decoded) = BASE64.decode(&file.key) {
        if let Ok(key) = <[u8; 32]>::try_from(decoded.as_slice()) {
            return Ok(key);
        }
    }
    Err(TransferError::BadFileKey {
        uuid: file.uuid.clone(),
    })
}

/// Total chunk count for a plaintext size.
pub fn chunk_count(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE)
}

impl DriveClient {
    /// Copy a file by downloading it and re-uploading it into the
    /// destination folder. There is no server-side copy; this is the copy.
    /// Folders are not copyable.
    pub async fn copy_file(
        &self,
        src: &FileNode,
        dest_folder_uuid: &str,
        new_name: Option<&str>,
    ) -> Result<UploadReceipt, TransferError> {
        let target_name = new_name.unwrap_or(&src.name);

        let tmp = tempfile::tempdir().map_err(|e| TransferError::io(std::path::Path::new("."), e))?;
        let local = tmp.path().join("copy.bin");

        self.download_to_path(src, &local, &mut |_, _| {}).await?;

        let request = UploadRequest {
            local_path: &local,
            parent_uuid: dest_folder_uuid,
            remote_name: target_name,
            resume: None,
            preserve_timestamps: false,
        };
        match self.upload_file(request, &mut |_| {}).await? {
            UploadOutcome::Completed(receipt) => Ok(receipt),
            // A one-shot copy has no resume surface; treat as a failed call.
            UploadOutcome::Interrupted(state) => Err(TransferError::Api(ApiError::Rejected {
                message: format!(
                    "copy upload interrupted at chunk {} of {}",
                    state.last_chunk, target_name
                ),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_boundaries() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(CHUNK_SIZE), 1);
        assert_eq!(chunk_count(CHUNK_SIZE + 1), 2);
        assert_eq!(chunk_count(3 * CHUNK_SIZE), 3);
    }

    #[test]
    fn resume_next_chunk() {
        let mut state = ResumeState {
            file_uuid: "u".into(),
            upload_key: "k".into(),
            last_chunk: -1,
        };
        assert_eq!(state.next_chunk(), 0);
        state.last_chunk = 2;
        assert_eq!(state.next_chunk(), 3);
    }

    #[test]
    fn file_key_decoding() {
        let mut file = FileNode {
            uuid: "u".into(),
            name: "n".into(),
            size: 0,
            mime: String::new(),
            key: "A".repeat(32),
            hash: String::new(),
            last_modified: 0,
            parent: None,
            chunks: 0,
            region: String::new(),
            bucket: String::new(),
            timestamp: 0,
        };
        assert_eq!(file_key_bytes(&file).unwrap(), [b'A'; 32]);

        // Legacy base64 form of 32 raw bytes.
        file.key = BASE64.encode([7u8; 32]);
        assert_eq!(file_key_bytes(&file).unwrap(), [7u8; 32]);

        file.key = "way-too-short".into();
        assert!(matches!(
            file_key_bytes(&file),
            Err(TransferError::BadFileKey { .. })
        ));
    }
}
