//! Sequential chunked download.

use std::io::Write;
use std::path::Path;

use tracing::{debug, instrument};

use crate::crypto::bulk::decrypt_chunk;
use crate::drive::{DriveClient, FileNode};

use super::{file_key_bytes, TransferError};

impl DriveClient {
    /// Download and decrypt a file into a writer, chunk by chunk in index
    /// order. Integrity per chunk comes from the GCM tag; end-to-end
    /// integrity is the separate `verify` operation against the metadata
    /// hash.
    #[instrument(level = "debug", skip(self, file, sink, on_progress), fields(uuid = %file.uuid, chunks = file.chunks))]
    pub async fn download_file(
        &self,
        file: &FileNode,
        sink: &mut (dyn Write + Send),
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<(), TransferError> {
        let key = file_key_bytes(file)?;
        let mut bytes_done: u64 = 0;

        for index in 0..file.chunks {
            let sealed = self
                .api()
                .download_chunk(&file.region, &file.bucket, &file.uuid, index)
                .await?;
            let plaintext = decrypt_chunk(&sealed, &key)?;

            sink.write_all(&plaintext)
                .map_err(|e| TransferError::io(Path::new(&file.name), e))?;

            bytes_done += plaintext.len() as u64;
            on_progress(bytes_done, file.size);
        }

        debug!(bytes = bytes_done, "download complete");
        Ok(())
    }

    /// Download a file to a local path, creating parent directories.
    pub async fn download_to_path(
        &self,
        file: &FileNode,
        path: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<(), TransferError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
            }
        }

        let mut out = std::fs::File::create(path).map_err(|e| TransferError::io(path, e))?;
        self.download_file(file, &mut out, on_progress).await?;
        out.flush().map_err(|e| TransferError::io(path, e))?;
        Ok(())
    }
}

/// Set a downloaded file's mtime (and atime) from a `lastModified` in
/// milliseconds. Best effort; failures are the caller's to log.
pub fn apply_timestamp(path: &Path, last_modified_ms: i64) -> std::io::Result<()> {
    if last_modified_ms <= 0 {
        return Ok(());
    }
    let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_millis(last_modified_ms as u64);
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(
        std::fs::FileTimes::new()
            .set_accessed(mtime)
            .set_modified(mtime),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_timestamp_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        apply_timestamp(&path, 1_700_000_000_000).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        let ms = modified
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        assert_eq!(ms, 1_700_000_000_000);
    }

    #[test]
    fn apply_timestamp_ignores_missing_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        apply_timestamp(&path, 0).unwrap();
    }
}
