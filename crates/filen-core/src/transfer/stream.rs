//! Random-access decrypted reads over an encrypted remote file.
//!
//! GCM can only authenticate a chunk it has received whole, so byte-level
//! seeks align down to the 1 MiB chunk boundary: the reader fetches whole
//! chunks, decrypts them, discards the in-chunk prefix in memory, and serves
//! the rest from its buffer. That is the correct trade for random-access
//! reads over an AEAD stream.

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{instrument, trace};

use crate::crypto::bulk::decrypt_chunk;
use crate::drive::{DriveClient, FileNode};

use super::{file_key_bytes, TransferError, CHUNK_SIZE};

/// Which chunk contains the given plaintext offset.
#[inline]
pub fn offset_to_chunk(offset: u64) -> u64 {
    offset / CHUNK_SIZE
}

/// Byte position within that chunk.
#[inline]
pub fn offset_in_chunk(offset: u64) -> usize {
    (offset % CHUNK_SIZE) as usize
}

/// Pull-based seekable reader over an encrypted remote file.
///
/// State is (position, pending buffer, next chunk to fetch). A seek drops
/// the buffer and re-aligns the chunk cursor; the next read lazily fetches
/// from the aligned chunk and discards `offset % CHUNK_SIZE` bytes.
pub struct RemoteFileReader {
    drive: Arc<DriveClient>,
    file: FileNode,
    key: [u8; 32],
    /// Plaintext position reads are served from.
    position: u64,
    /// Decrypted bytes fetched but not yet returned.
    buffer: BytesMut,
    /// Next chunk index to fetch when the buffer runs dry.
    next_chunk: u64,
    /// Bytes to discard from the front of the next fetched chunk
    /// (non-zero right after a misaligned seek).
    skip: usize,
}

impl RemoteFileReader {
    pub fn new(drive: Arc<DriveClient>, file: FileNode) -> Result<Self, TransferError> {
        let key = file_key_bytes(&file)?;
        Ok(Self {
            drive,
            file,
            key,
            position: 0,
            buffer: BytesMut::new(),
            next_chunk: 0,
            skip: 0,
        })
    }

    /// Total plaintext size.
    pub fn size(&self) -> u64 {
        self.file.size
    }

    /// Current read position. Clamped to `[0, size]`.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn file(&self) -> &FileNode {
        &self.file
    }

    /// Reposition the reader. Offsets beyond EOF clamp to the file size;
    /// negative results clamp to zero. Returns the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> u64 {
        let target: i64 = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(delta) => self.file.size as i64 + delta,
            SeekFrom::Current(delta) => self.position as i64 + delta,
        };
        let clamped = target.clamp(0, self.file.size as i64) as u64;

        if clamped != self.position {
            trace!(from = self.position, to = clamped, "seek resets chunk cursor");
            self.position = clamped;
            self.buffer.clear();
            self.next_chunk = offset_to_chunk(clamped);
            self.skip = offset_in_chunk(clamped);
        }
        self.position
    }

    /// Read up to `len` decrypted bytes from the current position.
    ///
    /// Whole chunks are fetched and authenticated until the buffer can
    /// satisfy the request; reads at or past EOF return an empty buffer.
    #[instrument(level = "trace", skip(self), fields(uuid = %self.file.uuid, pos = self.position))]
    pub async fn read(&mut self, len: usize) -> Result<Bytes, TransferError> {
        if len == 0 || self.position >= self.file.size {
            return Ok(Bytes::new());
        }

        let wanted = len.min((self.file.size - self.position) as usize);

        while self.buffer.len() < wanted && self.next_chunk < self.file.chunks {
            let index = self.next_chunk;
            let sealed = self
                .drive
                .api()
                .download_chunk(&self.file.region, &self.file.bucket, &self.file.uuid, index)
                .await?;
            let plaintext = decrypt_chunk(&sealed, &self.key)?;

            let start = self.skip.min(plaintext.len());
            self.buffer.extend_from_slice(&plaintext[start..]);
            self.skip = 0;
            self.next_chunk = index + 1;
            trace!(chunk = index, buffered = self.buffer.len(), "chunk fetched");
        }

        let take = wanted.min(self.buffer.len());
        let out = self.buffer.split_to(take).freeze();
        self.position += out.len() as u64;
        Ok(out)
    }
}

impl std::fmt::Debug for RemoteFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFileReader")
            .field("uuid", &self.file.uuid)
            .field("size", &self.file.size)
            .field("position", &self.position)
            .field("buffered", &self.buffer.len())
            .field("next_chunk", &self.next_chunk)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_math() {
        assert_eq!(offset_to_chunk(0), 0);
        assert_eq!(offset_to_chunk(CHUNK_SIZE - 1), 0);
        assert_eq!(offset_to_chunk(CHUNK_SIZE), 1);
        assert_eq!(offset_to_chunk(1_500_000), 1);

        assert_eq!(offset_in_chunk(0), 0);
        assert_eq!(offset_in_chunk(CHUNK_SIZE), 0);
        // A misaligned seek to 1_500_000 lands inside chunk 1 and must
        // discard the 451_424-byte prefix of it (1_500_000 - 1_048_576).
        assert_eq!(offset_in_chunk(1_500_000), 451_424);
    }

    fn reader_with_size(size: u64) -> RemoteFileReader {
        let credentials = crate::auth::Credentials {
            email: "user@example.com".into(),
            api_key: "K".into(),
            master_keys: "a".repeat(64),
            base_folder_uuid: "root".into(),
            user_id: "1".into(),
            last_logged_in_at: String::new(),
            last_refresh_at: None,
        };
        let drive = Arc::new(DriveClient::new(
            Arc::new(crate::api::ApiClient::new(
                Default::default(),
                Default::default(),
            )),
            &credentials,
        ));
        let file = FileNode {
            uuid: "u".into(),
            name: "n".into(),
            size,
            mime: String::new(),
            key: "k".repeat(32),
            hash: String::new(),
            last_modified: 0,
            parent: None,
            chunks: super::super::chunk_count(size),
            region: "de-1".into(),
            bucket: "b".into(),
            timestamp: 0,
        };
        RemoteFileReader::new(drive, file).unwrap()
    }

    #[test]
    fn seek_clamps_and_aligns() {
        let mut reader = reader_with_size(2_621_440); // 2.5 MiB

        assert_eq!(reader.seek(SeekFrom::Start(1_500_000)), 1_500_000);
        assert_eq!(reader.next_chunk, 1);
        assert_eq!(reader.skip, 451_424);

        // Past EOF clamps to size.
        assert_eq!(reader.seek(SeekFrom::Start(10_000_000)), 2_621_440);
        // Before start clamps to zero.
        assert_eq!(reader.seek(SeekFrom::Current(-9_999_999_999)), 0);
        // From end.
        assert_eq!(reader.seek(SeekFrom::End(-100)), 2_621_340);
    }

    #[test]
    fn seek_to_same_position_keeps_buffer() {
        let mut reader = reader_with_size(CHUNK_SIZE * 2);
        reader.buffer.extend_from_slice(b"pending");
        reader.position = 0;
        reader.seek(SeekFrom::Start(0));
        assert_eq!(&reader.buffer[..], b"pending");
    }

    #[tokio::test]
    async fn read_past_eof_is_empty() {
        let mut reader = reader_with_size(100);
        reader.seek(SeekFrom::Start(100));
        let out = reader.read(10).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(reader.position(), 100);
    }

    #[tokio::test]
    async fn zero_length_read_is_empty() {
        let mut reader = reader_with_size(100);
        let out = reader.read(0).await.unwrap();
        assert!(out.is_empty());
    }
}
