//! WebDAV metadata for drive entries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dav_server::fs::{DavMetaData, FsError};
use filen_core::drive::{FileNode, FolderNode, Node};

/// Metadata for a drive entry as WebDAV sees it.
#[derive(Debug, Clone)]
pub enum FilenMetaData {
    /// The base folder.
    Root,
    Folder {
        name: String,
        modified_ms: i64,
    },
    File {
        uuid: String,
        name: String,
        size: u64,
        modified_ms: i64,
    },
}

fn millis_to_system_time(ms: i64) -> SystemTime {
    if ms <= 0 {
        UNIX_EPOCH
    } else {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    }
}

impl FilenMetaData {
    pub fn root() -> Self {
        FilenMetaData::Root
    }

    pub fn from_node(node: &Node) -> Self {
        match node {
            Node::Folder(folder) => Self::from_folder(folder),
            Node::File(file) => Self::from_file(file),
        }
    }

    pub fn from_folder(folder: &FolderNode) -> Self {
        FilenMetaData::Folder {
            name: folder.name.clone(),
            modified_ms: folder.timestamp,
        }
    }

    pub fn from_file(file: &FileNode) -> Self {
        FilenMetaData::File {
            uuid: file.uuid.clone(),
            name: file.name.clone(),
            size: file.size,
            modified_ms: file.last_modified,
        }
    }

    /// Metadata for an in-flight write buffer with a known size.
    pub fn file_with_size(name: String, size: u64) -> Self {
        FilenMetaData::File {
            uuid: String::new(),
            name,
            size,
            modified_ms: now_ms(),
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl DavMetaData for FilenMetaData {
    fn len(&self) -> u64 {
        match self {
            FilenMetaData::File { size, .. } => *size,
            _ => 0,
        }
    }

    fn modified(&self) -> Result<SystemTime, FsError> {
        let ms = match self {
            FilenMetaData::Root => return Ok(SystemTime::now()),
            FilenMetaData::Folder { modified_ms, .. }
            | FilenMetaData::File { modified_ms, .. } => *modified_ms,
        };
        Ok(millis_to_system_time(ms))
    }

    fn is_dir(&self) -> bool {
        matches!(self, FilenMetaData::Root | FilenMetaData::Folder { .. })
    }

    fn is_file(&self) -> bool {
        matches!(self, FilenMetaData::File { .. })
    }

    /// Strong validator: UUID changes on every overwrite (trash-then-create)
    /// and the timestamp changes on metadata rewrites.
    fn etag(&self) -> Option<String> {
        match self {
            FilenMetaData::File {
                uuid, modified_ms, ..
            } if !uuid.is_empty() => Some(format!("{uuid}-{modified_ms}")),
            _ => None,
        }
    }

    fn created(&self) -> Result<SystemTime, FsError> {
        // The drive does not expose a creation time; modification time is
        // the closest truth.
        self.modified()
    }

    fn accessed(&self) -> Result<SystemTime, FsError> {
        self.modified()
    }

    fn status_changed(&self) -> Result<SystemTime, FsError> {
        self.modified()
    }

    fn executable(&self) -> Result<bool, FsError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_meta() -> FilenMetaData {
        FilenMetaData::File {
            uuid: "abc-123".into(),
            name: "report.pdf".into(),
            size: 2048,
            modified_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn root_is_a_directory() {
        let meta = FilenMetaData::root();
        assert!(meta.is_dir());
        assert!(!meta.is_file());
        assert_eq!(meta.len(), 0);
        assert!(meta.etag().is_none());
    }

    #[test]
    fn file_metadata_fields() {
        let meta = file_meta();
        assert!(meta.is_file());
        assert_eq!(meta.len(), 2048);

        let modified = meta.modified().unwrap();
        let ms = modified.duration_since(UNIX_EPOCH).unwrap().as_millis();
        assert_eq!(ms, 1_700_000_000_000);
    }

    #[test]
    fn etag_is_uuid_dash_modified() {
        assert_eq!(file_meta().etag().unwrap(), "abc-123-1700000000000");
    }

    #[test]
    fn virtual_file_has_no_etag() {
        let meta = FilenMetaData::file_with_size("new.bin".into(), 0);
        assert!(meta.etag().is_none());
    }

    #[test]
    fn missing_timestamp_clamps_to_epoch() {
        let meta = FilenMetaData::Folder {
            name: "f".into(),
            modified_ms: 0,
        };
        assert_eq!(meta.modified().unwrap(), UNIX_EPOCH);
    }
}
