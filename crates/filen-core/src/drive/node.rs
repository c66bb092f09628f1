//! Decrypted views of server-side entities.

use serde::{Deserialize, Serialize};

/// Sentinel name for entries whose metadata failed to decrypt with every
/// master key. Keeping them listed keeps the namespace navigable.
pub const ENCRYPTED_SENTINEL: &str = "[Encrypted]";

/// The decrypted file metadata record stored inside the `002` envelope.
///
/// Field names are the wire schema; `key` is the per-file content key and
/// `hash` the SHA-512 of the plaintext (empty for empty files).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub last_modified: i64,
}

/// A folder with its name decrypted.
#[derive(Debug, Clone)]
pub struct FolderNode {
    pub uuid: String,
    pub name: String,
    /// Absent on the root folder.
    pub parent: Option<String>,
    pub timestamp: i64,
}

/// A file with its metadata decrypted, plus the chunk-store coordinates
/// needed to fetch content.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub uuid: String,
    pub name: String,
    pub size: u64,
    pub mime: String,
    /// 32-character per-file key; its UTF-8 bytes are the AES-256 key.
    pub key: String,
    /// SHA-512 of the plaintext, empty for empty files.
    pub hash: String,
    pub last_modified: i64,
    pub parent: Option<String>,
    pub chunks: u64,
    pub region: String,
    pub bucket: String,
    pub timestamp: i64,
}

impl FileNode {
    /// The file key as AES-256 key bytes.
    ///
    /// Returns `None` when the key is not the expected 32 ASCII characters
    /// (e.g. the metadata never decrypted and this is a sentinel entry).
    pub fn key_bytes(&self) -> Option<[u8; 32]> {
        let bytes = self.key.as_bytes();
        bytes.try_into().ok()
    }
}

/// A resolved node: folder or file.
#[derive(Debug, Clone)]
pub enum Node {
    Folder(FolderNode),
    File(FileNode),
}

impl Node {
    pub fn uuid(&self) -> &str {
        match self {
            Node::Folder(f) => &f.uuid,
            Node::File(f) => &f.uuid,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Folder(f) => &f.name,
            Node::File(f) => &f.name,
        }
    }

    pub fn parent(&self) -> Option<&str> {
        match self {
            Node::Folder(f) => f.parent.as_deref(),
            Node::File(f) => f.parent.as_deref(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Node::Folder(_) => 0,
            Node::File(f) => f.size,
        }
    }

    pub fn last_modified(&self) -> i64 {
        match self {
            Node::Folder(f) => f.timestamp,
            Node::File(f) => f.last_modified,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    /// `"folder"` or `"file"` - the serialized form of the tag.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Node::Folder(_) => "folder",
            Node::File(_) => "file",
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            Node::Folder(f) => Some(f),
            Node::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_metadata_uses_wire_keys() {
        let meta: FileMetadata = serde_json::from_str(
            r#"{"name":"a.txt","size":10,"mime":"text/plain","key":"k","hash":"h","lastModified":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(meta.name, "a.txt");
        assert_eq!(meta.last_modified, 1_700_000_000_000);

        let out = serde_json::to_value(&meta).unwrap();
        assert!(out.get("lastModified").is_some());
    }

    #[test]
    fn key_bytes_requires_exactly_32_ascii_chars() {
        let mut file = FileNode {
            uuid: "u".into(),
            name: "n".into(),
            size: 0,
            mime: String::new(),
            key: "k".repeat(32),
            hash: String::new(),
            last_modified: 0,
            parent: None,
            chunks: 0,
            region: String::new(),
            bucket: String::new(),
            timestamp: 0,
        };
        assert!(file.key_bytes().is_some());

        file.key = "short".into();
        assert!(file.key_bytes().is_none());
    }

    #[test]
    fn node_accessors() {
        let node = Node::Folder(FolderNode {
            uuid: "u".into(),
            name: "docs".into(),
            parent: Some("p".into()),
            timestamp: 5,
        });
        assert_eq!(node.uuid(), "u");
        assert_eq!(node.name(), "docs");
        assert_eq!(node.kind_str(), "folder");
        assert!(node.is_folder());
        assert!(node.as_file().is_none());
    }
}
