//! Wire DTOs for the gateway JSON API.
//!
//! Every response arrives wrapped in the `{status, message, code, data}`
//! envelope handled by the client; the types here describe the `data`
//! payloads only. Fields the server may omit are defaulted rather than
//! required - the API adds fields over time and old clients must keep
//! working.

use serde::Deserialize;

/// `POST /v3/auth/info`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    #[serde(default = "default_auth_version")]
    pub auth_version: u32,
    #[serde(default)]
    pub salt: String,
}

fn default_auth_version() -> u32 {
    2
}

/// `POST /v3/login`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub api_key: String,
    /// One or more encrypted master keys. Older accounts return a bare
    /// string, newer ones a list (rotation history, newest last).
    #[serde(default)]
    pub master_keys: MasterKeys,
    /// Numeric on current accounts; tolerate a string for older ones.
    #[serde(default, alias = "userId")]
    pub id: Option<serde_json::Value>,
}

impl LoginData {
    /// The user id as a string, however the server encoded it.
    pub fn user_id(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// Encrypted master keys: bare string or list.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(untagged)]
pub enum MasterKeys {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl MasterKeys {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            MasterKeys::None => Vec::new(),
            MasterKeys::One(s) => vec![s],
            MasterKeys::Many(v) => v,
        }
    }
}

/// `GET /v3/user/baseFolder`
#[derive(Debug, Clone, Deserialize)]
pub struct BaseFolder {
    pub uuid: String,
}

/// `POST /v3/dir/content`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DirContent {
    #[serde(default)]
    pub folders: Vec<RawFolder>,
    #[serde(default)]
    pub uploads: Vec<RawFile>,
}

/// A folder as the server sees it: opaque UUID plus an encrypted name.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFolder {
    pub uuid: String,
    /// Encrypted name envelope. The plaintext is either a bare string or a
    /// JSON object `{"name": …}`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// A file as the server sees it: opaque UUID, encrypted metadata envelope,
/// and the chunk-store coordinates needed to fetch content.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    pub uuid: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub chunks: u64,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// `POST /v3/file/exists`
#[derive(Debug, Clone, Deserialize)]
pub struct FileExists {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// `POST /v3/dir/download` - the bulk folder tree.
///
/// Depending on server version the listing arrives under `files` or
/// `uploads`, and each record is either a map or a positional array. The
/// positional schemas are normalized in [`TreeEntry`].
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DirTree {
    #[serde(default)]
    pub folders: Vec<TreeEntry>,
    #[serde(default)]
    pub files: Vec<TreeEntry>,
    #[serde(default)]
    pub uploads: Vec<TreeEntry>,
}

impl DirTree {
    /// File records, whichever key the server used.
    pub fn file_entries(&self) -> &[TreeEntry] {
        if self.files.is_empty() {
            &self.uploads
        } else {
            &self.files
        }
    }
}

/// One record of the bulk tree: map style or positional array style.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeEntry {
    Map(serde_json::Map<String, serde_json::Value>),
    Positional(Vec<serde_json::Value>),
}

impl TreeEntry {
    fn str_at(values: &[serde_json::Value], idx: usize) -> Option<String> {
        values.get(idx).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn map_str(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
        map.get(key).and_then(|v| v.as_str()).map(str::to_string)
    }

    fn map_flagged_deleted(map: &serde_json::Map<String, serde_json::Value>) -> bool {
        ["deleted", "trash"]
            .iter()
            .any(|k| map.get(*k).and_then(serde_json::Value::as_bool) == Some(true))
    }

    /// Interpret this record as a folder: `(uuid, encrypted_name, parent)`.
    ///
    /// Positional schema: `[uuid, name, parent]`. Records that are trashed,
    /// malformed, or too short yield `None` and are skipped by callers.
    pub fn as_folder(&self) -> Option<(String, String, Option<String>)> {
        match self {
            TreeEntry::Map(map) => {
                if Self::map_flagged_deleted(map) {
                    return None;
                }
                Some((
                    Self::map_str(map, "uuid")?,
                    Self::map_str(map, "name").unwrap_or_default(),
                    Self::map_str(map, "parent"),
                ))
            }
            TreeEntry::Positional(values) => {
                if values.len() < 3 {
                    return None;
                }
                Some((
                    Self::str_at(values, 0)?,
                    Self::str_at(values, 1).unwrap_or_default(),
                    Self::str_at(values, 2),
                ))
            }
        }
    }

    /// Interpret this record as a file: `(uuid, encrypted_metadata, parent)`.
    ///
    /// Positional schema (observed): `[uuid, bucket, region, chunks, parent,
    /// metadata, …]`. Anything beyond index 5 is unknown and ignored.
    pub fn as_file(&self) -> Option<(String, String, Option<String>)> {
        match self {
            TreeEntry::Map(map) => {
                if Self::map_flagged_deleted(map) {
                    return None;
                }
                Some((
                    Self::map_str(map, "uuid")?,
                    Self::map_str(map, "metadata").unwrap_or_default(),
                    Self::map_str(map, "parent"),
                ))
            }
            TreeEntry::Positional(values) => {
                if values.len() < 6 {
                    return None;
                }
                Some((
                    Self::str_at(values, 0)?,
                    Self::str_at(values, 5).unwrap_or_default(),
                    Self::str_at(values, 4),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_keys_accepts_string_and_list() {
        let one: MasterKeys = serde_json::from_str("\"002abc\"").unwrap();
        assert_eq!(one.into_vec(), vec!["002abc".to_string()]);

        let many: MasterKeys = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(many.into_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn login_user_id_string_or_number() {
        let n: LoginData =
            serde_json::from_str(r#"{"apiKey":"K","masterKeys":[],"id":42}"#).unwrap();
        assert_eq!(n.user_id(), "42");

        let s: LoginData =
            serde_json::from_str(r#"{"apiKey":"K","masterKeys":[],"userId":"abc"}"#).unwrap();
        assert_eq!(s.user_id(), "abc");
    }

    #[test]
    fn tree_entry_positional_folder() {
        let entry: TreeEntry = serde_json::from_str(r#"["u1","002name","parent1"]"#).unwrap();
        let (uuid, name, parent) = entry.as_folder().unwrap();
        assert_eq!(uuid, "u1");
        assert_eq!(name, "002name");
        assert_eq!(parent.as_deref(), Some("parent1"));
    }

    #[test]
    fn tree_entry_positional_file_uses_observed_indices() {
        let entry: TreeEntry = serde_json::from_str(
            r#"["u1","bucket-7","de-1",3,"parent1","002meta","future-field"]"#,
        )
        .unwrap();
        let (uuid, metadata, parent) = entry.as_file().unwrap();
        assert_eq!(uuid, "u1");
        assert_eq!(metadata, "002meta");
        assert_eq!(parent.as_deref(), Some("parent1"));
    }

    #[test]
    fn tree_entry_short_positional_is_skipped() {
        let entry: TreeEntry = serde_json::from_str(r#"["u1","meta"]"#).unwrap();
        assert!(entry.as_folder().is_none());
        assert!(entry.as_file().is_none());
    }

    #[test]
    fn tree_entry_map_forms() {
        let entry: TreeEntry =
            serde_json::from_str(r#"{"uuid":"u1","name":"002n","parent":"p"}"#).unwrap();
        let (uuid, name, parent) = entry.as_folder().unwrap();
        assert_eq!((uuid.as_str(), name.as_str()), ("u1", "002n"));
        assert_eq!(parent.as_deref(), Some("p"));

        let trashed: TreeEntry =
            serde_json::from_str(r#"{"uuid":"u2","metadata":"m","trash":true}"#).unwrap();
        assert!(trashed.as_file().is_none());
    }

    #[test]
    fn dir_tree_prefers_files_key() {
        let tree: DirTree = serde_json::from_str(
            r#"{"folders":[],"files":[["u","b","r",1,"p","m"]],"uploads":[]}"#,
        )
        .unwrap();
        assert_eq!(tree.file_entries().len(), 1);

        let legacy: DirTree =
            serde_json::from_str(r#"{"folders":[],"uploads":[["u","b","r",1,"p","m"]]}"#).unwrap();
        assert_eq!(legacy.file_entries().len(), 1);
    }
}
