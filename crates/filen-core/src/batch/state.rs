//! Durable batch state: the on-disk schema and per-task bookkeeping.
//!
//! A batch is a persisted work plan. Field and status names below are the
//! file format; resumability across runs (and across client versions)
//! depends on them staying exactly as they are.

use serde::{Deserialize, Serialize};

use crate::transfer::ResumeState;

/// What a batch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Upload,
    Download,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
        }
    }
}

/// Per-task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Interrupted,
    Completed,
    SkippedConflict,
    SkippedMissing,
    SkippedNewer,
    ErrorParent,
    ErrorUpload,
    ErrorDownload,
}

impl TaskStatus {
    pub fn is_skipped(self) -> bool {
        matches!(
            self,
            TaskStatus::SkippedConflict | TaskStatus::SkippedMissing | TaskStatus::SkippedNewer
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            TaskStatus::ErrorParent | TaskStatus::ErrorUpload | TaskStatus::ErrorDownload
        )
    }
}

fn default_last_chunk() -> i64 {
    -1
}

/// One row of a batch: one file.
///
/// Upload tasks carry `remotePath`; download tasks carry `remoteUuid` and
/// `remoteModificationTime`. The resume invariant: `fileUuid` and
/// `uploadKey` are either both set or both absent, and `lastChunk == -1`
/// iff no chunks have been accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub local_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_uuid: Option<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_key: Option<String>,
    #[serde(default = "default_last_chunk")]
    pub last_chunk: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_modification_time: Option<i64>,
}

impl Task {
    pub fn upload(local_path: String, remote_path: String) -> Self {
        Self {
            local_path,
            remote_path: Some(remote_path),
            remote_uuid: None,
            status: TaskStatus::Pending,
            file_uuid: None,
            upload_key: None,
            last_chunk: -1,
            remote_modification_time: None,
        }
    }

    pub fn download(local_path: String, remote_uuid: String, remote_modified: i64) -> Self {
        Self {
            local_path,
            remote_path: None,
            remote_uuid: Some(remote_uuid),
            status: TaskStatus::Pending,
            file_uuid: None,
            upload_key: None,
            last_chunk: -1,
            remote_modification_time: Some(remote_modified),
        }
    }

    /// Resume coordinates, present only when a previous attempt recorded a
    /// full session (both `fileUuid` and `uploadKey`).
    pub fn resume_state(&self) -> Option<ResumeState> {
        match (&self.file_uuid, &self.upload_key) {
            (Some(uuid), Some(key)) => Some(ResumeState {
                file_uuid: uuid.clone(),
                upload_key: key.clone(),
                last_chunk: self.last_chunk,
            }),
            _ => None,
        }
    }

    pub fn set_resume(&mut self, state: &ResumeState) {
        self.file_uuid = Some(state.file_uuid.clone());
        self.upload_key = Some(state.upload_key.clone());
        self.last_chunk = state.last_chunk;
    }

    pub fn clear_resume(&mut self) {
        self.file_uuid = None;
        self.upload_key = None;
        self.last_chunk = -1;
    }
}

/// The durable record for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchState {
    pub operation_type: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_remote_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_destination: Option<String>,
    pub tasks: Vec<Task>,
}

/// Include/exclude shell-glob filter over basenames.
///
/// Include patterns: the name must match at least one (an empty include list
/// admits everything). Exclude patterns: the name must match none.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, glob::PatternError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| glob::Pattern::new(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| glob::Pattern::new(p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|p| p.matches(name)) {
            return false;
        }
        !self.exclude.iter().any(|p| p.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_are_the_wire_format() {
        for (status, expected) in [
            (TaskStatus::Pending, "\"pending\""),
            (TaskStatus::Uploading, "\"uploading\""),
            (TaskStatus::Interrupted, "\"interrupted\""),
            (TaskStatus::Completed, "\"completed\""),
            (TaskStatus::SkippedConflict, "\"skipped_conflict\""),
            (TaskStatus::SkippedMissing, "\"skipped_missing\""),
            (TaskStatus::SkippedNewer, "\"skipped_newer\""),
            (TaskStatus::ErrorParent, "\"error_parent\""),
            (TaskStatus::ErrorUpload, "\"error_upload\""),
            (TaskStatus::ErrorDownload, "\"error_download\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), expected);
        }
    }

    #[test]
    fn task_schema_round_trip() {
        let mut task = Task::upload("/tmp/a.txt".into(), "backup/a.txt".into());
        task.set_resume(&ResumeState {
            file_uuid: "fu".into(),
            upload_key: "uk".into(),
            last_chunk: 4,
        });
        task.status = TaskStatus::Interrupted;

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["localPath"], "/tmp/a.txt");
        assert_eq!(json["remotePath"], "backup/a.txt");
        assert_eq!(json["fileUuid"], "fu");
        assert_eq!(json["uploadKey"], "uk");
        assert_eq!(json["lastChunk"], 4);
        assert_eq!(json["status"], "interrupted");

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.resume_state().unwrap().last_chunk, 4);
    }

    #[test]
    fn resume_invariant_requires_both_fields() {
        let mut task = Task::upload("l".into(), "r".into());
        assert!(task.resume_state().is_none());
        assert_eq!(task.last_chunk, -1);

        task.file_uuid = Some("fu".into());
        assert!(task.resume_state().is_none(), "uuid alone is not resumable");

        task.upload_key = Some("uk".into());
        let state = task.resume_state().unwrap();
        assert_eq!(state.last_chunk, -1);
        assert_eq!(state.next_chunk(), 0);

        task.clear_resume();
        assert!(task.resume_state().is_none());
        assert_eq!(task.last_chunk, -1);
    }

    #[test]
    fn missing_last_chunk_defaults_to_minus_one() {
        let task: Task =
            serde_json::from_str(r#"{"localPath":"l","status":"pending"}"#).unwrap();
        assert_eq!(task.last_chunk, -1);
    }

    #[test]
    fn filter_semantics() {
        let filter = FileFilter::new(
            &["*.txt".into(), "*.md".into()],
            &["secret*".into()],
        )
        .unwrap();

        assert!(filter.matches("notes.txt"));
        assert!(filter.matches("readme.md"));
        assert!(!filter.matches("image.png"), "must match an include");
        assert!(!filter.matches("secret.txt"), "exclude wins over include");

        let no_includes = FileFilter::new(&[], &["*.log".into()]).unwrap();
        assert!(no_includes.matches("anything.bin"));
        assert!(!no_includes.matches("trace.log"));

        let empty = FileFilter::default();
        assert!(empty.matches("whatever"));
    }

    #[test]
    fn batch_state_schema() {
        let state = BatchState {
            operation_type: OperationKind::Upload,
            target_remote_path: Some("backup".into()),
            remote_path: None,
            local_destination: None,
            tasks: vec![Task::upload("a".into(), "backup/a".into())],
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["operationType"], "upload");
        assert_eq!(json["targetRemotePath"], "backup");
        assert!(json.get("remotePath").is_none());
        assert_eq!(json["tasks"][0]["status"], "pending");
    }
}
