//! Batch orchestrator: building, persisting and resuming task lists.
//!
//! A batch is identified by a content-derived ID, so re-running the same
//! command resumes the same work plan. State is committed to disk on every
//! task transition and, during uploads, every ~10 chunks or 5 seconds, so a
//! crash or Ctrl-C loses at most a few chunks of bookkeeping (the server
//! keeps the chunks themselves).

mod state;

pub use state::{BatchState, FileFilter, OperationKind, Task, TaskStatus};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::drive::{canonical_path, parent_path, DriveClient, DriveError, Node};
use crate::state::{StateError, StateStore};
use crate::transfer::{
    apply_timestamp, TransferError, UploadEvent, UploadOutcome, UploadRequest,
};

/// Save cadence during an upload: every this many chunks...
const CHECKPOINT_CHUNKS: i64 = 10;

/// ...or every this long, whichever comes first.
const CHECKPOINT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("invalid glob pattern: {0}")]
    BadPattern(#[from] glob::PatternError),

    /// Recursive download was pointed at a file, or vice versa.
    #[error("{0}")]
    BadTarget(String),
}

/// Outcome counters for one batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub completed: usize,
    pub previously_completed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchSummary {
    /// A clean batch deletes its state file; anything else keeps it for
    /// resume.
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Conflict policy when the destination already has an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Overwrite,
    /// Strict `>` on modification time; equal timestamps skip.
    Newer,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "newer" => Ok(ConflictPolicy::Newer),
            other => Err(format!(
                "unknown conflict policy \"{other}\" (expected skip, overwrite or newer)"
            )),
        }
    }
}

/// Derive the stable batch ID: first 16 hex chars of
/// `SHA1("<op>-<src1|src2|…>-<target>")`. Same inputs, same batch.
pub fn batch_id(operation: OperationKind, sources: &[String], target: &str) -> String {
    let input = format!("{}-{}-{}", operation.as_str(), sources.join("|"), target);
    let digest = Sha1::digest(input.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Join a remote target with a local relative path, always using `/`.
fn join_remote(target: &str, rel: &Path) -> String {
    let mut out = canonical_path(target);
    for component in rel.components() {
        let part = component.as_os_str().to_string_lossy();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&part);
    }
    out
}

/// Expand local sources into upload tasks.
///
/// Each source is glob-expanded. Plain files become one task each;
/// directories are walked when `recursive` is set (and skipped otherwise).
/// The include/exclude filter applies to basenames.
pub fn enumerate_upload_tasks(
    sources: &[String],
    target: &str,
    recursive: bool,
    filter: &FileFilter,
) -> Result<Vec<Task>, BatchError> {
    let mut tasks = Vec::new();

    for source in sources {
        let expanded: Vec<PathBuf> = glob::glob(source)?
            .filter_map(Result::ok)
            .collect();
        debug!(source, count = expanded.len(), "glob expanded");

        for item in expanded {
            if item.is_dir() {
                if !recursive {
                    debug!(path = %item.display(), "skipping directory (non-recursive)");
                    continue;
                }
                // Paths are made relative to the directory's parent so the
                // directory itself appears under the target.
                let anchor = item.parent().unwrap_or(&item).to_path_buf();
                for entry in WalkDir::new(&item)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_file())
                {
                    let name = entry.file_name().to_string_lossy();
                    if !filter.matches(&name) {
                        debug!(name = %name, "filtered out");
                        continue;
                    }
                    let rel = entry
                        .path()
                        .strip_prefix(&anchor)
                        .unwrap_or(entry.path())
                        .to_path_buf();
                    tasks.push(Task::upload(
                        entry.path().to_string_lossy().into_owned(),
                        join_remote(target, &rel),
                    ));
                }
            } else if item.is_file() {
                let name = item
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if !filter.matches(&name) {
                    debug!(name = %name, "filtered out");
                    continue;
                }
                tasks.push(Task::upload(
                    item.to_string_lossy().into_owned(),
                    join_remote(target, Path::new(&name)),
                ));
            }
        }
    }

    Ok(tasks)
}

/// Options for an upload batch.
pub struct UploadOptions {
    pub sources: Vec<String>,
    pub target: String,
    pub recursive: bool,
    pub conflict: ConflictPolicy,
    pub preserve_timestamps: bool,
    pub filter: FileFilter,
}

/// Run (or resume) an upload batch.
pub async fn run_upload(
    drive: &DriveClient,
    store: &StateStore,
    batch_id: &str,
    options: &UploadOptions,
) -> Result<BatchSummary, BatchError> {
    let existing = store.load_batch_state(batch_id)?;
    let resuming = existing.is_some();

    let state = match existing {
        Some(state) => {
            info!(batch_id, tasks = state.tasks.len(), "resuming upload batch");
            state
        }
        None => {
            // Resolving the target up front also creates it, so even an
            // all-filtered batch leaves a usable destination.
            drive.create_folder_recursive(&options.target).await?;
            let tasks = enumerate_upload_tasks(
                &options.sources,
                &options.target,
                options.recursive,
                &options.filter,
            )?;
            info!(batch_id, tasks = tasks.len(), "upload task list built");
            let state = BatchState {
                operation_type: OperationKind::Upload,
                target_remote_path: Some(options.target.clone()),
                remote_path: None,
                local_destination: None,
                tasks,
            };
            store.save_batch_state(batch_id, &state)?;
            state
        }
    };

    let total = state.tasks.len();
    let state = Mutex::new(state);
    let mut summary = BatchSummary::default();

    for i in 0..total {
        let (status, local_path, remote_path, resume) = {
            let st = state.lock().expect("batch state lock");
            let task = &st.tasks[i];
            (
                task.status,
                task.local_path.clone(),
                task.remote_path.clone().unwrap_or_default(),
                task.resume_state(),
            )
        };

        if status == TaskStatus::Completed {
            summary.previously_completed += 1;
            continue;
        }
        if status.is_skipped() {
            summary.skipped += 1;
            continue;
        }

        let local = Path::new(&local_path);
        if !local.exists() {
            warn!(path = %local_path, "source vanished, skipping");
            summary.skipped += 1;
            set_status_and_save(&state, store, batch_id, i, TaskStatus::SkippedMissing);
            continue;
        }

        // Ensure the remote parent exists.
        let remote_parent = parent_path(&remote_path);
        let parent = match drive.create_folder_recursive(&remote_parent).await {
            Ok(folder) => folder,
            Err(e) => {
                warn!(parent = %remote_parent, error = %e, "parent creation failed");
                summary.errors += 1;
                set_status_and_save(&state, store, batch_id, i, TaskStatus::ErrorParent);
                continue;
            }
        };

        let remote_name = crate::drive::base_name(&remote_path);

        // Conflict checks only apply to a first attempt; a resumed session
        // already owns its server-side upload.
        if resume.is_none() && options.conflict != ConflictPolicy::Overwrite {
            match upload_conflict(drive, &parent.uuid, &remote_name, local, options).await {
                Ok(None) => {}
                Ok(Some(skip_status)) => {
                    debug!(name = %remote_name, ?skip_status, "conflict, skipping");
                    summary.skipped += 1;
                    set_status_and_save(&state, store, batch_id, i, skip_status);
                    continue;
                }
                Err(e) => {
                    warn!(name = %remote_name, error = %e, "conflict check failed, proceeding");
                }
            }
        }

        let is_resuming = resume.is_some()
            && matches!(status, TaskStatus::Interrupted | TaskStatus::Uploading);
        let resume = if is_resuming { resume } else { None };
        set_status_and_save(&state, store, batch_id, i, TaskStatus::Uploading);

        let mut last_saved_chunk: i64 = resume.as_ref().map_or(-1, |r| r.last_chunk);
        let mut last_save = Instant::now();
        let mut on_event = |event: UploadEvent| {
            let mut st = state.lock().expect("batch state lock");
            match event {
                UploadEvent::Session {
                    file_uuid,
                    upload_key,
                } => {
                    let task = &mut st.tasks[i];
                    task.file_uuid = Some(file_uuid);
                    task.upload_key = Some(upload_key);
                    task.last_chunk = -1;
                    if let Err(e) = store.save_batch_state(batch_id, &st) {
                        warn!(error = %e, "failed to checkpoint batch state");
                    }
                }
                UploadEvent::Chunk { index, .. } => {
                    st.tasks[i].last_chunk = index as i64;
                    let due = index as i64 - last_saved_chunk >= CHECKPOINT_CHUNKS
                        || last_save.elapsed() >= CHECKPOINT_INTERVAL;
                    if due {
                        if let Err(e) = store.save_batch_state(batch_id, &st) {
                            warn!(error = %e, "failed to checkpoint batch state");
                        }
                        last_saved_chunk = index as i64;
                        last_save = Instant::now();
                    }
                }
            }
        };

        let request = UploadRequest {
            local_path: local,
            parent_uuid: &parent.uuid,
            remote_name: &remote_name,
            resume,
            preserve_timestamps: options.preserve_timestamps,
        };

        match drive.upload_file(request, &mut on_event).await {
            Ok(UploadOutcome::Completed(receipt)) => {
                debug!(name = %remote_name, uuid = %receipt.uuid, "task complete");
                summary.completed += 1;
                let mut st = state.lock().expect("batch state lock");
                let task = &mut st.tasks[i];
                task.status = TaskStatus::Completed;
                task.clear_resume();
                if let Err(e) = store.save_batch_state(batch_id, &st) {
                    warn!(error = %e, "failed to save batch state");
                }
            }
            Ok(UploadOutcome::Interrupted(resume_state)) => {
                warn!(name = %remote_name, last_chunk = resume_state.last_chunk, "task interrupted");
                summary.errors += 1;
                let mut st = state.lock().expect("batch state lock");
                let task = &mut st.tasks[i];
                task.set_resume(&resume_state);
                task.status = TaskStatus::Interrupted;
                if let Err(e) = store.save_batch_state(batch_id, &st) {
                    warn!(error = %e, "failed to save batch state");
                }
            }
            Err(e) => {
                warn!(name = %remote_name, error = %e, "task failed");
                summary.errors += 1;
                set_status_and_save(&state, store, batch_id, i, TaskStatus::ErrorUpload);
            }
        }
    }

    finish_batch(store, batch_id, &summary, resuming);
    Ok(summary)
}

/// Decide whether an upload task should be skipped for conflict reasons.
/// `None` means proceed.
async fn upload_conflict(
    drive: &DriveClient,
    parent_uuid: &str,
    remote_name: &str,
    local: &Path,
    options: &UploadOptions,
) -> Result<Option<TaskStatus>, BatchError> {
    let files = drive.list_files(parent_uuid).await?;
    let existing = files.iter().find(|f| f.name == remote_name).cloned();

    // Fall back to the hashed-name index when the cached listing is blind.
    let exists_remotely = if existing.is_some() {
        true
    } else {
        let hashed =
            crate::crypto::hash::hash_filename(remote_name, drive.email(), drive.master_key());
        drive
            .api()
            .file_exists(parent_uuid, &hashed)
            .await
            .map(|r| r.exists)
            .unwrap_or(false)
    };

    if !exists_remotely {
        return Ok(None);
    }

    match options.conflict {
        ConflictPolicy::Skip => Ok(Some(TaskStatus::SkippedConflict)),
        ConflictPolicy::Overwrite => Ok(None),
        ConflictPolicy::Newer => {
            let remote_modified = existing.map(|f| f.last_modified).unwrap_or(0);
            let local_modified = local
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            if local_modified > remote_modified {
                Ok(None)
            } else {
                Ok(Some(TaskStatus::SkippedNewer))
            }
        }
    }
}

/// Options for a download batch.
pub struct DownloadOptions {
    pub remote_path: String,
    pub local_destination: Option<String>,
    pub conflict: ConflictPolicy,
    pub preserve_timestamps: bool,
    pub filter: FileFilter,
}

/// Build the download task list from the bulk tree endpoint.
///
/// Relative paths are reconstructed by walking each file's parent chain
/// through the folder map; files whose chain leaves the requested root (or
/// cycles) are discarded.
async fn enumerate_download_tasks(
    drive: &DriveClient,
    root_uuid: &str,
    base_dest: &Path,
    filter: &FileFilter,
) -> Result<Vec<Task>, BatchError> {
    let tree = drive.api().dir_download(root_uuid).await.map_err(DriveError::Api)?;

    struct FolderMeta {
        name: String,
        parent: Option<String>,
    }

    let mut folder_map: HashMap<String, FolderMeta> = HashMap::new();
    for entry in &tree.folders {
        let Some((uuid, encrypted_name, parent)) = entry.as_folder() else {
            continue;
        };
        let Some(name) = drive.decrypt_folder_name(&encrypted_name) else {
            continue;
        };
        folder_map.insert(uuid, FolderMeta { name, parent });
    }
    debug!(folders = folder_map.len(), "folder tree mapped");

    let relative_dir = |parent_uuid: &str| -> Option<PathBuf> {
        let mut parts: Vec<&str> = Vec::new();
        let mut current = parent_uuid;
        let mut seen: Vec<&str> = Vec::new();
        while current != root_uuid {
            if seen.contains(&current) {
                return None; // cycle
            }
            seen.push(current);
            let folder = folder_map.get(current)?;
            parts.push(&folder.name);
            current = folder.parent.as_deref()?;
        }
        Some(parts.iter().rev().collect())
    };

    let mut tasks = Vec::new();
    for entry in tree.file_entries() {
        let Some((uuid, encrypted_metadata, parent)) = entry.as_file() else {
            continue;
        };
        let Some(meta) = drive.decrypt_file_metadata(&encrypted_metadata) else {
            debug!(uuid, "skipping file with undecryptable metadata");
            continue;
        };
        if !filter.matches(&meta.name) {
            continue;
        }

        let parent = parent.unwrap_or_default();
        let Some(rel_dir) = relative_dir(&parent) else {
            debug!(uuid, "skipping file outside requested root");
            continue;
        };

        let local_path = base_dest.join(rel_dir).join(&meta.name);
        tasks.push(Task::download(
            local_path.to_string_lossy().into_owned(),
            uuid,
            meta.last_modified,
        ));
    }

    Ok(tasks)
}

/// Run (or resume) a recursive folder download.
pub async fn run_download(
    drive: &DriveClient,
    store: &StateStore,
    batch_id: &str,
    options: &DownloadOptions,
) -> Result<BatchSummary, BatchError> {
    let root = drive.resolve_path(&options.remote_path).await?;
    let Node::Folder(root) = root else {
        return Err(BatchError::BadTarget(format!(
            "\"{}\" is a file; use the single-file download instead",
            options.remote_path
        )));
    };

    let base_dest = options
        .local_destination
        .clone()
        .unwrap_or_else(|| {
            if root.name.is_empty() {
                "download".to_string()
            } else {
                root.name.clone()
            }
        });
    let base_dest = PathBuf::from(base_dest);
    std::fs::create_dir_all(&base_dest)
        .map_err(|e| BatchError::Transfer(TransferError::io(&base_dest, e)))?;

    let existing = store.load_batch_state(batch_id)?;
    let resuming = existing.is_some();

    let mut state = match existing {
        Some(state) => {
            info!(batch_id, tasks = state.tasks.len(), "resuming download batch");
            state
        }
        None => {
            let tasks =
                enumerate_download_tasks(drive, &root.uuid, &base_dest, &options.filter).await?;
            info!(batch_id, tasks = tasks.len(), "download task list built");
            let state = BatchState {
                operation_type: OperationKind::Download,
                target_remote_path: None,
                remote_path: Some(options.remote_path.clone()),
                local_destination: Some(base_dest.to_string_lossy().into_owned()),
                tasks,
            };
            store.save_batch_state(batch_id, &state)?;
            state
        }
    };

    let mut summary = BatchSummary::default();

    for i in 0..state.tasks.len() {
        let task = state.tasks[i].clone();

        if task.status == TaskStatus::Completed {
            summary.previously_completed += 1;
            continue;
        }
        if task.status.is_skipped() {
            summary.skipped += 1;
            continue;
        }

        let local = PathBuf::from(&task.local_path);
        let Some(remote_uuid) = task.remote_uuid.clone() else {
            warn!(path = %task.local_path, "download task without remote uuid");
            summary.errors += 1;
            state.tasks[i].status = TaskStatus::ErrorDownload;
            save_quiet(store, batch_id, &state);
            continue;
        };

        // Conflict check against the existing local file.
        if local.exists() {
            let skip = match options.conflict {
                ConflictPolicy::Skip => Some(TaskStatus::SkippedConflict),
                ConflictPolicy::Overwrite => None,
                ConflictPolicy::Newer => {
                    let remote_modified = task.remote_modification_time.unwrap_or(0);
                    let local_modified = local
                        .metadata()
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_millis() as i64)
                        .unwrap_or(0);
                    if remote_modified > local_modified {
                        None
                    } else {
                        Some(TaskStatus::SkippedNewer)
                    }
                }
            };
            if let Some(skip_status) = skip {
                debug!(path = %task.local_path, ?skip_status, "conflict, skipping");
                summary.skipped += 1;
                state.tasks[i].status = skip_status;
                save_quiet(store, batch_id, &state);
                continue;
            }
        }

        let result: Result<(), TransferError> = async {
            let file = drive.file_node(&remote_uuid).await?;
            drive
                .download_to_path(&file, &local, &mut |_, _| {})
                .await?;
            if options.preserve_timestamps {
                let stamp = if file.last_modified > 0 {
                    file.last_modified
                } else {
                    task.remote_modification_time.unwrap_or(0)
                };
                if let Err(e) = apply_timestamp(&local, stamp) {
                    warn!(path = %local.display(), error = %e, "could not set timestamp");
                }
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                summary.completed += 1;
                state.tasks[i].status = TaskStatus::Completed;
            }
            Err(e) => {
                warn!(path = %task.local_path, error = %e, "download failed");
                summary.errors += 1;
                state.tasks[i].status = TaskStatus::ErrorDownload;
            }
        }
        save_quiet(store, batch_id, &state);
    }

    finish_batch(store, batch_id, &summary, resuming);
    Ok(summary)
}

fn set_status_and_save(
    state: &Mutex<BatchState>,
    store: &StateStore,
    batch_id: &str,
    index: usize,
    status: TaskStatus,
) {
    let mut st = state.lock().expect("batch state lock");
    st.tasks[index].status = status;
    save_quiet(store, batch_id, &st);
}

fn save_quiet(store: &StateStore, batch_id: &str, state: &BatchState) {
    if let Err(e) = store.save_batch_state(batch_id, state) {
        warn!(batch_id, error = %e, "failed to save batch state");
    }
}

/// Delete the state file after a clean run; keep it for resume otherwise.
fn finish_batch(store: &StateStore, batch_id: &str, summary: &BatchSummary, resuming: bool) {
    if summary.is_clean() {
        if let Err(e) = store.delete_batch_state(batch_id) {
            warn!(batch_id, error = %e, "failed to delete finished batch state");
        }
        info!(batch_id, resuming, ?summary, "batch finished cleanly");
    } else {
        info!(batch_id, ?summary, "batch finished with errors, state retained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_id_is_stable_and_short() {
        let sources = vec!["a/*.txt".to_string(), "b".to_string()];
        let id1 = batch_id(OperationKind::Upload, &sources, "/backup");
        let id2 = batch_id(OperationKind::Upload, &sources, "/backup");
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 16);
        assert!(id1.bytes().all(|b| b.is_ascii_hexdigit()));

        // Any input change yields a different batch.
        assert_ne!(id1, batch_id(OperationKind::Download, &sources, "/backup"));
        assert_ne!(id1, batch_id(OperationKind::Upload, &sources, "/other"));
        let fewer = vec!["a/*.txt".to_string()];
        assert_ne!(id1, batch_id(OperationKind::Upload, &fewer, "/backup"));
    }

    #[test]
    fn join_remote_uses_forward_slashes() {
        assert_eq!(
            join_remote("/backup", Path::new("dir/file.txt")),
            "backup/dir/file.txt"
        );
        assert_eq!(join_remote("", Path::new("a.txt")), "a.txt");
        assert_eq!(join_remote("/", Path::new("a.txt")), "a.txt");
    }

    #[test]
    fn conflict_policy_parsing() {
        assert_eq!("skip".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Skip);
        assert_eq!(
            "overwrite".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::Overwrite
        );
        assert_eq!(
            "newer".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::Newer
        );
        assert!("later".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn enumerate_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.log"), b"b").unwrap();

        let source = dir.path().join("*").to_string_lossy().into_owned();
        let filter = FileFilter::default();
        let tasks = enumerate_upload_tasks(&[source], "/backup", false, &filter).unwrap();

        let mut remotes: Vec<_> = tasks
            .iter()
            .map(|t| t.remote_path.clone().unwrap())
            .collect();
        remotes.sort();
        assert_eq!(remotes, vec!["backup/a.txt", "backup/b.log"]);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert!(tasks.iter().all(|t| t.last_chunk == -1));
    }

    #[test]
    fn enumerate_respects_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"k").unwrap();
        std::fs::write(dir.path().join("drop.log"), b"d").unwrap();

        let source = dir.path().join("*").to_string_lossy().into_owned();
        let filter = FileFilter::new(&["*.txt".into()], &[]).unwrap();
        let tasks = enumerate_upload_tasks(&[source], "/", false, &filter).unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].remote_path.as_deref(), Some("keep.txt"));
    }

    #[test]
    fn enumerate_skips_directories_without_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), b"i").unwrap();

        let source = dir.path().join("sub").to_string_lossy().into_owned();
        let filter = FileFilter::default();

        let flat = enumerate_upload_tasks(&[source.clone()], "/", false, &filter).unwrap();
        assert!(flat.is_empty());

        let deep = enumerate_upload_tasks(&[source], "/", true, &filter).unwrap();
        assert_eq!(deep.len(), 1);
        // The directory itself is part of the remote path.
        assert_eq!(deep[0].remote_path.as_deref(), Some("sub/inner.txt"));
    }

    #[test]
    fn enumerate_recursive_preserves_nesting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("root/a/b")).unwrap();
        std::fs::write(dir.path().join("root/top.txt"), b"t").unwrap();
        std::fs::write(dir.path().join("root/a/b/deep.txt"), b"d").unwrap();

        let source = dir.path().join("root").to_string_lossy().into_owned();
        let tasks =
            enumerate_upload_tasks(&[source], "/dest", true, &FileFilter::default()).unwrap();

        let mut remotes: Vec<_> = tasks
            .iter()
            .map(|t| t.remote_path.clone().unwrap())
            .collect();
        remotes.sort();
        assert_eq!(remotes, vec!["dest/root/a/b/deep.txt", "dest/root/top.txt"]);
    }
}
