//! Cross-module protocol invariants.
//!
//! These pin the externally observable contracts: envelope layout, key
//! derivation shapes, filename-hash stability, batch state durability, and
//! the resume bookkeeping that survives a process restart.

use filen_core::batch::{self, BatchState, OperationKind, Task, TaskStatus};
use filen_core::crypto::envelope::{decrypt_metadata, encrypt_metadata};
use filen_core::crypto::hash::{hash_filename, sha512_hex};
use filen_core::crypto::kdf::derive_keys;
use filen_core::state::StateStore;
use filen_core::transfer::ResumeState;

// ============================================================================
// Crypto laws
// ============================================================================

#[test]
fn envelope_round_trip_under_derived_master_key() {
    // The same key material that login derives must open what it seals.
    let keys = derive_keys("correct horse battery staple", 2, &"A".repeat(32)).unwrap();
    let master_key = keys.master_key.to_string();

    let metadata = r#"{"name":"tax-2025.pdf","size":123456,"mime":"application/octet-stream","key":"kkkkkkkkkkkkkkkkkkkkkkkkkkkkkkkk","hash":"","lastModified":1700000000000}"#;
    let envelope = encrypt_metadata(metadata, &master_key).unwrap();

    assert!(envelope.starts_with("002"));
    assert_eq!(decrypt_metadata(&envelope, &master_key).unwrap(), metadata);
}

#[test]
fn envelope_length_follows_the_formula() {
    let key = "k".repeat(32);
    for len in [0usize, 1, 2, 3, 15, 16, 100, 1000] {
        let plaintext = "x".repeat(len);
        let envelope = encrypt_metadata(&plaintext, &key).unwrap();
        let expected = 3 + 12 + (len + 16).div_ceil(3) * 4;
        assert_eq!(envelope.len(), expected, "plaintext length {len}");
    }
}

#[test]
fn master_key_rotation_keeps_old_envelopes_readable() {
    let old = derive_keys("old-password", 2, "salt-salt-salt-salt").unwrap();
    let new = derive_keys("new-password", 2, "salt-salt-salt-salt").unwrap();

    let envelope = encrypt_metadata("pre-rotation blob", &old.master_key).unwrap();

    // The newest key cannot open it; the retained old key can. This is why
    // credentials store the whole key history.
    assert!(decrypt_metadata(&envelope, &new.master_key).is_err());
    assert_eq!(
        decrypt_metadata(&envelope, &old.master_key).unwrap(),
        "pre-rotation blob"
    );
}

#[test]
fn derived_key_shapes() {
    let keys = derive_keys("hunter2", 2, &"A".repeat(32)).unwrap();
    assert_eq!(keys.master_key.len(), 64);
    assert_eq!(keys.auth_password.len(), 128);
}

#[test]
fn filename_hash_is_stable_and_case_insensitive() {
    let mk = "f".repeat(64);
    let reference = hash_filename("Quarterly Report.XLSX", "Alice@Example.COM", &mk);

    // Stable across "sessions" (pure function of inputs)...
    assert_eq!(
        reference,
        hash_filename("Quarterly Report.XLSX", "Alice@Example.COM", &mk)
    );
    // ...and case-insensitive on name and email both.
    assert_eq!(
        reference,
        hash_filename("quarterly report.xlsx", "alice@example.com", &mk)
    );
}

#[test]
fn sha512_digest_is_lowercase_hex() {
    let digest = sha512_hex(b"chunk");
    assert_eq!(digest.len(), 128);
    assert!(digest
        .bytes()
        .all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
}

// ============================================================================
// Batch durability
// ============================================================================

fn store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open_at(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn interrupted_state_survives_a_restart() {
    let (_dir, store) = store();

    // First run: chunk 2 was the last one accepted before the failure.
    let mut task = Task::upload("/data/big.bin".into(), "backup/big.bin".into());
    task.set_resume(&ResumeState {
        file_uuid: "file-uuid-1".into(),
        upload_key: "upload-key-1".into(),
        last_chunk: 2,
    });
    task.status = TaskStatus::Interrupted;

    let sources = vec!["/data/big.bin".to_string()];
    let id = batch::batch_id(OperationKind::Upload, &sources, "/backup");
    store
        .save_batch_state(
            &id,
            &BatchState {
                operation_type: OperationKind::Upload,
                target_remote_path: Some("/backup".into()),
                remote_path: None,
                local_destination: None,
                tasks: vec![task],
            },
        )
        .unwrap();

    // "Restart": same command line derives the same batch id and finds the
    // resume coordinates intact.
    let id_again = batch::batch_id(OperationKind::Upload, &sources, "/backup");
    assert_eq!(id, id_again);

    let loaded = store.load_batch_state(&id_again).unwrap().unwrap();
    let resume = loaded.tasks[0].resume_state().unwrap();
    assert_eq!(resume.file_uuid, "file-uuid-1");
    assert_eq!(resume.upload_key, "upload-key-1");
    assert_eq!(resume.last_chunk, 2);
    // The next attempt starts at the failed index, not at zero.
    assert_eq!(resume.next_chunk(), 3);
    assert_eq!(loaded.tasks[0].status, TaskStatus::Interrupted);
}

#[test]
fn clean_completion_deletes_the_state_file() {
    let (_dir, store) = store();
    let id = "deadbeefdeadbeef";

    store
        .save_batch_state(
            id,
            &BatchState {
                operation_type: OperationKind::Download,
                target_remote_path: None,
                remote_path: Some("/photos".into()),
                local_destination: Some("./photos".into()),
                tasks: Vec::new(),
            },
        )
        .unwrap();
    assert!(store.load_batch_state(id).unwrap().is_some());

    store.delete_batch_state(id).unwrap();
    assert!(store.load_batch_state(id).unwrap().is_none());
}

#[test]
fn state_file_is_wire_compatible() {
    // A state file written by the previous implementation must load as-is.
    let (_dir, store) = store();
    let legacy = r#"{
  "operationType": "upload",
  "targetRemotePath": "backup",
  "tasks": [
    {
      "localPath": "/tmp/a.txt",
      "remotePath": "backup/a.txt",
      "status": "interrupted",
      "fileUuid": "fu-1",
      "uploadKey": "uk-1",
      "lastChunk": 7
    },
    {
      "localPath": "/tmp/b.txt",
      "remotePath": "backup/b.txt",
      "status": "completed",
      "fileUuid": null,
      "uploadKey": null,
      "lastChunk": -1
    }
  ]
}"#;
    let path = store.batch_state_dir().join("batch_state_cafe.json");
    std::fs::write(path, legacy).unwrap();

    let state = store.load_batch_state("cafe").unwrap().unwrap();
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.tasks[0].resume_state().unwrap().last_chunk, 7);
    assert_eq!(state.tasks[1].status, TaskStatus::Completed);
    assert!(state.tasks[1].resume_state().is_none());
}
