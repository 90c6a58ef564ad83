use taskvault::archive;
use taskvault::crypto::{ArchiveKey, CryptoError};
use taskvault::db::{self, ArchiveRecord, TaskDraft};
use taskvault::repo;
use taskvault::sync::{InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn tampered_archive_blob_fails_restore_and_leaves_the_archive_in_place() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(false));
    let key = ArchiveKey::from_passphrase("test passphrase");

    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "sensitive notes".to_string(),
            workspace_id: "ws-1".to_string(),
            completed: true,
            ..Default::default()
        },
    )
    .expect("create task");

    archive::archive_tasks(&conn, &key, &[task.id.clone()]).expect("archive");

    // Corrupt one ciphertext character in place.
    let record = db::get_archive(&conn, &task.id)
        .expect("get archive")
        .expect("archive exists");
    let (nonce_hex, cipher_b64) = record
        .encrypted_payload
        .split_once(':')
        .expect("wire format");
    let mut cipher_chars: Vec<char> = cipher_b64.chars().collect();
    cipher_chars[0] = if cipher_chars[0] == 'A' { 'B' } else { 'A' };
    let tampered_cipher: String = cipher_chars.into_iter().collect();
    db::put_archive_row(
        &conn,
        &ArchiveRecord {
            id: record.id.clone(),
            original_workspace: record.original_workspace.clone(),
            encrypted_payload: format!("{nonce_hex}:{tampered_cipher}"),
            archived_at_ms: record.archived_at_ms,
        },
    )
    .expect("store tampered blob");

    let err = archive::unarchive_workspace(&conn, &key, "ws-1")
        .expect_err("restore must fail authentication");
    assert!(err.is::<CryptoError>());

    // The batch rolled back: no task was reinstated and the archive record
    // is still there, untouched.
    assert!(db::get_task(&conn, &task.id).expect("get task").is_none());
    assert!(db::get_archive(&conn, &task.id)
        .expect("get archive")
        .is_some());
}
