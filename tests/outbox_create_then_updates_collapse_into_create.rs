use taskvault::db::{self, OutboxAction, TaskDraft, TaskPatch};
use taskvault::repo;
use taskvault::sync::{InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn updates_on_a_pending_create_fold_into_one_create_entry() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(false));

    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "first".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    repo::update_task(
        &conn,
        &engine,
        &task.id,
        TaskPatch {
            content: Some("second".to_string()),
            ..Default::default()
        },
    )
    .expect("first update");

    repo::update_task(
        &conn,
        &engine,
        &task.id,
        TaskPatch {
            priority: Some(Some(2)),
            ..Default::default()
        },
    )
    .expect("second update");

    let entries = db::list_outbox(&conn).expect("list outbox");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, OutboxAction::Create);
    assert_eq!(entries[0].record_id, task.id);

    // The single entry carries the record state after both patches.
    assert_eq!(entries[0].payload["content"].as_str(), Some("second"));
    assert_eq!(entries[0].payload["priority"].as_i64(), Some(2));
}
