use taskvault::db::{self, TaskDraft, TaskPatch};
use taskvault::repo;
use taskvault::sync::{InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn online_create_and_update_reach_the_remote_directly() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(true));

    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "instant".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    assert!(task.synced);
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 0);
    assert!(engine.remote().task(&task.id).is_some());

    let updated = repo::update_task(
        &conn,
        &engine,
        &task.id,
        TaskPatch {
            content: Some("instant, edited".to_string()),
            ..Default::default()
        },
    )
    .expect("update task");

    assert!(updated.synced);
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 0);
    let remote_copy = engine.remote().task(&task.id).expect("remote copy");
    assert_eq!(remote_copy["content"].as_str(), Some("instant, edited"));
}
