use taskvault::db::{self, TaskDraft};
use taskvault::repo;
use taskvault::sync::{InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn failed_direct_write_keeps_the_entry_queued_for_eventual_delivery() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(true));
    engine.remote().set_network_failing(true);

    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "flaky network".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    // The local write succeeded; the remote call did not. Nothing is lost.
    assert!(!task.synced);
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 1);
    assert!(engine.remote().task(&task.id).is_none());

    engine.remote().set_network_failing(false);
    engine.drain(&conn).expect("drain");

    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 0);
    let stored = db::get_task(&conn, &task.id)
        .expect("get task")
        .expect("task exists");
    assert!(stored.synced);
    assert!(engine.remote().task(&task.id).is_some());
}
