use taskvault::db::{self, TaskDraft};
use taskvault::repo;
use taskvault::sync::{InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn one_bulk_call_for_upserts_then_singulars_in_enqueue_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let online = NetworkFlag::new(false);
    let engine = SyncEngine::new(InMemoryRemoteApi::new(), online.clone());

    let ws_first = repo::create_workspace(&conn, &engine, "Work", None).expect("workspace one");
    let ws_second = repo::create_workspace(&conn, &engine, "Home", None).expect("workspace two");

    for content in ["task a", "task b", "task c"] {
        repo::create_task(
            &conn,
            &engine,
            TaskDraft {
                content: content.to_string(),
                workspace_id: ws_first.id.clone(),
                ..Default::default()
            },
        )
        .expect("create task");
    }

    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 5);

    online.set_online(true);
    engine.drain(&conn).expect("drain");
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 0);

    let calls = engine.remote().calls();
    assert_eq!(
        calls,
        vec![
            "batch:3".to_string(),
            format!("create_workspace:{}", ws_first.id),
            format!("create_workspace:{}", ws_second.id),
        ]
    );

    for workspace in db::list_workspaces(&conn).expect("list workspaces") {
        assert!(workspace.synced);
    }
}
