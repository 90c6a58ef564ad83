use taskvault::db::{self, TaskDraft};
use taskvault::repo;
use taskvault::sync::{self, InMemoryRemoteApi, NetworkFlag, SyncEngine};

#[test]
fn hydration_never_overwrites_a_record_with_a_pending_local_edit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(false));

    // An offline edit the remote has not seen.
    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "local edit".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    // The remote holds a different (older) copy under the same identity.
    engine.remote().put_task(serde_json::json!({
        "clientId": task.id.as_str(),
        "content": "stale remote copy",
        "workspaceId": "ws-1",
    }));

    sync::hydrate_tasks(&conn, engine.remote()).expect("hydrate");

    let stored = db::get_task(&conn, &task.id)
        .expect("get task")
        .expect("task exists");
    assert_eq!(stored.content, "local edit");
    assert!(!stored.synced);
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 1);
}

#[test]
fn hydration_applies_remote_state_to_synced_records_and_new_ones() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let online = NetworkFlag::new(true);
    let engine = SyncEngine::new(InMemoryRemoteApi::new(), online.clone());

    let task = repo::create_task(
        &conn,
        &engine,
        TaskDraft {
            content: "synced copy".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");
    assert!(task.synced);

    // Another device edited the record and created a new one.
    engine.remote().put_task(serde_json::json!({
        "clientId": task.id.as_str(),
        "content": "edited elsewhere",
        "workspaceId": "ws-1",
    }));
    engine.remote().put_task(serde_json::json!({
        "clientId": "t-from-other-device",
        "content": "born elsewhere",
        "workspaceId": "ws-1",
    }));

    let applied = sync::hydrate_tasks(&conn, engine.remote()).expect("hydrate");
    assert_eq!(applied, 2);

    let stored = db::get_task(&conn, &task.id)
        .expect("get task")
        .expect("task exists");
    assert_eq!(stored.content, "edited elsewhere");
    assert!(stored.synced);

    let imported = db::get_task(&conn, "t-from-other-device")
        .expect("get task")
        .expect("imported task");
    assert_eq!(imported.content, "born elsewhere");
    assert!(imported.synced);
}

#[test]
fn workspace_hydration_honors_the_same_guard() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(false));

    let workspace = repo::create_workspace(&conn, &engine, "Renamed offline", None)
        .expect("create workspace");

    engine.remote().put_workspace(serde_json::json!({
        "clientId": workspace.id.as_str(),
        "title": "Stale remote title",
    }));
    engine.remote().put_workspace(serde_json::json!({
        "clientId": "ws-from-other-device",
        "title": "Shared board",
        "color": "#112233",
    }));

    let applied = sync::hydrate_workspaces(&conn, engine.remote()).expect("hydrate");
    assert_eq!(applied, 1);

    let local = db::get_workspace(&conn, &workspace.id)
        .expect("get workspace")
        .expect("workspace exists");
    assert_eq!(local.title, "Renamed offline");
    assert!(!local.synced);

    let imported = db::get_workspace(&conn, "ws-from-other-device")
        .expect("get workspace")
        .expect("imported workspace");
    assert_eq!(imported.title, "Shared board");
    assert_eq!(imported.color, "#112233");
    assert!(imported.synced);
}
