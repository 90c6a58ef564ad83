use std::time::Duration;

use taskvault::db::{self, TaskDraft};
use taskvault::sync::{InMemoryRemoteApi, NetworkError, NetworkFlag, SyncEngine};

#[test]
fn failed_drain_loses_nothing_and_doubles_the_retry_delay() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(true));
    engine.remote().set_network_failing(true);

    db::create_task(
        &conn,
        TaskDraft {
            content: "unreachable server".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    let before = db::outbox_len(&conn).expect("outbox len");
    assert_eq!(before, 1);
    assert_eq!(engine.retry_delay(), None);

    let err = engine.drain(&conn).expect_err("drain must fail");
    assert!(err.is::<NetworkError>());
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), before);
    assert_eq!(engine.retry_delay(), Some(Duration::from_millis(1_000)));

    let err = engine.drain(&conn).expect_err("drain must fail again");
    assert!(err.is::<NetworkError>());
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), before);
    assert_eq!(engine.retry_delay(), Some(Duration::from_millis(2_000)));

    // Server back: the pass succeeds and the delay resets to the base.
    engine.remote().set_network_failing(false);
    engine.drain(&conn).expect("drain succeeds");
    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 0);
    assert_eq!(engine.retry_delay(), None);
}

#[test]
fn retry_delay_is_capped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    let engine = SyncEngine::new(InMemoryRemoteApi::new(), NetworkFlag::new(true));
    engine.remote().set_network_failing(true);

    db::create_task(
        &conn,
        TaskDraft {
            content: "still unreachable".to_string(),
            workspace_id: "ws-1".to_string(),
            ..Default::default()
        },
    )
    .expect("create task");

    for _ in 0..8 {
        let _ = engine.drain(&conn).expect_err("drain must fail");
    }
    assert_eq!(engine.retry_delay(), Some(Duration::from_millis(30_000)));
}
