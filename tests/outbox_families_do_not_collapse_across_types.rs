use taskvault::db::{self, OutboxAction};

#[test]
fn task_and_workspace_entries_with_equal_ids_stay_independent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let app_dir = temp.path().join("taskvault");
    let conn = db::open(&app_dir).expect("open db");

    // Same record id in two different families.
    db::enqueue_outbox(
        &conn,
        OutboxAction::CreateWorkspace,
        "shared-id",
        &serde_json::json!({ "id": "shared-id", "title": "Workspace" }),
    )
    .expect("enqueue workspace create");

    // A task delete for the same id must not cancel the workspace create.
    db::enqueue_outbox(
        &conn,
        OutboxAction::Delete,
        "shared-id",
        &serde_json::json!({ "id": "shared-id" }),
    )
    .expect("enqueue task delete");

    let entries = db::list_outbox(&conn).expect("list outbox");
    let actions: Vec<OutboxAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![OutboxAction::CreateWorkspace, OutboxAction::Delete]
    );

    // Within the archive family the net-zero rule still applies.
    db::enqueue_outbox(
        &conn,
        OutboxAction::CreateArchive,
        "arc-1",
        &serde_json::json!({ "id": "arc-1" }),
    )
    .expect("enqueue archive create");
    db::enqueue_outbox(
        &conn,
        OutboxAction::DeleteArchive,
        "arc-1",
        &serde_json::json!({ "id": "arc-1" }),
    )
    .expect("enqueue archive delete");

    assert_eq!(db::outbox_len(&conn).expect("outbox len"), 2);
}
