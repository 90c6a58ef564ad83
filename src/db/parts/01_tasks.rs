fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: row.get(2)?,
        workspace_id: row.get(3)?,
        project_id: row.get(4)?,
        section: row.get(5)?,
        priority: row.get(6)?,
        sort_order: row.get(7)?,
        completed: row.get::<_, i64>(8)? != 0,
        synced: row.get::<_, i64>(9)? != 0,
        is_deleted: row.get::<_, i64>(10)? != 0,
        created_at_ms: row.get(11)?,
        updated_at_ms: row.get(12)?,
    })
}

const TASK_COLUMNS: &str = "id, content, kind, workspace_id, project_id, section, priority, \
     sort_order, completed, synced, is_deleted, created_at, updated_at";

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    conn.query_row(
        &format!(r#"SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"#),
        params![id],
        task_from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn put_task_row(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO tasks (
  id, content, kind, workspace_id, project_id, section, priority,
  sort_order, completed, synced, is_deleted, created_at, updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT(id) DO UPDATE SET
  content = excluded.content,
  kind = excluded.kind,
  workspace_id = excluded.workspace_id,
  project_id = excluded.project_id,
  section = excluded.section,
  priority = excluded.priority,
  sort_order = excluded.sort_order,
  completed = excluded.completed,
  synced = excluded.synced,
  is_deleted = excluded.is_deleted,
  updated_at = excluded.updated_at
"#,
        params![
            task.id,
            task.content,
            task.kind,
            task.workspace_id,
            task.project_id,
            task.section,
            task.priority,
            task.sort_order,
            task.completed as i64,
            task.synced as i64,
            task.is_deleted as i64,
            task.created_at_ms,
            task.updated_at_ms,
        ],
    )?;
    Ok(())
}

/// Remote wire shape for a task snapshot. The client identity travels as
/// `clientId`; the remote authority keys every upsert on it.
pub fn task_payload(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "id": task.id.as_str(),
        "clientId": task.id.as_str(),
        "content": task.content.as_str(),
        "type": task.kind.as_str(),
        "workspaceId": task.workspace_id.as_str(),
        "projectId": task.project_id.as_deref(),
        "section": task.section.as_deref(),
        "priority": task.priority,
        "sortOrder": task.sort_order,
        "completed": task.completed,
        "createdAt": task.created_at_ms,
        "updatedAt": task.updated_at_ms,
    })
}

/// Writes the task and its `Create` outbox entry in one transaction so a
/// crash never leaves the two collections inconsistent.
pub fn create_task(conn: &Connection, draft: TaskDraft) -> Result<Task> {
    if draft.workspace_id.trim().is_empty() {
        return Err(anyhow!("task must belong to a workspace"));
    }

    let now = now_ms();
    let task = Task {
        id: draft.id.unwrap_or_else(new_client_id),
        content: draft.content,
        kind: draft.kind.unwrap_or_else(|| "text".to_string()),
        workspace_id: draft.workspace_id,
        project_id: draft.project_id,
        section: draft.section,
        priority: draft.priority,
        sort_order: draft.sort_order,
        completed: draft.completed,
        synced: false,
        is_deleted: false,
        created_at_ms: now,
        updated_at_ms: now,
    };

    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        put_task_row(conn, &task)?;
        enqueue_outbox(conn, OutboxAction::Create, &task.id, &task_payload(&task))?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit create task: {e}"),
            })?;
            Ok(task)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Merges `patch` into the stored task, restamps `updated_at`, clears the
/// synced flag, and enqueues (or collapses) an `Update` entry.
pub fn update_task(conn: &Connection, id: &str, patch: TaskPatch) -> Result<Task> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<Task> = (|| {
        let mut task = get_task(conn, id)?.ok_or_else(|| anyhow!("task not found: {id}"))?;

        if let Some(content) = patch.content {
            task.content = content;
        }
        if let Some(kind) = patch.kind {
            task.kind = kind;
        }
        if let Some(workspace_id) = patch.workspace_id {
            task.workspace_id = workspace_id;
        }
        if let Some(project_id) = patch.project_id {
            task.project_id = project_id;
        }
        if let Some(section) = patch.section {
            task.section = section;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(sort_order) = patch.sort_order {
            task.sort_order = sort_order;
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        task.synced = false;
        task.updated_at_ms = now_ms();

        put_task_row(conn, &task)?;
        enqueue_outbox(conn, OutboxAction::Update, &task.id, &task_payload(&task))?;
        Ok(task)
    })();

    match result {
        Ok(task) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit update task: {e}"),
            })?;
            Ok(task)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Soft delete: the row is kept (invisible to reads) until the remote
/// authority confirms the delete, then purged by the sync engine.
pub fn tombstone_task(conn: &Connection, id: &str) -> Result<()> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        let updated = conn.execute(
            r#"UPDATE tasks SET is_deleted = 1, synced = 0, updated_at = ?2 WHERE id = ?1"#,
            params![id, now_ms()],
        )?;
        if updated == 0 {
            return Err(anyhow!("task not found: {id}"));
        }
        enqueue_outbox(
            conn,
            OutboxAction::Delete,
            id,
            &serde_json::json!({ "id": id }),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit delete task: {e}"),
            })?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Removes a task that never reached the remote authority, together with
/// every pending outbox entry for it. No network interaction ever happens
/// for such a record.
pub fn purge_task_local(conn: &Connection, id: &str) -> Result<()> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        clear_record_entries(conn, id, ActionFamily::Task)?;
        conn.execute(r#"DELETE FROM tasks WHERE id = ?1"#, params![id])?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit purge task: {e}"),
            })?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Physical removal of a tombstoned row once its delete is confirmed.
pub fn purge_task(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(r#"DELETE FROM tasks WHERE id = ?1"#, params![id])?;
    Ok(())
}

pub fn mark_task_synced(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        r#"UPDATE tasks SET synced = 1 WHERE id = ?1"#,
        params![id],
    )?;
    Ok(())
}

/// The UI's sole data source: local rows only, tombstones excluded.
pub fn list_tasks(conn: &Connection, workspace_id: Option<&str>) -> Result<Vec<Task>> {
    let mut out = Vec::new();

    match workspace_id {
        Some(workspace_id) => {
            let mut stmt = conn.prepare(&format!(
                r#"SELECT {TASK_COLUMNS} FROM tasks
                   WHERE is_deleted = 0 AND workspace_id = ?1
                   ORDER BY created_at DESC, id ASC"#
            ))?;
            let mut rows = stmt.query(params![workspace_id])?;
            while let Some(row) = rows.next()? {
                out.push(task_from_row(row)?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                r#"SELECT {TASK_COLUMNS} FROM tasks
                   WHERE is_deleted = 0
                   ORDER BY created_at DESC, id ASC"#
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                out.push(task_from_row(row)?);
            }
        }
    }

    Ok(out)
}

/// Hydration upsert. A local row with `synced = 0` carries an edit the
/// remote has not seen yet; the remote copy must not clobber it, so the
/// conditional upsert leaves such rows untouched.
pub fn apply_remote_task(conn: &Connection, payload: &serde_json::Value) -> Result<bool> {
    let Some(id) = payload["clientId"]
        .as_str()
        .or_else(|| payload["id"].as_str())
    else {
        return Ok(false);
    };

    let now = now_ms();
    let applied = conn.execute(
        r#"
INSERT INTO tasks (
  id, content, kind, workspace_id, project_id, section, priority,
  sort_order, completed, synced, is_deleted, created_at, updated_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, 0, ?10, ?11)
ON CONFLICT(id) DO UPDATE SET
  content = excluded.content,
  kind = excluded.kind,
  workspace_id = excluded.workspace_id,
  project_id = excluded.project_id,
  section = excluded.section,
  priority = excluded.priority,
  sort_order = excluded.sort_order,
  completed = excluded.completed,
  synced = 1,
  is_deleted = 0,
  updated_at = excluded.updated_at
WHERE tasks.synced = 1
"#,
        params![
            id,
            payload["content"].as_str().unwrap_or_default(),
            payload["type"].as_str().unwrap_or("text"),
            payload["workspaceId"].as_str().unwrap_or_default(),
            payload["projectId"].as_str(),
            payload["section"].as_str(),
            payload["priority"].as_i64(),
            payload["sortOrder"].as_i64(),
            payload["completed"].as_bool().unwrap_or(false) as i64,
            payload["createdAt"].as_i64().unwrap_or(now),
            payload["updatedAt"].as_i64().unwrap_or(now),
        ],
    )?;

    Ok(applied > 0)
}
