fn workspace_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        title: row.get(1)?,
        color: row.get(2)?,
        synced: row.get::<_, i64>(3)? != 0,
        is_deleted: row.get::<_, i64>(4)? != 0,
        created_at_ms: row.get(5)?,
        updated_at_ms: row.get(6)?,
    })
}

const WORKSPACE_COLUMNS: &str = "id, title, color, synced, is_deleted, created_at, updated_at";

pub const DEFAULT_WORKSPACE_COLOR: &str = "#666666";

pub fn get_workspace(conn: &Connection, id: &str) -> Result<Option<Workspace>> {
    conn.query_row(
        &format!(r#"SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?1"#),
        params![id],
        workspace_from_row,
    )
    .optional()
    .map_err(Into::into)
}

fn put_workspace_row(conn: &Connection, workspace: &Workspace) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO workspaces (id, title, color, synced, is_deleted, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(id) DO UPDATE SET
  title = excluded.title,
  color = excluded.color,
  synced = excluded.synced,
  is_deleted = excluded.is_deleted,
  updated_at = excluded.updated_at
"#,
        params![
            workspace.id,
            workspace.title,
            workspace.color,
            workspace.synced as i64,
            workspace.is_deleted as i64,
            workspace.created_at_ms,
            workspace.updated_at_ms,
        ],
    )?;
    Ok(())
}

pub fn workspace_payload(workspace: &Workspace) -> serde_json::Value {
    serde_json::json!({
        "id": workspace.id.as_str(),
        "clientId": workspace.id.as_str(),
        "title": workspace.title.as_str(),
        "color": workspace.color.as_str(),
        "createdAt": workspace.created_at_ms,
        "updatedAt": workspace.updated_at_ms,
    })
}

pub fn create_workspace(
    conn: &Connection,
    title: &str,
    color: Option<&str>,
) -> Result<Workspace> {
    if title.trim().is_empty() {
        return Err(anyhow!("workspace title must not be empty"));
    }

    let now = now_ms();
    let workspace = Workspace {
        id: new_client_id(),
        title: title.to_string(),
        color: color.unwrap_or(DEFAULT_WORKSPACE_COLOR).to_string(),
        synced: false,
        is_deleted: false,
        created_at_ms: now,
        updated_at_ms: now,
    };

    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        put_workspace_row(conn, &workspace)?;
        enqueue_outbox(
            conn,
            OutboxAction::CreateWorkspace,
            &workspace.id,
            &workspace_payload(&workspace),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit create workspace: {e}"),
            })?;
            Ok(workspace)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

pub fn tombstone_workspace(conn: &Connection, id: &str) -> Result<()> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        let updated = conn.execute(
            r#"UPDATE workspaces SET is_deleted = 1, synced = 0, updated_at = ?2 WHERE id = ?1"#,
            params![id, now_ms()],
        )?;
        if updated == 0 {
            return Err(anyhow!("workspace not found: {id}"));
        }
        enqueue_outbox(
            conn,
            OutboxAction::DeleteWorkspace,
            id,
            &serde_json::json!({ "id": id }),
        )?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit delete workspace: {e}"),
            })?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

pub fn purge_workspace_local(conn: &Connection, id: &str) -> Result<()> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<()> = (|| {
        clear_record_entries(conn, id, ActionFamily::Workspace)?;
        conn.execute(r#"DELETE FROM workspaces WHERE id = ?1"#, params![id])?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit purge workspace: {e}"),
            })?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

pub fn purge_workspace(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(r#"DELETE FROM workspaces WHERE id = ?1"#, params![id])?;
    Ok(())
}

pub fn mark_workspace_synced(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        r#"UPDATE workspaces SET synced = 1 WHERE id = ?1"#,
        params![id],
    )?;
    Ok(())
}

pub fn list_workspaces(conn: &Connection) -> Result<Vec<Workspace>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT {WORKSPACE_COLUMNS} FROM workspaces
           WHERE is_deleted = 0
           ORDER BY created_at ASC, id ASC"#
    ))?;

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(workspace_from_row(row)?);
    }
    Ok(out)
}

/// Hydration upsert with the same unsynced-local guard as tasks.
pub fn apply_remote_workspace(conn: &Connection, payload: &serde_json::Value) -> Result<bool> {
    let Some(id) = payload["clientId"]
        .as_str()
        .or_else(|| payload["id"].as_str())
    else {
        return Ok(false);
    };

    let now = now_ms();
    let applied = conn.execute(
        r#"
INSERT INTO workspaces (id, title, color, synced, is_deleted, created_at, updated_at)
VALUES (?1, ?2, ?3, 1, 0, ?4, ?5)
ON CONFLICT(id) DO UPDATE SET
  title = excluded.title,
  color = excluded.color,
  synced = 1,
  is_deleted = 0,
  updated_at = excluded.updated_at
WHERE workspaces.synced = 1
"#,
        params![
            id,
            payload["title"].as_str().unwrap_or_default(),
            payload["color"].as_str().unwrap_or(DEFAULT_WORKSPACE_COLOR),
            payload["createdAt"].as_i64().unwrap_or(now),
            payload["updatedAt"].as_i64().unwrap_or(now),
        ],
    )?;

    Ok(applied > 0)
}
