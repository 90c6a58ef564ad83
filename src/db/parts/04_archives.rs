fn archive_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArchiveRecord> {
    Ok(ArchiveRecord {
        id: row.get(0)?,
        original_workspace: row.get(1)?,
        encrypted_payload: row.get(2)?,
        archived_at_ms: row.get(3)?,
    })
}

pub fn get_archive(conn: &Connection, id: &str) -> Result<Option<ArchiveRecord>> {
    conn.query_row(
        r#"SELECT id, original_workspace, encrypted_payload, archived_at
           FROM archives WHERE id = ?1"#,
        params![id],
        archive_from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn put_archive_row(conn: &Connection, archive: &ArchiveRecord) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO archives (id, original_workspace, encrypted_payload, archived_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(id) DO UPDATE SET
  original_workspace = excluded.original_workspace,
  encrypted_payload = excluded.encrypted_payload,
  archived_at = excluded.archived_at
"#,
        params![
            archive.id,
            archive.original_workspace,
            archive.encrypted_payload,
            archive.archived_at_ms,
        ],
    )?;
    Ok(())
}

pub fn delete_archive_row(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(r#"DELETE FROM archives WHERE id = ?1"#, params![id])?;
    Ok(())
}

pub fn list_archives_for_workspace(
    conn: &Connection,
    workspace_id: &str,
) -> Result<Vec<ArchiveRecord>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, original_workspace, encrypted_payload, archived_at
           FROM archives
           WHERE original_workspace = ?1
           ORDER BY archived_at ASC, id ASC"#,
    )?;

    let mut rows = stmt.query(params![workspace_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(archive_from_row(row)?);
    }
    Ok(out)
}

pub fn archive_payload(archive: &ArchiveRecord) -> serde_json::Value {
    serde_json::json!({
        "id": archive.id.as_str(),
        "originalWorkspace": archive.original_workspace.as_str(),
        "encryptedData": archive.encrypted_payload.as_str(),
        "archivedAt": archive.archived_at_ms,
    })
}
