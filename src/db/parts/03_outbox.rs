impl OutboxAction {
    fn family_delete(family: ActionFamily) -> Self {
        match family {
            ActionFamily::Task => Self::Delete,
            ActionFamily::Workspace => Self::DeleteWorkspace,
            ActionFamily::Archive => Self::DeleteArchive,
        }
    }
}

fn family_actions(family: ActionFamily) -> &'static str {
    match family {
        ActionFamily::Task => "'create', 'update', 'delete'",
        ActionFamily::Workspace => "'create_workspace', 'delete_workspace'",
        ActionFamily::Archive => "'create_archive', 'delete_archive'",
    }
}

fn find_entry_seq(
    conn: &Connection,
    record_id: &str,
    action: OutboxAction,
) -> Result<Option<i64>> {
    conn.query_row(
        r#"SELECT seq FROM outbox WHERE record_id = ?1 AND action = ?2"#,
        params![record_id, action.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

fn replace_entry_payload(
    conn: &Connection,
    seq: i64,
    payload: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        r#"UPDATE outbox SET payload = ?2 WHERE seq = ?1"#,
        params![seq, serde_json::to_string(payload)?],
    )?;
    Ok(())
}

/// Appends an entry, applying the collapsing algebra so the outbox only
/// ever carries the net effect per record:
/// - update onto a pending create folds into the create (same seq);
/// - update onto a pending update replaces the payload (same seq);
/// - delete onto a pending create removes both (the record never existed
///   remotely);
/// - delete drops any pending update it supersedes;
/// - create onto a pending delete takes over that entry's slot.
/// Task, workspace and archive actions collapse independently even for
/// equal record ids.
pub fn enqueue_outbox(
    conn: &Connection,
    action: OutboxAction,
    record_id: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let family = action.family();
    let create_action = OutboxAction::family_create(family);

    if action == OutboxAction::Update {
        if let Some(seq) = find_entry_seq(conn, record_id, create_action)? {
            return replace_entry_payload(conn, seq, payload);
        }
        if let Some(seq) = find_entry_seq(conn, record_id, OutboxAction::Update)? {
            return replace_entry_payload(conn, seq, payload);
        }
    }

    if action.is_delete() {
        if let Some(seq) = find_entry_seq(conn, record_id, create_action)? {
            remove_outbox_entry(conn, seq)?;
            return Ok(());
        }
        if family == ActionFamily::Task {
            if let Some(seq) = find_entry_seq(conn, record_id, OutboxAction::Update)? {
                remove_outbox_entry(conn, seq)?;
            }
        }
    }

    if action.is_create() {
        let delete_action = OutboxAction::family_delete(family);
        if let Some(seq) = find_entry_seq(conn, record_id, delete_action)? {
            conn.execute(
                r#"UPDATE outbox SET action = ?2, payload = ?3 WHERE seq = ?1"#,
                params![seq, action.as_str(), serde_json::to_string(payload)?],
            )?;
            return Ok(());
        }
    }

    conn.execute(
        r#"INSERT INTO outbox (record_id, action, payload, enqueued_at)
           VALUES (?1, ?2, ?3, ?4)"#,
        params![
            record_id,
            action.as_str(),
            serde_json::to_string(payload)?,
            now_ms()
        ],
    )?;
    Ok(())
}

pub fn list_outbox(conn: &Connection) -> Result<Vec<OutboxEntry>> {
    let mut stmt = conn.prepare(
        r#"SELECT seq, record_id, action, payload, enqueued_at
           FROM outbox
           ORDER BY seq ASC"#,
    )?;

    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let seq: i64 = row.get(0)?;
        let record_id: String = row.get(1)?;
        let action: String = row.get(2)?;
        let payload: String = row.get(3)?;
        let enqueued_at_ms: i64 = row.get(4)?;

        out.push(OutboxEntry {
            seq,
            record_id,
            action: OutboxAction::parse(&action)?,
            payload: serde_json::from_str(&payload)?,
            enqueued_at_ms,
        });
    }
    Ok(out)
}

pub fn outbox_len(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row(r#"SELECT COUNT(*) FROM outbox"#, [], |row| row.get(0))?;
    Ok(count as u64)
}

pub fn remove_outbox_entry(conn: &Connection, seq: i64) -> Result<()> {
    conn.execute(r#"DELETE FROM outbox WHERE seq = ?1"#, params![seq])?;
    Ok(())
}

/// True when the record's pending create has not been confirmed yet, i.e.
/// the remote authority has never seen this record.
pub fn has_pending_create(
    conn: &Connection,
    record_id: &str,
    family: ActionFamily,
) -> Result<bool> {
    Ok(find_entry_seq(conn, record_id, OutboxAction::family_create(family))?.is_some())
}

pub fn clear_record_entries(
    conn: &Connection,
    record_id: &str,
    family: ActionFamily,
) -> Result<()> {
    conn.execute(
        &format!(
            r#"DELETE FROM outbox WHERE record_id = ?1 AND action IN ({})"#,
            family_actions(family)
        ),
        params![record_id],
    )?;
    Ok(())
}
