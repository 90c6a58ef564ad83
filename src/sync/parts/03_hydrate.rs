/// Pulls the remote view of the task set into the local store. Records the
/// remote sends arrive marked `synced`; a local row with an un-uploaded
/// edit (`synced = 0`) is never overwritten. The pending outbox entry
/// ships the local state first, after which hydration converges.
pub fn hydrate_tasks(conn: &Connection, remote: &impl RemoteApi) -> Result<u64> {
    let items = remote.fetch_tasks()?;

    let mut applied = 0u64;
    for item in &items {
        if db::apply_remote_task(conn, item)? {
            applied += 1;
        }
    }
    Ok(applied)
}

pub fn hydrate_workspaces(conn: &Connection, remote: &impl RemoteApi) -> Result<u64> {
    let items = remote.fetch_workspaces()?;

    let mut applied = 0u64;
    for item in &items {
        if db::apply_remote_workspace(conn, item)? {
            applied += 1;
        }
    }
    Ok(applied)
}
