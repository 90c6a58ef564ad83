//! The optimistic write path. Every mutation lands in the local store (and
//! the outbox) before any network is attempted, so the local write always
//! succeeds from the caller's point of view; remote sync is eventually
//! consistent. When the device is online a direct remote call is attempted
//! as an optimization; on success the record is already synced and the
//! outbox entry is dropped.

use anyhow::Result;
use rusqlite::Connection;

use crate::db::{self, ActionFamily, Task, TaskDraft, TaskPatch, Workspace};
use crate::sync::{Connectivity, RemoteApi, SyncEngine, SyncSignal};

pub const DEFAULT_WORKSPACE_TITLE: &str = "Personal";

pub fn create_task<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
    draft: TaskDraft,
) -> Result<Task> {
    let mut task = db::create_task(conn, draft)?;

    if engine.is_online() {
        match engine.remote().create_task(&db::task_payload(&task)) {
            Ok(()) => {
                db::clear_record_entries(conn, &task.id, ActionFamily::Task)?;
                db::mark_task_synced(conn, &task.id)?;
                task.synced = true;
                return Ok(task);
            }
            Err(e) => {
                tracing::debug!("direct create failed, task stays queued: {e:#}");
            }
        }
    }

    engine.signal(SyncSignal::Enqueued);
    Ok(task)
}

pub fn update_task<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
    id: &str,
    patch: TaskPatch,
) -> Result<Task> {
    let mut task = db::update_task(conn, id, patch)?;

    if engine.is_online() {
        match engine.remote().update_task(&task.id, &db::task_payload(&task)) {
            Ok(()) => {
                db::clear_record_entries(conn, &task.id, ActionFamily::Task)?;
                db::mark_task_synced(conn, &task.id)?;
                task.synced = true;
                return Ok(task);
            }
            Err(e) => {
                tracing::debug!("direct update failed, edit stays queued: {e:#}");
            }
        }
    }

    engine.signal(SyncSignal::Enqueued);
    Ok(task)
}

/// A record whose only outbox trace is an unconfirmed `Create` never
/// reached the remote authority: it is purged outright, with no network
/// interaction ever happening for it. Anything else is tombstoned and a
/// `Delete` is queued.
pub fn delete_task<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
    id: &str,
) -> Result<()> {
    if db::get_task(conn, id)?.is_none() {
        return Ok(());
    }

    if db::has_pending_create(conn, id, ActionFamily::Task)? {
        return db::purge_task_local(conn, id);
    }

    db::tombstone_task(conn, id)?;
    engine.signal(SyncSignal::Enqueued);
    Ok(())
}

/// The UI's sole data source. Local only, tombstones excluded, never
/// blocks on network.
pub fn list_tasks(conn: &Connection, workspace_id: Option<&str>) -> Result<Vec<Task>> {
    db::list_tasks(conn, workspace_id)
}

pub fn create_workspace<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
    title: &str,
    color: Option<&str>,
) -> Result<Workspace> {
    let mut workspace = db::create_workspace(conn, title, color)?;

    if engine.is_online() {
        match engine
            .remote()
            .create_workspace(&db::workspace_payload(&workspace))
        {
            Ok(()) => {
                db::clear_record_entries(conn, &workspace.id, ActionFamily::Workspace)?;
                db::mark_workspace_synced(conn, &workspace.id)?;
                workspace.synced = true;
                return Ok(workspace);
            }
            Err(e) => {
                tracing::debug!("direct workspace create failed, stays queued: {e:#}");
            }
        }
    }

    engine.signal(SyncSignal::Enqueued);
    Ok(workspace)
}

pub fn delete_workspace<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
    id: &str,
) -> Result<()> {
    if db::get_workspace(conn, id)?.is_none() {
        return Ok(());
    }

    if db::has_pending_create(conn, id, ActionFamily::Workspace)? {
        return db::purge_workspace_local(conn, id);
    }

    db::tombstone_workspace(conn, id)?;
    engine.signal(SyncSignal::Enqueued);
    Ok(())
}

pub fn list_workspaces(conn: &Connection) -> Result<Vec<Workspace>> {
    db::list_workspaces(conn)
}

/// First-run convenience: a fresh install gets a "Personal" workspace so
/// the board is never empty.
pub fn ensure_default_workspace<R: RemoteApi, C: Connectivity>(
    conn: &Connection,
    engine: &SyncEngine<R, C>,
) -> Result<Workspace> {
    let existing = db::list_workspaces(conn)?;
    if let Some(first) = existing.into_iter().next() {
        return Ok(first);
    }
    create_workspace(conn, engine, DEFAULT_WORKSPACE_TITLE, None)
}
