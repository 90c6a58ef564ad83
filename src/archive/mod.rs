//! Archive pipeline: bulk-encrypts completed tasks into encrypted-at-rest
//! archive records and restores them in reverse. Runs on its own worker
//! thread with its own connection; callers talk to it through a
//! request/reply channel, so encrypting a large batch never blocks the
//! caller's thread and no mutable state is shared.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::crypto::{self, ArchiveKey};
use crate::db::{self, ArchiveRecord, OutboxAction, StorageError, Task};

/// Encrypts each completed task in `task_ids`, writes the archive record,
/// removes the source task and queues the `Delete` + `CreateArchive` pair,
/// all inside one transaction, so a crash mid-batch archives nothing.
/// Tasks that are not completed (or already tombstoned) are skipped.
pub fn archive_tasks(conn: &Connection, key: &ArchiveKey, task_ids: &[String]) -> Result<u64> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<u64> = (|| {
        let mut count = 0u64;
        for id in task_ids {
            let Some(task) = db::get_task(conn, id)? else {
                continue;
            };
            if !task.completed || task.is_deleted {
                continue;
            }

            let archive = ArchiveRecord {
                id: task.id.clone(),
                original_workspace: task.workspace_id.clone(),
                encrypted_payload: crypto::encrypt_payload(key, task.content.as_bytes())?,
                archived_at_ms: db::now_ms(),
            };

            db::put_archive_row(conn, &archive)?;
            db::purge_task(conn, &task.id)?;
            db::enqueue_outbox(
                conn,
                OutboxAction::Delete,
                &task.id,
                &serde_json::json!({ "id": task.id.as_str() }),
            )?;
            db::enqueue_outbox(
                conn,
                OutboxAction::CreateArchive,
                &archive.id,
                &db::archive_payload(&archive),
            )?;
            count += 1;
        }
        Ok(count)
    })();

    match result {
        Ok(count) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit archive batch: {e}"),
            })?;
            Ok(count)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

/// Decrypts every archive record of the workspace and reinstates the tasks
/// (completed, unsynced). A failed authentication tag rolls the whole batch
/// back and reports the failure; corrupted plaintext is never written.
pub fn unarchive_workspace(
    conn: &Connection,
    key: &ArchiveKey,
    workspace_id: &str,
) -> Result<u64> {
    conn.execute_batch("BEGIN IMMEDIATE;")?;

    let result: Result<u64> = (|| {
        let archives = db::list_archives_for_workspace(conn, workspace_id)?;

        let mut count = 0u64;
        for archive in archives {
            let plaintext = crypto::decrypt_payload(key, &archive.encrypted_payload)?;
            let content = String::from_utf8(plaintext)
                .map_err(|_| anyhow!("archived content is not valid utf-8"))?;

            let task = Task {
                id: archive.id.clone(),
                content,
                kind: "text".to_string(),
                workspace_id: archive.original_workspace.clone(),
                project_id: None,
                section: None,
                priority: None,
                sort_order: None,
                completed: true,
                synced: false,
                is_deleted: false,
                created_at_ms: archive.archived_at_ms,
                updated_at_ms: db::now_ms(),
            };

            db::put_task_row(conn, &task)?;
            db::delete_archive_row(conn, &archive.id)?;
            db::enqueue_outbox(conn, OutboxAction::Create, &task.id, &db::task_payload(&task))?;
            db::enqueue_outbox(
                conn,
                OutboxAction::DeleteArchive,
                &archive.id,
                &serde_json::json!({ "id": archive.id.as_str() }),
            )?;
            count += 1;
        }
        Ok(count)
    })();

    match result {
        Ok(count) => {
            conn.execute_batch("COMMIT;").map_err(|e| StorageError {
                context: format!("commit unarchive batch: {e}"),
            })?;
            Ok(count)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

pub enum ArchiveCommand {
    Archive {
        task_ids: Vec<String>,
        reply: mpsc::Sender<ArchiveReply>,
    },
    Unarchive {
        workspace_id: String,
        reply: mpsc::Sender<ArchiveReply>,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum ArchiveReply {
    Archived(u64),
    Restored(u64),
    Failed(String),
}

/// Handle to the archive worker thread. Each request blocks the caller
/// until the worker replies, so at most one archive operation is in flight
/// per handle by construction.
pub struct ArchiveWorker {
    tx: mpsc::Sender<ArchiveCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ArchiveWorker {
    pub fn spawn(app_dir: &Path, key: ArchiveKey) -> Self {
        let (tx, rx) = mpsc::channel();
        let app_dir: PathBuf = app_dir.to_path_buf();
        let handle = thread::spawn(move || worker_loop(&app_dir, &key, &rx));
        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn archive(&self, task_ids: Vec<String>) -> Result<u64> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(ArchiveCommand::Archive {
                task_ids,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("archive worker is gone"))?;

        match reply_rx
            .recv()
            .map_err(|_| anyhow!("archive worker dropped the reply"))?
        {
            ArchiveReply::Archived(count) => Ok(count),
            ArchiveReply::Failed(message) => Err(anyhow!(message)),
            other => Err(anyhow!("unexpected archive reply: {other:?}")),
        }
    }

    pub fn unarchive(&self, workspace_id: &str) -> Result<u64> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(ArchiveCommand::Unarchive {
                workspace_id: workspace_id.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("archive worker is gone"))?;

        match reply_rx
            .recv()
            .map_err(|_| anyhow!("archive worker dropped the reply"))?
        {
            ArchiveReply::Restored(count) => Ok(count),
            ArchiveReply::Failed(message) => Err(anyhow!(message)),
            other => Err(anyhow!("unexpected archive reply: {other:?}")),
        }
    }
}

impl Drop for ArchiveWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(ArchiveCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(app_dir: &Path, key: &ArchiveKey, rx: &mpsc::Receiver<ArchiveCommand>) {
    let conn = match db::open(app_dir) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("archive worker could not open the local store: {e:#}");
            // Fail every request instead of leaving callers hanging.
            while let Ok(command) = rx.recv() {
                match command {
                    ArchiveCommand::Archive { reply, .. }
                    | ArchiveCommand::Unarchive { reply, .. } => {
                        let _ = reply.send(ArchiveReply::Failed("local store unavailable".into()));
                    }
                    ArchiveCommand::Shutdown => break,
                }
            }
            return;
        }
    };

    while let Ok(command) = rx.recv() {
        match command {
            ArchiveCommand::Archive { task_ids, reply } => {
                let outcome = match archive_tasks(&conn, key, &task_ids) {
                    Ok(count) => ArchiveReply::Archived(count),
                    Err(e) => {
                        tracing::warn!("archive batch failed: {e:#}");
                        ArchiveReply::Failed(format!("{e:#}"))
                    }
                };
                let _ = reply.send(outcome);
            }
            ArchiveCommand::Unarchive {
                workspace_id,
                reply,
            } => {
                let outcome = match unarchive_workspace(&conn, key, &workspace_id) {
                    Ok(count) => ArchiveReply::Restored(count),
                    Err(e) => {
                        tracing::warn!("unarchive batch failed: {e:#}");
                        ArchiveReply::Failed(format!("{e:#}"))
                    }
                };
                let _ = reply.send(outcome);
            }
            ArchiveCommand::Shutdown => break,
        }
    }
}
