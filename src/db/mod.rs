// This module is split into smaller files to keep each file focused on one
// collection. The pieces are `include!`'d so everything remains in
// `crate::db`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Local I/O failure. Fatal to the attempted operation; the caller must not
/// assume any partial write happened.
#[derive(Debug)]
pub struct StorageError {
    pub context: String,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage failure: {}", self.context)
    }
}

impl std::error::Error for StorageError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub kind: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub section: Option<String>,
    pub priority: Option<i64>,
    pub sort_order: Option<i64>,
    pub completed: bool,
    pub synced: bool,
    pub is_deleted: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Input for a new task. The id is minted on the device if absent and stays
/// stable for the record's entire lifetime.
#[derive(Clone, Debug, Default)]
pub struct TaskDraft {
    pub id: Option<String>,
    pub content: String,
    pub kind: Option<String>,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub section: Option<String>,
    pub priority: Option<i64>,
    pub sort_order: Option<i64>,
    pub completed: bool,
}

/// Partial update for a task. Fields left `None` keep their stored value;
/// there is deliberately no way to carry unknown fields.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub kind: Option<String>,
    pub workspace_id: Option<String>,
    pub project_id: Option<Option<String>>,
    pub section: Option<Option<String>>,
    pub priority: Option<Option<i64>>,
    pub sort_order: Option<Option<i64>>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub title: String,
    pub color: String,
    pub synced: bool,
    pub is_deleted: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub id: String,
    pub original_workspace: String,
    pub encrypted_payload: String,
    pub archived_at_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutboxAction {
    Create,
    Update,
    Delete,
    CreateWorkspace,
    DeleteWorkspace,
    CreateArchive,
    DeleteArchive,
}

/// Collapse scope: entries only ever collapse with entries of the same
/// family for the same record id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionFamily {
    Task,
    Workspace,
    Archive,
}

impl OutboxAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CreateWorkspace => "create_workspace",
            Self::DeleteWorkspace => "delete_workspace",
            Self::CreateArchive => "create_archive",
            Self::DeleteArchive => "delete_archive",
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(match text {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "create_workspace" => Self::CreateWorkspace,
            "delete_workspace" => Self::DeleteWorkspace,
            "create_archive" => Self::CreateArchive,
            "delete_archive" => Self::DeleteArchive,
            other => return Err(anyhow!("unknown outbox action: {other}")),
        })
    }

    pub fn family(&self) -> ActionFamily {
        match self {
            Self::Create | Self::Update | Self::Delete => ActionFamily::Task,
            Self::CreateWorkspace | Self::DeleteWorkspace => ActionFamily::Workspace,
            Self::CreateArchive | Self::DeleteArchive => ActionFamily::Archive,
        }
    }

    fn family_create(family: ActionFamily) -> Self {
        match family {
            ActionFamily::Task => Self::Create,
            ActionFamily::Workspace => Self::CreateWorkspace,
            ActionFamily::Archive => Self::CreateArchive,
        }
    }

    fn is_create(&self) -> bool {
        matches!(self, Self::Create | Self::CreateWorkspace | Self::CreateArchive)
    }

    fn is_delete(&self) -> bool {
        matches!(self, Self::Delete | Self::DeleteWorkspace | Self::DeleteArchive)
    }
}

#[derive(Clone, Debug)]
pub struct OutboxEntry {
    pub seq: i64,
    pub record_id: String,
    pub action: OutboxAction,
    pub payload: serde_json::Value,
    pub enqueued_at_ms: i64,
}

fn db_path(app_dir: &Path) -> PathBuf {
    app_dir.join("taskvault.sqlite3")
}

pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

pub fn new_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS tasks (
  id TEXT PRIMARY KEY,
  content TEXT NOT NULL,
  kind TEXT NOT NULL DEFAULT 'text',
  workspace_id TEXT NOT NULL,
  project_id TEXT,
  section TEXT,
  priority INTEGER,
  sort_order INTEGER,
  completed INTEGER NOT NULL DEFAULT 0,
  synced INTEGER NOT NULL DEFAULT 0,
  is_deleted INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_workspace ON tasks(workspace_id);
CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed);

CREATE TABLE IF NOT EXISTS workspaces (
  id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  color TEXT NOT NULL DEFAULT '#666666',
  synced INTEGER NOT NULL DEFAULT 0,
  is_deleted INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workspaces_deleted ON workspaces(is_deleted);

CREATE TABLE IF NOT EXISTS archives (
  id TEXT PRIMARY KEY,
  original_workspace TEXT NOT NULL,
  encrypted_payload TEXT NOT NULL,
  archived_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_archives_workspace ON archives(original_workspace);

CREATE TABLE IF NOT EXISTS outbox (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  record_id TEXT NOT NULL,
  action TEXT NOT NULL,
  payload TEXT NOT NULL,
  enqueued_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_outbox_record ON outbox(record_id);

PRAGMA user_version = 1;
"#,
        )?;
    }

    Ok(())
}

pub fn open(app_dir: &Path) -> Result<Connection> {
    fs::create_dir_all(app_dir).map_err(|e| StorageError {
        context: format!("create app dir: {e}"),
    })?;
    let conn = Connection::open(db_path(app_dir)).map_err(|e| StorageError {
        context: format!("open database: {e}"),
    })?;
    conn.busy_timeout(Duration::from_millis(5_000))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    migrate(&conn)?;
    Ok(conn)
}

/// Wipes every collection, including pending outbox entries. Sign-out /
/// reset path; the schema stays in place.
pub fn reset_local_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
BEGIN;
DELETE FROM tasks;
DELETE FROM workspaces;
DELETE FROM archives;
DELETE FROM outbox;
COMMIT;
"#,
    )
    .map_err(|e| StorageError {
        context: format!("reset local data: {e}"),
    })?;
    Ok(())
}

include!("parts/01_tasks.rs");
include!("parts/02_workspaces.rs");
include!("parts/03_outbox.rs");
include!("parts/04_archives.rs");
