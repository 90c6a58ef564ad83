use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use serde_json::Value;

use crate::db;

/// Transient transport failure: the device is offline, the server is
/// unreachable, or the call timed out. Never surfaced to the UI for
/// mutation calls; the outbox guarantees eventual delivery.
#[derive(Debug)]
pub struct NetworkError {
    pub context: String,
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "network failure: {}", self.context)
    }
}

impl std::error::Error for NetworkError {}

/// 4xx other than 401/403/404. The entry stays in the outbox and will be
/// retried; a persistent rejection is a data-modeling bug upstream.
#[derive(Debug)]
pub struct RemoteRejection {
    pub status: u16,
    pub body: String,
}

impl std::fmt::Display for RemoteRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote rejected the call: HTTP {} {}", self.status, self.body)
    }
}

impl std::error::Error for RemoteRejection {}

/// 401/403. Propagated up so the caller can re-authenticate; the outbox is
/// left intact and backoff is not armed.
#[derive(Debug)]
pub struct AuthError {
    pub status: u16,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "authentication rejected: HTTP {}", self.status)
    }
}

impl std::error::Error for AuthError {}

/// The remote authority has no record for the client identity. For deletes
/// this is success, not failure.
#[derive(Debug)]
pub struct RemoteNotFound {
    pub client_id: String,
}

impl std::fmt::Display for RemoteNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found on remote: {}", self.client_id)
    }
}

impl std::error::Error for RemoteNotFound {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub modified: u64,
    pub upserted: u64,
}

/// The two remote operations the core consumes (bulk upsert and singular
/// mutation), spelled out per record family, plus the hydration reads.
/// Payloads are wire-shaped snapshots keyed by client identity.
pub trait RemoteApi: Send + Sync {
    fn upsert_tasks(&self, items: &[Value]) -> Result<BatchSummary>;
    fn create_task(&self, payload: &Value) -> Result<()>;
    fn update_task(&self, client_id: &str, payload: &Value) -> Result<()>;
    fn delete_task(&self, client_id: &str) -> Result<()>;
    fn create_workspace(&self, payload: &Value) -> Result<()>;
    fn delete_workspace(&self, client_id: &str) -> Result<()>;
    fn create_archive(&self, payload: &Value) -> Result<()>;
    fn delete_archive(&self, client_id: &str) -> Result<()>;
    fn fetch_tasks(&self) -> Result<Vec<Value>>;
    fn fetch_workspaces(&self) -> Result<Vec<Value>>;
}

/// Connectivity probe. The engine only ever asks "is the device online
/// right now"; event delivery is a separate concern (see [`SyncSignal`]).
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Shared online/offline flag the embedding application flips from its
/// platform connectivity events.
#[derive(Clone)]
pub struct NetworkFlag(Arc<AtomicBool>);

impl NetworkFlag {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for NetworkFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn payload_client_id(payload: &Value) -> Option<&str> {
    payload["clientId"].as_str().or_else(|| payload["id"].as_str())
}

/// In-process stand-in for the remote authority. Keeps the applied records
/// and a call log so tests can assert exactly which network traffic a
/// scenario produced, and can be switched into failure modes.
pub struct InMemoryRemoteApi {
    tasks: Mutex<BTreeMap<String, Value>>,
    workspaces: Mutex<BTreeMap<String, Value>>,
    archives: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    fail_network: AtomicBool,
    fail_auth: AtomicBool,
}

impl InMemoryRemoteApi {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            workspaces: Mutex::new(BTreeMap::new()),
            archives: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_network: AtomicBool::new(false),
            fail_auth: AtomicBool::new(false),
        }
    }

    pub fn set_network_failing(&self, failing: bool) {
        self.fail_network.store(failing, Ordering::SeqCst);
    }

    pub fn set_auth_failing(&self, failing: bool) {
        self.fail_auth.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn task(&self, client_id: &str) -> Option<Value> {
        self.tasks.lock().ok()?.get(client_id).cloned()
    }

    pub fn workspace(&self, client_id: &str) -> Option<Value> {
        self.workspaces.lock().ok()?.get(client_id).cloned()
    }

    pub fn archive(&self, client_id: &str) -> Option<Value> {
        self.archives.lock().ok()?.get(client_id).cloned()
    }

    pub fn put_task(&self, payload: Value) {
        if let Some(id) = payload_client_id(&payload).map(|id| id.to_string()) {
            if let Ok(mut tasks) = self.tasks.lock() {
                tasks.insert(id, payload);
            }
        }
    }

    pub fn put_workspace(&self, payload: Value) {
        if let Some(id) = payload_client_id(&payload).map(|id| id.to_string()) {
            if let Ok(mut workspaces) = self.workspaces.lock() {
                workspaces.insert(id, payload);
            }
        }
    }

    fn check(&self, call: String) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(AuthError { status: 401 }.into());
        }
        if self.fail_network.load(Ordering::SeqCst) {
            return Err(NetworkError {
                context: format!("{call}: connection refused"),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for InMemoryRemoteApi {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteApi for InMemoryRemoteApi {
    fn upsert_tasks(&self, items: &[Value]) -> Result<BatchSummary> {
        self.check(format!("batch:{}", items.len()))?;

        let mut tasks = self.tasks.lock().map_err(|_| anyhow!("poisoned lock"))?;
        let mut summary = BatchSummary::default();
        for item in items {
            let Some(id) = payload_client_id(item) else {
                continue;
            };
            if tasks.insert(id.to_string(), item.clone()).is_some() {
                summary.modified += 1;
            } else {
                summary.upserted += 1;
            }
        }
        Ok(summary)
    }

    fn create_task(&self, payload: &Value) -> Result<()> {
        let id = payload_client_id(payload).unwrap_or_default().to_string();
        self.check(format!("create_task:{id}"))?;

        let mut tasks = self.tasks.lock().map_err(|_| anyhow!("poisoned lock"))?;
        tasks.insert(id, payload.clone());
        Ok(())
    }

    fn update_task(&self, client_id: &str, payload: &Value) -> Result<()> {
        self.check(format!("update_task:{client_id}"))?;

        let mut tasks = self.tasks.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if !tasks.contains_key(client_id) {
            return Err(RemoteNotFound {
                client_id: client_id.to_string(),
            }
            .into());
        }
        tasks.insert(client_id.to_string(), payload.clone());
        Ok(())
    }

    fn delete_task(&self, client_id: &str) -> Result<()> {
        self.check(format!("delete_task:{client_id}"))?;

        let mut tasks = self.tasks.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if tasks.remove(client_id).is_none() {
            return Err(RemoteNotFound {
                client_id: client_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn create_workspace(&self, payload: &Value) -> Result<()> {
        let id = payload_client_id(payload).unwrap_or_default().to_string();
        self.check(format!("create_workspace:{id}"))?;

        let mut workspaces = self.workspaces.lock().map_err(|_| anyhow!("poisoned lock"))?;
        workspaces.insert(id, payload.clone());
        Ok(())
    }

    fn delete_workspace(&self, client_id: &str) -> Result<()> {
        self.check(format!("delete_workspace:{client_id}"))?;

        let mut workspaces = self.workspaces.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if workspaces.remove(client_id).is_none() {
            return Err(RemoteNotFound {
                client_id: client_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn create_archive(&self, payload: &Value) -> Result<()> {
        let id = payload_client_id(payload).unwrap_or_default().to_string();
        self.check(format!("create_archive:{id}"))?;

        let mut archives = self.archives.lock().map_err(|_| anyhow!("poisoned lock"))?;
        archives.insert(id, payload.clone());
        Ok(())
    }

    fn delete_archive(&self, client_id: &str) -> Result<()> {
        self.check(format!("delete_archive:{client_id}"))?;

        let mut archives = self.archives.lock().map_err(|_| anyhow!("poisoned lock"))?;
        if archives.remove(client_id).is_none() {
            return Err(RemoteNotFound {
                client_id: client_id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn fetch_tasks(&self) -> Result<Vec<Value>> {
        self.check("fetch_tasks".to_string())?;

        let tasks = self.tasks.lock().map_err(|_| anyhow!("poisoned lock"))?;
        Ok(tasks.values().cloned().collect())
    }

    fn fetch_workspaces(&self) -> Result<Vec<Value>> {
        self.check("fetch_workspaces".to_string())?;

        let workspaces = self.workspaces.lock().map_err(|_| anyhow!("poisoned lock"))?;
        Ok(workspaces.values().cloned().collect())
    }
}
