use anyhow::Result;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use super::{AuthError, BatchSummary, NetworkError, RemoteApi, RemoteNotFound, RemoteRejection};

#[derive(Debug, Default, Deserialize)]
struct BatchResponse {
    #[serde(rename = "modifiedCount", default)]
    modified_count: u64,
    #[serde(rename = "upsertedCount", default)]
    upserted_count: u64,
}

pub fn join_base_url_and_path(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Remote authority over HTTP. The bearer credential comes from the
/// external session component; a 401/403 here means the caller must
/// obtain a fresh one, nothing is retried with a stale token.
pub struct HttpRemote {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = token.to_string();
    }

    fn url(&self, path: &str) -> String {
        join_base_url_and_path(&self.base_url, path)
    }

    fn send(&self, req: RequestBuilder, context: &str) -> Result<(u16, String)> {
        let resp = req.bearer_auth(&self.token).send().map_err(|e| NetworkError {
            context: format!("{context}: {e}"),
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().unwrap_or_default();
        Ok((status, text))
    }

    fn confirm(context: &str, client_id: &str, status: u16, body: String) -> Result<String> {
        match status {
            200..=299 => Ok(body),
            401 | 403 => Err(AuthError { status }.into()),
            404 => Err(RemoteNotFound {
                client_id: client_id.to_string(),
            }
            .into()),
            400..=499 => Err(RemoteRejection { status, body }.into()),
            _ => Err(NetworkError {
                context: format!("{context}: HTTP {status} {body}"),
            }
            .into()),
        }
    }
}

impl RemoteApi for HttpRemote {
    fn upsert_tasks(&self, items: &[Value]) -> Result<BatchSummary> {
        let (status, body) = self.send(
            self.client
                .post(self.url("/api/tasks/batch"))
                .json(&serde_json::json!({ "tasks": items })),
            "batch upsert",
        )?;
        let body = Self::confirm("batch upsert", "", status, body)?;

        let parsed: BatchResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(BatchSummary {
            modified: parsed.modified_count,
            upserted: parsed.upserted_count,
        })
    }

    fn create_task(&self, payload: &Value) -> Result<()> {
        let (status, body) = self.send(
            self.client.post(self.url("/api/tasks")).json(payload),
            "create task",
        )?;
        Self::confirm("create task", "", status, body)?;
        Ok(())
    }

    fn update_task(&self, client_id: &str, payload: &Value) -> Result<()> {
        let (status, body) = self.send(
            self.client
                .put(self.url(&format!("/api/tasks/{client_id}")))
                .json(payload),
            "update task",
        )?;
        Self::confirm("update task", client_id, status, body)?;
        Ok(())
    }

    fn delete_task(&self, client_id: &str) -> Result<()> {
        let (status, body) = self.send(
            self.client.delete(self.url(&format!("/api/tasks/{client_id}"))),
            "delete task",
        )?;
        Self::confirm("delete task", client_id, status, body)?;
        Ok(())
    }

    fn create_workspace(&self, payload: &Value) -> Result<()> {
        let (status, body) = self.send(
            self.client.post(self.url("/api/workspaces")).json(payload),
            "create workspace",
        )?;
        Self::confirm("create workspace", "", status, body)?;
        Ok(())
    }

    fn delete_workspace(&self, client_id: &str) -> Result<()> {
        let (status, body) = self.send(
            self.client
                .delete(self.url(&format!("/api/workspaces/{client_id}"))),
            "delete workspace",
        )?;
        Self::confirm("delete workspace", client_id, status, body)?;
        Ok(())
    }

    fn create_archive(&self, payload: &Value) -> Result<()> {
        let (status, body) = self.send(
            self.client.post(self.url("/api/archives")).json(payload),
            "create archive",
        )?;
        Self::confirm("create archive", "", status, body)?;
        Ok(())
    }

    fn delete_archive(&self, client_id: &str) -> Result<()> {
        let (status, body) = self.send(
            self.client
                .delete(self.url(&format!("/api/archives/{client_id}"))),
            "delete archive",
        )?;
        Self::confirm("delete archive", client_id, status, body)?;
        Ok(())
    }

    fn fetch_tasks(&self) -> Result<Vec<Value>> {
        let (status, body) = self.send(self.client.get(self.url("/api/tasks")), "fetch tasks")?;
        let body = Self::confirm("fetch tasks", "", status, body)?;

        let parsed: Value = serde_json::from_str(&body)?;
        let items = parsed["data"]["tasks"]
            .as_array()
            .or_else(|| parsed.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(items)
    }

    fn fetch_workspaces(&self) -> Result<Vec<Value>> {
        let (status, body) = self.send(
            self.client.get(self.url("/api/workspaces")),
            "fetch workspaces",
        )?;
        let body = Self::confirm("fetch workspaces", "", status, body)?;

        let parsed: Value = serde_json::from_str(&body)?;
        let items = parsed["data"]["workspaces"]
            .as_array()
            .or_else(|| parsed.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(items)
    }
}
