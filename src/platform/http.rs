//! HTTP implementation of the platform boundary, speaking the hosted
//! service's (Appwrite-compatible) REST surface. One client instance holds
//! one session; the session secret returned at sign-in is replayed on every
//! subsequent request.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use crate::config::PlatformConfig;

use super::{
    Account, Accounts, DocumentPage, DocumentStore, FileId, FileStore, Filter, PlatformError,
    PlatformResult, Session,
};

#[derive(Clone)]
pub struct HttpPlatform {
    http: reqwest::Client,
    cfg: PlatformConfig,
    api_key: Option<String>,
    session: Arc<RwLock<Option<String>>>,
}

impl HttpPlatform {
    pub fn new(cfg: PlatformConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(HttpPlatform {
            http,
            cfg,
            api_key,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Build from `SNAPFEED_*` environment variables (`SNAPFEED_API_KEY`
    /// optional, for trusted server-side use).
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = PlatformConfig::from_env()?;
        let api_key = std::env::var("SNAPFEED_API_KEY").ok();
        Self::new(cfg, api_key)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.cfg.endpoint, path);
        let mut req = self
            .http
            .request(method, url)
            .header("X-Appwrite-Project", &self.cfg.project_id);
        if let Some(key) = &self.api_key {
            req = req.header("X-Appwrite-Key", key);
        }
        let session = self.session.read().unwrap().clone();
        if let Some(secret) = session {
            req = req.header("X-Appwrite-Session", secret);
        }
        req
    }

    fn doc_path(&self, collection: &str, id: Option<&str>) -> String {
        let base = format!(
            "/databases/{}/collections/{}/documents",
            self.cfg.database_id, collection
        );
        match id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }
}

fn transport(e: reqwest::Error) -> PlatformError {
    PlatformError::Other(format!("request failed: {e}"))
}

/// Map non-success statuses to the error taxonomy, pulling the service's
/// message and error code out of the body when present.
async fn check(resp: reqwest::Response) -> PlatformResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.json::<Value>().await.ok();
    let kind = body
        .as_ref()
        .and_then(|v| v.get("type").and_then(Value::as_str));
    if kind == Some("user_session_already_exists") {
        return Err(PlatformError::SessionActive);
    }
    let message = body
        .as_ref()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| status.to_string());
    Err(match status.as_u16() {
        401 => PlatformError::Unauthorized(message),
        404 => PlatformError::NotFound(message),
        409 => PlatformError::Conflict(message),
        _ => PlatformError::Other(message),
    })
}

#[async_trait]
impl Accounts for HttpPlatform {
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PlatformResult<Account> {
        let resp = self
            .request(reqwest::Method::POST, "/account")
            .json(&json!({
                "userId": "unique()",
                "email": email,
                "password": password,
                "name": name,
            }))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn create_session(&self, email: &str, password: &str) -> PlatformResult<Session> {
        let resp = self
            .request(reqwest::Method::POST, "/account/sessions/email")
            .json(&json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(transport)?;
        let body: Value = check(resp).await?.json().await.map_err(transport)?;
        // the secret is only present for server-side sessions; fall back to
        // the session id, which older deployments accept
        let secret = body
            .get("secret")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| body.get("$id").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();
        *self.session.write().unwrap() = Some(secret);
        serde_json::from_value(body).map_err(|e| PlatformError::Other(e.to_string()))
    }

    async fn current_account(&self) -> PlatformResult<Account> {
        let resp = self
            .request(reqwest::Method::GET, "/account")
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn delete_session(&self) -> PlatformResult<()> {
        let resp = self
            .request(reqwest::Method::DELETE, "/account/sessions/current")
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        self.session.write().unwrap().take();
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for HttpPlatform {
    async fn create(&self, collection: &str, data: Value) -> PlatformResult<Value> {
        let resp = self
            .request(reqwest::Method::POST, &self.doc_path(collection, None))
            .json(&json!({"documentId": "unique()", "data": data}))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn get(&self, collection: &str, id: &str) -> PlatformResult<Value> {
        let resp = self
            .request(reqwest::Method::GET, &self.doc_path(collection, Some(id)))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn list(&self, collection: &str, filters: &[Filter]) -> PlatformResult<DocumentPage> {
        let queries: Vec<(&str, String)> = filters
            .iter()
            .map(|f| ("queries[]", f.to_wire().to_string()))
            .collect();
        debug!("list {collection}: {} filters", queries.len());
        let resp = self
            .request(reqwest::Method::GET, &self.doc_path(collection, None))
            .query(&queries)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> PlatformResult<Value> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.doc_path(collection, Some(id)))
            .json(&json!({"data": data}))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?.json().await.map_err(transport)
    }

    async fn delete(&self, collection: &str, id: &str) -> PlatformResult<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &self.doc_path(collection, Some(id)))
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl FileStore for HttpPlatform {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> PlatformResult<FileId> {
        let mime = infer::get(&bytes)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_owned())
            .mime_str(&mime)
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("fileId", "unique()")
            .part("file", part);
        let path = format!("/storage/buckets/{}/files", self.cfg.bucket_id);
        let resp = self
            .request(reqwest::Method::POST, &path)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let body: Value = check(resp).await?.json().await.map_err(transport)?;
        let id = body
            .get("$id")
            .and_then(Value::as_str)
            .ok_or_else(|| PlatformError::Other("upload response missing $id".into()))?;
        Ok(FileId(id.to_owned()))
    }

    fn view_url(&self, file: &FileId) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.cfg.endpoint,
            self.cfg.bucket_id,
            file.0,
            urlencoding::encode(&self.cfg.project_id)
        )
    }

    async fn delete(&self, file: &FileId) -> PlatformResult<()> {
        let path = format!("/storage/buckets/{}/files/{}", self.cfg.bucket_id, file.0);
        let resp = self
            .request(reqwest::Method::DELETE, &path)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}
