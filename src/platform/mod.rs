//! The fixed boundary to the hosted backend platform: account/session
//! management, document storage with a narrow query language, and file
//! storage. Everything above this module is platform-agnostic; the two
//! implementations are an HTTP client for the real service and an in-memory
//! fake for tests and local development.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub mod http;
pub mod mem;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The service refuses to create a session while one is active.
    #[error("a session is already active")]
    SessionActive,
    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PlatformError::Unauthorized(_))
    }
    pub fn is_conflict(&self) -> bool {
        matches!(self, PlatformError::Conflict(_))
    }
    pub fn is_session_active(&self) -> bool {
        matches!(self, PlatformError::SessionActive)
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Query primitives the platform's list endpoint understands. Equality
/// matches any of the candidate values; everything else is ordering and
/// windowing.
#[derive(Debug, Clone)]
pub enum Filter {
    Equal { field: String, any_of: Vec<Value> },
    OrderAsc(String),
    OrderDesc(String),
    Limit(u64),
    Offset(u64),
    CursorAfter(String),
}

impl Filter {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Filter::Equal { field: field.to_owned(), any_of: vec![value.into()] }
    }

    pub fn equal_any<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Equal {
            field: field.to_owned(),
            any_of: values.into_iter().map(|v| Value::String(v.into())).collect(),
        }
    }

    /// Wire form understood by the platform's REST query parameter.
    pub fn to_wire(&self) -> Value {
        match self {
            Filter::Equal { field, any_of } => {
                json!({"method": "equal", "attribute": field, "values": any_of})
            }
            Filter::OrderAsc(field) => json!({"method": "orderAsc", "attribute": field}),
            Filter::OrderDesc(field) => json!({"method": "orderDesc", "attribute": field}),
            Filter::Limit(n) => json!({"method": "limit", "values": [n]}),
            Filter::Offset(n) => json!({"method": "offset", "values": [n]}),
            Filter::CursorAfter(id) => json!({"method": "cursorAfter", "values": [id]}),
        }
    }
}

/// One page of raw documents plus the total number of equality matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    pub total: u64,
    pub documents: Vec<Value>,
}

impl DocumentPage {
    pub fn empty() -> Self {
        DocumentPage { total: 0, documents: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId(pub String);

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PlatformResult<Account>;
    async fn create_session(&self, email: &str, password: &str) -> PlatformResult<Session>;
    async fn current_account(&self) -> PlatformResult<Account>;
    async fn delete_session(&self) -> PlatformResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document; the platform issues the identifier.
    async fn create(&self, collection: &str, data: Value) -> PlatformResult<Value>;
    async fn get(&self, collection: &str, id: &str) -> PlatformResult<Value>;
    async fn list(&self, collection: &str, filters: &[Filter]) -> PlatformResult<DocumentPage>;
    /// Partial update; absent fields keep their stored value.
    async fn update(&self, collection: &str, id: &str, data: Value) -> PlatformResult<Value>;
    async fn delete(&self, collection: &str, id: &str) -> PlatformResult<()>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> PlatformResult<FileId>;
    fn view_url(&self, file: &FileId) -> String;
    async fn delete(&self, file: &FileId) -> PlatformResult<()>;
}
