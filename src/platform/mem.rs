//! In-memory platform used by tests and local development. Semantics follow
//! the hosted service closely enough for the data layer to be exercised
//! against it: collections come into existence on first document creation,
//! listing an unknown collection is a missing-resource error, and the query
//! filters are evaluated with the same equality/ordering/windowing rules.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{
    Account, Accounts, DocumentPage, DocumentStore, FileId, FileStore, Filter, PlatformError,
    PlatformResult, Session,
};

/// The hosted service caps unwindowed list calls at this size.
const DEFAULT_LIST_LIMIT: usize = 25;

struct MemAccount {
    id: String,
    email: String,
    password: String,
    name: String,
}

#[derive(Default)]
struct State {
    accounts: Vec<MemAccount>,
    // account id of the active session, if any
    session: Option<String>,
    // documents per collection, in insertion order
    collections: HashMap<String, Vec<Value>>,
    files: HashMap<String, (String, Vec<u8>)>,
}

#[derive(Clone, Default)]
pub struct MemPlatform {
    state: Arc<RwLock<State>>,
}

impl MemPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provision collections so listing them succeeds while still empty.
    pub fn with_collections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let platform = Self::default();
        {
            let mut s = platform.state.write().unwrap();
            for name in names {
                s.collections.entry(name.into()).or_default();
            }
        }
        platform
    }
}

fn now_string() -> String {
    // fixed-width fractions keep lexicographic order equal to time order
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn field_of<'a>(doc: &'a Value, field: &str) -> &'a Value {
    doc.get(field).unwrap_or(&Value::Null)
}

fn value_matches(actual: &Value, candidate: &Value) -> bool {
    if actual == candidate {
        return true;
    }
    // expanded relation object compared against an identifier string
    if let (Some(id), Some(c)) = (
        actual.get("$id").and_then(Value::as_str),
        candidate.as_str(),
    ) {
        if id == c {
            return true;
        }
    }
    // array field (e.g. likes): containment semantics
    if let Some(items) = actual.as_array() {
        return items.iter().any(|item| value_matches(item, candidate));
    }
    false
}

fn cmp_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Accounts for MemPlatform {
    async fn create_account(&self, email: &str, password: &str, name: &str) -> PlatformResult<Account> {
        let mut s = self.state.write().unwrap();
        if s.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Err(PlatformError::Conflict(
                "a user with the same email already exists".into(),
            ));
        }
        let account = MemAccount {
            id: Uuid::new_v4().to_string(),
            email: email.to_owned(),
            password: password.to_owned(),
            name: name.to_owned(),
        };
        let out = Account {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
        };
        s.accounts.push(account);
        Ok(out)
    }

    async fn create_session(&self, email: &str, password: &str) -> PlatformResult<Session> {
        let mut s = self.state.write().unwrap();
        if s.session.is_some() {
            // mirror the hosted service's behavior, which the sign-in path tolerates
            return Err(PlatformError::SessionActive);
        }
        let account = s
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password)
            .ok_or_else(|| PlatformError::Unauthorized("invalid credentials".into()))?;
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: account.id.clone(),
        };
        s.session = Some(account.id.clone());
        Ok(session)
    }

    async fn current_account(&self) -> PlatformResult<Account> {
        let s = self.state.read().unwrap();
        let id = s
            .session
            .as_ref()
            .ok_or_else(|| PlatformError::Unauthorized("no active session".into()))?;
        let account = s
            .accounts
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| PlatformError::Unauthorized("session account gone".into()))?;
        Ok(Account {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
        })
    }

    async fn delete_session(&self) -> PlatformResult<()> {
        let mut s = self.state.write().unwrap();
        if s.session.take().is_none() {
            return Err(PlatformError::Unauthorized("no active session".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemPlatform {
    async fn create(&self, collection: &str, data: Value) -> PlatformResult<Value> {
        let Value::Object(mut fields) = data else {
            return Err(PlatformError::Other("document data must be an object".into()));
        };
        let now = now_string();
        fields
            .entry("$id".to_owned())
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        fields.insert("$createdAt".to_owned(), json!(now));
        fields.insert("$updatedAt".to_owned(), json!(now));
        let doc = Value::Object(fields);
        let mut s = self.state.write().unwrap();
        s.collections
            .entry(collection.to_owned())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> PlatformResult<Value> {
        let s = self.state.read().unwrap();
        let docs = s
            .collections
            .get(collection)
            .ok_or_else(|| PlatformError::NotFound(format!("collection '{collection}' not found")))?;
        docs.iter()
            .find(|d| d.get("$id").and_then(Value::as_str) == Some(id))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("document '{id}' not found")))
    }

    async fn list(&self, collection: &str, filters: &[Filter]) -> PlatformResult<DocumentPage> {
        let s = self.state.read().unwrap();
        let docs = s
            .collections
            .get(collection)
            .ok_or_else(|| PlatformError::NotFound(format!("collection '{collection}' not found")))?;

        let mut equals: Vec<(&str, &[Value])> = Vec::new();
        let mut orders: Vec<(&str, bool)> = Vec::new(); // (field, descending)
        let mut limit = DEFAULT_LIST_LIMIT;
        let mut offset = 0usize;
        let mut cursor: Option<&str> = None;
        for f in filters {
            match f {
                Filter::Equal { field, any_of } => equals.push((field, any_of)),
                Filter::OrderAsc(field) => orders.push((field, false)),
                Filter::OrderDesc(field) => orders.push((field, true)),
                Filter::Limit(n) => limit = *n as usize,
                Filter::Offset(n) => offset = *n as usize,
                Filter::CursorAfter(id) => cursor = Some(id),
            }
        }

        let mut matched: Vec<Value> = docs
            .iter()
            .filter(|d| {
                equals
                    .iter()
                    .all(|(field, any_of)| any_of.iter().any(|c| value_matches(field_of(d, field), c)))
            })
            .cloned()
            .collect();
        let total = matched.len() as u64;

        // later directives break ties of earlier ones: apply in reverse, stably
        for (field, desc) in orders.iter().rev() {
            matched.sort_by(|a, b| {
                let ord = cmp_json(field_of(a, field), field_of(b, field));
                if *desc {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(cursor) = cursor {
            match matched
                .iter()
                .position(|d| d.get("$id").and_then(Value::as_str) == Some(cursor))
            {
                Some(pos) => {
                    matched.drain(..=pos);
                }
                None => matched.clear(),
            }
        }

        let documents: Vec<Value> = matched.into_iter().skip(offset).take(limit).collect();
        Ok(DocumentPage { total, documents })
    }

    async fn update(&self, collection: &str, id: &str, data: Value) -> PlatformResult<Value> {
        let Value::Object(changes) = data else {
            return Err(PlatformError::Other("document data must be an object".into()));
        };
        let mut s = self.state.write().unwrap();
        let docs = s
            .collections
            .get_mut(collection)
            .ok_or_else(|| PlatformError::NotFound(format!("collection '{collection}' not found")))?;
        let doc = docs
            .iter_mut()
            .find(|d| d.get("$id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| PlatformError::NotFound(format!("document '{id}' not found")))?;
        if let Value::Object(fields) = doc {
            for (k, v) in changes {
                if k.starts_with('$') {
                    continue; // metadata is platform-owned
                }
                fields.insert(k, v);
            }
            fields.insert("$updatedAt".to_owned(), json!(now_string()));
        }
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> PlatformResult<()> {
        let mut s = self.state.write().unwrap();
        let docs = s
            .collections
            .get_mut(collection)
            .ok_or_else(|| PlatformError::NotFound(format!("collection '{collection}' not found")))?;
        let before = docs.len();
        docs.retain(|d| d.get("$id").and_then(Value::as_str) != Some(id));
        if docs.len() == before {
            return Err(PlatformError::NotFound(format!("document '{id}' not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for MemPlatform {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> PlatformResult<FileId> {
        let id = Uuid::new_v4().to_string();
        let mut s = self.state.write().unwrap();
        s.files.insert(id.clone(), (filename.to_owned(), bytes));
        Ok(FileId(id))
    }

    fn view_url(&self, file: &FileId) -> String {
        format!("mem://files/{}", file.0)
    }

    async fn delete(&self, file: &FileId) -> PlatformResult<()> {
        // best-effort: deleting an unknown file is a no-op
        let mut s = self.state.write().unwrap();
        s.files.remove(&file.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> MemPlatform {
        MemPlatform::new()
    }

    #[tokio::test]
    async fn list_on_unknown_collection_is_not_found() {
        let p = docs();
        let err = p.list("follows", &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_issues_id_and_timestamps() {
        let p = docs();
        let doc = p.create("posts", json!({"caption": "hi"})).await.unwrap();
        assert!(doc.get("$id").and_then(Value::as_str).is_some());
        assert!(doc.get("$createdAt").is_some());
        assert_eq!(doc["caption"], "hi");
    }

    #[tokio::test]
    async fn equality_matches_scalars_objects_and_arrays() {
        let p = docs();
        p.create("posts", json!({"creator": "u1", "likes": ["u2", {"$id": "u3"}]}))
            .await
            .unwrap();
        p.create("posts", json!({"creator": {"$id": "u1"}, "likes": []}))
            .await
            .unwrap();
        p.create("posts", json!({"creator": "u9", "likes": ["u1"]}))
            .await
            .unwrap();

        let by_creator = p
            .list("posts", &[Filter::equal("creator", "u1")])
            .await
            .unwrap();
        assert_eq!(by_creator.total, 2);

        let by_like = p.list("posts", &[Filter::equal("likes", "u3")]).await.unwrap();
        assert_eq!(by_like.total, 1);
    }

    #[tokio::test]
    async fn ordering_offset_limit_and_total() {
        let p = docs();
        for i in 0..7 {
            p.create("users", json!({"name": format!("user-{i}"), "rank": i}))
                .await
                .unwrap();
        }
        let page = p
            .list(
                "users",
                &[Filter::OrderDesc("rank".into()), Filter::Offset(2), Filter::Limit(3)],
            )
            .await
            .unwrap();
        assert_eq!(page.total, 7);
        let ranks: Vec<i64> = page
            .documents
            .iter()
            .map(|d| d["rank"].as_i64().unwrap())
            .collect();
        assert_eq!(ranks, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn cursor_after_continues_from_last_seen() {
        let p = docs();
        let mut ids = Vec::new();
        for i in 0..5 {
            let d = p.create("posts", json!({"n": i})).await.unwrap();
            ids.push(d["$id"].as_str().unwrap().to_owned());
        }
        let page = p
            .list("posts", &[Filter::CursorAfter(ids[2].clone()), Filter::Limit(10)])
            .await
            .unwrap();
        let ns: Vec<i64> = page.documents.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 4]);

        // unknown cursor yields an empty page
        let page = p
            .list("posts", &[Filter::CursorAfter("nope".into())])
            .await
            .unwrap();
        assert!(page.documents.is_empty());
    }

    #[tokio::test]
    async fn update_merges_and_protects_metadata() {
        let p = docs();
        let doc = p.create("posts", json!({"caption": "a", "location": "x"})).await.unwrap();
        let id = doc["$id"].as_str().unwrap();
        let updated = p
            .update("posts", id, json!({"caption": "b", "$id": "forged"}))
            .await
            .unwrap();
        assert_eq!(updated["caption"], "b");
        assert_eq!(updated["location"], "x");
        assert_eq!(updated["$id"].as_str().unwrap(), id);
    }

    #[tokio::test]
    async fn account_session_round_trip() {
        let p = docs();
        p.create_account("a@b.c", "pw", "Ada").await.unwrap();
        let dup = p.create_account("A@B.C", "pw", "Ada").await.unwrap_err();
        assert!(dup.is_conflict());

        assert!(p.current_account().await.unwrap_err().is_unauthorized());
        p.create_session("a@b.c", "pw").await.unwrap();
        assert_eq!(p.current_account().await.unwrap().email, "a@b.c");

        // a second session while one is active is rejected, distinguishably
        let active = p.create_session("a@b.c", "pw").await.unwrap_err();
        assert!(active.is_session_active());

        p.delete_session().await.unwrap();
        assert!(p.current_account().await.unwrap_err().is_unauthorized());
    }
}
