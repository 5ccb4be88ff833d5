//! Read-side denormalization. The platform performs no joins, so lists of
//! documents come back with bare identifier relation fields; these helpers
//! batch-resolve them into expanded documents. Enrichment is best-effort:
//! any failure is swallowed and the caller gets the unenriched input back.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::models::{Comment, Post, Save, User};
use crate::platform::{DocumentStore, Filter, PlatformResult};
use crate::relation::{HasId, RelationRef};

/// One batched lookup of documents by identifier, keyed for rewriting.
/// Documents that fail to parse are skipped rather than failing the batch.
async fn fetch_map<T>(
    docs: &dyn DocumentStore,
    collection: &str,
    ids: &[String],
) -> PlatformResult<HashMap<String, T>>
where
    T: DeserializeOwned + HasId,
{
    let filters = [
        Filter::equal_any("$id", ids.iter().cloned()),
        Filter::Limit(ids.len() as u64),
    ];
    let page = docs.list(collection, &filters).await?;
    Ok(page
        .documents
        .into_iter()
        .filter_map(|v| serde_json::from_value::<T>(v).ok())
        .map(|d| (d.doc_id().to_owned(), d))
        .collect())
}

fn distinct_unexpanded<'a, T: HasId + 'a>(
    refs: impl Iterator<Item = &'a RelationRef<T>>,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for r in refs {
        if r.is_expanded() {
            continue;
        }
        if let Some(id) = r.id() {
            if seen.insert(id.to_owned()) {
                out.push(id.to_owned());
            }
        }
    }
    out
}

/// Replace each post's `creator` identifier with the full user document.
/// Already-expanded creators pass through untouched, which also makes the
/// operation idempotent; unresolvable identifiers are left as-is.
pub async fn attach_creators(
    docs: &dyn DocumentStore,
    users_collection: &str,
    mut posts: Vec<Post>,
) -> Vec<Post> {
    let ids = distinct_unexpanded(posts.iter().map(|p| &p.creator));
    if ids.is_empty() {
        return posts;
    }
    let users: HashMap<String, User> = match fetch_map(docs, users_collection, &ids).await {
        Ok(map) => map,
        Err(e) => {
            warn!("creator enrichment skipped: {e}");
            return posts;
        }
    };
    for post in &mut posts {
        if post.creator.is_expanded() {
            continue;
        }
        if let Some(user) = post.creator.id().and_then(|id| users.get(id)) {
            post.creator = RelationRef::Expanded(Box::new(user.clone()));
        }
    }
    posts
}

/// Same batched pattern for the `user` field of comments.
pub async fn attach_comment_users(
    docs: &dyn DocumentStore,
    users_collection: &str,
    mut comments: Vec<Comment>,
) -> Vec<Comment> {
    let ids = distinct_unexpanded(comments.iter().map(|c| &c.user));
    if ids.is_empty() {
        return comments;
    }
    let users: HashMap<String, User> = match fetch_map(docs, users_collection, &ids).await {
        Ok(map) => map,
        Err(e) => {
            warn!("comment user enrichment skipped: {e}");
            return comments;
        }
    };
    for comment in &mut comments {
        if comment.user.is_expanded() {
            continue;
        }
        if let Some(user) = comment.user.id().and_then(|id| users.get(id)) {
            comment.user = RelationRef::Expanded(Box::new(user.clone()));
        }
    }
    comments
}

/// Replace each save record's `post` reference with the full post, itself
/// creator-enriched. A stale save pointing at a deleted post keeps its bare
/// identifier.
pub async fn attach_posts(
    docs: &dyn DocumentStore,
    users_collection: &str,
    posts_collection: &str,
    mut saves: Vec<Save>,
) -> Vec<Save> {
    let mut seen = std::collections::HashSet::new();
    let ids: Vec<String> = saves
        .iter()
        .filter_map(|s| s.post.id())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_owned)
        .collect();
    if ids.is_empty() {
        return saves;
    }
    let fetched: HashMap<String, Post> = match fetch_map(docs, posts_collection, &ids).await {
        Ok(map) => map,
        Err(e) => {
            warn!("save enrichment skipped: {e}");
            return saves;
        }
    };
    let enriched = attach_creators(docs, users_collection, fetched.into_values().collect()).await;
    let by_id: HashMap<String, Post> = enriched.into_iter().map(|p| (p.id.clone(), p)).collect();
    for save in &mut saves {
        if let Some(post) = save.post.id().and_then(|id| by_id.get(id)) {
            save.post = RelationRef::Expanded(Box::new(post.clone()));
        }
    }
    saves
}
