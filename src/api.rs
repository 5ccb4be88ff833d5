//! The query/mutation surface the UI layer calls. Reads go through the
//! request cache and enrich relation fields before returning; mutations
//! write through the platform and invalidate every cached query they may
//! have staled.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::{MemoryCache, QueryKey, RequestCache};
use crate::comments::CommentThread;
use crate::config::PlatformConfig;
use crate::enrich;
use crate::error::{ApiError, ApiResult};
use crate::follows::FollowGraph;
use crate::likes;
use crate::models::{
    Comment, Credentials, Follow, NewComment, NewPost, NewUser, Post, Save, UpdatePost,
    UpdateUser, User,
};
use crate::pagination::{self, PageSlice, FEED_PAGE_SIZE, SEARCH_WINDOW};
use crate::platform::http::HttpPlatform;
use crate::platform::mem::MemPlatform;
use crate::platform::{Accounts, DocumentPage, DocumentStore, FileId, FileStore, Filter};

/// One feed page plus the cursor for the next fetch. A `None` cursor means
/// the feed is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<String>,
}

pub struct Client {
    accounts: Arc<dyn Accounts>,
    docs: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStore>,
    cache: Arc<dyn RequestCache>,
    cfg: PlatformConfig,
}

impl Client {
    pub fn new(
        accounts: Arc<dyn Accounts>,
        docs: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStore>,
        cfg: PlatformConfig,
    ) -> Self {
        Client {
            accounts,
            docs,
            files,
            cache: Arc::new(MemoryCache::new()),
            cfg,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn RequestCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Client over the in-memory platform, for tests and local development.
    pub fn in_memory(cfg: PlatformConfig) -> Self {
        let platform = MemPlatform::with_collections([
            cfg.collections.users.as_str(),
            cfg.collections.posts.as_str(),
            cfg.collections.saves.as_str(),
            cfg.collections.comments.as_str(),
            cfg.collections.follows.as_str(),
        ]);
        Client::new(
            Arc::new(platform.clone()),
            Arc::new(platform.clone()),
            Arc::new(platform),
            cfg,
        )
    }

    /// Client over the hosted platform, configured from `SNAPFEED_*`
    /// environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = PlatformConfig::from_env()?;
        let api_key = std::env::var("SNAPFEED_API_KEY").ok();
        let platform = HttpPlatform::new(cfg.clone(), api_key)?;
        Ok(Client::new(
            Arc::new(platform.clone()),
            Arc::new(platform.clone()),
            Arc::new(platform),
            cfg,
        ))
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.cfg
    }

    /// Direct access to the document store, mainly for test seeding.
    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.docs)
    }

    // ---------------- helpers ------------------------------------------

    fn cache_get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.cache
            .get(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn cache_put<T: Serialize>(&self, key: QueryKey, value: &T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.cache.put(key, v);
        }
    }

    /// List that treats a missing collection as empty. Used for collections
    /// provisioned out of band (saves, follows) and for pre-rollout reads.
    async fn list_or_empty(&self, collection: &str, filters: &[Filter]) -> ApiResult<DocumentPage> {
        match self.docs.list(collection, filters).await {
            Ok(page) => Ok(page),
            Err(e) if e.is_not_found() => Ok(DocumentPage::empty()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort deletion of uploaded files, logging rather than failing.
    async fn discard_files(&self, files: &[FileId]) {
        for file in files {
            if let Err(e) = self.files.delete(file).await {
                debug!("file cleanup failed for {}: {e}", file.0);
            }
        }
    }

    fn follow_graph(&self) -> FollowGraph<'_> {
        FollowGraph::new(self.docs.as_ref(), &self.cfg)
    }

    /// Establish a session, tolerating one already being active. The hosted
    /// service rejects session creation while signed in; in that case the
    /// existing session is kept if it still resolves to an account.
    async fn ensure_session(&self, email: &str, password: &str) -> ApiResult<()> {
        match self.accounts.create_session(email, password).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_session_active() => {
                self.accounts.current_account().await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ---------------- auth ---------------------------------------------

    /// Register an account, sign it in, and create the matching profile
    /// document.
    pub async fn sign_up(&self, new: &NewUser) -> ApiResult<User> {
        let account = self
            .accounts
            .create_account(&new.email, &new.password, &new.name)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    ApiError::Conflict("an account with this email already exists".into())
                } else {
                    ApiError::from(e)
                }
            })?;
        self.ensure_session(&new.email, &new.password).await?;
        let data = json!({
            "accountId": account.id,
            "name": account.name,
            "email": account.email,
            "username": new.username,
            "imageUrl": self.cfg.initials_avatar_url(&account.name),
        });
        let doc = self.docs.create(&self.cfg.collections.users, data).await?;
        self.cache.invalidate(&QueryKey::bare("current_user"));
        self.cache.invalidate_op("users");
        parse(doc)
    }

    pub async fn sign_in(&self, creds: &Credentials) -> ApiResult<()> {
        self.ensure_session(&creds.email, &creds.password).await?;
        self.cache.invalidate(&QueryKey::bare("current_user"));
        Ok(())
    }

    /// Profile of the signed-in account, or `None` when no session is
    /// active.
    pub async fn current_user(&self) -> ApiResult<Option<User>> {
        let key = QueryKey::bare("current_user");
        if let Some(cached) = self.cache_get::<Option<User>>(&key) {
            return Ok(cached);
        }
        let account = match self.accounts.current_account().await {
            Ok(account) => account,
            Err(e) if e.is_unauthorized() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let filters = [
            Filter::equal("accountId", account.id.as_str()),
            Filter::Limit(1),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.users, &filters)
            .await?;
        let user = page
            .documents
            .into_iter()
            .next()
            .map(parse::<User>)
            .transpose()?;
        self.cache_put(key, &user);
        Ok(user)
    }

    /// End the session. An already-expired session counts as signed out.
    pub async fn sign_out(&self) -> ApiResult<()> {
        match self.accounts.delete_session().await {
            Ok(()) => {}
            Err(e) if e.is_unauthorized() => {}
            Err(e) => return Err(e.into()),
        }
        self.cache.invalidate(&QueryKey::bare("current_user"));
        Ok(())
    }

    // ---------------- posts --------------------------------------------

    /// Upload the media, then create the post document. Uploads are rolled
    /// back if document creation fails.
    pub async fn create_post(&self, new: &NewPost) -> ApiResult<Post> {
        if new.images.is_empty() {
            return Err(ApiError::Invalid("a post needs at least one image".into()));
        }
        let mut uploaded: Vec<FileId> = Vec::new();
        for image in &new.images {
            match self.files.upload(image.bytes.clone(), &image.filename).await {
                Ok(id) => uploaded.push(id),
                Err(e) => {
                    self.discard_files(&uploaded).await;
                    return Err(e.into());
                }
            }
        }
        let urls: Vec<String> = uploaded.iter().map(|f| self.files.view_url(f)).collect();
        let ids: Vec<String> = uploaded.iter().map(|f| f.0.clone()).collect();
        let data = json!({
            "creator": new.creator_id,
            "caption": new.caption,
            "tags": new.tags,
            "location": new.location,
            "imageUrl": urls[0],
            "imageId": ids[0],
            "imageUrls": urls,
            "imageIds": ids,
            "likes": [],
        });
        let doc = match self.docs.create(&self.cfg.collections.posts, data).await {
            Ok(doc) => doc,
            Err(e) => {
                self.discard_files(&uploaded).await;
                return Err(e.into());
            }
        };
        self.invalidate_post_lists();
        parse(doc)
    }

    pub async fn get_post(&self, post_id: &str) -> ApiResult<Post> {
        let key = QueryKey::new("post", post_id);
        if let Some(cached) = self.cache_get::<Post>(&key) {
            return Ok(cached);
        }
        let doc = self.docs.get(&self.cfg.collections.posts, post_id).await?;
        let post: Post = parse(doc)?;
        let mut enriched = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            vec![post],
        )
        .await;
        let post = enriched
            .pop()
            .ok_or_else(|| ApiError::Platform("enrichment dropped the post".into()))?;
        self.cache_put(key, &post);
        Ok(post)
    }

    /// Update caption, tags and location, replacing the media only when new
    /// images were supplied. Replaced files are deleted after the document
    /// update succeeds; fresh uploads are rolled back if it fails.
    pub async fn update_post(&self, upd: &UpdatePost) -> ApiResult<Post> {
        let mut urls = upd.image_urls.clone();
        let mut ids = upd.image_ids.clone();
        let mut uploaded: Vec<FileId> = Vec::new();
        if !upd.new_images.is_empty() {
            for image in &upd.new_images {
                match self.files.upload(image.bytes.clone(), &image.filename).await {
                    Ok(id) => uploaded.push(id),
                    Err(e) => {
                        self.discard_files(&uploaded).await;
                        return Err(e.into());
                    }
                }
            }
            urls = uploaded.iter().map(|f| self.files.view_url(f)).collect();
            ids = uploaded.iter().map(|f| f.0.clone()).collect();
        }
        let data = json!({
            "caption": upd.caption,
            "tags": upd.tags,
            "location": upd.location,
            "imageUrl": urls.first(),
            "imageId": ids.first(),
            "imageUrls": urls,
            "imageIds": ids,
        });
        let doc = match self
            .docs
            .update(&self.cfg.collections.posts, &upd.post_id, data)
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                self.discard_files(&uploaded).await;
                return Err(e.into());
            }
        };
        if !uploaded.is_empty() {
            let replaced: Vec<FileId> = upd.image_ids.iter().cloned().map(FileId).collect();
            self.discard_files(&replaced).await;
        }
        self.cache.invalidate(&QueryKey::new("post", &upd.post_id));
        self.invalidate_post_lists();
        self.cache.invalidate_op("saved_posts");
        self.cache.invalidate_op("liked_posts");
        parse(doc)
    }

    /// Delete the post document, then its media files best-effort.
    pub async fn delete_post(&self, post_id: &str) -> ApiResult<()> {
        let raw = self.docs.get(&self.cfg.collections.posts, post_id).await?;
        let post: Post = parse(raw)?;
        self.docs
            .delete(&self.cfg.collections.posts, post_id)
            .await?;
        let files: Vec<FileId> = post.media_ids().into_iter().map(FileId).collect();
        self.discard_files(&files).await;
        self.cache.invalidate(&QueryKey::new("post", post_id));
        self.invalidate_post_lists();
        self.cache.invalidate_op("saved_posts");
        self.cache.invalidate_op("liked_posts");
        Ok(())
    }

    /// The twenty newest posts, creator-enriched.
    pub async fn recent_posts(&self) -> ApiResult<Vec<Post>> {
        let key = QueryKey::bare("recent_posts");
        if let Some(cached) = self.cache_get::<Vec<Post>>(&key) {
            return Ok(cached);
        }
        let filters = [Filter::OrderDesc("$createdAt".into()), Filter::Limit(20)];
        let page = self
            .list_or_empty(&self.cfg.collections.posts, &filters)
            .await?;
        let posts = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(page),
        )
        .await;
        self.cache_put(key, &posts);
        Ok(posts)
    }

    /// A user's own posts, newest first.
    pub async fn user_posts(&self, user_id: &str) -> ApiResult<Vec<Post>> {
        let key = QueryKey::new("user_posts", user_id);
        if let Some(cached) = self.cache_get::<Vec<Post>>(&key) {
            return Ok(cached);
        }
        let filters = [
            Filter::equal("creator", user_id),
            Filter::OrderDesc("$createdAt".into()),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.posts, &filters)
            .await?;
        let posts = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(page),
        )
        .await;
        self.cache_put(key, &posts);
        Ok(posts)
    }

    /// One page of the infinite-scroll feed, ordered by last update.
    pub async fn feed_page(&self, cursor: Option<&str>) -> ApiResult<FeedPage> {
        let key = QueryKey::new("feed", cursor.unwrap_or(""));
        if let Some(cached) = self.cache_get::<FeedPage>(&key) {
            return Ok(cached);
        }
        let mut filters = vec![
            Filter::OrderDesc("$updatedAt".into()),
            Filter::Limit(FEED_PAGE_SIZE),
        ];
        if let Some(cursor) = cursor {
            filters.push(Filter::CursorAfter(cursor.to_owned()));
        }
        let page = self
            .list_or_empty(&self.cfg.collections.posts, &filters)
            .await?;
        let posts = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(page),
        )
        .await;
        let next_cursor = pagination::next_cursor(&posts, FEED_PAGE_SIZE);
        let result = FeedPage { posts, next_cursor };
        self.cache_put(key, &result);
        Ok(result)
    }

    /// Substring search over captions, locations, tags and creator names,
    /// filtered client side within a bounded window of recent posts.
    pub async fn search_posts(
        &self,
        term: &str,
        page: u64,
        page_size: u64,
    ) -> ApiResult<PageSlice<Post>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(PageSlice { items: Vec::new(), total: 0 });
        }
        let key = QueryKey::new("search_posts", format!("{term}|{page}|{page_size}"));
        if let Some(cached) = self.cache_get::<PageSlice<Post>>(&key) {
            return Ok(cached);
        }
        let filters = [
            Filter::OrderDesc("$createdAt".into()),
            Filter::Limit(SEARCH_WINDOW),
        ];
        let window = self
            .list_or_empty(&self.cfg.collections.posts, &filters)
            .await?;
        let posts = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(window),
        )
        .await;
        let matches: Vec<Post> = posts
            .into_iter()
            .filter(|p| pagination::post_matches(p, term))
            .collect();
        let (offset, limit) = pagination::offset_window(page, page_size);
        let slice = pagination::slice_window(matches, offset, limit);
        self.cache_put(key, &slice);
        Ok(slice)
    }

    /// Toggle the caller's like on a post. Reads the stored likes, flips
    /// membership, writes the full list back. Last write wins under
    /// concurrency.
    pub async fn like_post(&self, post_id: &str, user_id: &str) -> ApiResult<Post> {
        let raw = self.docs.get(&self.cfg.collections.posts, post_id).await?;
        let post: Post = parse(raw)?;
        let next = likes::toggle(&likes::decode(&post.likes), user_id);
        let doc = self
            .docs
            .update(&self.cfg.collections.posts, post_id, json!({ "likes": next }))
            .await?;
        self.cache.invalidate(&QueryKey::new("post", post_id));
        self.invalidate_post_lists();
        self.cache.invalidate_op("liked_posts");
        parse(doc)
    }

    /// Posts a user has liked, newest first.
    pub async fn liked_posts(&self, user_id: &str) -> ApiResult<Vec<Post>> {
        let key = QueryKey::new("liked_posts", user_id);
        if let Some(cached) = self.cache_get::<Vec<Post>>(&key) {
            return Ok(cached);
        }
        let filters = [
            Filter::equal("likes", user_id),
            Filter::OrderDesc("$createdAt".into()),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.posts, &filters)
            .await?;
        let posts = enrich::attach_creators(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(page),
        )
        .await;
        self.cache_put(key, &posts);
        Ok(posts)
    }

    fn invalidate_post_lists(&self) {
        self.cache.invalidate(&QueryKey::bare("recent_posts"));
        self.cache.invalidate_op("feed");
        self.cache.invalidate_op("user_posts");
        self.cache.invalidate_op("search_posts");
    }

    // ---------------- saves --------------------------------------------

    pub async fn save_post(&self, user_id: &str, post_id: &str) -> ApiResult<Save> {
        let data = json!({ "user": user_id, "post": post_id });
        let doc = self.docs.create(&self.cfg.collections.saves, data).await?;
        self.cache.invalidate_op("saved_posts");
        self.cache.invalidate(&QueryKey::bare("current_user"));
        parse(doc)
    }

    /// Remove a save record. A record already gone counts as removed.
    pub async fn delete_saved_post(&self, save_id: &str) -> ApiResult<()> {
        match self.docs.delete(&self.cfg.collections.saves, save_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        self.cache.invalidate_op("saved_posts");
        self.cache.invalidate(&QueryKey::bare("current_user"));
        Ok(())
    }

    /// A user's saved posts, newest save first, each save carrying the full
    /// creator-enriched post.
    pub async fn saved_posts(&self, user_id: &str) -> ApiResult<Vec<Save>> {
        let key = QueryKey::new("saved_posts", user_id);
        if let Some(cached) = self.cache_get::<Vec<Save>>(&key) {
            return Ok(cached);
        }
        let filters = [
            Filter::equal("user", user_id),
            Filter::OrderDesc("$createdAt".into()),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.saves, &filters)
            .await?;
        let saves = enrich::attach_posts(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            &self.cfg.collections.posts,
            parse_list(page),
        )
        .await;
        self.cache_put(key, &saves);
        Ok(saves)
    }

    /// The save record a user holds for a post, if any.
    pub async fn find_save(&self, user_id: &str, post_id: &str) -> ApiResult<Option<Save>> {
        let filters = [
            Filter::equal("user", user_id),
            Filter::equal("post", post_id),
            Filter::Limit(1),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.saves, &filters)
            .await?;
        page.documents
            .into_iter()
            .next()
            .map(parse::<Save>)
            .transpose()
    }

    // ---------------- comments -----------------------------------------

    /// All comments of a post as a two-level thread, oldest first, with
    /// authors expanded.
    pub async fn comments_for_post(&self, post_id: &str) -> ApiResult<CommentThread> {
        let key = QueryKey::new("comments", post_id);
        if let Some(flat) = self.cache_get::<Vec<Comment>>(&key) {
            return Ok(CommentThread::build(flat));
        }
        let filters = [
            Filter::equal("post", post_id),
            Filter::OrderAsc("$createdAt".into()),
            Filter::Limit(100),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.comments, &filters)
            .await?;
        let flat = enrich::attach_comment_users(
            self.docs.as_ref(),
            &self.cfg.collections.users,
            parse_list(page),
        )
        .await;
        self.cache_put(key, &flat);
        Ok(CommentThread::build(flat))
    }

    pub async fn create_comment(&self, new: &NewComment) -> ApiResult<Comment> {
        let content = new.content.trim();
        if content.is_empty() {
            return Err(ApiError::Invalid("comment content must not be empty".into()));
        }
        let mut data = json!({
            "post": new.post_id,
            "user": new.user_id,
            "content": content,
            "likes": [],
        });
        if let Some(parent) = &new.parent_comment {
            data["parentComment"] = json!(parent);
        }
        let doc = self
            .docs
            .create(&self.cfg.collections.comments, data)
            .await?;
        self.cache.invalidate(&QueryKey::new("comments", &new.post_id));
        parse(doc)
    }

    /// Delete one comment. Replies are kept and surface as orphans under
    /// the deleted parent's id.
    pub async fn delete_comment(&self, comment_id: &str, post_id: &str) -> ApiResult<()> {
        self.docs
            .delete(&self.cfg.collections.comments, comment_id)
            .await?;
        self.cache.invalidate(&QueryKey::new("comments", post_id));
        Ok(())
    }

    /// Toggle the caller's like on a comment, same semantics as posts.
    pub async fn like_comment(&self, comment_id: &str, user_id: &str) -> ApiResult<Comment> {
        let raw = self
            .docs
            .get(&self.cfg.collections.comments, comment_id)
            .await?;
        let comment: Comment = parse(raw)?;
        let next = likes::toggle(&likes::decode(&comment.likes), user_id);
        let doc = self
            .docs
            .update(
                &self.cfg.collections.comments,
                comment_id,
                json!({ "likes": next }),
            )
            .await?;
        self.cache.invalidate_op("comments");
        parse(doc)
    }

    // ---------------- users --------------------------------------------

    /// One page of users, newest first, optionally filtered by a
    /// case-insensitive name/username search.
    pub async fn users_page(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> ApiResult<PageSlice<User>> {
        let term = search.map(str::trim).filter(|t| !t.is_empty());
        let key = QueryKey::new(
            "users",
            format!("{page}|{page_size}|{}", term.unwrap_or("")),
        );
        if let Some(cached) = self.cache_get::<PageSlice<User>>(&key) {
            return Ok(cached);
        }
        let (offset, limit) = pagination::offset_window(page, page_size);
        let slice = match term {
            Some(term) => {
                let filters = [
                    Filter::OrderDesc("$createdAt".into()),
                    Filter::Limit(SEARCH_WINDOW),
                ];
                let window = self
                    .list_or_empty(&self.cfg.collections.users, &filters)
                    .await?;
                let matches: Vec<User> = parse_list(window)
                    .into_iter()
                    .filter(|u| pagination::user_matches(u, term))
                    .collect();
                pagination::slice_window(matches, offset, limit)
            }
            None => {
                let filters = [
                    Filter::OrderDesc("$createdAt".into()),
                    Filter::Offset(offset),
                    Filter::Limit(limit),
                ];
                let page = self
                    .list_or_empty(&self.cfg.collections.users, &filters)
                    .await?;
                let total = page.total;
                PageSlice { items: parse_list(page), total }
            }
        };
        self.cache_put(key, &slice);
        Ok(slice)
    }

    pub async fn get_user(&self, user_id: &str) -> ApiResult<User> {
        // Guard against identifier strings leaking out of an uninitialized
        // UI route.
        if user_id.is_empty() || user_id == "undefined" || user_id == "null" {
            return Err(ApiError::Invalid("invalid user identifier".into()));
        }
        let key = QueryKey::new("user", user_id);
        if let Some(cached) = self.cache_get::<User>(&key) {
            return Ok(cached);
        }
        let doc = self.docs.get(&self.cfg.collections.users, user_id).await?;
        let user: User = parse(doc)?;
        self.cache_put(key, &user);
        Ok(user)
    }

    /// Batch fetch of user profiles, used to render a post's likers.
    /// Identifiers with no matching profile are silently absent.
    pub async fn users_by_ids(&self, ids: &[String]) -> ApiResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filters = [
            Filter::equal_any("$id", ids.iter().cloned()),
            Filter::Limit(ids.len() as u64),
        ];
        let page = self
            .list_or_empty(&self.cfg.collections.users, &filters)
            .await?;
        Ok(parse_list(page))
    }

    /// Update profile fields, replacing the avatar only when a new image was
    /// supplied.
    pub async fn update_user(&self, upd: &UpdateUser) -> ApiResult<User> {
        let mut image_url = upd.image_url.clone();
        let mut image_id = upd.image_id.clone();
        let mut uploaded: Option<FileId> = None;
        if let Some(image) = &upd.new_image {
            let id = self.files.upload(image.bytes.clone(), &image.filename).await?;
            image_url = Some(self.files.view_url(&id));
            image_id = Some(id.0.clone());
            uploaded = Some(id);
        }
        let data = json!({
            "name": upd.name,
            "bio": upd.bio,
            "imageUrl": image_url,
            "imageId": image_id,
        });
        let doc = match self
            .docs
            .update(&self.cfg.collections.users, &upd.user_id, data)
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                if let Some(id) = &uploaded {
                    self.discard_files(std::slice::from_ref(id)).await;
                }
                return Err(e.into());
            }
        };
        if uploaded.is_some() {
            if let Some(old) = &upd.image_id {
                self.discard_files(&[FileId(old.clone())]).await;
            }
        }
        self.cache.invalidate(&QueryKey::bare("current_user"));
        self.cache.invalidate(&QueryKey::new("user", &upd.user_id));
        self.cache.invalidate_op("users");
        parse(doc)
    }

    // ---------------- follows ------------------------------------------

    /// Follow a user. Already following returns the existing record.
    pub async fn follow(&self, follower_id: &str, following_id: &str) -> ApiResult<Follow> {
        let record = self.follow_graph().create(follower_id, following_id).await?;
        self.invalidate_follow_keys();
        Ok(record)
    }

    /// Unfollow a user. Not following is already the requested state.
    pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> ApiResult<()> {
        self.follow_graph().delete(follower_id, following_id).await?;
        self.invalidate_follow_keys();
        Ok(())
    }

    /// Whether the relation exists. Errors read as "not following".
    pub async fn is_following(&self, follower_id: &str, following_id: &str) -> bool {
        self.follow_graph().exists(follower_id, following_id).await
    }

    pub async fn followers_count(&self, user_id: &str) -> u64 {
        let key = QueryKey::new("followers_count", user_id);
        if let Some(cached) = self.cache_get::<u64>(&key) {
            return cached;
        }
        let count = self.follow_graph().count_followers(user_id).await;
        self.cache_put(key, &count);
        count
    }

    pub async fn following_count(&self, user_id: &str) -> u64 {
        let key = QueryKey::new("following_count", user_id);
        if let Some(cached) = self.cache_get::<u64>(&key) {
            return cached;
        }
        let count = self.follow_graph().count_following(user_id).await;
        self.cache_put(key, &count);
        count
    }

    pub async fn followers(&self, user_id: &str) -> Vec<User> {
        self.follow_graph().list_followers(user_id).await
    }

    pub async fn following(&self, user_id: &str) -> Vec<User> {
        self.follow_graph().list_following(user_id).await
    }

    fn invalidate_follow_keys(&self) {
        self.cache.invalidate_op("followers_count");
        self.cache.invalidate_op("following_count");
        self.cache.invalidate_op("user");
        self.cache.invalidate_op("users");
        self.cache.invalidate(&QueryKey::bare("current_user"));
    }
}

fn parse<T: DeserializeOwned>(doc: Value) -> ApiResult<T> {
    serde_json::from_value(doc).map_err(|e| ApiError::Platform(format!("malformed document: {e}")))
}

/// Parse a page of documents, skipping any that do not match the expected
/// shape.
fn parse_list<T: DeserializeOwned>(page: DocumentPage) -> Vec<T> {
    page.documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("skipping malformed document: {e}");
                None
            }
        })
        .collect()
}
