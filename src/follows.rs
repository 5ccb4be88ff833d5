//! Accessors over the directed follower -> following relation. The backing
//! collection is provisioned out of band, so every read treats a
//! missing-resource error as "no relation yet" rather than a failure.

use log::warn;
use serde_json::json;

use crate::config::PlatformConfig;
use crate::models::{Follow, User};
use crate::platform::{DocumentStore, Filter, PlatformError, PlatformResult};
use crate::relation::distinct_ids;

const LIST_WINDOW: u64 = 100;

pub struct FollowGraph<'a> {
    docs: &'a dyn DocumentStore,
    follows: &'a str,
    users: &'a str,
}

impl<'a> FollowGraph<'a> {
    pub fn new(docs: &'a dyn DocumentStore, cfg: &'a PlatformConfig) -> Self {
        FollowGraph {
            docs,
            follows: &cfg.collections.follows,
            users: &cfg.collections.users,
        }
    }

    /// The record for an exact ordered pair, if any. A missing collection
    /// reads as no record.
    pub async fn find(&self, follower_id: &str, following_id: &str) -> PlatformResult<Option<Follow>> {
        let filters = [
            Filter::equal("follower", follower_id),
            Filter::equal("following", following_id),
            Filter::Limit(1),
        ];
        match self.docs.list(self.follows, &filters).await {
            Ok(page) => Ok(page
                .documents
                .into_iter()
                .next()
                .and_then(|v| serde_json::from_value(v).ok())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, follower_id: &str, following_id: &str) -> bool {
        match self.find(follower_id, following_id).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!("follow existence check failed: {e}");
                false
            }
        }
    }

    /// Create the relation, returning the existing record when one is
    /// already present. Check-then-act, not atomic: a concurrent duplicate
    /// is possible and accepted.
    pub async fn create(&self, follower_id: &str, following_id: &str) -> PlatformResult<Follow> {
        if let Some(existing) = self.find(follower_id, following_id).await? {
            return Ok(existing);
        }
        let created = self
            .docs
            .create(
                self.follows,
                json!({"follower": follower_id, "following": following_id}),
            )
            .await;
        let created = match created {
            Ok(doc) => doc,
            // a uniqueness constraint losing the race to a concurrent
            // create also means "already following"
            Err(e) if e.is_conflict() => {
                if let Some(existing) = self.find(follower_id, following_id).await? {
                    return Ok(existing);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        serde_json::from_value(created).map_err(|e| PlatformError::Other(e.to_string()))
    }

    /// Remove the relation. Absence, including a missing collection, counts
    /// as already satisfied.
    pub async fn delete(&self, follower_id: &str, following_id: &str) -> PlatformResult<()> {
        let Some(existing) = self.find(follower_id, following_id).await? else {
            return Ok(());
        };
        match self.docs.delete(self.follows, &existing.id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn count_followers(&self, user_id: &str) -> u64 {
        self.count(Filter::equal("following", user_id)).await
    }

    pub async fn count_following(&self, user_id: &str) -> u64 {
        self.count(Filter::equal("follower", user_id)).await
    }

    async fn count(&self, filter: Filter) -> u64 {
        match self.docs.list(self.follows, &[filter, Filter::Limit(1)]).await {
            Ok(page) => page.total,
            Err(e) => {
                if !e.is_not_found() {
                    warn!("follow count failed: {e}");
                }
                0
            }
        }
    }

    /// Users following `user_id`. Empty on any error.
    pub async fn list_followers(&self, user_id: &str) -> Vec<User> {
        self.list_side("following", user_id, |f| &f.follower).await
    }

    /// Users `user_id` follows. Empty on any error.
    pub async fn list_following(&self, user_id: &str) -> Vec<User> {
        self.list_side("follower", user_id, |f| &f.following).await
    }

    async fn list_side(
        &self,
        match_field: &str,
        user_id: &str,
        opposite: impl Fn(&Follow) -> &crate::relation::RelationRef<User>,
    ) -> Vec<User> {
        let filters = [Filter::equal(match_field, user_id), Filter::Limit(LIST_WINDOW)];
        let records: Vec<Follow> = match self.docs.list(self.follows, &filters).await {
            Ok(page) => page
                .documents
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(e) => {
                if !e.is_not_found() {
                    warn!("follow listing failed: {e}");
                }
                return Vec::new();
            }
        };
        let refs: Vec<_> = records.iter().map(|f| opposite(f).clone()).collect();
        let ids = distinct_ids(&refs);
        if ids.is_empty() {
            return Vec::new();
        }
        let filters = [
            Filter::equal_any("$id", ids.iter().cloned()),
            Filter::Limit(ids.len() as u64),
        ];
        match self.docs.list(self.users, &filters).await {
            Ok(page) => page
                .documents
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(e) => {
                warn!("follow user lookup failed: {e}");
                Vec::new()
            }
        }
    }
}
