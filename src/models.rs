use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::relation::{HasId, RelationRef};

pub type Id = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "$id")]
    pub id: Id,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "$updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "accountId", default)]
    pub account_id: Id,
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "imageId", default)]
    pub image_id: Option<String>,
    /// Save records the platform attaches when it expands the reverse
    /// relation. Usually empty when users are fetched in a batch.
    #[serde(default)]
    pub save: Vec<RelationRef<Save>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "$id")]
    pub id: Id,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "$updatedAt", default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub creator: RelationRef<User>,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub tags: Vec<String>,
    // Legacy single-image fields, still written for older readers.
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    #[serde(rename = "imageId", default)]
    pub image_id: Option<String>,
    // Multi-image arrays; take precedence when non-empty.
    #[serde(rename = "imageUrls", default)]
    pub image_urls: Vec<String>,
    #[serde(rename = "imageIds", default)]
    pub image_ids: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub likes: Vec<RelationRef<User>>,
}

impl Post {
    /// All media URLs of the post, newer parallel arrays winning over the
    /// legacy single-image field.
    pub fn media_urls(&self) -> Vec<String> {
        if !self.image_urls.is_empty() {
            self.image_urls.clone()
        } else {
            self.image_url.iter().cloned().collect()
        }
    }

    /// All media file identifiers, same precedence as [`Post::media_urls`].
    pub fn media_ids(&self) -> Vec<String> {
        if !self.image_ids.is_empty() {
            self.image_ids.clone()
        } else {
            self.image_id.iter().cloned().collect()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "$id")]
    pub id: Id,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub post: RelationRef<Post>,
    #[serde(default)]
    pub user: RelationRef<User>,
    #[serde(default)]
    pub content: String,
    /// Null or absent means a root comment. One level of nesting is rendered
    /// even though the data model permits arbitrary depth.
    #[serde(rename = "parentComment", default)]
    pub parent_comment: Option<Id>,
    #[serde(default)]
    pub likes: Vec<RelationRef<User>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Save {
    #[serde(rename = "$id")]
    pub id: Id,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: RelationRef<User>,
    #[serde(default)]
    pub post: RelationRef<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    #[serde(rename = "$id")]
    pub id: Id,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follower: RelationRef<User>,
    #[serde(default)]
    pub following: RelationRef<User>,
}

impl HasId for User {
    fn doc_id(&self) -> &str {
        &self.id
    }
}
impl HasId for Post {
    fn doc_id(&self) -> &str {
        &self.id
    }
}
impl HasId for Comment {
    fn doc_id(&self) -> &str {
        &self.id
    }
}
impl HasId for Save {
    fn doc_id(&self) -> &str {
        &self.id
    }
}
impl HasId for Follow {
    fn doc_id(&self) -> &str {
        &self.id
    }
}

// ---------------- input types -----------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Raw bytes of an image selected by the user, uploaded before the owning
/// document is created.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub creator_id: Id,
    pub caption: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub images: Vec<NewImage>,
}

#[derive(Debug, Clone)]
pub struct UpdatePost {
    pub post_id: Id,
    pub caption: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    /// Current media of the post, as the editing view received it.
    pub image_ids: Vec<String>,
    pub image_urls: Vec<String>,
    /// Replacement media. Empty means keep the current media.
    pub new_images: Vec<NewImage>,
}

#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub user_id: Id,
    pub name: String,
    pub bio: Option<String>,
    pub image_id: Option<String>,
    pub image_url: Option<String>,
    pub new_image: Option<NewImage>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Id,
    pub user_id: Id,
    pub content: String,
    pub parent_comment: Option<Id>,
}

/// Split a free-form tag string ("art, travel , food") into the stored list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().replace(' ', ""))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_tags_strips_and_skips_empties() {
        assert_eq!(parse_tags("art, travel , , food"), vec!["art", "travel", "food"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn media_arrays_win_over_legacy_fields() {
        let post: Post = serde_json::from_value(json!({
            "$id": "p1",
            "creator": "u1",
            "imageUrl": "legacy.png",
            "imageId": "f0",
            "imageUrls": ["a.png", "b.png"],
            "imageIds": ["f1", "f2"]
        }))
        .unwrap();
        assert_eq!(post.media_urls(), vec!["a.png", "b.png"]);
        assert_eq!(post.media_ids(), vec!["f1", "f2"]);
    }

    #[test]
    fn legacy_fields_used_when_arrays_empty() {
        let post: Post = serde_json::from_value(json!({
            "$id": "p1",
            "creator": "u1",
            "imageUrl": "legacy.png",
            "imageId": "f0"
        }))
        .unwrap();
        assert_eq!(post.media_urls(), vec!["legacy.png"]);
        assert_eq!(post.media_ids(), vec!["f0"]);
    }

    #[test]
    fn heterogeneous_likes_deserialize() {
        let post: Post = serde_json::from_value(json!({
            "$id": "p2",
            "creator": {"$id": "u9"},
            "likes": ["u1", {"$id": "u3", "name": "Three", "accountId": "a3"}]
        }))
        .unwrap();
        assert_eq!(post.likes.len(), 2);
        assert_eq!(post.likes[0].id(), Some("u1"));
        assert_eq!(post.likes[1].id(), Some("u3"));
        // creator object without the full user shape still yields its id
        assert_eq!(post.creator.id(), Some("u9"));
    }
}
