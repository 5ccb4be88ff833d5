pub mod api;
pub mod cache;
pub mod comments;
pub mod config;
pub mod enrich;
pub mod error;
pub mod follows;
pub mod likes;
pub mod models;
pub mod pagination;
pub mod platform;
pub mod relation;

// Re-export the surface most callers need
pub use api::{Client, FeedPage};
pub use cache::{MemoryCache, NoCache, QueryKey, RequestCache};
pub use comments::CommentThread;
pub use config::{Collections, PlatformConfig};
pub use error::{ApiError, ApiResult};
pub use models::{
    Comment, Credentials, Follow, NewComment, NewImage, NewPost, NewUser, Post, Save,
    UpdatePost, UpdateUser, User,
};
pub use pagination::PageSlice;
pub use relation::RelationRef;
