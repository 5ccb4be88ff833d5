use anyhow::Context;

/// Collection names inside the platform database.
#[derive(Debug, Clone)]
pub struct Collections {
    pub users: String,
    pub posts: String,
    pub saves: String,
    pub comments: String,
    /// Provisioned manually after the initial rollout; accessors tolerate it
    /// being absent.
    pub follows: String,
}

impl Default for Collections {
    fn default() -> Self {
        Collections {
            users: "users".into(),
            posts: "posts".into(),
            saves: "saves".into(),
            comments: "comments".into(),
            follows: "follows".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub bucket_id: String,
    pub collections: Collections,
}

impl PlatformConfig {
    /// Read configuration from the environment. A `.env` file is loaded
    /// automatically in debug builds only.
    pub fn from_env() -> anyhow::Result<Self> {
        if cfg!(debug_assertions) {
            let _ = dotenv::dotenv();
        }
        fn required(name: &str) -> anyhow::Result<String> {
            std::env::var(name).with_context(|| format!("{name} must be set"))
        }
        fn collection(name: &str, default: &str) -> String {
            std::env::var(name).unwrap_or_else(|_| default.to_owned())
        }
        Ok(PlatformConfig {
            endpoint: required("SNAPFEED_ENDPOINT")?.trim_end_matches('/').to_owned(),
            project_id: required("SNAPFEED_PROJECT_ID")?,
            database_id: required("SNAPFEED_DATABASE_ID")?,
            bucket_id: required("SNAPFEED_BUCKET_ID")?,
            collections: Collections {
                users: collection("SNAPFEED_USERS_COLLECTION", "users"),
                posts: collection("SNAPFEED_POSTS_COLLECTION", "posts"),
                saves: collection("SNAPFEED_SAVES_COLLECTION", "saves"),
                comments: collection("SNAPFEED_COMMENTS_COLLECTION", "comments"),
                follows: collection("SNAPFEED_FOLLOWS_COLLECTION", "follows"),
            },
        })
    }

    /// Fixed configuration for the in-memory platform.
    pub fn for_tests() -> Self {
        PlatformConfig {
            endpoint: "mem://".into(),
            project_id: "test".into(),
            database_id: "main".into(),
            bucket_id: "media".into(),
            collections: Collections::default(),
        }
    }

    /// Avatar URL the platform renders from a user's initials; used as the
    /// profile image until the user uploads one.
    pub fn initials_avatar_url(&self, name: &str) -> String {
        format!(
            "{}/avatars/initials?name={}&project={}",
            self.endpoint,
            urlencoding::encode(name),
            urlencoding::encode(&self.project_id)
        )
    }
}
