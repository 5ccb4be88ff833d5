use snapfeed::models::{NewImage, NewPost, NewUser, Post, User};
use snapfeed::{Client, PlatformConfig};

mod common;

fn client() -> Client {
    common::init_logging();
    Client::in_memory(PlatformConfig::for_tests())
}

async fn seed_user(c: &Client, name: &str) -> User {
    let user = c
        .sign_up(&NewUser {
            name: name.into(),
            username: name.to_lowercase(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    c.sign_out().await.unwrap();
    user
}

async fn seed_post(c: &Client, creator: &User, caption: &str) -> Post {
    c.create_post(&NewPost {
        creator_id: creator.id.clone(),
        caption: caption.into(),
        tags: vec![],
        location: None,
        images: vec![NewImage {
            bytes: vec![1, 2, 3],
            filename: "pic.png".into(),
        }],
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn save_and_find() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    let bob = seed_user(&c, "Bob").await;
    let post = seed_post(&c, &ada, "keeper").await;

    assert!(c.find_save(&bob.id, &post.id).await.unwrap().is_none());
    let save = c.save_post(&bob.id, &post.id).await.unwrap();

    let found = c.find_save(&bob.id, &post.id).await.unwrap().unwrap();
    assert_eq!(found.id, save.id);
}

#[tokio::test]
async fn saved_posts_expand_post_and_creator() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    let bob = seed_user(&c, "Bob").await;
    let post = seed_post(&c, &ada, "keeper").await;
    c.save_post(&bob.id, &post.id).await.unwrap();

    let saves = c.saved_posts(&bob.id).await.unwrap();
    assert_eq!(saves.len(), 1);
    let saved_post = saves[0].post.expanded().unwrap();
    assert_eq!(saved_post.caption, "keeper");
    assert_eq!(saved_post.creator.expanded().unwrap().name, "Ada");
}

#[tokio::test]
async fn stale_save_keeps_bare_reference() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    let bob = seed_user(&c, "Bob").await;
    let post = seed_post(&c, &ada, "short-lived").await;
    c.save_post(&bob.id, &post.id).await.unwrap();
    c.delete_post(&post.id).await.unwrap();

    let saves = c.saved_posts(&bob.id).await.unwrap();
    assert_eq!(saves.len(), 1);
    assert!(saves[0].post.expanded().is_none());
    assert_eq!(saves[0].post.id(), Some(post.id.as_str()));
}

#[tokio::test]
async fn unsave_is_idempotent() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    let bob = seed_user(&c, "Bob").await;
    let post = seed_post(&c, &ada, "keeper").await;
    let save = c.save_post(&bob.id, &post.id).await.unwrap();

    c.delete_saved_post(&save.id).await.unwrap();
    assert!(c.find_save(&bob.id, &post.id).await.unwrap().is_none());
    // already gone still succeeds
    c.delete_saved_post(&save.id).await.unwrap();
}
