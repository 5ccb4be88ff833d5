use std::collections::HashSet;

use snapfeed::models::{NewImage, NewPost, NewUser, User};
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

async fn seed_posts(c: &Client, creator: &User, count: usize) {
    for i in 0..count {
        c.create_post(&NewPost {
            creator_id: creator.id.clone(),
            caption: format!("post {i}"),
            tags: vec![],
            location: None,
            images: vec![NewImage {
                bytes: vec![1, 2, 3],
                filename: format!("{i}.png"),
            }],
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn feed_pages_are_disjoint_and_exhaustive() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    seed_posts(&c, &ada, 12).await;

    let first = c.feed_page(None).await.unwrap();
    assert_eq!(first.posts.len(), 9);
    let cursor = first.next_cursor.clone().unwrap();

    let second = c.feed_page(Some(&cursor)).await.unwrap();
    assert_eq!(second.posts.len(), 3);
    // a short page ends the feed
    assert!(second.next_cursor.is_none());

    let mut seen: HashSet<String> = HashSet::new();
    for post in first.posts.iter().chain(second.posts.iter()) {
        assert!(seen.insert(post.id.clone()), "post served twice");
    }
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn exact_multiple_ends_with_an_empty_page() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    seed_posts(&c, &ada, 9).await;

    let first = c.feed_page(None).await.unwrap();
    assert_eq!(first.posts.len(), 9);
    // full page: cannot prove exhaustion yet
    let cursor = first.next_cursor.clone().unwrap();

    let second = c.feed_page(Some(&cursor)).await.unwrap();
    assert!(second.posts.is_empty());
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn empty_feed_has_no_cursor() {
    let c = client();
    let page = c.feed_page(None).await.unwrap();
    assert!(page.posts.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn feed_posts_carry_expanded_creators() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    seed_posts(&c, &ada, 2).await;
    let page = c.feed_page(None).await.unwrap();
    assert!(page
        .posts
        .iter()
        .all(|p| p.creator.expanded().map(|u| u.name == "Ada").unwrap_or(false)));
}

#[tokio::test]
async fn user_posts_are_scoped_to_the_creator() {
    let c = client();
    let ada = seed_user(&c, "Ada").await;
    let bob = seed_user(&c, "Bob").await;
    seed_posts(&c, &ada, 2).await;
    seed_posts(&c, &bob, 1).await;

    let posts = c.user_posts(&ada.id).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.creator.id() == Some(ada.id.as_str())));
}
