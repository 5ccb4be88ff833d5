use snapfeed::models::{Credentials, NewUser};
use snapfeed::{ApiError, Client, PlatformConfig};

mod common;

fn client() -> Client {
    common::init_logging();
    Client::in_memory(PlatformConfig::for_tests())
}

fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.into(),
        username: name.to_lowercase(),
        email: email.into(),
        password: "hunter22".into(),
    }
}

#[tokio::test]
async fn sign_up_creates_profile_and_session() {
    let c = client();
    let user = c.sign_up(&new_user("Ada", "ada@example.com")).await.unwrap();
    assert_eq!(user.name, "Ada");
    assert_eq!(user.username.as_deref(), Some("ada"));
    assert!(!user.account_id.is_empty());
    // profile starts with the initials avatar
    assert!(user.image_url.as_deref().unwrap().contains("/avatars/initials"));

    let current = c.current_user().await.unwrap().unwrap();
    assert_eq!(current.id, user.id);
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let c = client();
    c.sign_up(&new_user("Ada", "ada@example.com")).await.unwrap();
    c.sign_out().await.unwrap();
    let err = c.sign_up(&new_user("Other", "ada@example.com")).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn sign_out_and_back_in() {
    let c = client();
    c.sign_up(&new_user("Ada", "ada@example.com")).await.unwrap();
    c.sign_out().await.unwrap();
    assert!(c.current_user().await.unwrap().is_none());

    c.sign_in(&Credentials {
        email: "ada@example.com".into(),
        password: "hunter22".into(),
    })
    .await
    .unwrap();
    assert!(c.current_user().await.unwrap().is_some());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let c = client();
    c.sign_up(&new_user("Ada", "ada@example.com")).await.unwrap();
    c.sign_out().await.unwrap();
    let err = c
        .sign_in(&Credentials {
            email: "ada@example.com".into(),
            password: "nope".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn sign_out_without_session_is_fine() {
    let c = client();
    c.sign_out().await.unwrap();
    assert!(c.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn signing_in_while_signed_in_keeps_the_session() {
    let c = client();
    c.sign_up(&new_user("Ada", "ada@example.com")).await.unwrap();
    c.sign_in(&Credentials {
        email: "ada@example.com".into(),
        password: "hunter22".into(),
    })
    .await
    .unwrap();
    assert!(c.current_user().await.unwrap().is_some());
}
