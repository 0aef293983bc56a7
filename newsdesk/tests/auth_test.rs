use mockito::Matcher;
use newsdesk::auth::{AuthProvider, IdentityKind, RemoteAuthProvider, SessionBootstrap};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn anonymous_sign_up() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/accounts:signUp")
        .match_query(Matcher::UrlEncoded("key".into(), "web-key".into()))
        .match_body(Matcher::PartialJson(json!({"returnSecureToken": true})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"localId": "anon-42", "idToken": "tok", "expiresIn": "3600"}"#)
        .create_async()
        .await;

    let provider = RemoteAuthProvider::new(server.url()).with_api_key(Some("web-key".into()));
    let identity = provider.sign_in().await.expect("signed in");

    assert_eq!(identity.user_id, "anon-42");
    assert_eq!(identity.kind, IdentityKind::Anonymous);
    assert_eq!(identity.id_token.as_deref(), Some("tok"));
    mock.assert_async().await;
}

#[tokio::test]
async fn custom_token_sign_in() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/accounts:signInWithCustomToken")
        .match_body(Matcher::PartialJson(json!({"token": "minted"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"localId": "user-7", "idToken": "tok"}"#)
        .create_async()
        .await;

    let provider = RemoteAuthProvider::new(server.url()).with_custom_token(Some("minted".into()));
    let identity = provider.sign_in().await.expect("signed in");

    assert_eq!(identity.user_id, "user-7");
    assert_eq!(identity.kind, IdentityKind::CustomToken);
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_sign_in_falls_back_to_local_identity() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/accounts:signUp")
        .with_status(400)
        .with_body(r#"{"error": {"message": "ADMIN_ONLY_OPERATION"}}"#)
        .create_async()
        .await;

    let provider = RemoteAuthProvider::new(server.url());
    assert!(provider.sign_in().await.is_err());

    let bootstrap = SessionBootstrap::new(Some(Arc::new(provider)));
    let identity = bootstrap.resolve_identity().await;
    assert!(identity.is_local());
    assert!(identity.user_id.starts_with("local-"));
    assert!(identity.id_token.is_none());
}

#[tokio::test]
async fn empty_user_id_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/accounts:signUp")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"localId": ""}"#)
        .create_async()
        .await;

    let bootstrap = SessionBootstrap::new(Some(Arc::new(RemoteAuthProvider::new(server.url()))));
    assert!(bootstrap.resolve_identity().await.is_local());
}

#[tokio::test]
async fn offline_bootstrap_generates_distinct_identities() {
    let a = SessionBootstrap::offline().resolve_identity().await;
    let b = SessionBootstrap::offline().resolve_identity().await;
    assert!(a.is_local() && b.is_local());
    assert_ne!(a.user_id, b.user_id);
}
