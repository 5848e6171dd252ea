use mockito::{Matcher, Server};
use oauth2l_lib::{ErrorKind, TokenIntrospector};

fn introspector(server: &mockito::ServerGuard) -> TokenIntrospector {
    TokenIntrospector::new(reqwest::Client::new(), format!("{}/tokeninfo", server.url()))
}

#[tokio::test]
async fn valid_token_returns_mapping() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/tokeninfo")
        .match_query(Matcher::UrlEncoded("access_token".into(), "ya29.good".into()))
        .with_status(200)
        .with_body(
            r#"{"azp":"123.apps","scope":"https://www.googleapis.com/auth/userinfo.email openid","expires_in":"3412","email":"user@example.com"}"#,
        )
        .create_async()
        .await;

    let info = introspector(&server)
        .introspect("ya29.good")
        .await
        .expect("introspect");
    assert!(!info.is_empty());
    assert_eq!(info.expires_in(), Some(3412));
    assert_eq!(info.email(), Some("user@example.com"));
    assert_eq!(
        info.scopes(),
        vec!["https://www.googleapis.com/auth/userinfo.email", "openid"]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_token_is_empty_and_invalid() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/tokeninfo")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"error":"invalid_token","error_description":"Invalid Value"}"#)
        .create_async()
        .await;

    let introspector = introspector(&server);
    let info = introspector.introspect("ya29.bad").await.expect("introspect");
    assert!(info.is_empty());
    assert!(!introspector.is_valid("ya29.bad").await.expect("is_valid"));
}

#[tokio::test]
async fn unexpected_status_is_communication_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/tokeninfo")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("backend unavailable")
        .create_async()
        .await;

    let err = introspector(&server)
        .introspect("ya29.any")
        .await
        .expect_err("fail");
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(err.message().contains("status=500"));
}
