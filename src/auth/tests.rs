//! Tests for the auth module

use super::*;

fn build(auth: &Authenticator) -> reqwest::Request {
    let client = reqwest::Client::new();
    let req = client.get("https://example.com/api");
    auth.apply(req).build().unwrap()
}

#[test]
fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let built = build(&auth);
    assert!(built.headers().get("Authorization").is_none());
}

#[test]
fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::bearer("cj-token"));
    let built = build(&auth);
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer cj-token"
    );
}

#[test]
fn test_api_key_header() {
    let auth = Authenticator::new(AuthConfig::api_key_header("X-API-Key", "test-key-123"));
    let built = build(&auth);
    assert_eq!(built.headers().get("X-API-Key").unwrap(), "test-key-123");
}

#[test]
fn test_api_key_header_with_prefix() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Header,
        name: "Authorization".to_string(),
        prefix: Some("Token ".to_string()),
        value: "my-token".to_string(),
    });
    let built = build(&auth);
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Token my-token"
    );
}

#[test]
fn test_api_key_query() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Query,
        name: "apikey".to_string(),
        prefix: None,
        value: "secret123".to_string(),
    });
    let built = build(&auth);
    assert!(built.url().query().unwrap().contains("apikey=secret123"));
}
