//! OAuth2 password grant and the stored auth config

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use farmos_wfs_harness::HarnessError;
use farmos_wfs_harness::auth::OAuthClient;
use farmos_wfs_harness::auth_config::{AuthManager, AuthMethodConfig};

use crate::common::{ACCESS_TOKEN, BEARER, MockFarmos, token_json};

#[tokio::test]
async fn test_password_grant_yields_bearer_session() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token().await;

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(header("authorization", BEARER))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&farmos.server)
        .await;

    let oauth = OAuthClient::from_config(&farmos.config).unwrap();
    let session = oauth.authenticate(&farmos.config.oauth).await.unwrap();
    assert_eq!(session.token().access_token, ACCESS_TOKEN);

    let response = session
        .get(&format!("{}/api", farmos.uri()))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_rejected_grant_is_an_auth_error() {
    let farmos = MockFarmos::start().await;
    farmos.mount_token_rejected().await;

    let oauth = OAuthClient::from_config(&farmos.config).unwrap();
    let err = oauth.authenticate(&farmos.config.oauth).await.unwrap_err();

    match err {
        HarnessError::Auth(msg) => assert!(msg.contains("invalid_grant"), "{}", msg),
        other => panic!("Expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_bearer_token_is_rejected() {
    let farmos = MockFarmos::start().await;
    let mut token = token_json();
    token["token_type"] = "mac".into();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token))
        .mount(&farmos.server)
        .await;

    let oauth = OAuthClient::from_config(&farmos.config).unwrap();
    assert!(matches!(
        oauth.fetch_token(&farmos.config.oauth).await,
        Err(HarnessError::Auth(_))
    ));
}

#[tokio::test]
async fn test_stored_config_grants_once() {
    let farmos = MockFarmos::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json()))
        .expect(1)
        .mount(&farmos.server)
        .await;

    let (manager, id) = farmos.auth_manager();
    assert_eq!(id.len(), 7);

    let first = manager.authenticated_client(&id).await.unwrap();
    let second = manager.authenticated_client(&id).await.unwrap();
    assert_eq!(first.token().access_token, second.token().access_token);
}

#[tokio::test]
async fn test_unknown_config_id() {
    let manager = AuthManager::new();
    assert!(matches!(
        manager.authenticated_client("nope123").await,
        Err(HarnessError::Auth(_))
    ));
}

#[tokio::test]
async fn test_store_requires_master_password() {
    let farmos = MockFarmos::start().await;
    let mut manager = AuthManager::new();
    let mut method = AuthMethodConfig::oauth2(&farmos.config).unwrap();

    assert!(manager.store_authentication_config(&mut method).is_err());
    assert!(method.id().is_none());

    assert!(manager.set_master_password("test"));
    let id = manager.store_authentication_config(&mut method).unwrap();
    assert_eq!(method.id(), Some(id.as_str()));
    assert!(manager.contains(&id));
}
