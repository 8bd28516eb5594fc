//! End-to-end provider handshake tests against a mock identity provider.

use base64::Engine;
use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalogo::api::handlers::auth::{
    AuthConfig, AuthError, ProviderClient, Session, SessionIdentity, SessionStore, Verification,
};
use catalogo::cli::globals::GlobalArgs;

const CLIENT_ID: &str = "client-id.apps.example.com";
const SUBJECT: &str = "subject-1234";
const ACCESS_TOKEN: &str = "ya29.access";

fn fake_id_token(subject: &str) -> String {
    let encode = |part: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(part);
    format!(
        "{}.{}.{}",
        encode(br#"{"alg":"RS256"}"#),
        encode(json!({ "sub": subject, "aud": CLIENT_ID }).to_string().as_bytes()),
        encode(b"signature")
    )
}

fn provider_for(server: &MockServer) -> ProviderClient {
    let base = server.uri();
    let config = AuthConfig::new()
        .with_token_url(format!("{base}/token"))
        .with_token_info_url(format!("{base}/tokeninfo"))
        .with_user_info_url(format!("{base}/userinfo"))
        .with_revoke_url(format!("{base}/revoke"));
    let globals = GlobalArgs::new(
        CLIENT_ID.to_string(),
        SecretString::from("client-secret".to_string()),
    );
    ProviderClient::new(&config, &globals).expect("provider client should build")
}

async fn mount_token_info(server: &MockServer, user_id: &str, issued_to: &str) {
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("access_token", ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": user_id,
            "issued_to": issued_to,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn exchange_returns_access_token_and_subject() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("redirect_uri=postmessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "id_token": fake_id_token(SUBJECT),
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let bundle = provider.exchange("auth-code").await.expect("exchange");
    assert_eq!(bundle.access_token, ACCESS_TOKEN);
    assert_eq!(bundle.subject, SUBJECT);
}

#[tokio::test]
async fn exchange_rejection_is_reported_as_exchange_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider
        .exchange("bad-code")
        .await
        .expect_err("exchange should fail");
    assert_eq!(err, AuthError::ExchangeFailed);
}

#[tokio::test]
async fn exchange_without_subject_claim_fails() {
    let server = MockServer::start().await;
    let encode = |part: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(part);
    let sub_less = format!(
        "{}.{}.{}",
        encode(br#"{"alg":"RS256"}"#),
        encode(json!({ "aud": CLIENT_ID }).to_string().as_bytes()),
        encode(b"signature")
    );
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "id_token": sub_less,
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider
        .exchange("auth-code")
        .await
        .expect_err("exchange should fail");
    assert_eq!(err, AuthError::ExchangeFailed);
}

#[tokio::test]
async fn verify_accepts_a_clean_handshake() {
    let server = MockServer::start().await;
    mount_token_info(&server, SUBJECT, CLIENT_ID).await;

    let provider = provider_for(&server);
    let bundle = catalogo::api::handlers::auth::TokenBundle {
        access_token: ACCESS_TOKEN.to_string(),
        subject: SUBJECT.to_string(),
    };
    let outcome = provider
        .verify(&bundle, &Session::default())
        .await
        .expect("verify");
    assert_eq!(outcome, Verification::Verified);
}

#[tokio::test]
async fn verify_surfaces_provider_reported_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_token",
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let bundle = catalogo::api::handlers::auth::TokenBundle {
        access_token: ACCESS_TOKEN.to_string(),
        subject: SUBJECT.to_string(),
    };
    let err = provider
        .verify(&bundle, &Session::default())
        .await
        .expect_err("verify should fail");
    assert_eq!(err, AuthError::TokenInfo("invalid_token".to_string()));
}

#[tokio::test]
async fn verify_rejects_subject_mismatch() {
    let server = MockServer::start().await;
    mount_token_info(&server, "someone-else", CLIENT_ID).await;

    let provider = provider_for(&server);
    let bundle = catalogo::api::handlers::auth::TokenBundle {
        access_token: ACCESS_TOKEN.to_string(),
        subject: SUBJECT.to_string(),
    };
    let err = provider
        .verify(&bundle, &Session::default())
        .await
        .expect_err("verify should fail");
    assert_eq!(err, AuthError::SubjectMismatch);
}

#[tokio::test]
async fn verify_rejects_audience_mismatch() {
    let server = MockServer::start().await;
    mount_token_info(&server, SUBJECT, "another-app.apps.example.com").await;

    let provider = provider_for(&server);
    let bundle = catalogo::api::handlers::auth::TokenBundle {
        access_token: ACCESS_TOKEN.to_string(),
        subject: SUBJECT.to_string(),
    };
    let err = provider
        .verify(&bundle, &Session::default())
        .await
        .expect_err("verify should fail");
    assert_eq!(err, AuthError::AudienceMismatch);
}

#[tokio::test]
async fn verify_reports_duplicate_login_as_already_connected() {
    let server = MockServer::start().await;
    mount_token_info(&server, SUBJECT, CLIENT_ID).await;

    let store = SessionStore::new(Duration::from_secs(60));
    let token = store.issue().await.expect("issue");
    store
        .populate(
            &token,
            SessionIdentity {
                access_token: ACCESS_TOKEN.to_string(),
                subject_id: SUBJECT.to_string(),
                display_name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await;
    let session = store.snapshot(&token).await.expect("snapshot");

    let provider = provider_for(&server);
    let bundle = catalogo::api::handlers::auth::TokenBundle {
        access_token: ACCESS_TOKEN.to_string(),
        subject: SUBJECT.to_string(),
    };
    let outcome = provider.verify(&bundle, &session).await.expect("verify");
    assert_eq!(outcome, Verification::AlreadyConnected);
}

#[tokio::test]
async fn user_info_fetches_name_and_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(query_param("access_token", ACCESS_TOKEN))
        .and(query_param("alt", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Alice",
            "email": "alice@example.com",
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let profile = provider.user_info(ACCESS_TOKEN).await.expect("user info");
    assert_eq!(profile.name, "Alice");
    assert_eq!(profile.email, "alice@example.com");
}

#[tokio::test]
async fn revoke_succeeds_on_provider_ack() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/revoke"))
        .and(query_param("token", ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(provider.revoke(ACCESS_TOKEN).await.is_ok());
}

#[tokio::test]
async fn revoke_fails_on_provider_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/revoke"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    assert!(provider.revoke(ACCESS_TOKEN).await.is_err());
}
