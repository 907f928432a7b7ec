use super::*;
use axum::{
    http::{Request, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

pub(crate) const TEST_JWT_SECRET: &str = "supersecretjwtsecretforunittesting123";

pub(crate) fn set_env_vars() {
    unsafe {
        env::set_var("JWT_SECRET", TEST_JWT_SECRET);
    }
}

pub(crate) fn token_for(user_id: Uuid, secret: &str, exp: usize) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: Some("owner@example.com".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn extract(authorization: Option<String>) -> Result<AuthUser, AppError> {
    let mut builder = Request::builder().uri("/");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();

    AuthUser::from_request_parts(&mut parts, &()).await
}

#[test]
fn test_validate_jwt_success() {
    set_env_vars();
    let user_id = Uuid::new_v4();
    let token = token_for(user_id, TEST_JWT_SECRET, 9999999999);

    let claims = validate_jwt(&token).expect("Valid token should pass");
    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email.as_deref(), Some("owner@example.com"));
}

#[test]
fn test_validate_jwt_expired() {
    set_env_vars();
    let token = token_for(Uuid::new_v4(), TEST_JWT_SECRET, 1);

    assert!(validate_jwt(&token).is_err());
}

#[test]
fn test_validate_jwt_invalid_signature() {
    set_env_vars();
    let token = token_for(Uuid::new_v4(), "wrongsecret", 9999999999);

    assert!(validate_jwt(&token).is_err());
}

#[tokio::test]
async fn test_extractor_reads_bearer_token() {
    set_env_vars();
    let user_id = Uuid::new_v4();
    let token = token_for(user_id, TEST_JWT_SECRET, 9999999999);

    let auth = extract(Some(format!("Bearer {token}"))).await.unwrap();
    assert_eq!(auth.user_id, user_id);
}

#[tokio::test]
async fn test_extractor_rejects_missing_or_malformed_header() {
    set_env_vars();

    let missing = extract(None).await.unwrap_err();
    assert_eq!(missing.into_response().status(), StatusCode::UNAUTHORIZED);

    let malformed = extract(Some("Basic abc".to_string())).await.unwrap_err();
    assert!(matches!(malformed, AppError::Unauthorized(_)));
}
