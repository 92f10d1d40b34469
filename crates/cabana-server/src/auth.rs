//! Handshake identity verification.
//!
//! Identity is established out-of-band: clients present a signed token
//! (browser clients via the `auth_token` cookie, native clients via a bearer
//! header or the websocket `token` query parameter). Token issuance belongs
//! to the auth collaborator; this module only verifies and extracts the
//! `(user id, username)` pair attached to each connection.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use cabana_shared::types::{Identity, UserId};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ServerError;

/// Cookie carrying the auth token for browser clients.
pub const COOKIE_NAME: &str = "auth_token";

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i64,
    username: String,
    exp: i64,
}

/// Sign a token for the given identity, valid for seven days.
pub fn sign_token(identity: &Identity, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        user_id: identity.user_id.0,
        username: identity.username.clone(),
        exp: (Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a token and extract the identity, or `None` when the token is
/// missing a valid signature or expired.
pub fn verify_token(token: &str, secret: &str) -> Option<Identity> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(Identity {
        user_id: UserId(data.claims.user_id),
        username: data.claims.username,
    })
}

/// Extract and verify an identity from request headers: bearer token first,
/// then the auth cookie.
pub fn identity_from_headers(headers: &HeaderMap, secret: &str) -> Option<Identity> {
    if let Some(token) = bearer_token(headers) {
        if let Some(identity) = verify_token(token, secret) {
            return Some(identity);
        }
    }

    cookie_token(headers).and_then(|token| verify_token(&token, secret))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == COOKIE_NAME).then(|| value.to_string())
    })
}

/// Require a verified identity on the request/response path, attaching it as
/// a request extension for handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let identity = identity_from_headers(req.headers(), &state.config.jwt_secret)
        .ok_or(ServerError::Unauthorized)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn test_identity() -> Identity {
        Identity {
            user_id: UserId(7),
            username: "ada".into(),
        }
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let token = sign_token(&test_identity(), SECRET).unwrap();
        let identity = verify_token(&token, SECRET).unwrap();
        assert_eq!(identity, test_identity());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign_token(&test_identity(), SECRET).unwrap();
        assert!(verify_token(&token, "other-secret").is_none());
        assert!(verify_token("garbage", SECRET).is_none());
    }

    #[test]
    fn test_identity_from_cookie_header() {
        let token = sign_token(&test_identity(), SECRET).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            format!("theme=dark; {COOKIE_NAME}={token}").parse().unwrap(),
        );

        let identity = identity_from_headers(&headers, SECRET).unwrap();
        assert_eq!(identity.username, "ada");
    }

    #[test]
    fn test_identity_from_bearer_header() {
        let token = sign_token(&test_identity(), SECRET).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());

        assert!(identity_from_headers(&headers, SECRET).is_some());
        assert!(identity_from_headers(&HeaderMap::new(), SECRET).is_none());
    }
}
