use crate::db;
use crate::domain::models::RoleKind;
use crate::web::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
}

pub fn sign_session(user_id: Uuid, email: &str, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    sign_with_expiry(user_id, email, exp.timestamp(), key)
}

fn sign_with_expiry(
    user_id: Uuid,
    email: &str,
    exp: i64,
    key: &[u8],
) -> Result<String, SessionError> {
    let payload = format!("{user_id}|{email}|{exp}");
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let user_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let email = pieces[1].to_string();
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims {
        user_id,
        email,
        exp,
    })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                let trimmed = pair.trim();
                if let Some(rest) = trimmed.strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

/// Session context: identity plus role, resolved from the store once per
/// request. Handlers take this instead of re-fetching profile or role
/// themselves.
pub struct CurrentUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: RoleKind,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims = verify_session(&token, &shared.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {e}");
            ApiError::Unauthorized
        })?;

        let user = db::find_user_by_id(&shared.pool, claims.user_id)
            .await
            .map_err(|e| {
                tracing::warn!("Profile lookup failed for session: {e}");
                ApiError::Unauthorized
            })?
            .ok_or(ApiError::Unauthorized)?;

        let role = db::find_role_by_id(&shared.pool, user.role_id)
            .await
            .map_err(|e| {
                tracing::warn!("Role lookup failed for session: {e}");
                ApiError::Unauthorized
            })?
            .and_then(|role| RoleKind::from_name(&role.name))
            .ok_or(ApiError::Unauthorized)?;

        Ok(CurrentUser {
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn roundtrip_preserves_identity() {
        let user_id = Uuid::new_v4();
        let token = sign_session(user_id, "a@x.com", KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "a@x.com");
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let token = sign_session(Uuid::new_v4(), "a@x.com", KEY).unwrap();
        let err = verify_session(&token, b"another-key-entirely-other-bytes").unwrap_err();
        assert!(matches!(err, SessionError::Signature));
    }

    #[test]
    fn garbage_tokens_are_invalid() {
        assert!(matches!(
            verify_session("not-a-token", KEY).unwrap_err(),
            SessionError::Invalid
        ));
        assert!(matches!(
            verify_session("a.b.c", KEY).unwrap_err(),
            SessionError::Invalid
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let past = Utc::now().timestamp() - 60;
        let token = sign_with_expiry(Uuid::new_v4(), "a@x.com", past, KEY).unwrap();
        assert!(matches!(
            verify_session(&token, KEY).unwrap_err(),
            SessionError::Expired
        ));
    }

    #[test]
    fn extracts_bearer_and_cookie_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer tok-1".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok-1"));

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "theme=dark; session=tok-2".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok-2"));
    }
}
