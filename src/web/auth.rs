use crate::db;
use crate::domain::models::RoleKind;
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{self, CurrentUser};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static LOGIN_RATE_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(5, 60));

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: RoleKind,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() || payload.full_name.trim().is_empty() {
        return Err(ApiError::Validation(
            "Email, password and full name are required".to_string(),
        ));
    }

    let role = db::find_role_by_name(&state.pool, &payload.role)
        .await?
        .ok_or_else(|| ApiError::Validation(format!("Role '{}' not found", payload.role)))?;
    let role_kind = RoleKind::from_name(&role.name).ok_or(ApiError::Unauthorized)?;

    let salt = SaltString::generate(rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4();
    db::insert_user(
        &state.pool,
        user_id,
        &email,
        &hash,
        payload.full_name.trim(),
        role.id,
    )
    .await?;

    tracing::info!("Registered {} as {}", user_id, role.name);

    let token = session::sign_session(user_id, &email, &state.session_key)
        .map_err(|e| anyhow::anyhow!("Failed to sign session: {e}"))?;

    Ok((
        session_cookie_headers(&token),
        Json(AuthResponse {
            user_id,
            email,
            full_name: payload.full_name.trim().to_string(),
            role: role_kind,
        }),
    ))
}

async fn login(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = client_ip(&headers);
    if !LOGIN_RATE_LIMITER.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {ip}");
        return Err(ApiError::Validation(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let user = db::find_user_by_email(&state.pool, &email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.hash).map_err(|_| ApiError::Unauthorized)?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let role = db::find_role_by_id(&state.pool, user.role_id)
        .await?
        .and_then(|role| RoleKind::from_name(&role.name))
        .ok_or(ApiError::Unauthorized)?;

    let token = session::sign_session(user.id, &user.email, &state.session_key)
        .map_err(|e| anyhow::anyhow!("Failed to sign session: {e}"))?;

    tracing::info!("User {} logged in", user.id);

    Ok((
        session_cookie_headers(&token),
        Json(AuthResponse {
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            role,
        }),
    ))
}

async fn logout() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
            .parse()
            .expect("static cookie header"),
    );
    (headers, Json(serde_json::json!({ "status": "signed_out" })))
}

async fn me(user: CurrentUser) -> Json<AuthResponse> {
    Json(AuthResponse {
        user_id: user.user_id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
    })
}

fn session_cookie_headers(token: &str) -> HeaderMap {
    let secure_flag = if std::env::var("PRODUCTION").is_ok() {
        "; Secure"
    } else {
        ""
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("session={token}; HttpOnly; SameSite=Lax; Path=/{secure_flag}")
            .parse()
            .expect("cookie header"),
    );
    headers
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}
