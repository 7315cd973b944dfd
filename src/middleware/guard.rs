use crate::db;
use crate::domain::models::RoleKind;
use crate::state::SharedState;
use crate::web::session;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;

/// How the guard treats a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Health checks and static assets: never guarded.
    Open,
    /// Login/register: authenticated users are bounced to the dashboard.
    AuthOnly,
    /// Survey authoring, listing and results: managers only.
    ManagerOnly,
    /// Everything else requires a valid session.
    Protected,
}

pub fn classify(path: &str) -> RouteClass {
    if path == "/health" || path == "/favicon.ico" || path.starts_with("/static/") {
        return RouteClass::Open;
    }
    if path == "/auth/login" || path == "/auth/register" {
        return RouteClass::AuthOnly;
    }
    if is_manager_path(path) {
        return RouteClass::ManagerOnly;
    }
    RouteClass::Protected
}

/// Authoring, listing and results live under these paths. The invite-token
/// respond page shares the /dashboard/survey prefix but is explicitly open
/// to team members.
fn is_manager_path(path: &str) -> bool {
    if path.starts_with("/dashboard/survey/respond/") {
        return false;
    }
    path == "/dashboard/survey"
        || path.starts_with("/dashboard/surveys")
        || path.starts_with("/dashboard/results")
        || (path.starts_with("/dashboard/survey/") && path.ends_with("/created"))
}

/// Single synchronous check per request: unauthenticated callers of
/// protected paths are redirected to login with the original path preserved,
/// authenticated callers are kept off the auth pages, and manager-restricted
/// paths verify the caller's role against the store. Any session or store
/// failure counts as unauthenticated.
pub async fn route_guard(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let class = classify(&path);
    if class == RouteClass::Open {
        return next.run(req).await;
    }

    let claims = session::extract_token(req.headers())
        .and_then(|token| session::verify_session(&token, &state.session_key).ok());

    match (class, claims) {
        (RouteClass::AuthOnly, None) => next.run(req).await,
        (RouteClass::AuthOnly, Some(_)) => Redirect::to("/dashboard").into_response(),
        (_, None) => login_redirect(&path),
        (RouteClass::ManagerOnly, Some(claims)) => {
            match is_manager(&state, claims.user_id).await {
                Ok(true) => next.run(req).await,
                Ok(false) => {
                    tracing::warn!(
                        "Non-manager {} blocked from manager path {}",
                        claims.user_id,
                        path
                    );
                    Redirect::to("/dashboard").into_response()
                }
                Err(e) => {
                    tracing::error!("Role check failed for {}: {e}", claims.user_id);
                    login_redirect(&path)
                }
            }
        }
        (_, Some(_)) => next.run(req).await,
    }
}

fn login_redirect(path: &str) -> Response {
    Redirect::to(&format!("/auth/login?redirectTo={path}")).into_response()
}

async fn is_manager(state: &SharedState, user_id: Uuid) -> anyhow::Result<bool> {
    let Some(profile) = db::find_user_by_id(&state.pool, user_id).await? else {
        return Ok(false);
    };
    let Some(role) = db::find_role_by_id(&state.pool, profile.role_id).await? else {
        return Ok(false);
    };
    Ok(RoleKind::from_name(&role.name) == Some(RoleKind::Manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::services::mailer::Mailer;
    use crate::state::AppState;
    use axum::{body::Body, http::Request as HttpRequest, routing::get, Router};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn test_state() -> SharedState {
        // Lazy pool aimed at a dead port: never connects unless a guarded
        // path actually queries, and then the query reliably errors.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@127.0.0.1:1/teampulse_test")
            .unwrap();
        let email = EmailConfig {
            service_id: String::new(),
            template_id: String::new(),
            public_key: String::new(),
            private_key: String::new(),
        };
        Arc::new(AppState {
            pool,
            session_key: KEY.to_vec(),
            mailer: Arc::new(Mailer::new(email, "http://localhost:3000".to_string())),
        })
    }

    fn app(state: SharedState) -> Router {
        Router::new()
            .route("/health", get(|| async { "OK" }))
            .route("/auth/login", get(|| async { "login" }))
            .route("/dashboard", get(|| async { "dash" }))
            .route("/dashboard/survey", get(|| async { "surveys" }))
            .layer(axum::middleware::from_fn_with_state(state, route_guard))
    }

    #[test]
    fn classification_covers_the_route_map() {
        assert_eq!(classify("/health"), RouteClass::Open);
        assert_eq!(classify("/static/app.js"), RouteClass::Open);
        assert_eq!(classify("/auth/login"), RouteClass::AuthOnly);
        assert_eq!(classify("/auth/register"), RouteClass::AuthOnly);
        assert_eq!(classify("/dashboard"), RouteClass::Protected);
        assert_eq!(classify("/dashboard/pending"), RouteClass::Protected);
        assert_eq!(classify("/dashboard/survey"), RouteClass::ManagerOnly);
        assert_eq!(classify("/dashboard/surveys/create"), RouteClass::ManagerOnly);
        assert_eq!(classify("/dashboard/surveys/members"), RouteClass::ManagerOnly);
        assert_eq!(classify("/dashboard/results/abc"), RouteClass::ManagerOnly);
        assert_eq!(classify("/dashboard/survey/abc/created"), RouteClass::ManagerOnly);
        // token respond flow is protected, not manager-only
        assert_eq!(
            classify("/dashboard/survey/respond/tok123"),
            RouteClass::Protected
        );
    }

    #[tokio::test]
    async fn unauthenticated_protected_request_redirects_to_login() {
        let response = app(test_state())
            .oneshot(
                HttpRequest::builder()
                    .uri("/dashboard/survey")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers()["location"],
            "/auth/login?redirectTo=/dashboard/survey"
        );
    }

    #[tokio::test]
    async fn unauthenticated_auth_page_passes_through() {
        let response = app(test_state())
            .oneshot(
                HttpRequest::builder()
                    .uri("/auth/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_auth_page_redirects_to_dashboard() {
        let token = session::sign_session(Uuid::new_v4(), "a@x.com", KEY).unwrap();
        let response = app(test_state())
            .oneshot(
                HttpRequest::builder()
                    .uri("/auth/login")
                    .header("cookie", format!("session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/dashboard");
    }

    #[tokio::test]
    async fn role_check_failure_counts_as_unauthenticated() {
        // The lazy pool has no server behind it, so the manager lookup errors
        // out; the guard must fall back to the login redirect.
        let token = session::sign_session(Uuid::new_v4(), "a@x.com", KEY).unwrap();
        let response = app(test_state())
            .oneshot(
                HttpRequest::builder()
                    .uri("/dashboard/survey")
                    .header("cookie", format!("session={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers()["location"],
            "/auth/login?redirectTo=/dashboard/survey"
        );
    }

    #[tokio::test]
    async fn open_paths_skip_the_guard() {
        let response = app(test_state())
            .oneshot(
                HttpRequest::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
