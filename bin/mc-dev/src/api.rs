//! Dev HTTP API
//!
//! JSON surface over [`App`] so the access flow can be driven with curl or a
//! browser while the real frontend is not around.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use mc_access::{App, AuthError, Navigation, RoleState, Route, SessionState, ShellView};

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<App>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let (status, code) = match &err {
            AuthError::InvalidCredential => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIAL"),
            AuthError::NoSession => (StatusCode::UNAUTHORIZED, "NO_SESSION"),
            AuthError::EmailInUse { .. } => (StatusCode::CONFLICT, "EMAIL_IN_USE"),
            AuthError::WeakPassword { .. } => (StatusCode::BAD_REQUEST, "WEAK_PASSWORD"),
            AuthError::Network(_) => (StatusCode::BAD_GATEWAY, "NETWORK"),
            AuthError::Provider { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER"),
            AuthError::Directory(_) => (StatusCode::BAD_GATEWAY, "DIRECTORY"),
        };
        Self {
            status,
            body: ErrorBody {
                error: code.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// Where the client should go after a credential action
#[derive(Debug, Serialize, Deserialize)]
pub struct NextResponse {
    pub next: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionState,
    pub role: RoleState,
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigateQuery {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub route: Route,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub refreshing: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn create_router(app: Arc<App>) -> Router {
    let state = ApiState { app };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/session", get(session_handler))
        .route("/api/sign-in", post(sign_in_handler))
        .route("/api/sign-in/google", post(google_sign_in_handler))
        .route("/api/register", post(register_handler))
        .route("/api/sign-out", post(sign_out_handler))
        .route("/api/navigate", get(navigate_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/roles/refresh", post(refresh_role_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn session_handler(State(state): State<ApiState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        session: state.app.session(),
        role: state.app.role(),
        location: state.app.navigator().location(),
    })
}

async fn sign_in_handler(
    State(state): State<ApiState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<NextResponse>, ApiError> {
    let next = state.app.sign_in(&req.email, &req.password).await?;
    Ok(Json(NextResponse { next }))
}

async fn google_sign_in_handler(State(state): State<ApiState>) -> Result<Json<NextResponse>, ApiError> {
    let next = state.app.sign_in_with_google().await?;
    Ok(Json(NextResponse { next }))
}

async fn register_handler(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<NextResponse>, ApiError> {
    let next = state
        .app
        .register(&req.email, &req.password, req.name, req.photo_url)
        .await?;
    Ok(Json(NextResponse { next }))
}

async fn sign_out_handler(State(state): State<ApiState>) -> Json<LogoutResponse> {
    let route = state.app.logout().await;
    Json(LogoutResponse { route })
}

async fn navigate_handler(
    State(state): State<ApiState>,
    Query(query): Query<NavigateQuery>,
) -> Json<Navigation> {
    Json(state.app.navigate(&query.path).await)
}

async fn dashboard_handler(State(state): State<ApiState>) -> Json<ShellView> {
    Json(state.app.dashboard().view())
}

async fn refresh_role_handler(State(state): State<ApiState>) -> (StatusCode, Json<RefreshResponse>) {
    let refreshing = state.app.roles().refresh();
    let status = if refreshing { StatusCode::ACCEPTED } else { StatusCode::CONFLICT };
    (status, Json(RefreshResponse { refreshing }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use mc_access::{MemoryIdentityProvider, UserDirectory};
    use mc_common::{DirectoryError, RoleRecord, UserRecord};
    use mc_config::GateConfig;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Every user is an organizer
    struct OrganizerDirectory;

    #[async_trait]
    impl UserDirectory for OrganizerDirectory {
        async fn find_role(&self, _email: &str) -> Result<Option<RoleRecord>, DirectoryError> {
            Ok(Some(RoleRecord { role: Some("organizer".to_string()) }))
        }

        async fn find_user(&self, _email: &str) -> Result<Option<UserRecord>, DirectoryError> {
            Ok(None)
        }

        async fn create_user(&self, _record: &UserRecord) -> Result<(), DirectoryError> {
            Ok(())
        }
    }

    async fn create_test_app() -> (Router, Arc<App>) {
        let identity = Arc::new(
            MemoryIdentityProvider::new().with_account("alice@example.com", "secret1", Some("Alice")),
        );
        let app = Arc::new(
            App::new(&GateConfig::default(), identity, Arc::new(OrganizerDirectory))
                .with_settle_timeout(Duration::from_secs(1)),
        );
        app.start();
        // Let the first provider report land
        tokio::time::sleep(Duration::from_millis(10)).await;
        (create_router(app.clone()), app)
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _app) = create_test_app().await;
        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
    }

    #[tokio::test]
    async fn test_session_starts_anonymous() {
        let (router, _app) = create_test_app().await;
        let (status, body) = send(&router, Method::GET, "/api/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "anonymous");
        assert_eq!(body["role"]["status"], "idle");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let (router, _app) = create_test_app().await;
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sign-in",
            Some(serde_json::json!({ "email": "alice@example.com", "password": "wrong" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "INVALID_CREDENTIAL");
    }

    #[tokio::test]
    async fn test_redirect_then_sign_in_returns_to_requested_view() {
        let (router, _app) = create_test_app().await;

        let (_, body) = send(&router, Method::GET, "/api/navigate?path=/dashboard/add-camp", None).await;
        assert_eq!(body["navigation"], "redirect");
        assert_eq!(body["to"], "/join-us");
        assert_eq!(body["returnTo"], "/dashboard/add-camp");

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/sign-in",
            Some(serde_json::json!({ "email": "alice@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["next"], "/dashboard/add-camp");

        let (_, body) = send(&router, Method::GET, "/api/navigate?path=/dashboard/add-camp", None).await;
        assert_eq!(body["navigation"], "render");
    }

    #[tokio::test]
    async fn test_dashboard_and_sign_out() {
        let (router, app) = create_test_app().await;
        app.sign_in("alice@example.com", "secret1").await.unwrap();
        let mut roles = app.roles().watch();
        tokio::time::timeout(Duration::from_secs(1), roles.wait_for(|s| s.role().is_some()))
            .await
            .unwrap()
            .unwrap();

        let (_, body) = send(&router, Method::GET, "/api/dashboard", None).await;
        assert_eq!(body["shell"], "ready");
        assert_eq!(body["header"]["title"], "Alice");
        let labels: Vec<_> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["label"].as_str().unwrap().to_string())
            .collect();
        assert!(labels.contains(&"Manage Camps".to_string()));
        assert!(!labels.contains(&"Registered Camps".to_string()));

        let (status, body) = send(&router, Method::POST, "/api/sign-out", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"]["route"], "home");

        let (status, _) = send(&router, Method::POST, "/api/roles/refresh", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
