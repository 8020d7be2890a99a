/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use taskdeck_api::{app::{build_router, AppState}, config::Config};
/// use taskdeck_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use taskdeck_shared::auth::jwt::TokenLifetimes;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::middleware::{auth::require_auth, security::SecurityHeadersLayer};
use crate::routes;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn token_lifetimes(&self) -> &TokenLifetimes {
        &self.config.jwt.lifetimes
    }
}

/// Builds the complete router
///
/// ```text
/// /health
/// /api/account/{register,login,refresh}              public
/// /api/account/...                                   authenticated
/// /api/project[/{id}[/member|task|label|activity]]   authenticated
/// /api/mention, /api/notification                    authenticated
/// ```
///
/// Layers, outermost first: security headers, CORS, trace, cookies. The
/// auth layer is a route layer, so it wraps only routes added before it and
/// unknown paths still answer 404.
pub fn build_router(state: AppState) -> Router {
    let account = Router::new()
        .route("/logout", post(routes::account::logout))
        .route("/check-auth", get(routes::account::check_auth))
        .route("/me", get(routes::account::me))
        .route("/update", put(routes::account::update))
        .route("/delete/:id", delete(routes::account::delete_account))
        .route("/restore/:id", patch(routes::account::restore_account))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route("/register", post(routes::account::register))
        .route("/login", post(routes::account::login))
        .route("/refresh", post(routes::account::refresh));

    let project = Router::new()
        .route("/", get(routes::projects::list))
        .route("/deleted", get(routes::projects::list_deleted))
        .route("/create", post(routes::projects::create))
        .route("/update", put(routes::projects::update))
        .route("/unarchive/:id", patch(routes::projects::unarchive))
        .route("/delete/:id", delete(routes::projects::delete))
        .route("/restore/:id", patch(routes::projects::restore))
        .route("/:id", get(routes::projects::get))
        .route("/:id/role", get(routes::projects::role))
        .route("/:id/status", patch(routes::projects::change_status))
        .route(
            "/:id/settings",
            get(routes::projects::get_settings).put(routes::projects::update_settings),
        )
        .route("/:id/activity", get(routes::projects::activity))
        .route(
            "/:id/member",
            get(routes::members::list).post(routes::members::add),
        )
        .route(
            "/:id/member/:account_id",
            patch(routes::members::update_role).delete(routes::members::remove),
        )
        .route(
            "/:id/label",
            get(routes::labels::list).post(routes::labels::create),
        )
        .route("/:id/label/:label_id", delete(routes::labels::delete))
        .route(
            "/:id/task",
            get(routes::tasks::list).post(routes::tasks::create),
        )
        .route(
            "/:id/task/:task_id",
            get(routes::tasks::get)
                .put(routes::tasks::update)
                .delete(routes::tasks::delete),
        )
        .route("/:id/task/:task_id/status", patch(routes::tasks::change_status))
        .route("/:id/task/:task_id/assign", patch(routes::tasks::assign))
        .route(
            "/:id/task/:task_id/label/:label_id",
            post(routes::labels::attach).delete(routes::labels::detach),
        )
        .route(
            "/:id/task/:task_id/comment",
            get(routes::comments::list).post(routes::comments::create),
        )
        .route(
            "/:id/task/:task_id/comment/:comment_id",
            put(routes::comments::update).delete(routes::comments::delete),
        )
        .route(
            "/:id/task/:task_id/time-log",
            get(routes::time_logs::list).post(routes::time_logs::create),
        )
        .route(
            "/:id/task/:task_id/time-log/:time_log_id",
            delete(routes::time_logs::delete),
        );

    let mention = Router::new()
        .route("/", get(routes::mentions::list))
        .route("/:id/read", patch(routes::mentions::mark_read));

    let notification = Router::new()
        .route("/", get(routes::notifications::list))
        .route("/unread-count", get(routes::notifications::unread_count))
        .route("/read-all", patch(routes::notifications::mark_all_read))
        .route("/:id/read", patch(routes::notifications::mark_read))
        .route("/:id/archive", patch(routes::notifications::archive));

    let protected = Router::new()
        .nest("/project", project)
        .nest("/mention", mention)
        .nest("/notification", notification)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api = Router::new().nest("/account", account).merge(protected);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(CookieManagerLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials are required for the auth cookies
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static(crate::pagination::PAGINATION_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    // A lazy pool never connects until a query runs, so requests rejected
    // before touching the database can be tested without PostgreSQL.
    fn test_app() -> Router {
        let config = crate::config::test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();
        build_router(AppState::new(pool, config))
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/project").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/account/register")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"a@b.co"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].as_str().unwrap().contains("password"));
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/api/account/me")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = test_app()
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
