/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use crm_api::{app::{build_router, AppState}, config::Config};
/// use crm_worker::{DispatcherConfig, LinkBuilder, LogMailer, NotificationDispatcher};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = sqlx::PgPool::connect(&config.database.url).await?;
/// let (notifier, _worker) = NotificationDispatcher::spawn(
///     Arc::new(LogMailer::new()),
///     LinkBuilder::new(config.api.public_base_url.clone()),
///     DispatcherConfig::default(),
///     CancellationToken::new(),
/// );
/// let app = build_router(AppState::new(pool, config, notifier));
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::auth::{require_admin, require_auth},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use crm_shared::auth::jwt::TokenSettings;
use crm_worker::NotificationDispatcher;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub tokens: TokenSettings,
    pub notifier: NotificationDispatcher,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, notifier: NotificationDispatcher) -> Self {
        Self {
            tokens: config.token_settings(),
            db,
            config: Arc::new(config),
            notifier,
        }
    }
}

/// Builds the router with all routes and middleware
///
/// ```text
/// /                               GET     liveness banner
/// /health                         GET     database check
/// /auth/register                  POST
/// /auth/login                     POST
/// /auth/verify-email              GET, POST  ?token=
/// /auth/forgot_password           POST
/// /auth/reset-password            POST
/// /me                             GET, PATCH, DELETE          bearer
/// /admin/users[/:id]              GET[, PATCH, DELETE]        bearer + admin
/// /contacts[/:id]                 POST, GET[, PUT, DELETE]    bearer, owner-scoped
/// /leads[/:id]                    POST, GET[, PUT, DELETE]    bearer, owner-scoped
/// /tasks[/:id]                    POST, GET[, PUT, DELETE]    bearer, owner-scoped
/// ```
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route(
            "/auth/verify-email",
            get(routes::auth::verify_email).post(routes::auth::verify_email),
        )
        .route("/auth/forgot_password", post(routes::auth::forgot_password))
        .route("/auth/reset-password", post(routes::auth::reset_password));

    let admin_routes = Router::new()
        .route("/admin/users", get(routes::admin_users::list_users))
        .route(
            "/admin/users/:id",
            get(routes::admin_users::get_user)
                .patch(routes::admin_users::update_user)
                .delete(routes::admin_users::delete_user),
        )
        .route_layer(from_fn(require_admin));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::me::get_me)
                .patch(routes::me::update_me)
                .delete(routes::me::delete_me),
        )
        .route(
            "/contacts",
            post(routes::contacts::create_contact).get(routes::contacts::list_contacts),
        )
        .route(
            "/contacts/:id",
            get(routes::contacts::get_contact)
                .put(routes::contacts::update_contact)
                .delete(routes::contacts::delete_contact),
        )
        .route(
            "/leads",
            post(routes::leads::create_lead).get(routes::leads::list_leads),
        )
        .route(
            "/leads/:id",
            get(routes::leads::get_lead)
                .put(routes::leads::update_lead)
                .delete(routes::leads::delete_lead),
        )
        .route(
            "/tasks",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config.api.cors_origins))
        .with_state(state)
}

/// Any origin when none are configured or `*` is listed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

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
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
