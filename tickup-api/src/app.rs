/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tickup_api::{app::{build_router, AppState, Backends}, config::Config};
/// use tickup_shared::{clock::SystemClock, notify::LogNotifier, store::memory::MemoryStore};
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = Arc::new(MemoryStore::new());
/// let state = AppState::new(
///     config,
///     Backends::new(store.clone(), store, Arc::new(LogNotifier), Arc::new(SystemClock)),
/// );
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use tickup_shared::{
    auth::middleware::{session_auth_middleware, SessionVerifier, LEGACY_TOKEN_HEADER},
    clock::Clock,
    notify::Notifier,
    otp::OtpLedger,
    services::{AccountService, InviteLinks, InviteService, PasswordResetService, TaskService},
    store::{TaskStore, UserStore},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// External collaborators the services are built on
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tasks,
            notifier,
            clock,
        }
    }
}

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tasks: TaskService,
    pub invites: InviteService,
    pub accounts: AccountService,
    pub resets: PasswordResetService,
    pub verifier: SessionVerifier,
    /// Reset code ledger, also driven by the background sweeper
    pub otp: Arc<OtpLedger>,
    /// Used by the health check
    pub store: Arc<dyn TaskStore>,
}

impl AppState {
    /// Wires the services together
    pub fn new(config: Config, backends: Backends) -> Self {
        let Backends {
            users,
            tasks,
            notifier,
            clock,
        } = backends;

        let otp = Arc::new(OtpLedger::new(
            clock.clone(),
            Duration::seconds(config.otp.ttl_seconds),
        ));

        let invites = InviteService::new(
            tasks.clone(),
            users.clone(),
            notifier.clone(),
            clock.clone(),
            InviteLinks {
                frontend_url: config.links.frontend_url.clone(),
                backend_url: config.links.backend_url.clone(),
            },
        );

        let accounts = AccountService::new(
            users.clone(),
            invites.clone(),
            clock.clone(),
            config.jwt.secret.clone(),
            Duration::days(config.jwt.ttl_days),
        );

        let resets = PasswordResetService::new(users.clone(), otp.clone(), notifier, clock.clone());
        let verifier = SessionVerifier::new(users.clone(), config.jwt.secret.clone());

        Self {
            tasks: TaskService::new(tasks.clone(), users, clock),
            invites,
            accounts,
            resets,
            verifier,
            otp,
            store: tasks,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// ├── /auth/
/// │   ├── POST /signup, /login, /request-password-reset, /reset-password
/// │   ├── GET  /check-username/:username
/// │   └── GET /user, PUT /update-username, PUT /change-password   (session)
/// └── /tasks/                                                     (session)
///     ├── POST / , GET / , GET /stats, GET /important
///     ├── GET /recycle, GET /recycle/:id
///     ├── PUT /restore-all, DELETE /empty-bin
///     ├── GET|PATCH|DELETE /:id, PATCH /:id/status, PUT /:id/restore
///     ├── POST /:id/invite
///     └── GET /:id/auto-accept?email=                             (public)
/// ```
///
/// # Middleware Stack
///
/// 1. Security headers
/// 2. CORS
/// 3. Tracing (tower-http TraceLayer)
/// 4. Session authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    let session = middleware::from_fn_with_state(state.verifier.clone(), session_auth_middleware);

    let public_auth = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/check-username/:username", get(routes::auth::check_username))
        .route(
            "/request-password-reset",
            post(routes::auth::request_password_reset),
        )
        .route("/reset-password", post(routes::auth::reset_password));

    let account = Router::new()
        .route("/user", get(routes::auth::current_user))
        .route("/update-username", put(routes::auth::update_username))
        .route("/change-password", put(routes::auth::change_password))
        .route_layer(session.clone());

    let tasks = Router::new()
        .route(
            "/",
            post(routes::tasks::create_task).get(routes::tasks::list_tasks),
        )
        .route("/stats", get(routes::tasks::task_stats))
        .route("/important", get(routes::tasks::important_tasks))
        .route("/recycle", get(routes::tasks::recycle_bin))
        .route("/recycle/:id", get(routes::tasks::recycled_task))
        .route("/restore-all", put(routes::tasks::restore_all))
        .route("/empty-bin", delete(routes::tasks::empty_bin))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/status", patch(routes::tasks::update_status))
        .route("/:id/restore", put(routes::tasks::restore_task))
        .route("/:id/invite", post(routes::invites::invite))
        .route_layer(session);

    let join_links = Router::new().route("/:id/auto-accept", get(routes::invites::auto_accept));

    let cors = cors_layer(&state.config.api.cors_origins);
    let production = state.config.api.production;

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", public_auth.merge(account))
        .nest("/tasks", tasks.merge(join_links))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

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
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(LEGACY_TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
