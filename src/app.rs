use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::DefaultPolicyEvaluator;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_auth_event_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::middleware::{session_gate, GateRoutes, SessionGate};
use crate::routes::{auth, health, pages, users};
use crate::services::TokenIssuer;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub store: Arc<SqliteStore>,
    pub issuer: Arc<TokenIssuer>,
    pub gate: Arc<SessionGate>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config, event_bus: EventBus) -> Self {
        let jwt = Arc::new(config.jwt.clone());
        let permissions = Arc::new(config.permission_table.clone());
        let store = Arc::new(SqliteStore::new(pool.clone()));

        let issuer = TokenIssuer::new(
            store.clone(),
            store.clone(),
            jwt.clone(),
            config.refresh_ttl_seconds(),
            event_bus.clone(),
        );

        let evaluator = DefaultPolicyEvaluator::new(permissions);
        let gate = SessionGate::new(Arc::new(evaluator), GateRoutes::default());

        Self {
            pool,
            config: Arc::new(config),
            jwt,
            store,
            issuer: Arc::new(issuer),
            gate: Arc::new(gate),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = Config::from_env()?;
    create_app_with_config(pool, config).await
}

pub async fn create_app_with_config(pool: SqlitePool, config: Config) -> Result<Router, AppError> {
    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_auth_event_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/:id/role", put(users::update_role))
        .route("/:id", delete(users::delete_user));

    // Everything here passes through the session gate.
    let page_routes = Router::new()
        .route("/auth/login", get(pages::login_page))
        .route("/acesso-negado", get(pages::access_denied))
        .route("/dashboard", get(pages::section))
        .route("/dashboard/*rest", get(pages::section))
        .route("/admin", get(pages::section))
        .route("/admin/*rest", get(pages::section))
        .route("/backoffice", get(pages::section))
        .route("/backoffice/*rest", get(pages::section))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_gate));

    let router = Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .route("/api/health", get(health::health))
        .merge(page_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
