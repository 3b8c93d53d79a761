use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{
    AccountApprovals, BlacklistLedger, CredentialIssuer, Inbox, ServiceContext, VisitWorkflow,
    VisitorDirectory,
};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{
    admin, blacklist, health, notifications, requests, resident, security, visitor,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    /// Present when backed by PostgreSQL; used by health checks and pool gauges.
    pub pool: Option<PgPool>,
    pub visitor_rate_limiter: Option<Arc<RateLimiterState>>,
    pub workflow: VisitWorkflow,
    pub credentials: CredentialIssuer,
    pub blacklist: BlacklistLedger,
    pub directory: VisitorDirectory,
    pub inbox: Inbox,
    pub accounts: AccountApprovals,
}

impl AppState {
    pub fn new(config: Config, ctx: ServiceContext, pool: Option<PgPool>) -> Result<Self, JwtError> {
        let jwt = JwtConfig::new(
            &config.jwt.private_key,
            &config.jwt.public_key,
            config.jwt.access_token_expiry_secs,
            config.jwt.leeway_secs,
        )?;
        let visitor_rate_limiter = RateLimiterState::new(&config.rate_limit).map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            pool,
            visitor_rate_limiter,
            workflow: VisitWorkflow::new(ctx.clone()),
            credentials: CredentialIssuer::new(ctx.clone()),
            blacklist: BlacklistLedger::new(ctx.clone()),
            directory: VisitorDirectory::new(ctx.clone()),
            inbox: Inbox::new(ctx.clone()),
            accounts: AccountApprovals::new(ctx),
        })
    }
}

pub fn create_app(
    config: Config,
    ctx: ServiceContext,
    pool: Option<PgPool>,
) -> Result<Router, JwtError> {
    let state = AppState::new(config, ctx, pool)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Anonymous visitor-facing routes, rate limited per client IP
    let visitor_routes = Router::new()
        .route("/api/v1/visitor/requests", post(visitor::create_request))
        .route(
            "/api/v1/visitor/requests/:id/cancel",
            post(visitor::cancel_request),
        )
        .route("/api/v1/visitor/status/:phone", get(visitor::status))
        .route(
            "/api/v1/visitor/blacklist-check",
            get(visitor::blacklist_check),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Authenticated routes; the actor extractor rejects missing tokens
    let resident_routes = Router::new()
        .route("/api/v1/resident/visitors", post(resident::invite_visitor))
        .route(
            "/api/v1/resident/requests/pending",
            get(resident::pending_requests),
        )
        .route("/api/v1/resident/requests", get(resident::request_history));

    let request_routes = Router::new()
        .route("/api/v1/requests/:id", get(requests::get_request))
        .route("/api/v1/requests/:id/approve", post(requests::approve))
        .route("/api/v1/requests/:id/deny", post(requests::deny));

    let security_routes = Router::new()
        .route("/api/v1/security/walk-ins", post(security::record_walk_in))
        .route(
            "/api/v1/security/walk-ins/pending",
            get(security::pending_walk_ins),
        )
        .route("/api/v1/security/visits/today", get(security::todays_visits))
        .route("/api/v1/security/verify", post(security::verify_credential))
        .route(
            "/api/v1/security/requests/:id/arrival",
            post(security::record_arrival),
        )
        .route(
            "/api/v1/security/requests/:id/departure",
            post(security::record_departure),
        )
        .route(
            "/api/v1/security/requests/:id/complete",
            post(security::complete),
        );

    let blacklist_routes = Router::new()
        .route(
            "/api/v1/blacklist",
            get(blacklist::list_entries).post(blacklist::add_entry),
        )
        .route("/api/v1/blacklist/:id/remove", post(blacklist::remove_entry));

    let notification_routes = Router::new()
        .route("/api/v1/notifications", get(notifications::list))
        .route(
            "/api/v1/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/v1/notifications/:id/read",
            post(notifications::mark_read),
        );

    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/accounts/:id/approve",
            post(admin::approve_account),
        )
        .route(
            "/api/v1/admin/accounts/:id/reject",
            post(admin::reject_account),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(visitor_routes)
        .merge(resident_routes)
        .merge(request_routes)
        .merge(security_routes)
        .merge(blacklist_routes)
        .merge(notification_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
