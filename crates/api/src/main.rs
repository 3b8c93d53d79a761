use anyhow::{Context, Result};
use domain::services::ServiceContext;
use persistence::PgVisitStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use visitor_gate_api::{app, config::Config, middleware, services::EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting Visitor Gate API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;
    persistence::db::run_migrations(&pool).await?;

    let policy = config
        .gate
        .policy()
        .context("gate.utc_offset_minutes is out of range")?;
    let mailer = EmailService::new(config.email.clone());
    if !mailer.is_enabled() {
        info!("Email delivery disabled; notices are in-app only");
    }
    let ctx = ServiceContext::new(Arc::new(PgVisitStore::new(pool.clone())), Arc::new(mailer))
        .with_policy(policy);

    let addr = config.socket_addr()?;
    let app = app::create_app(config, ctx, Some(pool))?;

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
