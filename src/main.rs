//! CourseHub - course management backend

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursehub::{
    api::{self, AppState},
    config::Config,
    db,
    services::{create_mailer, EmailOutbox, EmailTemplates},
    storage::create_storage,
};

/// Interval for pruning rate limiter entries and expired sessions
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursehub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CourseHub...");

    // Load configuration
    let config_path =
        std::env::var("COURSEHUB_CONFIG").unwrap_or_else(|_| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;
    tracing::info!("Configuration loaded from {}", config_path);

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Material storage
    let storage = create_storage(&config.storage)?;

    // Outbound email worker
    let mailer = create_mailer(&config.mail)?;
    let (outbox, _email_worker) =
        EmailOutbox::start(mailer, EmailTemplates::new()?, config.mail.queue_capacity);
    tracing::info!("Email worker started ({:?})", config.mail.driver);

    // Build application state
    let state = AppState::build(pool, &config, storage, outbox);

    // Periodic cleanup of login attempts and expired sessions
    {
        let limiter = state.rate_limiter.clone();
        let user_service = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                match user_service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Removed {} expired sessions", n),
                    Err(e) => tracing::warn!("Session cleanup failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
