//! # Stockroom API Server
//!
//! Startup order: configuration, tracing, pool, migrations, seed data,
//! router. Ctrl-C drains in-flight requests before the pool is closed.
//!
//! ```bash
//! cargo run -p stockroom-api
//! ```
//!
//! `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
//! JSON lines.

use stockroom_api::{
    app::{build_router, AppState},
    config::Config,
};
use stockroom_shared::db::{migrations, pool, seed};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stockroom_api=debug,stockroom_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    tracing::info!(
        "Stockroom API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let db = pool::create_pool(config.database.pool_config()).await?;
    migrations::run_migrations(&db).await?;

    let report = seed::seed(&db).await?;
    tracing::info!(
        catalog_rows = report.catalog_rows,
        policy_rules = report.policy_rules,
        "Seed data applied"
    );

    let address = config.bind_address();
    let app = build_router(AppState::new(db.clone(), config));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}
