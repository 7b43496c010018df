//! Jobtrail API server binary.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use jobtrail_core::mailer::TracingMailer;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "jobtrail_server", about = "Jobtrail API server")]
struct Args {
    /// Address to bind the HTTP listener.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3400")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/jobtrail"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobtrail_api=debug,jobtrail_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!(database_url = %args.database_url, bind_addr = %args.bind_addr, "starting jobtrail_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    info!("running database migrations");
    jobtrail_api::migrate(&pool).await?;

    let mut config = jobtrail_api::config::ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    config.database_url = args.database_url;

    let oauth_state = Arc::new(jobtrail_api::services::oauth::OAuthStateStore::new());
    let _cleanup = oauth_state.spawn_cleanup_task();

    // Expired refresh rows are dead weight for the per-user candidate scan;
    // sweep them hourly.
    let sweep_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match jobtrail_core::auth::refresh_ledger::delete_expired(&sweep_pool).await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "removed expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "expired-token sweep failed"),
            }
        }
    });

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let state = jobtrail_api::AppState {
        pool,
        config: config.clone(),
        http,
        oauth_state,
        mailer: Arc::new(TracingMailer),
    };

    let app = jobtrail_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
