use crate::config::Config;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use utils::cli::Args;
use utils::state::AppState;

mod api;
mod config;
mod content;
mod domain;
mod error;
mod meta;
mod utils;
mod vfs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webfs=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = validate_config(&args).await;

    let pool = SqlitePoolOptions::new()
        .max_connections(12)
        .connect(config.db_url.as_str())
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let content = content::localfs::LocalFsBackend::open(&config.content_root, config.volume_count)
        .await?;
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, Arc::new(pool), Arc::new(content)));

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down");
}

async fn validate_config(args: &Args) -> Config {
    let mut validation_errors = Vec::new();

    if args.volumes == 0 {
        validation_errors.push("WEBFS_VOLUMES must be at least 1".to_string());
    }

    let content_root = Path::new(&args.content_root);
    if let Ok(meta) = tokio::fs::metadata(content_root).await {
        if !meta.is_dir() {
            validation_errors.push(format!(
                "WEBFS_CONTENT_ROOT `{}` exists but is not a directory",
                args.content_root,
            ));
        }
    } else if let Err(e) = tokio::fs::create_dir_all(content_root).await {
        validation_errors.push(format!(
            "WEBFS_CONTENT_ROOT `{}` cannot be created: {e}",
            args.content_root,
        ));
    }

    if let Some(db_path) = args.database_url.strip_prefix("sqlite:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                validation_errors.push(format!(
                    "the directory for the database `{}` does not exist",
                    parent.display(),
                ));
            }
        }
    }

    if !validation_errors.is_empty() {
        eprintln!("{}", validation_errors.join("\n"));
        std::process::exit(1);
    }

    Config {
        host: args.host.clone(),
        port: args.port,
        db_url: args.database_url.clone(),
        content_root: args.content_root.clone(),
        volume_count: args.volumes,
    }
}
