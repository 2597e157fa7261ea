//! khis-etl - KHIS extraction and aggregation service
//!
//! Pulls FP and MNCH analytics from KHIS (DHIS2) into SQLite, aggregates them
//! to county and national level, and exposes the pipeline over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use khis_common::config::{resolve_config_path, TomlConfig, CONFIG_PATH_ENV};
use khis_common::db::{init_database, SqliteStore};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use khis_etl::services::KhisClient;
use khis_etl::AppState;

/// Command-line arguments for khis-etl
#[derive(Parser, Debug)]
#[command(name = "khis-etl")]
#[command(about = "KHIS analytics extraction and aggregation service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and KHIS_ETL_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and KHIS_ETL_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite URL (overrides config and DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    let path = resolve_config_path(args.config.as_deref());
    let mut config = TomlConfig::load(path.as_deref())?;
    config.apply_env_overrides()?;

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run `f` under a plain subscriber writing to `writer`, for the logging
/// that happens before the configured subscriber exists
fn with_bootstrap_logging<W, T>(writer: W, f: impl FnOnce() -> T) -> T
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let bootstrap = fmt().with_ansi(false).with_writer(writer).finish();
    tracing::subscriber::with_default(bootstrap, f)
}

fn init_logging(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},tower_http=info", config.logging.level).into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = with_bootstrap_logging(std::io::stderr, || load_config(&args))
        .context("Failed to load configuration")?;
    init_logging(&config)?;

    info!("Starting khis-etl {}", env!("CARGO_PKG_VERSION"));
    info!(
        program = %config.pipeline.program,
        chunk_size = config.pipeline.facility_chunk_size,
        "Pipeline defaults"
    );

    let credentials = config
        .khis
        .credentials()
        .context("KHIS credentials are incomplete")?;
    info!("KHIS endpoint: {}", credentials.base_url);
    let client = KhisClient::new(
        credentials,
        Duration::from_secs(config.pipeline.request_timeout_secs),
    )?;

    let pool = init_database(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database: {}", config.database_url);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(client),
        config,
    );
    let app = khis_etl::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_warnings_logged_before_init() {
        let captured = Captured::default();
        let writer = captured.clone();

        let config = with_bootstrap_logging(move || writer.clone(), || {
            TomlConfig::load(Some(Path::new("/nonexistent/khis-etl.toml")))
        })
        .unwrap();
        assert_eq!(config.port, TomlConfig::default().port);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("Config file not found"), "{}", output);
    }
}
