use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use sojourn_common::config::{default_config_path, resolve_data_folder, TomlConfig};
use sojourn_common::events::EventBus;
use sojourn_common::time::SystemClock;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sojourn_progress::catalog::Catalog;
use sojourn_progress::celebration::CelebrationNotifier;
use sojourn_progress::identity::Identity;
use sojourn_progress::persistence::{
    HttpRecordBackend, LocalAdapter, PersistenceAdapter, RemoteAdapter, SqliteKeyValueStore,
};
use sojourn_progress::store::{ProgressStore, StoreSettings};
use sojourn_progress::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "sojourn-progress")]
#[command(about = "Progress & achievement engine for Sojourn")]
#[command(version)]
struct Args {
    /// Bootstrap configuration file
    #[arg(short, long, env = "SOJOURN_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides the config file)
    #[arg(short, long, env = "SOJOURN_PORT")]
    port: Option<u16>,

    /// Folder holding the local database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Signed-in user id (overrides the config file)
    #[arg(short, long, env = "SOJOURN_USER_ID")]
    user_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = TomlConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&config)?;

    let port = args.port.unwrap_or(config.port);
    info!("Starting Sojourn progress engine on port {}", port);
    info!("Config file: {}", config_path.display());

    let data_folder = resolve_data_folder(args.data_folder.as_deref(), &config);
    info!("Data folder: {}", data_folder.display());

    let identity = match args.user_id.clone().or_else(|| config.user_id.clone()) {
        Some(user_id) => Identity::signed_in(user_id),
        None => Identity::anonymous(),
    };
    info!(
        "User: {} ({})",
        identity.user_id,
        if identity.signed_in { "signed in" } else { "anonymous" }
    );

    let save_timeout = config.persistence.save_timeout();
    let adapter = build_adapter(&config, &identity, &data_folder, save_timeout).await?;
    info!("Persistence backend: {}", adapter.backend_name());

    let events = EventBus::new(100);
    let settings = StoreSettings {
        catalog: Catalog::default(),
        calendar: config.calendar.calendar()?,
        save_timeout,
        events: Some(events.clone()),
    };
    let store = Arc::new(
        ProgressStore::open(identity, adapter, Arc::new(SystemClock), settings).await,
    );
    let notifier = Arc::new(CelebrationNotifier::spawn(
        store.subscribe(),
        config.celebration.auto_dismiss(),
        Some(events.clone()),
    ));

    let app = build_router(AppState::new(store.clone(), notifier, events));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Flushing pending progress writes");
    store.flush().await;
    let status = store.writer_status();
    if status.last_error.is_some() {
        warn!(
            "Last save of revision {} failed ({} failures this session)",
            status.revision, status.failures
        );
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Remote backend for signed-in users when one is configured, local sqlite
/// otherwise
async fn build_adapter(
    config: &TomlConfig,
    identity: &Identity,
    data_folder: &Path,
    save_timeout: std::time::Duration,
) -> Result<Arc<dyn PersistenceAdapter>> {
    if let (Some(remote), true) = (&config.remote, identity.signed_in) {
        info!("Remote record store: {}", remote.base_url);
        let backend = HttpRecordBackend::new(&remote.base_url, remote.api_token.clone(), save_timeout)
            .context("Failed to build HTTP client")?;
        return Ok(Arc::new(RemoteAdapter::new(backend)));
    }

    let db_path = data_folder.join(&config.database_file);
    info!("Local database: {}", db_path.display());
    let pool = sojourn_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    Ok(Arc::new(LocalAdapter::new(SqliteKeyValueStore::new(pool))))
}

/// `RUST_LOG` wins over `logging.level`; `logging.file` adds a plain-text
/// file sink next to stderr
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        format!("sojourn_progress={level},sojourn_common={level},tower_http=debug").into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
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
