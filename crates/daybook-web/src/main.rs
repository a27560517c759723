mod error;
mod routes;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use daybook_core::auth::Identity;
use daybook_core::config::DaybookConfig;
use daybook_core::llm::LlmService;
use daybook_core::objects::{ObjectStore, LOCAL_UPLOAD_PREFIX};
use daybook_core::stats::CategoryPalette;
use daybook_core::storage::{self, Storage};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub storage: Storage,
    pub identity: Identity,
    pub objects: ObjectStore,
    pub config: DaybookConfig,
    pub palette: CategoryPalette,
    pub llm: Option<LlmService>,
}

#[derive(Parser)]
#[command(name = "daybook-web", version, about = "Daybook web dashboard")]
struct Cli {
    /// Address to bind (overrides web.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides web.port)
    #[arg(long, short)]
    port: Option<u16>,
    /// Project directory holding `.daybook/config.toml`
    #[arg(long)]
    project_dir: Option<PathBuf>,
    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("daybook_web=info,daybook_core=info"));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let project_dir = cli.project_dir.or_else(|| std::env::current_dir().ok());
    let mut config = DaybookConfig::load(project_dir.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        DaybookConfig::default_config()
    });
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let storage = storage::create_backend(&config)?;
    let identity = Identity::from_config(&config)?;
    let objects = ObjectStore::from_config(&config)?;
    let palette = CategoryPalette::from_config(&config.stats.categories);

    let llm = if config.llm.enabled {
        match LlmService::from_config(&config.llm) {
            Ok(service) => Some(service),
            Err(e) => {
                tracing::warn!("weekly reports disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let upload_dir = objects.local_dir().map(|p| p.to_path_buf());

    let state = Arc::new(AppState {
        storage,
        identity,
        objects,
        config: config.clone(),
        palette,
        llm,
    });

    let mut app = routes::router().with_state(state);
    if let Some(dir) = upload_dir {
        std::fs::create_dir_all(&dir)?;
        app = app.nest_service(LOCAL_UPLOAD_PREFIX, ServeDir::new(dir));
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("daybook-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
