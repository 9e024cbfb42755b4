use clap::Parser;
use dotenv::dotenv;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;
use tracing::{error, info};

use dsr_tracker::db::memory_store::MemoryStore;
use dsr_tracker::db::postgres_store::PostgresStore;
use dsr_tracker::db::store::{OrganizationStore, RecordStore, UserStore};
use dsr_tracker::server::config::AppConfig;
use dsr_tracker::server::logging::init_logging;
use dsr_tracker::services::auth_service::AuthService;
use dsr_tracker::services::dsr_service::{DsrService, DsrSettings};
use dsr_tracker::services::organization_service::OrganizationService;
use dsr_tracker::web::{AppState, create_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

struct Stores {
    records: Arc<dyn RecordStore>,
    organizations: Arc<dyn OrganizationStore>,
    users: Arc<dyn UserStore>,
}

impl Stores {
    fn shared<S>(store: S) -> Self
    where
        S: RecordStore + OrganizationStore + UserStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            records: store.clone(),
            organizations: store.clone(),
            users: store,
        }
    }
}

async fn connect_stores(database_url: Option<&str>) -> Result<Stores, Box<dyn std::error::Error + Send + Sync>> {
    match database_url {
        Some(url) => {
            let mut opt = ConnectOptions::new(url.to_owned());
            opt.max_connections(10).sqlx_logging(false);
            let db = Database::connect(opt).await?;
            info!("Connected to Postgres.");
            Ok(Stores::shared(PostgresStore::new(db)))
        }
        None => {
            info!("DATABASE_URL not set, using the in-memory store.");
            Ok(Stores::shared(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    dotenv().ok();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting DSR server.");

    let stores = match connect_stores(config.database_url.as_deref()).await {
        Ok(stores) => stores,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database.");
            return Err(e);
        }
    };

    let dsr_service = DsrService::new(
        stores.records,
        DsrSettings {
            page_size: config.page_size,
            comment_append_attempts: config.comment_append_attempts,
        },
    );
    let organization_service = OrganizationService::new(stores.organizations);
    let auth_service = AuthService::new(stores.users, config.jwt_secret.clone(), config.session_ttl_hours);

    if let (Some(user_id), Some(password)) = (
        config.bootstrap_admin_user.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) {
        if let Err(e) = auth_service.ensure_bootstrap_admin(user_id, password).await {
            error!(error = %e, "Failed to create the bootstrap admin account.");
            return Err(e.into());
        }
    }

    let app_state = Arc::new(AppState {
        dsr_service,
        organization_service,
        auth_service,
        config: config.clone(),
    });
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for the shutdown signal.");
            }
            info!("Shutdown signal received.");
        })
        .await?;

    Ok(())
}
