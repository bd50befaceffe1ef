use agronet_backend::config::{AuthBackend, Config, StoreBackend};
use agronet_backend::services::auth::{AuthProvider, FirebaseAuthProvider, StaticAuthProvider};
use agronet_backend::services::crop_service::CropService;
use agronet_backend::services::crop_store::{CropStore, MemoryCropStore};
use agronet_backend::services::pg_crop_store::PgCropStore;
use agronet_backend::{routes, AppState};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agronet_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Invalid configuration");

    let store: Arc<dyn CropStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            tracing::info!("Connecting to database...");
            let db = Database::connect(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running migrations...");
            migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");

            Arc::new(PgCropStore::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory crop store, data is lost on restart");
            Arc::new(MemoryCropStore::new())
        }
    };

    let auth: Arc<dyn AuthProvider> = match &config.auth {
        AuthBackend::Firebase { api_key, cache_ttl } => {
            Arc::new(FirebaseAuthProvider::new(api_key.clone(), *cache_ttl))
        }
        AuthBackend::Static { tokens } => {
            let provider = StaticAuthProvider::parse(tokens).expect("Invalid AUTH_STATIC_TOKENS");
            tracing::warn!(tokens = provider.len(), "Using static token table for authentication");
            Arc::new(provider)
        }
    };

    tracing::info!(policy = ?config.quantity_policy, "Quantity policy");
    let state = AppState {
        crops: CropService::new(store, config.quantity_policy),
        auth,
    };

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on {}", config.listen_addr());

    axum::serve(listener, app).await.expect("Server error");
}
