use event_portal::{
    AppState,
    auth::{AuthState, SupabaseAuthClient},
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects the three backend clients (database, auth,
/// storage) and serves the page router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: pretty locally, JSON in production
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "event_portal=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Backend database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Auth backend
    let auth = Arc::new(SupabaseAuthClient::new(
        &config.supabase_url,
        &config.supabase_anon_key,
    )) as AuthState;

    // 5. Object storage
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
        &config.storage_public_url,
    )
    .await;

    // MinIO starts empty; production buckets are provisioned with the backend project.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    // 6. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        auth,
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server stopped unexpectedly.");
}
