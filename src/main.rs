use contacts_api::{
    AppState,
    config::{AppConfig, Env, StorageBackend, StoreBackend},
    create_router,
    mailer::{LogMailer, MailerState, MailgunMailer},
    repository::{JsonFileRepository, PostgresRepository, RepositoryState},
    storage::{LocalStorage, S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes Configuration, Logging, the Credential Store, the avatar file
/// store and the mailer, then serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "contacts_api=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: Pretty print output for human readability.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Credential Store
    let repo: RepositoryState = match config.store {
        StoreBackend::Postgres => {
            let db_url = config
                .db_url
                .as_deref()
                .expect("FATAL: DATABASE_URL is required for the postgres store.");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.ensure_schema()
                .await
                .expect("FATAL: Failed to prepare the database schema.");
            Arc::new(repo)
        }
        StoreBackend::Json => Arc::new(
            JsonFileRepository::open(&config.data_file)
                .await
                .expect("FATAL: Failed to open the JSON store. Check DATA_FILE."),
        ),
    };

    // 5. Avatar File Store
    let storage: StorageState = match &config.storage {
        StorageBackend::Local => Arc::new(LocalStorage::new(config.avatars_dir())),
        StorageBackend::S3(s3) => Arc::new(
            S3StorageClient::new(
                &s3.endpoint,
                &s3.region,
                &s3.access_key,
                &s3.secret_key,
                &s3.bucket,
            )
            .await,
        ),
    };
    storage
        .prepare()
        .await
        .expect("FATAL: Failed to prepare the avatar file store.");

    // 6. Email Sender
    let mailer: MailerState = match &config.mail {
        Some(mail) => Arc::new(MailgunMailer::new(mail, &config.mail_from)),
        None => {
            tracing::warn!("Mailgun is not configured, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    // 7. Unified State Assembly & Server Startup
    let port = config.port;
    let app = create_router(AppState::new(repo, storage, mailer, config));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .expect("FATAL: Failed to bind the HTTP port.");

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
