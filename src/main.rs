use linkboard::{
    AppState, RevalidationHub,
    config::{AppConfig, Env},
    create_router,
    mailer::{LogMailer, MailerState, SmtpMailer},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Asynchronous entry point: initializes configuration, logging, database,
/// mailer, and the HTTP server.
#[tokio::main]
async fn main() {
    // Configuration and environment loading (fail-fast on missing
    // production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // Log filter: RUST_LOG wins, with sensible defaults for development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "linkboard=debug,tower_http=info,axum=trace".into());

    // Structured logging format is selected by environment: pretty output
    // for humans locally, JSON for log aggregators in production.
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

    // Database initialization and embedded migrations.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // Mailer selection: a real SMTP transport when configured, otherwise
    // verification links are logged.
    let mailer: MailerState = if config.smtp_host.is_some() {
        Arc::new(SmtpMailer::new(&config))
    } else {
        tracing::warn!("SMTP_HOST not set; outbound email is disabled");
        Arc::new(LogMailer)
    };

    let app_state = AppState {
        repo,
        mailer,
        revalidation: Arc::new(RevalidationHub::new()),
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("FATAL: Failed to bind 0.0.0.0:3000");

    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API documentation (Swagger UI) available at: http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}
