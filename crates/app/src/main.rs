#![forbid(unsafe_code)]

mod config;

use api::{ApiState, TokenService, router};
use services::{AppServices, Clock};
use storage::SqliteRepository;
use tracing_subscriber::EnvFilter;

use config::{Command, Config, Invocation};

const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

fn prepare_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    if let Some(parent) = config::sqlite_parent_dir(db_url) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.dev_secret {
        tracing::warn!("MARKET_JWT_SECRET is not set, using the development secret");
    }

    prepare_sqlite_dir(&config.db_url)?;
    let clock = Clock::default();
    let services = AppServices::new_sqlite(&config.db_url, clock).await?;
    let tokens = TokenService::new(&config.jwt_secret, config.token_ttl, clock);
    let app = router(ApiState::new(services, tokens));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        db = %config.db_url,
        "market api listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("market api stopped");
    Ok(())
}

async fn migrate(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_dir(&config.db_url)?;
    let repo = SqliteRepository::connect(&config.db_url).await?;
    repo.migrate().await?;
    tracing::info!(db = %config.db_url, "migrations applied");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let invocation = config::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
        .inspect_err(|_| config::print_usage())?;

    match invocation {
        Invocation::Help => {
            config::print_usage();
            Ok(())
        }
        Invocation::Run(Command::Serve, config) => serve(config).await,
        Invocation::Run(Command::Migrate, config) => migrate(config).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
