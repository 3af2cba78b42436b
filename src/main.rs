use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod audit;
mod beacon_api;
mod business_hours;
mod config;
mod dispatch;
mod presence;
mod runner;
mod scheduler;

#[cfg(test)]
mod beacon_api_tests;
#[cfg(test)]
mod presence_tests;

use audit::{AuditTrail, FileSink, TracingSink};
use beacon_api::{HttpAuthGateway, TokenManager};
use config::{AppConfig, ConfigError};
use dispatch::{HttpPushGateway, NotificationDispatcher};
use presence::{PgPresenceStore, PresenceError, PresenceStore};
use runner::AbsenceRunner;
use scheduler::NotificationScheduler;

#[derive(Error, Debug)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client setup failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("presence store error: {0}")]
    Presence(#[from] PresenceError),
    #[error("JSON serialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser)]
#[command(
    name = "beaconwatch-core",
    about = "Absence detection and push notification scheduler"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic absence notification scheduler until interrupted
    Run,
    /// Execute a single notification cycle and print its summary
    Once,
    /// Print presence tracking detail rows for one employee
    Detail {
        #[arg(long)]
        employee_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let offset = config.operating_offset()?;
    info!(
        "Configuration loaded: threshold {} minutes, window {}-{}, offset UTC{:+}",
        config.threshold_minutes,
        config.weekday_start_hour,
        config.weekday_end_hour,
        config.utc_offset_hours
    );

    let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;
    info!("Database pool connected");

    let mut audit = AuditTrail::new().with_sink(Box::new(TracingSink));
    if let Some(ref path) = config.audit_log_path {
        audit = audit.with_sink(Box::new(FileSink::new(path)));
        info!("Audit file sink enabled: {}", path);
    }
    let audit = Arc::new(audit);

    let auth_gateway = Arc::new(HttpAuthGateway::new(
        http_client.clone(),
        &config.api_base_url,
        config.auth_username.clone(),
        config.auth_password.clone(),
    ));
    let token_manager = Arc::new(TokenManager::new(auth_gateway, Arc::clone(&audit)));

    let store: Arc<dyn PresenceStore> = Arc::new(PgPresenceStore::new(pool));
    let push_gateway = Arc::new(HttpPushGateway::new(
        http_client.clone(),
        config.push_url.clone(),
    ));
    let dispatcher = NotificationDispatcher::new(push_gateway);

    let runner = Arc::new(AbsenceRunner::new(
        config.weekday_start_hour,
        config.weekday_end_hour,
        offset,
        Arc::clone(&token_manager),
        Arc::clone(&store),
        dispatcher,
        Arc::clone(&audit),
    ));

    match cli.command {
        Command::Run => {
            let scheduler = NotificationScheduler::new(
                runner,
                token_manager,
                config.threshold_minutes,
                Duration::from_secs(config.misfire_grace_secs),
                Arc::clone(&audit),
            );
            scheduler.start().await;
            info!("Scheduler running, press Ctrl+C to stop");

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
            scheduler.stop().await;
        }
        Command::Once => {
            let scheduler = NotificationScheduler::new(
                runner,
                token_manager,
                config.threshold_minutes,
                Duration::from_secs(config.misfire_grace_secs),
                Arc::clone(&audit),
            );
            let summary = scheduler.run_once().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Detail { employee_id } => {
            let rows = store.absent_details(&employee_id).await?;
            if rows.is_empty() {
                info!("No presence tracking rows for employee {}", employee_id);
            }
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
    }

    Ok(())
}
