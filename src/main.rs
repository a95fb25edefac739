//! AIS tracker ingestion service

use ais_tracker::api;
use ais_tracker::config::AppConfig;
use ais_tracker::database::Database;
use ais_tracker::errors::AisTrackerError;
use ais_tracker::stream::StreamSupervisor;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AisTrackerError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables and config files
    let config = AppConfig::load()?;

    // A missing credential is the one unrecoverable fault; exit before
    // any connection attempt.
    config.validate()?;

    let AppConfig {
        stream,
        database,
        api: api_config,
    } = config;

    let db = Database::connect(&database.path).await?;
    let supervisor = StreamSupervisor::new(stream)?;

    // Setup signal handling for graceful shutdown
    let shutdown_signal = signal::ctrl_c();

    match api_config {
        Some(api_config) => {
            tokio::select! {
                result = supervisor.run(&db) => {
                    info!("Ingestion loop ended: {:?}", result);
                }
                result = api::serve(db.clone(), api_config.listen) => {
                    info!("Read API ended: {:?}", result);
                }
                _ = shutdown_signal => {
                    info!("Received shutdown signal");
                }
            }
        }
        None => {
            tokio::select! {
                result = supervisor.run(&db) => {
                    info!("Ingestion loop ended: {:?}", result);
                }
                _ = shutdown_signal => {
                    info!("Received shutdown signal");
                }
            }
        }
    }

    Ok(())
}
