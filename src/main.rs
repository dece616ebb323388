use dotenvy::dotenv;
use school_transfer::{
    config::{database, transfer::load_default_config},
    entities::{Transfer, TransferStatus, TransferColumn},
    errors::{Error, Result},
    service::TransferService,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal: env vars can be set externally
    dotenv().ok();

    // 3. Load protocol settings
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load transfer settings: {}", e))?;
    info!(
        tac_prefix = %config.tac_prefix,
        tac_ttl_days = config.tac_ttl_days,
        "Loaded transfer settings"
    );

    // 4. Connect and make sure the schema exists
    let url = database::get_database_url();
    if let Some(path) = url.strip_prefix("sqlite://").and_then(|rest| rest.split('?').next()) {
        if let Some(dir) = std::path::Path::new(path)
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir).map_err(|e| Error::Config {
                message: format!("Cannot create database directory {}: {e}", dir.display()),
            })?;
        }
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Report what is in flight
    let service = TransferService::new(db, config);
    let live = Transfer::find()
        .filter(TransferColumn::Status.is_in([TransferStatus::Pending, TransferStatus::Approved]))
        .count(service.connection())
        .await?;
    info!(live_transfers = live, "Transfer service ready");

    Ok(())
}
