//! Gatehouse Server: application entry point.

mod error;
mod settings;

use gatehouse_core::RequestContext;
use gatehouse_core::repository::{EntityRepository, Pagination, SearchFilter};
use gatehouse_db::{DbManager, Services, run_migrations};
use surrealdb::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = settings::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Gatehouse server...");

    let manager = DbManager::connect(&config.db).await?;
    run_migrations(manager.client()).await?;

    let services = Services::new(manager, config.db.pepper.clone());
    report_totals(&services).await?;

    info!("Gatehouse server ready; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Gatehouse server stopped.");
    Ok(())
}

/// Count each collection once so that a broken store fails start-up.
async fn report_totals<C: Connection>(services: &Services<C>) -> Result<(), ServerError> {
    let ctx = RequestContext::new().with_request_id("startup");
    let probe = Pagination::new(0, 0);

    let users = services
        .users
        .list(&ctx, probe, SearchFilter::default())
        .await?;
    let groups = services
        .groups
        .list(&ctx, probe, SearchFilter::default())
        .await?;
    let permissions = services
        .permissions
        .list(&ctx, probe, SearchFilter::default())
        .await?;

    info!(
        users = users.total,
        groups = groups.total,
        permissions = permissions.total,
        "Store reachable"
    );
    Ok(())
}
