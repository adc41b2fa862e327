//! `fogon-reconcile`: one low-stock reconciliation pass against PostgreSQL.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use fogon_infra::{InfraConfig, LowStockService, PostgresCatalog, PostgresNotificationStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fogon_observability::init();

    let config = InfraConfig::from_env().context("loading configuration")?;
    let database_url = config.require_database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(database_url)
        .await
        .context("connecting to PostgreSQL")?;

    let catalog = Arc::new(PostgresCatalog::new(pool.clone()));
    let store = Arc::new(PostgresNotificationStore::new(pool));

    catalog.ensure_schema().await.context("ensuring catalog schema")?;
    store
        .ensure_schema()
        .await
        .context("ensuring notification schema")?;

    let service = LowStockService::new(catalog, store, config.reconcile_retry.clone());
    let outcome = service
        .reconcile_and_apply()
        .await
        .context("low-stock reconciliation failed")?;

    tracing::info!(
        created = outcome.created,
        deleted = outcome.deleted,
        attempts = outcome.attempts,
        "reconcile pass finished"
    );

    Ok(())
}
