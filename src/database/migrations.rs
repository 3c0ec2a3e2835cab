//! Database Migrations
//!
//! Embedded refinery migrations from the `migrations/` directory.

use anyhow::{Context, Result};

use crate::database::DatabaseConnection;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Run all pending migrations
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    tracing::info!("🔄 Running database migrations...");

    let mut client = db
        .pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;

    let report = embedded::migrations::runner()
        .run_async(&mut **client)
        .await
        .context("Failed to apply migrations")?;

    for migration in report.applied_migrations() {
        tracing::info!(version = migration.version(), name = migration.name(), "migration applied");
    }
    tracing::info!("✅ Database migrations completed successfully");
    Ok(())
}
