//! Authorization command implementation.

use anyhow::Result;
use hms_smoke_core::{console, harness, RunConfig};
use tracing::info;

/// Check that the authorization layer denies access to the configured database.
pub async fn run(config: RunConfig) -> Result<()> {
    info!(
        address = %config.connection.address(),
        database = %config.database,
        "Running metastore authorization test"
    );

    console::info(harness::authorization_attempt_message(&config.database));
    harness::run(&config).await?;

    console::success(format!(
        "Test hive-metastore-opa-authorizer succeeded. Could not access database '{}'!",
        config.database
    ));
    Ok(())
}
