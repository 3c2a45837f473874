//! Smoke command implementation.

use anyhow::Result;
use hms_smoke_core::{console, harness, RunConfig, Suite};
use tracing::info;

/// Create the test tables and verify their schemas.
pub async fn run(config: RunConfig) -> Result<()> {
    if let Suite::Schema { scenarios } = &config.suite {
        let scenarios: Vec<String> = scenarios.iter().map(|s| s.to_string()).collect();
        info!(
            address = %config.connection.address(),
            database = %config.database,
            kerberos = config.connection.kerberos.is_some(),
            scenarios = ?scenarios,
            "Running metastore smoke test"
        );
    }

    let report = harness::run(&config).await?;

    for scenario in &report.scenarios {
        info!(
            scenario = %scenario.scenario,
            table = %scenario.table,
            outcome = ?scenario.table_outcome,
            columns = scenario.schema.len(),
            "Schema verified"
        );
    }
    info!(elapsed_ms = report.elapsed.as_millis() as u64, "Smoke test finished");

    console::success("Test finished successfully!");
    Ok(())
}
