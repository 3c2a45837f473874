//! Smoke-test harness.
//!
//! Each storage scenario walks
//! `ENSURE_DATABASE -> CREATE_TABLE -> FETCH_SCHEMA -> COMPARE`. The first
//! unexpected error or mismatch aborts the run; nothing is retried. The client
//! is acquired once per run and closed on every exit path.

use crate::client::{self, DatabaseOutcome, MetastoreClient, TableOutcome};
use crate::config::{RunConfig, ScenarioConfig, StorageScenario, Suite};
use crate::console;
use crate::descriptor::{build_table_descriptor, ExpectedSchema, TableDescriptor};
use crate::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of the negative authorization scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The operation failed; carries the error text
    Denied(String),
    /// The operation went through
    Allowed,
}

/// What one storage scenario observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: StorageScenario,
    pub table: String,
    pub table_outcome: TableOutcome,
    pub schema: ExpectedSchema,
}

/// What a whole run observed.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub database: Option<DatabaseOutcome>,
    pub scenarios: Vec<ScenarioReport>,
    pub authorization: Option<AuthorizationOutcome>,
    pub elapsed: Duration,
}

/// Create the database, tolerating one that already exists.
pub async fn ensure_database(conn: &dyn MetastoreClient, name: &str) -> Result<DatabaseOutcome> {
    let outcome = conn.create_database_if_not_exists(name).await?;
    debug!(database = %name, outcome = ?outcome, "Database ensured");
    Ok(outcome)
}

/// Create a table; an existing table is reported and not treated as failure.
pub async fn create_table(
    conn: &dyn MetastoreClient,
    descriptor: &TableDescriptor,
) -> Result<TableOutcome> {
    let outcome = conn.create_table(descriptor).await?;
    match outcome {
        TableOutcome::Created => {
            info!(
                table = %descriptor.qualified_name(),
                location = %descriptor.location,
                "Created table"
            );
        }
        TableOutcome::AlreadyExisted => {
            console::info(format!("Table {} already existed", descriptor.table));
        }
    }
    Ok(outcome)
}

/// Fetch the stored schema of `db.table`.
pub async fn fetch_schema(
    conn: &dyn MetastoreClient,
    db: &str,
    table: &str,
) -> Result<ExpectedSchema> {
    conn.get_schema(db, table).await
}

/// Ordered structural equality; `label` names the scenario in the diagnostic.
pub fn assert_schema_equals(
    label: &str,
    actual: &ExpectedSchema,
    expected: &ExpectedSchema,
) -> Result<()> {
    if actual == expected {
        return Ok(());
    }

    Err(Error::SchemaMismatch {
        scenario: label.to_string(),
        actual: actual.to_string(),
        expected: expected.to_string(),
    })
}

/// Run one storage scenario against an existing database.
pub async fn run_storage_scenario(
    conn: &dyn MetastoreClient,
    database: &str,
    scenario: StorageScenario,
    scenarios: &ScenarioConfig,
) -> Result<ScenarioReport> {
    let location = scenario.location(scenarios, database);
    let mut descriptor = build_table_descriptor(database, scenario.table_name(), &location)
        .compressed(scenarios.compressed);
    if scenarios.external_tables {
        descriptor = descriptor.external();
    }

    debug!(scenario = %scenario, table = %descriptor.qualified_name(), "Running scenario");

    let table_outcome = create_table(conn, &descriptor).await?;
    let schema = fetch_schema(conn, database, &descriptor.table).await?;
    assert_schema_equals(scenario.label(), &schema, &descriptor.expected_schema())?;

    Ok(ScenarioReport {
        scenario,
        table: descriptor.table,
        table_outcome,
        schema,
    })
}

/// Line announcing the authorization attempt, printed before connecting.
pub fn authorization_attempt_message(db: &str) -> String {
    format!(
        "Trying to access '{db}' which is expected to fail due to 'database_allow' authorization policy...!"
    )
}

/// Try to create a database the policy layer must reject.
///
/// Any error counts as a denial. Only a successful call is a failure, which
/// the caller decides how to report.
pub async fn run_authorization_denied_scenario(
    conn: &dyn MetastoreClient,
    db: &str,
) -> AuthorizationOutcome {
    match conn.create_database_if_not_exists(db).await {
        Ok(outcome) => {
            warn!(database = %db, outcome = ?outcome, "Database call was not denied");
            AuthorizationOutcome::Allowed
        }
        Err(e) => {
            if !matches!(e, Error::Metastore(crate::MetastoreError::Exception { .. })) {
                warn!(error = %e, "Denial was not reported by the metastore itself");
            }
            console::denied(e.to_string());
            AuthorizationOutcome::Denied(e.to_string())
        }
    }
}

/// Run the configured suite over an open connection.
pub async fn run_suite(conn: &dyn MetastoreClient, config: &RunConfig) -> Result<SuiteReport> {
    let start = Instant::now();
    let mut report = SuiteReport {
        database: None,
        scenarios: Vec::new(),
        authorization: None,
        elapsed: Duration::ZERO,
    };

    match &config.suite {
        Suite::Schema { scenarios } => {
            report.database = Some(ensure_database(conn, &config.database).await?);
            for scenario in scenarios {
                let scenario_report =
                    run_storage_scenario(conn, &config.database, *scenario, &config.scenarios)
                        .await?;
                info!(
                    scenario = %scenario,
                    outcome = ?scenario_report.table_outcome,
                    "Scenario passed"
                );
                report.scenarios.push(scenario_report);
            }
        }
        Suite::AuthorizationDenied => {
            let outcome = run_authorization_denied_scenario(conn, &config.database).await;
            if outcome == AuthorizationOutcome::Allowed {
                return Err(Error::AuthorizationNotEnforced {
                    database: config.database.clone(),
                });
            }
            report.authorization = Some(outcome);
        }
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

/// Run the suite on `conn`, closing it afterwards whatever the result.
pub async fn run_with_client(
    conn: Box<dyn MetastoreClient>,
    config: &RunConfig,
) -> Result<SuiteReport> {
    let result = run_suite(conn.as_ref(), config).await;

    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close metastore connection");
    }

    result
}

/// Connect as configured and run the suite.
pub async fn run(config: &RunConfig) -> Result<SuiteReport> {
    let conn = client::connect(&config.connection).await?;
    run_with_client(conn, config).await
}
