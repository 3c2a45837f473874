//! Harness tests against an in-memory metastore.
//!
//! The in-memory client mimics the server behaviour the smoke suites rely on:
//! duplicate creates report `AlreadyExists`, schemas come back in column order,
//! and configured databases are rejected the way a policy layer would.

use async_trait::async_trait;
use hms_smoke_core::config::{KerberosConfig, ScenarioConfig};
use hms_smoke_core::descriptor::TableKind;
use hms_smoke_core::harness::{self, AuthorizationOutcome};
use hms_smoke_core::{
    ColumnDescriptor, ConnectionConfig, DatabaseOutcome, Error, ExpectedSchema, MetastoreClient,
    MetastoreError, Result, RunConfig, StorageScenario, Suite, TableDescriptor, TableOutcome,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct State {
    databases: HashSet<String>,
    tables: HashMap<(String, String), TableDescriptor>,
    calls: Vec<String>,
}

#[derive(Default)]
struct InMemoryMetastore {
    state: Arc<Mutex<State>>,
    closed: Arc<AtomicBool>,
    /// Databases the "policy layer" rejects
    denied: HashSet<String>,
    /// Fails every database call with a transport error
    unreachable: bool,
    /// Returned by get_schema instead of the stored columns
    schema_override: Option<ExpectedSchema>,
}

impl InMemoryMetastore {
    fn handles(&self) -> (Arc<Mutex<State>>, Arc<AtomicBool>) {
        (Arc::clone(&self.state), Arc::clone(&self.closed))
    }

    fn denying(database: &str) -> Self {
        Self {
            denied: HashSet::from([database.to_string()]),
            ..Default::default()
        }
    }
}

#[async_trait]
impl MetastoreClient for InMemoryMetastore {
    async fn create_database_if_not_exists(&self, name: &str) -> Result<DatabaseOutcome> {
        let mut state = self.state.lock();
        state.calls.push(format!("create_database {name}"));

        if self.unreachable {
            return Err(MetastoreError::Transport("broken pipe".into()).into());
        }
        if self.denied.contains(name) {
            return Err(MetastoreError::Exception {
                operation: "create_database".into(),
                kind: "MetaException".into(),
                message: format!("Permission denied on database {name}"),
            }
            .into());
        }

        if state.databases.insert(name.to_string()) {
            Ok(DatabaseOutcome::Created)
        } else {
            Ok(DatabaseOutcome::AlreadyExisted)
        }
    }

    async fn create_table(&self, descriptor: &TableDescriptor) -> Result<TableOutcome> {
        let mut state = self.state.lock();
        state.calls.push(format!("create_table {}", descriptor.qualified_name()));

        if !state.databases.contains(&descriptor.database) {
            return Err(MetastoreError::Exception {
                operation: "create_table".into(),
                kind: "NoSuchObjectException".into(),
                message: format!("{} not found", descriptor.database),
            }
            .into());
        }

        let key = (descriptor.database.clone(), descriptor.table.clone());
        if state.tables.contains_key(&key) {
            return Ok(TableOutcome::AlreadyExisted);
        }
        state.tables.insert(key, descriptor.clone());
        Ok(TableOutcome::Created)
    }

    async fn get_schema(&self, db: &str, table: &str) -> Result<ExpectedSchema> {
        let mut state = self.state.lock();
        state.calls.push(format!("get_schema {db}.{table}"));

        if let Some(schema) = &self.schema_override {
            return Ok(schema.clone());
        }

        state
            .tables
            .get(&(db.to_string(), table.to_string()))
            .map(|t| ExpectedSchema::new(t.columns.clone()))
            .ok_or_else(|| {
                MetastoreError::Exception {
                    operation: "get_schema".into(),
                    kind: "UnknownTableException".into(),
                    message: format!("{db}.{table}"),
                }
                .into()
            })
    }

    fn transport(&self) -> &'static str {
        "in-memory"
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn schema_run(database: &str, scenarios: Vec<StorageScenario>) -> RunConfig {
    RunConfig {
        connection: ConnectionConfig::plain("localhost", 9083),
        database: database.to_string(),
        suite: Suite::Schema { scenarios },
        scenarios: ScenarioConfig::default(),
    }
}

fn authz_run(database: &str) -> RunConfig {
    RunConfig {
        connection: ConnectionConfig::plain("localhost", 9083)
            .with_kerberos(KerberosConfig::default()),
        database: database.to_string(),
        suite: Suite::AuthorizationDenied,
        scenarios: ScenarioConfig::default(),
    }
}

#[tokio::test]
async fn test_smoke_suite_passes_for_all_locations() {
    let metastore = InMemoryMetastore::default();
    let (state, closed) = metastore.handles();
    let config = schema_run(
        "test_metastore",
        vec![
            StorageScenario::Local,
            StorageScenario::S3,
            StorageScenario::Hdfs,
        ],
    );

    let report = harness::run_with_client(Box::new(metastore), &config)
        .await
        .unwrap();

    assert_eq!(report.database, Some(DatabaseOutcome::Created));
    assert_eq!(report.scenarios.len(), 3);
    for scenario in &report.scenarios {
        assert_eq!(scenario.table_outcome, TableOutcome::Created);
        assert_eq!(
            state.lock().tables[&("test_metastore".to_string(), scenario.table.clone())].kind,
            TableKind::Managed
        );
        assert_eq!(scenario.schema, ExpectedSchema::one_column());
    }
    assert!(closed.load(Ordering::SeqCst));

    let state = state.lock();
    let locations: Vec<&str> = [
        "one_column_table",
        "s3_one_column_table",
        "hdfs_one_column_table",
    ]
    .iter()
    .map(|t| {
        state.tables[&("test_metastore".to_string(), t.to_string())]
            .location
            .as_str()
    })
    .collect();
    assert_eq!(
        locations,
        vec![
            "/stackable/warehouse/location_test_metastore_one_column_table",
            "s3a://hive/",
            "hdfs://hdfs/access-hive/hive",
        ]
    );
}

#[tokio::test]
async fn test_external_compressed_tables_from_config() {
    let metastore = InMemoryMetastore::default();
    let (state, _) = metastore.handles();
    let mut config = schema_run("test_metastore", vec![StorageScenario::Hdfs]);
    config.scenarios.external_tables = true;
    config.scenarios.compressed = true;

    harness::run_suite(&metastore, &config).await.unwrap();

    let state = state.lock();
    let table = &state.tables[&(
        "test_metastore".to_string(),
        "hdfs_one_column_table".to_string(),
    )];
    assert_eq!(table.kind, TableKind::External);
    assert!(table.compressed);
}

#[tokio::test]
async fn test_second_run_swallows_already_exists() {
    let metastore = InMemoryMetastore::default();
    let config = schema_run("test_metastore", StorageScenario::defaults(false));

    harness::run_suite(&metastore, &config).await.unwrap();
    let report = harness::run_suite(&metastore, &config).await.unwrap();

    assert_eq!(report.database, Some(DatabaseOutcome::AlreadyExisted));
    assert!(report
        .scenarios
        .iter()
        .all(|s| s.table_outcome == TableOutcome::AlreadyExisted));
}

#[tokio::test]
async fn test_schema_mismatch_aborts_remaining_scenarios() {
    let metastore = InMemoryMetastore {
        schema_override: Some(ExpectedSchema::new(vec![ColumnDescriptor::new(
            "id", "int", "col comment",
        )])),
        ..Default::default()
    };
    let (state, closed) = metastore.handles();
    let config = schema_run("test_metastore", StorageScenario::defaults(false));

    let err = harness::run_with_client(Box::new(metastore), &config)
        .await
        .unwrap_err();

    match &err {
        Error::SchemaMismatch { scenario, .. } => assert_eq!(scenario, "local"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("Received local schema"));
    assert!(closed.load(Ordering::SeqCst));

    let state = state.lock();
    assert!(!state
        .calls
        .iter()
        .any(|c| c.contains("s3_one_column_table")));
}

#[tokio::test]
async fn test_database_failure_is_fatal_and_closes() {
    let metastore = InMemoryMetastore {
        unreachable: true,
        ..Default::default()
    };
    let (state, closed) = metastore.handles();
    let config = schema_run("test_metastore", StorageScenario::defaults(true));

    let err = harness::run_with_client(Box::new(metastore), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Metastore(MetastoreError::Transport(_))));
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(state.lock().calls.len(), 1);
}

#[tokio::test]
async fn test_authorization_denied_passes() {
    let metastore = InMemoryMetastore::denying("db_not_allowed");
    let (_, closed) = metastore.handles();

    let report = harness::run_with_client(Box::new(metastore), &authz_run("db_not_allowed"))
        .await
        .unwrap();

    match report.authorization {
        Some(AuthorizationOutcome::Denied(reason)) => {
            assert!(reason.contains("Permission denied on database db_not_allowed"))
        }
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_authorization_allowed_fails() {
    let metastore = InMemoryMetastore::denying("db_not_allowed");
    let (_, closed) = metastore.handles();

    let err = harness::run_with_client(Box::new(metastore), &authz_run("test_metastore"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::AuthorizationNotEnforced { ref database } if database == "test_metastore"
    ));
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_existing_database_counts_as_allowed() {
    let metastore = InMemoryMetastore::default();
    metastore
        .create_database_if_not_exists("db_not_allowed")
        .await
        .unwrap();

    let outcome = harness::run_authorization_denied_scenario(&metastore, "db_not_allowed").await;
    assert_eq!(outcome, AuthorizationOutcome::Allowed);
}

#[tokio::test]
async fn test_transport_error_counts_as_denial() {
    let metastore = InMemoryMetastore {
        unreachable: true,
        ..Default::default()
    };

    let outcome = harness::run_authorization_denied_scenario(&metastore, "db_not_allowed").await;
    assert!(matches!(outcome, AuthorizationOutcome::Denied(_)));
}

#[tokio::test]
#[ignore = "requires Hive Metastore"]
async fn test_live_smoke_suite() {
    let host = std::env::var("HMS_HOST").unwrap_or_else(|_| "localhost".into());
    let mut config = schema_run("test_metastore", StorageScenario::defaults(false));
    config.connection = ConnectionConfig::plain(host, 9083);

    harness::run(&config).await.unwrap();
}
