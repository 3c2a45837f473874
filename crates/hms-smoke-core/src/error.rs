//! Error types for the hms-smoke harness.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.
//! Conditions the harness expects (a table that already exists, a denied
//! database) never surface here; they are returned as outcome values by the
//! client seam.

use thiserror::Error;

/// Result type alias for hms-smoke operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for hms-smoke.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing command-line input, raised before any network call
    #[error("Usage error: {0}")]
    Usage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metastore-related error
    #[error("Metastore error: {0}")]
    Metastore(#[from] MetastoreError),

    /// The server returned a schema different from the expected one
    #[error("Received {scenario} schema {actual} - expected schema: {expected}")]
    SchemaMismatch {
        scenario: String,
        actual: String,
        expected: String,
    },

    /// A privileged operation succeeded although the policy should deny it
    #[error("Could access database '{database}' although authorization should deny it")]
    AuthorizationNotEnforced { database: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by, or while talking to, the metastore.
#[derive(Error, Debug)]
pub enum MetastoreError {
    /// Object already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Could not reach the metastore
    #[error("Connection failed to {address}: {message}")]
    Connection { address: String, message: String },

    /// The transport failed mid-call
    #[error("Transport error: {0}")]
    Transport(String),

    /// The metastore answered with an exception
    #[error("{kind} during {operation}: {message}")]
    Exception {
        operation: String,
        kind: String,
        message: String,
    },

    /// SASL negotiation failed
    #[error("SASL negotiation failed: {0}")]
    Sasl(String),

    /// Unexpected bytes on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Client used after close
    #[error("Metastore client is closed")]
    Closed,
}

impl MetastoreError {
    /// Whether a Thrift exception name denotes an already-existing object.
    pub fn is_already_exists_kind(kind: &str) -> bool {
        kind.contains("AlreadyExistsException")
    }
}

impl From<thrift::Error> for MetastoreError {
    fn from(err: thrift::Error) -> Self {
        match err {
            thrift::Error::Transport(e) => MetastoreError::Transport(e.to_string()),
            thrift::Error::Protocol(e) => MetastoreError::Protocol(e.to_string()),
            thrift::Error::Application(e) => MetastoreError::Exception {
                operation: "call".into(),
                kind: "TApplicationException".into(),
                message: e.message,
            },
            thrift::Error::User(e) => MetastoreError::Protocol(e.to_string()),
        }
    }
}

impl From<thrift::Error> for Error {
    fn from(err: thrift::Error) -> Self {
        Error::Metastore(err.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Usage("one of --metastore or --namespace is required".into());
        assert_eq!(
            err.to_string(),
            "Usage error: one of --metastore or --namespace is required"
        );

        let err: Error = MetastoreError::Connection {
            address: "localhost:9083".into(),
            message: "connection refused".into(),
        }
        .into();
        assert!(err.to_string().contains("Connection failed to localhost:9083"));
    }

    #[test]
    fn test_schema_mismatch_display() {
        let err = Error::SchemaMismatch {
            scenario: "local".into(),
            actual: "[]".into(),
            expected: "[(id, string, col comment)]".into(),
        };
        assert_eq!(
            err.to_string(),
            "Received local schema [] - expected schema: [(id, string, col comment)]"
        );
    }

    #[test]
    fn test_already_exists_kind() {
        assert!(MetastoreError::is_already_exists_kind("AlreadyExistsException"));
        assert!(!MetastoreError::is_already_exists_kind("MetaException"));
    }

    #[test]
    fn test_application_error_conversion() {
        let err = thrift::Error::Application(thrift::ApplicationError::new(
            thrift::ApplicationErrorKind::UnknownMethod,
            "get_schema",
        ));
        match MetastoreError::from(err) {
            MetastoreError::Exception { kind, message, .. } => {
                assert_eq!(kind, "TApplicationException");
                assert_eq!(message, "get_schema");
            }
            other => panic!("unexpected conversion: {other:?}"),
        }
    }
}
