//! Table and schema descriptors sent to and read back from the metastore.
//!
//! Descriptors are plain values: built fresh for every scenario, never
//! mutated afterwards, and translated into the wire types of whichever
//! transport carries them.

use std::fmt;

/// Parquet SerDe used by every smoke table.
pub const PARQUET_SERDE: &str = "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe";
/// Parquet input format.
pub const PARQUET_INPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat";
/// Parquet output format.
pub const PARQUET_OUTPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat";

/// Hive table type for managed tables.
pub const MANAGED_TABLE: &str = "MANAGED_TABLE";
/// Hive table type for external tables.
pub const EXTERNAL_TABLE: &str = "EXTERNAL_TABLE";

/// A single column definition. Position in the enclosing list is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Hive type tag, e.g. `string`
    pub r#type: String,
    pub comment: String,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        r#type: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            r#type: r#type.into(),
            comment: comment.into(),
        }
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldSchema(name='{}', type='{}', comment='{}')",
            self.name, self.r#type, self.comment
        )
    }
}

/// Whether the metastore owns the table data or only references it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableKind {
    #[default]
    Managed,
    External,
}

impl TableKind {
    pub fn as_hive_type(&self) -> &'static str {
        match self {
            TableKind::Managed => MANAGED_TABLE,
            TableKind::External => EXTERNAL_TABLE,
        }
    }
}

/// Everything needed to create one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub database: String,
    pub table: String,
    /// Storage location URI (local path, `s3a://`, `hdfs://`)
    pub location: String,
    pub columns: Vec<ColumnDescriptor>,
    pub serialization_lib: String,
    pub input_format: String,
    pub output_format: String,
    pub compressed: bool,
    pub kind: TableKind,
}

impl TableDescriptor {
    /// Same descriptor with the compression flag set.
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Same descriptor registered as an external table.
    pub fn external(mut self) -> Self {
        self.kind = TableKind::External;
        self
    }

    /// `db.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    /// The schema the server is expected to return for this table.
    pub fn expected_schema(&self) -> ExpectedSchema {
        ExpectedSchema::new(self.columns.clone())
    }
}

/// Build the single-column Parquet table used by every storage scenario.
pub fn build_table_descriptor(db: &str, table: &str, location: &str) -> TableDescriptor {
    TableDescriptor {
        database: db.to_string(),
        table: table.to_string(),
        location: location.to_string(),
        columns: vec![one_column()],
        serialization_lib: PARQUET_SERDE.to_string(),
        input_format: PARQUET_INPUT_FORMAT.to_string(),
        output_format: PARQUET_OUTPUT_FORMAT.to_string(),
        compressed: false,
        kind: TableKind::Managed,
    }
}

/// The `("id", "string", "col comment")` column.
pub fn one_column() -> ColumnDescriptor {
    ColumnDescriptor::new("id", "string", "col comment")
}

/// Ordered list of fields, compared exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedSchema {
    pub fields: Vec<ColumnDescriptor>,
}

impl ExpectedSchema {
    pub fn new(fields: Vec<ColumnDescriptor>) -> Self {
        Self { fields }
    }

    /// Schema of a table built with [`build_table_descriptor`].
    pub fn one_column() -> Self {
        Self::new(vec![one_column()])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<ColumnDescriptor>> for ExpectedSchema {
    fn from(fields: Vec<ColumnDescriptor>) -> Self {
        Self::new(fields)
    }
}

impl fmt::Display for ExpectedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "]")
    }
}
