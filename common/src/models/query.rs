//! Ad-hoc SQL query models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/databases/{name}/query`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// Read-only SQL statement to execute. Blank statements are rejected by
    /// `SqlValidator` before any connection is opened.
    #[serde(default)]
    pub query: String,
}

/// Result of an ad-hoc query.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// Logical database the statement ran against.
    pub database: String,

    /// The statement as submitted.
    pub query: String,

    /// Column information, taken from the result set.
    pub columns: Vec<ColumnInfo>,

    /// One JSON object per row, keyed by column name.
    pub rows: Vec<serde_json::Value>,

    /// Number of rows returned.
    pub row_count: usize,

    /// Query execution time in milliseconds.
    pub execution_time_ms: u64,
}

/// Column information in a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the server.
    pub data_type: String,
}
