//! Table browsing models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::response::Pagination;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

/// Query string for paginated table reads.
#[derive(Debug, Clone, Deserialize, Validate, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,

    /// Rows per page (default 50, max 1000).
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 1000, message = "per_page must be between 1 and 1000"))]
    pub per_page: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

/// Tables of one database.
#[derive(Debug, Serialize, ToSchema)]
pub struct TableList {
    pub database: String,
    pub tables: Vec<String>,
    pub table_count: usize,
}

/// One column as described by the server catalog.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ColumnDescription {
    pub field: String,
    pub column_type: String,
    pub nullable: String,
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

/// A page of rows from one table.
#[derive(Debug, Serialize, ToSchema)]
pub struct TablePage {
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnDescription>,
    /// One JSON object per row.
    pub data: Vec<serde_json::Value>,
    pub pagination: Pagination,
}

/// Size summary for a whole schema, in megabytes.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SchemaSize {
    pub table_count: u64,
    pub total_size_mb: f64,
    pub data_size_mb: f64,
    pub index_size_mb: f64,
    pub free_size_mb: f64,
}

/// Per-table size and row estimate.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TableStats {
    pub table_name: String,
    pub table_rows: Option<u64>,
    pub size_mb: f64,
    pub data_size_mb: f64,
    pub index_size_mb: f64,
    pub table_comment: String,
}

/// Response body for `GET /api/databases/{name}/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseStats {
    pub database: String,
    pub stats: SchemaSize,
    pub tables: Vec<TableStats>,
}

/// Converts a byte count to megabytes rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}
