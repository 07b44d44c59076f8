//! 通用数据库浏览服务
//!
//! Reads tables, columns, pages of rows and size statistics from whatever
//! schema a [`ConnectionRef`] is bound to, and runs ad-hoc read statements.

use std::time::Instant;

use sqlx::mysql::MySqlRow;
use sqlx::Row;

use common::errors::{AppError, AppResult};
use common::models::browser::bytes_to_mb;
use common::models::{
    ColumnDescription, DatabaseStats, PageQuery, QueryResult, SchemaSize, TablePage, TableStats,
};
use common::response::Pagination;
use common::utils::SqlValidator;

use crate::registry::ConnectionRef;
use crate::rows;

const DESCRIBE_SQL: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS field, \
     CAST(COLUMN_TYPE AS CHAR) AS column_type, \
     CAST(IS_NULLABLE AS CHAR) AS nullable, \
     CAST(COLUMN_KEY AS CHAR) AS `key`, \
     CAST(COLUMN_DEFAULT AS CHAR) AS `default`, \
     CAST(EXTRA AS CHAR) AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const SCHEMA_SIZE_SQL: &str = "SELECT CAST(COUNT(*) AS UNSIGNED) AS table_count, \
     CAST(COALESCE(SUM(DATA_LENGTH + INDEX_LENGTH), 0) AS UNSIGNED) AS total_bytes, \
     CAST(COALESCE(SUM(DATA_LENGTH), 0) AS UNSIGNED) AS data_bytes, \
     CAST(COALESCE(SUM(INDEX_LENGTH), 0) AS UNSIGNED) AS index_bytes, \
     CAST(COALESCE(SUM(DATA_FREE), 0) AS UNSIGNED) AS free_bytes \
     FROM information_schema.TABLES WHERE TABLE_SCHEMA = ?";

const TABLE_SIZES_SQL: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
     CAST(TABLE_ROWS AS UNSIGNED) AS table_rows, \
     CAST(COALESCE(DATA_LENGTH + INDEX_LENGTH, 0) AS UNSIGNED) AS total_bytes, \
     CAST(COALESCE(DATA_LENGTH, 0) AS UNSIGNED) AS data_bytes, \
     CAST(COALESCE(INDEX_LENGTH, 0) AS UNSIGNED) AS index_bytes, \
     CAST(COALESCE(TABLE_COMMENT, '') AS CHAR) AS table_comment \
     FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? \
     ORDER BY COALESCE(DATA_LENGTH + INDEX_LENGTH, 0) DESC, TABLE_NAME";

#[derive(sqlx::FromRow)]
struct SchemaSizeRow {
    table_count: u64,
    total_bytes: u64,
    data_bytes: u64,
    index_bytes: u64,
    free_bytes: u64,
}

impl From<SchemaSizeRow> for SchemaSize {
    fn from(row: SchemaSizeRow) -> Self {
        Self {
            table_count: row.table_count,
            total_size_mb: bytes_to_mb(row.total_bytes),
            data_size_mb: bytes_to_mb(row.data_bytes),
            index_size_mb: bytes_to_mb(row.index_bytes),
            free_size_mb: bytes_to_mb(row.free_bytes),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TableSizeRow {
    table_name: String,
    table_rows: Option<u64>,
    total_bytes: u64,
    data_bytes: u64,
    index_bytes: u64,
    table_comment: String,
}

impl From<TableSizeRow> for TableStats {
    fn from(row: TableSizeRow) -> Self {
        Self {
            table_name: row.table_name,
            table_rows: row.table_rows,
            size_mb: bytes_to_mb(row.total_bytes),
            data_size_mb: bytes_to_mb(row.data_bytes),
            index_size_mb: bytes_to_mb(row.index_bytes),
            table_comment: row.table_comment,
        }
    }
}

/// Back-quotes an identifier, doubling embedded back-quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Row offset of a 1-based page.
pub fn page_offset(page: u32, per_page: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(per_page)
}

/// Browser bound to one tenant schema.
pub struct TableBrowser {
    conn: ConnectionRef,
}

impl TableBrowser {
    pub fn new(conn: ConnectionRef) -> Self {
        Self { conn }
    }

    pub fn schema(&self) -> &str {
        self.conn.schema()
    }

    /// 列出当前库的所有表
    pub async fn list_tables(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query("SHOW TABLES")
            .fetch_all(self.conn.pool())
            .await?;
        Ok(rows.iter().filter_map(first_text).collect())
    }

    pub async fn table_exists(&self, table: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
        )
        .bind(self.schema())
        .bind(table)
        .fetch_one(self.conn.pool())
        .await?;
        Ok(count > 0)
    }

    async fn ensure_table(&self, table: &str) -> AppResult<()> {
        if self.table_exists(table).await? {
            Ok(())
        } else {
            Err(AppError::TableNotFound {
                database: self.schema().to_string(),
                table: table.to_string(),
            })
        }
    }

    /// 获取表的列定义
    pub async fn describe(&self, table: &str) -> AppResult<Vec<ColumnDescription>> {
        self.ensure_table(table).await?;
        self.columns(table).await
    }

    async fn columns(&self, table: &str) -> AppResult<Vec<ColumnDescription>> {
        let columns = sqlx::query_as::<_, ColumnDescription>(DESCRIBE_SQL)
            .bind(self.schema())
            .bind(table)
            .fetch_all(self.conn.pool())
            .await?;
        Ok(columns)
    }

    /// 分页读取表数据
    pub async fn paginate(&self, table: &str, page: &PageQuery) -> AppResult<TablePage> {
        self.ensure_table(table).await?;
        let columns = self.columns(table).await?;
        let quoted = quote_identifier(table);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {quoted}"))
            .fetch_one(self.conn.pool())
            .await?;

        let rows = sqlx::query(&format!("SELECT * FROM {quoted} LIMIT ? OFFSET ?"))
            .bind(u64::from(page.per_page))
            .bind(page_offset(page.page, page.per_page))
            .fetch_all(self.conn.pool())
            .await?;
        let data: Vec<serde_json::Value> = rows.iter().map(rows::row_to_json).collect();

        let pagination = Pagination::new(
            page.page,
            page.per_page,
            u64::try_from(total).unwrap_or(0),
            data.len(),
        );
        Ok(TablePage {
            database: self.schema().to_string(),
            table: table.to_string(),
            columns,
            data,
            pagination,
        })
    }

    /// 库与表的容量统计
    pub async fn stats(&self) -> AppResult<DatabaseStats> {
        let size: SchemaSizeRow = sqlx::query_as(SCHEMA_SIZE_SQL)
            .bind(self.schema())
            .fetch_one(self.conn.pool())
            .await?;
        let tables: Vec<TableSizeRow> = sqlx::query_as(TABLE_SIZES_SQL)
            .bind(self.schema())
            .fetch_all(self.conn.pool())
            .await?;

        Ok(DatabaseStats {
            database: self.schema().to_string(),
            stats: size.into(),
            tables: tables.into_iter().map(TableStats::from).collect(),
        })
    }

    /// 执行只读 SQL
    pub async fn execute(&self, sql: &str) -> AppResult<QueryResult> {
        SqlValidator::validate(sql)?;

        let start = Instant::now();
        let rows = sqlx::query(sql)
            .fetch_all(self.conn.pool())
            .await?;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            key = %self.conn.key(),
            database = %self.schema(),
            rows = rows.len(),
            elapsed_ms = execution_time_ms,
            "ad-hoc query executed"
        );

        Ok(QueryResult {
            database: self.schema().to_string(),
            query: sql.to_string(),
            columns: rows.first().map(rows::columns).unwrap_or_default(),
            row_count: rows.len(),
            rows: rows.iter().map(rows::row_to_json).collect(),
            execution_time_ms,
        })
    }
}

/// First column of a `SHOW TABLES` row, whatever its declared encoding.
fn first_text(row: &MySqlRow) -> Option<String> {
    row.try_get::<String, _>(0).ok().or_else(|| {
        row.try_get_unchecked::<Vec<u8>, _>(0)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    })
}
