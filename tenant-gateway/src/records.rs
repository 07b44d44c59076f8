//! 考勤与消息记录服务
//!
//! Both tables come from the tenant migration and share the `status` column
//! (`unread` / `read`). Comparisons on `status` follow the schema collation,
//! so the migration default `Unread` counts as unread.

use async_trait::async_trait;
use sqlx::{MySql, QueryBuilder};

use common::errors::{AppError, AppResult};
use common::models::records::{STATUS_READ, STATUS_UNREAD};
use common::models::{AttendanceRecord, MessageRecord, RecordFilter};

use crate::registry::ConnectionRef;

/// The fixed-schema tables addressable through the record endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    Attendance,
    Messages,
}

impl RecordTable {
    pub fn table_name(self) -> &'static str {
        match self {
            RecordTable::Attendance => "attendance_records",
            RecordTable::Messages => "messages",
        }
    }

    fn select_columns(self) -> &'static str {
        match self {
            RecordTable::Attendance => {
                "id, user_id, date, time_in, kiosk_terminal_in, time_out, \
                 kiosk_terminal_out, status, created_at, updated_at"
            }
            RecordTable::Messages => {
                "id, user_id, date, subject, message, status, created_at, updated_at"
            }
        }
    }

    fn search_columns(self) -> [&'static str; 3] {
        match self {
            RecordTable::Attendance => ["user_id", "kiosk_terminal_in", "kiosk_terminal_out"],
            RecordTable::Messages => ["user_id", "subject", "message"],
        }
    }
}

impl std::fmt::Display for RecordTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Builds the filtered listing query for `table`.
pub fn list_query(table: RecordTable, filter: &RecordFilter) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM `{}` WHERE 1 = 1",
        table.select_columns(),
        table.table_name()
    ));

    if let Some(user_id) = RecordFilter::non_blank(&filter.user_id) {
        builder.push(" AND user_id = ").push_bind(user_id.to_string());
    }
    if let Some(start) = RecordFilter::non_blank(&filter.start_date) {
        builder.push(" AND date >= ").push_bind(start.to_string());
    }
    if let Some(end) = RecordFilter::non_blank(&filter.end_date) {
        builder.push(" AND date <= ").push_bind(end.to_string());
    }
    if let Some(search) = RecordFilter::non_blank(&filter.search) {
        let pattern = format!("%{search}%");
        builder.push(" AND (");
        for (i, column) in table.search_columns().into_iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(column).push(" LIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }

    builder.push(" ORDER BY date DESC, created_at DESC");
    builder
}

/// Storage operations behind [`RecordService`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Schema the store reads and writes.
    fn schema(&self) -> &str;

    async fn attendance(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, sqlx::Error>;

    async fn messages(&self, filter: &RecordFilter) -> Result<Vec<MessageRecord>, sqlx::Error>;

    async fn count_unread_messages(&self, user_id: &str) -> Result<u64, sqlx::Error>;

    /// Flips one unread record to read. Returns rows changed.
    async fn set_read(&self, table: RecordTable, id: u64) -> Result<u64, sqlx::Error>;

    /// Flips every unread record to read. Returns rows changed.
    async fn set_all_read(&self, table: RecordTable) -> Result<u64, sqlx::Error>;

    async fn contains(&self, table: RecordTable, id: u64) -> Result<bool, sqlx::Error>;
}

/// Record storage on a tenant connection.
pub struct MySqlRecordStore {
    conn: ConnectionRef,
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    fn schema(&self) -> &str {
        self.conn.schema()
    }

    async fn attendance(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
        list_query(RecordTable::Attendance, filter)
            .build_query_as::<AttendanceRecord>()
            .fetch_all(self.conn.pool())
            .await
    }

    async fn messages(&self, filter: &RecordFilter) -> Result<Vec<MessageRecord>, sqlx::Error> {
        list_query(RecordTable::Messages, filter)
            .build_query_as::<MessageRecord>()
            .fetch_all(self.conn.pool())
            .await
    }

    async fn count_unread_messages(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM `messages` WHERE status = ? AND user_id = ?",
        )
        .bind(STATUS_UNREAD)
        .bind(user_id)
        .fetch_one(self.conn.pool())
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn set_read(&self, table: RecordTable, id: u64) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE `{}` SET status = ?, updated_at = NOW() WHERE id = ? AND status = ?",
            table.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(STATUS_READ)
            .bind(id)
            .bind(STATUS_UNREAD)
            .execute(self.conn.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn set_all_read(&self, table: RecordTable) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "UPDATE `{}` SET status = ?, updated_at = NOW() WHERE status = ?",
            table.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(STATUS_READ)
            .bind(STATUS_UNREAD)
            .execute(self.conn.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn contains(&self, table: RecordTable, id: u64) -> Result<bool, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM `{}` WHERE id = ?", table.table_name());
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(self.conn.pool())
            .await?;
        Ok(count > 0)
    }
}

/// Record operations on one tenant schema.
pub struct RecordService {
    store: Box<dyn RecordStore>,
}

impl RecordService {
    pub fn new(conn: ConnectionRef) -> Self {
        Self::with_store(MySqlRecordStore { conn })
    }

    pub fn with_store(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub async fn attendance(&self, filter: &RecordFilter) -> AppResult<Vec<AttendanceRecord>> {
        Ok(self.store.attendance(filter).await?)
    }

    pub async fn messages(&self, filter: &RecordFilter) -> AppResult<Vec<MessageRecord>> {
        Ok(self.store.messages(filter).await?)
    }

    /// 统计用户未读消息数，未提供用户时为 0
    pub async fn unread_count(&self, user_id: Option<&str>) -> AppResult<u64> {
        let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(0);
        };
        Ok(self.store.count_unread_messages(user_id).await?)
    }

    /// Marks one record read. Returns the number of rows changed (0 or 1).
    pub async fn mark_read(&self, table: RecordTable, id: u64) -> AppResult<u64> {
        let updated = self.store.set_read(table, id).await?;

        if updated == 0 && !self.store.contains(table, id).await? {
            return Err(AppError::RecordNotFound {
                table: table.table_name().to_string(),
                id,
            });
        }

        tracing::info!(database = %self.store.schema(), table = %table, id, updated, "record marked read");
        Ok(updated)
    }

    /// Marks every unread record read. Returns the number of rows changed.
    pub async fn mark_all_read(&self, table: RecordTable) -> AppResult<u64> {
        let updated = self.store.set_all_read(table).await?;
        tracing::info!(database = %self.store.schema(), table = %table, updated, "records marked read");
        Ok(updated)
    }
}
