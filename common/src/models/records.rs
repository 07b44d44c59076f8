//! Attendance and message record models.
//!
//! Both tables live in every tenant schema and share the same read/unread
//! status column.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Status value of a record nobody has looked at yet.
pub const STATUS_UNREAD: &str = "unread";
/// Status value after a record has been marked as read.
pub const STATUS_READ: &str = "read";

/// Listing filters shared by attendance and message endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RecordFilter {
    /// Inclusive lower bound on `date`.
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    /// Inclusive upper bound on `date`.
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    /// Free-text search over the table's searchable columns.
    pub search: Option<String>,
    /// Restrict to one user.
    pub user_id: Option<String>,
}

impl RecordFilter {
    /// Returns the value with surrounding whitespace removed, or `None` when blank.
    pub fn non_blank(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// One row of `attendance_records`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: Option<String>,
    pub date: String,
    pub time_in: Option<String>,
    pub kiosk_terminal_in: Option<String>,
    pub time_out: Option<String>,
    pub kiosk_terminal_out: Option<String>,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// One row of `messages`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MessageRecord {
    pub id: u64,
    pub user_id: Option<String>,
    pub date: String,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Query string for the unread counter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UnreadQuery {
    pub user_id: Option<String>,
}

/// Response body for the unread counter.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread_count: u64,
}

/// Response body for mark-as-read operations.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResult {
    /// Rows whose status actually changed.
    pub updated: u64,
    pub message: String,
}
