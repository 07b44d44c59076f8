//! Shared data models.

pub mod browser;
pub mod connection;
pub mod database;
pub mod query;
pub mod records;

// Re-export commonly used types
pub use browser::{
    ColumnDescription, DatabaseStats, PageQuery, SchemaSize, TableList, TablePage, TableStats,
};
pub use connection::{ConnectionItem, ConnectionParams};
pub use database::{DatabaseDescriptor, DatabaseInfo, DatabaseKind, DatabaseList, RefreshResult};
pub use query::{ColumnInfo, QueryRequest, QueryResult};
pub use records::{
    AttendanceRecord, MarkReadResult, MessageRecord, RecordFilter, UnreadCount, UnreadQuery,
};
