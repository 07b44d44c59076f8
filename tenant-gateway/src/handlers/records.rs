//! 考勤与消息端点
//!
//! `/api/attendance` and `/api/messages` are bound to the module connection;
//! the `/api/databases/{name}/...` variants address any tenant schema.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use common::errors::{AppError, AppResult};
use common::models::{
    AttendanceRecord, MarkReadResult, MessageRecord, RecordFilter, UnreadCount, UnreadQuery,
};
use common::response::ApiResponse;

use crate::records::{RecordService, RecordTable};
use crate::state::AppState;

async fn module_records(state: &AppState) -> AppResult<RecordService> {
    let key = &state.config.database.module_connection;
    Ok(RecordService::new(state.registry.resolve_declared(key).await?))
}

async fn tenant_records(state: &AppState, name: &str) -> AppResult<RecordService> {
    Ok(RecordService::new(state.registry.resolve(name).await?))
}

fn marked(table: RecordTable, updated: u64) -> Json<ApiResponse<MarkReadResult>> {
    let message = if updated == 0 {
        format!("No unread {table} to update")
    } else {
        format!("{updated} {table} marked as read")
    };
    Json(ApiResponse::ok_with_service(MarkReadResult { updated, message }))
}

/// 考勤记录列表
#[utoipa::path(
    get,
    path = "/api/attendance",
    tag = "attendance",
    params(RecordFilter),
    responses(
        (status = 200, description = "考勤记录，按日期倒序", body = ApiResponse<Vec<AttendanceRecord>>)
    )
)]
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<ApiResponse<Vec<AttendanceRecord>>>, AppError> {
    let data = module_records(&state).await?.attendance(&filter).await?;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 标记单条考勤记录为已读
#[utoipa::path(
    patch,
    path = "/api/attendance/{id}/read",
    tag = "attendance",
    params(("id" = u64, Path, description = "记录 ID")),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "记录未找到")
    )
)]
pub async fn mark_attendance_read(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Attendance;
    let updated = module_records(&state).await?.mark_read(table, id).await?;
    Ok(marked(table, updated))
}

/// 全部考勤记录标记为已读
#[utoipa::path(
    patch,
    path = "/api/attendance/read-all",
    tag = "attendance",
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>)
    )
)]
pub async fn mark_all_attendance_read(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Attendance;
    let updated = module_records(&state).await?.mark_all_read(table).await?;
    Ok(marked(table, updated))
}

/// 消息列表
#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "messages",
    params(RecordFilter),
    responses(
        (status = 200, description = "消息，按日期倒序", body = ApiResponse<Vec<MessageRecord>>)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<ApiResponse<Vec<MessageRecord>>>, AppError> {
    let data = module_records(&state).await?.messages(&filter).await?;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 未读消息数
#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "messages",
    params(UnreadQuery),
    responses(
        (status = 200, description = "未读数量，未提供 user_id 时为 0", body = ApiResponse<UnreadCount>)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<ApiResponse<UnreadCount>>, AppError> {
    let unread_count = match RecordFilter::non_blank(&query.user_id) {
        Some(user_id) => module_records(&state).await?.unread_count(Some(user_id)).await?,
        None => 0,
    };
    Ok(Json(ApiResponse::ok_with_service(UnreadCount { unread_count })))
}

/// 标记单条消息为已读
#[utoipa::path(
    put,
    path = "/api/messages/{id}/read",
    tag = "messages",
    params(("id" = u64, Path, description = "消息 ID")),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "消息未找到")
    )
)]
pub async fn mark_message_read(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Messages;
    let updated = module_records(&state).await?.mark_read(table, id).await?;
    Ok(marked(table, updated))
}

/// 全部消息标记为已读
#[utoipa::path(
    put,
    path = "/api/messages/read-all",
    tag = "messages",
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>)
    )
)]
pub async fn mark_all_messages_read(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Messages;
    let updated = module_records(&state).await?.mark_all_read(table).await?;
    Ok(marked(table, updated))
}

/// 指定租户库的考勤记录
#[utoipa::path(
    get,
    path = "/api/databases/{name}/attendance",
    tag = "attendance",
    params(("name" = String, Path, description = "数据库名称"), RecordFilter),
    responses(
        (status = 200, description = "考勤记录", body = ApiResponse<Vec<AttendanceRecord>>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn list_tenant_attendance(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<ApiResponse<Vec<AttendanceRecord>>>, AppError> {
    let data = tenant_records(&state, &name).await?.attendance(&filter).await?;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 标记租户库中的考勤记录为已读
#[utoipa::path(
    patch,
    path = "/api/databases/{name}/attendance/{id}/read",
    tag = "attendance",
    params(
        ("name" = String, Path, description = "数据库名称"),
        ("id" = u64, Path, description = "记录 ID")
    ),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "数据库或记录未找到")
    )
)]
pub async fn mark_tenant_attendance_read(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, u64)>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Attendance;
    let updated = tenant_records(&state, &name).await?.mark_read(table, id).await?;
    Ok(marked(table, updated))
}

/// 租户库考勤记录全部标记为已读
#[utoipa::path(
    patch,
    path = "/api/databases/{name}/attendance/read-all",
    tag = "attendance",
    params(("name" = String, Path, description = "数据库名称")),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn mark_all_tenant_attendance_read(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Attendance;
    let updated = tenant_records(&state, &name).await?.mark_all_read(table).await?;
    Ok(marked(table, updated))
}

/// 指定租户库的消息
#[utoipa::path(
    get,
    path = "/api/databases/{name}/messages",
    tag = "messages",
    params(("name" = String, Path, description = "数据库名称"), RecordFilter),
    responses(
        (status = 200, description = "消息", body = ApiResponse<Vec<MessageRecord>>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn list_tenant_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(filter): Query<RecordFilter>,
) -> Result<Json<ApiResponse<Vec<MessageRecord>>>, AppError> {
    let data = tenant_records(&state, &name).await?.messages(&filter).await?;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 标记租户库中的消息为已读
#[utoipa::path(
    put,
    path = "/api/databases/{name}/messages/{id}/read",
    tag = "messages",
    params(
        ("name" = String, Path, description = "数据库名称"),
        ("id" = u64, Path, description = "消息 ID")
    ),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "数据库或消息未找到")
    )
)]
pub async fn mark_tenant_message_read(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, u64)>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Messages;
    let updated = tenant_records(&state, &name).await?.mark_read(table, id).await?;
    Ok(marked(table, updated))
}

/// 租户库消息全部标记为已读
#[utoipa::path(
    put,
    path = "/api/databases/{name}/messages/read-all",
    tag = "messages",
    params(("name" = String, Path, description = "数据库名称")),
    responses(
        (status = 200, description = "已更新", body = ApiResponse<MarkReadResult>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn mark_all_tenant_messages_read(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MarkReadResult>>, AppError> {
    let table = RecordTable::Messages;
    let updated = tenant_records(&state, &name).await?.mark_all_read(table).await?;
    Ok(marked(table, updated))
}
