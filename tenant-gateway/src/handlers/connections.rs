//! 连接注册表端点

use std::time::Instant;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestId;
use common::models::ConnectionItem;
use common::response::ApiResponse;

use crate::state::AppState;

/// 连接测试结果
#[derive(Serialize, ToSchema)]
pub struct ConnectionTestResult {
    /// 连接键
    pub key: String,
    /// 测试是否成功
    pub success: bool,
    /// 连接延迟（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// 错误信息（如果测试失败）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 列出已注册的连接（不含密码）
#[utoipa::path(
    get,
    path = "/api/connections",
    tag = "connections",
    responses(
        (status = 200, description = "连接列表", body = ApiResponse<Vec<ConnectionItem>>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ConnectionItem>>>, AppError> {
    let data = state.registry.registered_connections().await;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 测试连接
#[utoipa::path(
    get,
    path = "/api/connections/{key}/test",
    tag = "connections",
    params(
        ("key" = String, Path, description = "连接键")
    ),
    responses(
        (status = 200, description = "连接测试结果", body = ApiResponse<ConnectionTestResult>)
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<ConnectionTestResult>>, AppError> {
    let start = Instant::now();
    let success = state.registry.test_connection(&key).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let result = if success {
        ConnectionTestResult {
            key,
            success,
            latency_ms: Some(latency_ms),
            error: None,
        }
    } else {
        ConnectionTestResult {
            error: Some(format!("connection '{key}' is unreachable or unknown")),
            key,
            success,
            latency_ms: None,
        }
    };
    Ok(Json(
        ApiResponse::ok_with_service(result)
            .with_request_id(request_id.as_str())
            .with_duration(latency_ms),
    ))
}
