//! 健康检查

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::response::SERVICE_NAME;

use crate::state::AppState;

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 静态声明的连接数
    pub declared_connections: usize,
    /// 已注册的动态连接数
    pub dynamic_connections: usize,
    /// 已建立的连接句柄数
    pub open_handles: usize,
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registered = state.registry.registered_connections().await;
    let declared = registered.iter().filter(|c| c.declared).count();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        declared_connections: declared,
        dynamic_connections: registered.len() - declared,
        open_handles: state.registry.cached_handles().await,
    })
}
