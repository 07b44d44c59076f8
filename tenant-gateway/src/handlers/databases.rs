//! 数据库注册表与通用浏览端点

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::middleware::RequestId;
use common::models::{
    ColumnDescription, DatabaseInfo, DatabaseList, DatabaseStats, PageQuery, QueryRequest,
    QueryResult, RefreshResult, TableList, TablePage,
};
use common::response::ApiResponse;
use common::utils::SqlValidator;

use crate::browser::TableBrowser;
use crate::state::AppState;

async fn browser(state: &AppState, name: &str) -> AppResult<TableBrowser> {
    let conn = state.registry.resolve(name).await?;
    Ok(TableBrowser::new(conn))
}

/// 列出所有可用数据库
#[utoipa::path(
    get,
    path = "/api/databases",
    tag = "databases",
    responses(
        (status = 200, description = "声明的数据库在前，其后为发现的租户库", body = ApiResponse<DatabaseList>)
    )
)]
pub async fn list_databases(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DatabaseList>>, AppError> {
    let databases = state.registry.list_available().await;
    Ok(Json(ApiResponse::ok_with_service(databases.into())))
}

/// 强制重新发现租户库
#[utoipa::path(
    post,
    path = "/api/databases/refresh",
    tag = "databases",
    responses(
        (status = 200, description = "刷新完成", body = ApiResponse<RefreshResult>)
    )
)]
pub async fn refresh_databases(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshResult>>, AppError> {
    let count = state.registry.refresh().await;
    Ok(Json(ApiResponse::ok_with_service(RefreshResult {
        count,
        message: format!("Database list refreshed, {count} dynamic databases found"),
    })))
}

/// 获取数据库详情及连通性
#[utoipa::path(
    get,
    path = "/api/databases/{name}",
    tag = "databases",
    params(
        ("name" = String, Path, description = "数据库名称")
    ),
    responses(
        (status = 200, description = "数据库详情", body = ApiResponse<DatabaseInfo>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn get_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<DatabaseInfo>>, AppError> {
    let info = state.registry.describe(&name).await?;
    Ok(Json(ApiResponse::ok_with_service(info)))
}

/// 列出数据库中的表
#[utoipa::path(
    get,
    path = "/api/databases/{name}/tables",
    tag = "browser",
    params(
        ("name" = String, Path, description = "数据库名称")
    ),
    responses(
        (status = 200, description = "表列表", body = ApiResponse<TableList>),
        (status = 404, description = "数据库未找到"),
        (status = 503, description = "无法连接数据库")
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<TableList>>, AppError> {
    let tables = browser(&state, &name).await?.list_tables().await?;
    Ok(Json(ApiResponse::ok_with_service(TableList {
        database: name,
        table_count: tables.len(),
        tables,
    })))
}

/// 分页读取表数据
#[utoipa::path(
    get,
    path = "/api/databases/{name}/tables/{table}",
    tag = "browser",
    params(
        ("name" = String, Path, description = "数据库名称"),
        ("table" = String, Path, description = "表名"),
        PageQuery
    ),
    responses(
        (status = 200, description = "列定义与当前页数据", body = ApiResponse<TablePage>),
        (status = 400, description = "分页参数无效"),
        (status = 404, description = "数据库或表未找到")
    )
)]
pub async fn get_table_data(
    State(state): State<AppState>,
    Path((name, table)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<TablePage>>, AppError> {
    page.validate()?;
    let data = browser(&state, &name).await?.paginate(&table, &page).await?;
    Ok(Json(ApiResponse::ok_with_service(data)))
}

/// 获取表的列定义
#[utoipa::path(
    get,
    path = "/api/databases/{name}/tables/{table}/columns",
    tag = "browser",
    params(
        ("name" = String, Path, description = "数据库名称"),
        ("table" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "列定义", body = ApiResponse<Vec<ColumnDescription>>),
        (status = 404, description = "数据库或表未找到")
    )
)]
pub async fn get_table_columns(
    State(state): State<AppState>,
    Path((name, table)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<ColumnDescription>>>, AppError> {
    let columns = browser(&state, &name).await?.describe(&table).await?;
    Ok(Json(ApiResponse::ok_with_service(columns)))
}

/// 库容量统计
#[utoipa::path(
    get,
    path = "/api/databases/{name}/stats",
    tag = "browser",
    params(
        ("name" = String, Path, description = "数据库名称")
    ),
    responses(
        (status = 200, description = "容量统计，表按大小降序", body = ApiResponse<DatabaseStats>),
        (status = 404, description = "数据库未找到")
    )
)]
pub async fn get_database_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<DatabaseStats>>, AppError> {
    let stats = browser(&state, &name).await?.stats().await?;
    Ok(Json(ApiResponse::ok_with_service(stats)))
}

/// 执行只读查询
///
/// 检查顺序：数据库存在 → 语句非空 → 关键字黑名单 → 建立连接并执行。
#[utoipa::path(
    post,
    path = "/api/databases/{name}/query",
    tag = "browser",
    params(
        ("name" = String, Path, description = "数据库名称")
    ),
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询结果", body = ApiResponse<QueryResult>),
        (status = 400, description = "查询语句为空"),
        (status = 403, description = "语句包含禁止的关键字"),
        (status = 404, description = "数据库未找到"),
        (status = 500, description = "数据库执行失败")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ApiResponse<QueryResult>>, AppError> {
    let start = Instant::now();
    if !state.registry.exists(&name).await {
        return Err(AppError::UnknownDatabase(name));
    }
    SqlValidator::validate(&req.query)?;

    let result = browser(&state, &name).await?.execute(&req.query).await?;
    Ok(Json(
        ApiResponse::ok_with_service(result)
            .with_request_id(request_id.as_str())
            .with_duration(start.elapsed().as_millis() as u64),
    ))
}
