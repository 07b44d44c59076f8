//! 多租户数据库网关
//!
//! 提供以下功能：
//! - 声明式与动态发现的租户库注册
//! - 按需建立、按连接键缓存的连接句柄
//! - 通用数据浏览与只读查询
//! - 考勤与消息模块

mod browser;
mod handlers;
mod records;
mod registry;
mod routes;
mod rows;
mod state;

use std::sync::Arc;

use anyhow::Context;
use common::config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use registry::{InformationSchemaCatalog, MySqlConnector, Registry};
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "多租户数据库网关 API",
        version = "0.1.0",
        description = "动态租户库注册、通用数据浏览、考勤与消息模块"
    ),
    paths(
        handlers::health::health_check,
        handlers::databases::list_databases,
        handlers::databases::refresh_databases,
        handlers::databases::get_database,
        handlers::databases::list_tables,
        handlers::databases::get_table_data,
        handlers::databases::get_table_columns,
        handlers::databases::get_database_stats,
        handlers::databases::execute_query,
        handlers::connections::list_connections,
        handlers::connections::test_connection,
        handlers::records::list_attendance,
        handlers::records::mark_attendance_read,
        handlers::records::mark_all_attendance_read,
        handlers::records::list_messages,
        handlers::records::unread_count,
        handlers::records::mark_message_read,
        handlers::records::mark_all_messages_read,
        handlers::records::list_tenant_attendance,
        handlers::records::mark_tenant_attendance_read,
        handlers::records::mark_all_tenant_attendance_read,
        handlers::records::list_tenant_messages,
        handlers::records::mark_tenant_message_read,
        handlers::records::mark_all_tenant_messages_read,
    ),
    components(schemas(
        common::models::DatabaseDescriptor,
        common::models::DatabaseKind,
        common::models::DatabaseList,
        common::models::DatabaseInfo,
        common::models::RefreshResult,
        common::models::ConnectionItem,
        common::models::QueryRequest,
        common::models::QueryResult,
        common::models::ColumnInfo,
        common::models::TableList,
        common::models::TablePage,
        common::models::ColumnDescription,
        common::models::DatabaseStats,
        common::models::SchemaSize,
        common::models::TableStats,
        common::models::AttendanceRecord,
        common::models::MessageRecord,
        common::models::UnreadCount,
        common::models::MarkReadResult,
        common::response::Pagination,
        common::response::ApiError,
        common::response::ResponseMeta,
        handlers::connections::ConnectionTestResult,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "databases", description = "租户库注册表"),
        (name = "browser", description = "通用数据浏览"),
        (name = "connections", description = "连接注册与测试"),
        (name = "attendance", description = "考勤记录"),
        (name = "messages", description = "消息"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 读取 .env（不覆盖已有环境变量）
    dotenvy::dotenv().ok();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let db = &config.database;

    // 构建注册表：目录查询走管理连接，租户连接按需建立
    let connector = MySqlConnector::new(db.max_connections, db.connect_timeout);
    let admin = db
        .declared_connection(&db.admin_connection)
        .context("admin connection is not declared")?;
    let catalog = InformationSchemaCatalog::new(connector.lazy_pool(admin));
    let registry = Arc::new(Registry::new(db, Arc::new(catalog), Arc::new(connector)));

    let discovered = registry.refresh().await;
    info!(
        pattern = %db.pattern,
        declared = registry.declared().len(),
        discovered,
        "database registry ready"
    );

    // 创建路由
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, registry);
    let auth = state.token.is_enabled();
    let app = routes::create_router(state);

    // 启动服务
    info!(service = common::response::SERVICE_NAME, address = %addr, auth, "启动服务");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
