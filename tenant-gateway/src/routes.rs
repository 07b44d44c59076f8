//! 网关路由模块

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use common::middleware::{auth_middleware, request_id_middleware};

use crate::handlers::{connections, databases, health, records};
use crate::state::AppState;
use crate::ApiDoc;

/// `/api` routes. Everything except the health check sits behind the bearer gate.
pub fn router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        // 数据库注册表
        .route("/api/databases", get(databases::list_databases))
        .route("/api/databases/refresh", post(databases::refresh_databases))
        .route("/api/databases/{name}", get(databases::get_database))
        // 通用浏览
        .route("/api/databases/{name}/tables", get(databases::list_tables))
        .route("/api/databases/{name}/tables/{table}", get(databases::get_table_data))
        .route(
            "/api/databases/{name}/tables/{table}/columns",
            get(databases::get_table_columns),
        )
        .route("/api/databases/{name}/stats", get(databases::get_database_stats))
        .route("/api/databases/{name}/query", post(databases::execute_query))
        // 租户库考勤与消息
        .route("/api/databases/{name}/attendance", get(records::list_tenant_attendance))
        .route(
            "/api/databases/{name}/attendance/read-all",
            patch(records::mark_all_tenant_attendance_read),
        )
        .route(
            "/api/databases/{name}/attendance/{id}/read",
            patch(records::mark_tenant_attendance_read),
        )
        .route("/api/databases/{name}/messages", get(records::list_tenant_messages))
        .route(
            "/api/databases/{name}/messages/read-all",
            put(records::mark_all_tenant_messages_read),
        )
        .route(
            "/api/databases/{name}/messages/{id}/read",
            put(records::mark_tenant_message_read),
        )
        // 连接
        .route("/api/connections", get(connections::list_connections))
        .route("/api/connections/{key}/test", get(connections::test_connection))
        // 模块绑定的考勤与消息
        .route("/api/attendance", get(records::list_attendance))
        .route("/api/attendance/read-all", patch(records::mark_all_attendance_read))
        .route("/api/attendance/{id}/read", patch(records::mark_attendance_read))
        .route("/api/messages", get(records::list_messages))
        .route("/api/messages/unread-count", get(records::unread_count))
        .route("/api/messages/read-all", put(records::mark_all_messages_read))
        .route("/api/messages/{id}/read", put(records::mark_message_read))
        .route_layer(middleware::from_fn_with_state(
            state.token.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/health", get(health::health_check))
        .merge(protected)
}

/// Full application: API routes, OpenAPI document and the HTTP layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(router(&state))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::registry::testing::{test_config, test_registry, FakeConnector, StaticCatalog};

    struct Harness {
        app: Router,
        connector: Arc<FakeConnector>,
        catalog: Arc<StaticCatalog>,
    }

    fn harness(token: Option<&str>) -> Harness {
        let catalog = StaticCatalog::new(&["sm_db_users_main", "sm_db_wlka", "sm_db_acme"]);
        let connector = FakeConnector::new(Duration::ZERO);
        let registry = test_registry(catalog.clone(), connector.clone(), Duration::from_secs(300));

        let mut config = test_config();
        config.api_token = token.map(String::from);
        let state = AppState::new(config, Arc::new(registry));

        Harness {
            app: create_router(state),
            connector,
            catalog,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn query(name: &str, sql: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/databases/{name}/query"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "query": sql }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "tenant-gateway");
        assert_eq!(body["declared_connections"], 2);
        assert_eq!(body["open_handles"], 0);
    }

    #[tokio::test]
    async fn test_list_databases() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/databases")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total"], 3);

        let databases = body["data"]["databases"].as_array().unwrap();
        assert_eq!(databases[0]["name"], "sm_db_users_main");
        assert_eq!(databases[0]["type"], "declared");
        assert_eq!(databases[2]["name"], "sm_db_acme");
        assert_eq!(databases[2]["connection"], "acme");
        assert_eq!(databases[2]["type"], "dynamic");
    }

    #[tokio::test]
    async fn test_refresh_reports_dynamic_count() {
        let h = harness(None);
        h.catalog.set_names(&["sm_db_acme", "sm_db_beta", "sm_db_wlka"]);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/databases/refresh")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 2);

        let (_, body) = send(&h.app, get("/api/databases")).await;
        assert_eq!(body["data"]["total"], 4);
    }

    #[tokio::test]
    async fn test_unknown_database_is_not_found() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/databases/sm_db_missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "DATABASE_NOT_FOUND");

        let (status, _) = send(&h.app, get("/api/databases/sm_db_missing/tables")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_describe_database() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/databases/sm_db_acme")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connection"], "acme");
        assert_eq!(body["data"]["connected"], true);
    }

    #[tokio::test]
    async fn test_query_on_unknown_database() {
        let h = harness(None);
        let (status, body) = send(&h.app, query("sm_db_missing", "SELECT 1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "DATABASE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_forbidden_query_never_connects() {
        let h = harness(None);
        let (status, body) = send(
            &h.app,
            query("sm_db_acme", "SELECT * FROM users; DROP TABLE users;"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN_STATEMENT");
        assert_eq!(h.connector.opens(), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let h = harness(None);
        let (status, body) = send(&h.app, query("sm_db_acme", "  ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(h.connector.opens(), 0);
    }

    #[tokio::test]
    async fn test_invalid_page_is_rejected() {
        let h = harness(None);
        let (status, body) =
            send(&h.app, get("/api/databases/sm_db_acme/tables/users?page=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_connections_hide_passwords() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/connections")).await;
        assert_eq!(status, StatusCode::OK);

        let items = body["data"].as_array().unwrap();
        assert_eq!(items[0]["key"], "users_main");
        assert_eq!(items[1]["key"], "wlka");
        assert!(items.iter().all(|i| i.get("password").is_none()));
    }

    #[tokio::test]
    async fn test_connection_test_endpoint() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/connections/wlka/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);

        h.connector.set_reachable(false);
        let (status, body) = send(&h.app, get("/api/connections/wlka/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], false);
        assert!(body["data"]["error"].is_string());
    }

    #[tokio::test]
    async fn test_connection_test_carries_request_meta() {
        let h = harness(None);
        let request = Request::builder()
            .uri("/api/connections/acme/test")
            .header("x-request-id", "req-7")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);
        assert_eq!(body["meta"]["request_id"], "req-7");
        assert!(body["meta"]["duration_ms"].is_u64());
    }

    #[tokio::test]
    async fn test_query_without_statement_is_rejected() {
        let h = harness(None);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/databases/sm_db_acme/query")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(h.connector.opens(), 0);
    }

    #[tokio::test]
    async fn test_unread_count_without_user_is_zero() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api/messages/unread-count")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["unread_count"], 0);
        assert_eq!(h.connector.opens(), 0);
    }

    #[tokio::test]
    async fn test_bearer_token_gate() {
        let h = harness(Some("s3cret"));

        let (status, body) = send(&h.app, get("/api/databases")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let request = Request::builder()
            .uri("/api/databases")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&h.app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let h = harness(None);
        let request = Request::builder()
            .uri("/api/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/databases/{name}/query"].is_object());
        assert!(body["paths"]["/api/messages/unread-count"].is_object());
    }
}
