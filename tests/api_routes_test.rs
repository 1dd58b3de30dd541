use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use realty_import::{
    config::ImportConfig,
    ingestor::ImportPipeline,
    models::Account,
    repositories::InMemoryStore,
    services::ImportRateLimiter,
    web::{AppState, StaticTokenVerifier, WebServer},
};

const BOUNDARY: &str = "----realty-import-boundary";
const TOKEN: &str = "agent-token";

const CSV: &str = "Fecha de Reserva*,Dirección*,Tipo de Operación*,Valor de Reserva*,Estado*,% Punta Vendedora*\n\
15/03/2024,Av. Siempreviva 742,Venta,150000,En Curso,3\n\
16/03/2024,,Venta,90000,Cerrada,2\n\
01-11-2025,Calle Falsa 123,Alquiler Tradicional,1200,Caída,3\n";

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
}

fn test_app_with(config: ImportConfig, rate_limiter: ImportRateLimiter, max_request_size: usize) -> TestApp {
    let store = Arc::new(InMemoryStore::new().with_account(Account {
        id: "agent-1".to_string(),
        email: "agent@example.com".to_string(),
        team_id: Some("team-1".to_string()),
        is_team_lead: false,
    }));
    let pipeline = ImportPipeline::new(&config, store.clone(), store.clone()).unwrap();

    let state = AppState {
        pipeline,
        roster_store: store.clone(),
        operation_store: store.clone(),
        verifier: Arc::new(StaticTokenVerifier::default().with_token(TOKEN, "agent-1")),
        rate_limiter,
        max_request_size,
    };

    TestApp {
        router: WebServer::create_router(state, max_request_size),
        store,
    }
}

fn test_app() -> TestApp {
    test_app_with(ImportConfig::default(), ImportRateLimiter::unlimited(), 1024 * 1024)
}

fn multipart_body(file: Option<(&str, &str)>, team_id: Option<&str>) -> Vec<u8> {
    let mut body = String::new();
    if let Some((file_name, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
        ));
    }
    if let Some(team_id) = team_id {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"teamId\"\r\n\r\n{team_id}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

// Helper function to send requests to the app
async fn send_request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    multipart: Option<Vec<u8>>,
) -> (StatusCode, Value) {
    let mut request_builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request_builder = request_builder.header("authorization", format!("Bearer {}", token));
    }

    let request = if let Some(body) = multipart {
        request_builder
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    } else {
        request_builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();
    let (status, body) = send_request(&app.router, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_import_requires_bearer_token() {
    let app = test_app();
    let body = multipart_body(Some(("ops.csv", CSV)), None);

    let (status, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        None,
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert!(json.get("created").is_none());

    let (status, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some("wrong-token"),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.store.operations().await.is_empty());
}

#[tokio::test]
async fn test_auth_checked_before_body() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/operations/import")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_import_partial_success() {
    let app = test_app();
    let (status, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(Some(("ops.csv", CSV)), None)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["created"], 2);
    assert_eq!(json["message"], "Import completed. 2 operations created.");
    assert_eq!(
        json["errors"],
        json!([{ "row": 3, "error": "direccion_reserva es requerido" }])
    );

    // caller's account names team-1
    let (status, listed) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/operations",
        Some(TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let operations = listed["data"].as_array().unwrap();
    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0]["team_id"], "team-1");
    assert_eq!(operations[0]["porcentaje_punta_vendedora"], json!(3.0));
}

#[tokio::test]
async fn test_import_uses_form_team_id() {
    let app = test_app();
    let (status, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(Some(("ops.csv", CSV)), Some("team-7"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send_request(
        &app.router,
        Method::GET,
        "/api/v1/operations?teamId=team-7",
        Some(TOKEN),
        None,
    )
    .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_import_without_file_is_bad_request() {
    let app = test_app();
    let (status, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(None, Some("team-1"))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "No file was uploaded");
}

#[tokio::test]
async fn test_job_fatal_errors_have_no_created_count() {
    let app = test_app();
    let (status, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(
            Some(("ops.csv", "Fecha de Reserva,Dirección\n15/03/2024,Calle 1\n")),
            None,
        )),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("tipo_operacion"));
    assert!(json.get("created").is_none());
}

#[tokio::test]
async fn test_file_over_size_limit() {
    let config = ImportConfig {
        max_file_size: 64,
        ..ImportConfig::default()
    };
    let app = test_app_with(config, ImportRateLimiter::unlimited(), 1024 * 1024);

    let (status, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(Some(("ops.csv", CSV)), None)),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_request_body_limit() {
    let app = test_app_with(ImportConfig::default(), ImportRateLimiter::unlimited(), 128);

    let (status, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(Some(("ops.csv", CSV)), None)),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.store.operations().await.is_empty());
}

#[tokio::test]
async fn test_import_rate_limit() {
    let app = test_app_with(
        ImportConfig::default(),
        ImportRateLimiter::per_hour(Some(1)),
        1024 * 1024,
    );
    let body = multipart_body(Some(("ops.csv", CSV)), None);

    let (first, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(body.clone()),
    )
    .await;
    let (second, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(body),
    )
    .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_list_requires_token() {
    let app = test_app();
    let (status, _) =
        send_request(&app.router, Method::GET, "/api/v1/operations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_upload_does_not_use_quota() {
    let app = test_app_with(
        ImportConfig::default(),
        ImportRateLimiter::per_hour(Some(1)),
        1024 * 1024,
    );

    let (missing_file, _) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(None, Some("team-1"))),
    )
    .await;
    let (valid, json) = send_request(
        &app.router,
        Method::POST,
        "/api/v1/operations/import",
        Some(TOKEN),
        Some(multipart_body(Some(("ops.csv", CSV)), None)),
    )
    .await;

    assert_eq!(missing_file, StatusCode::BAD_REQUEST);
    assert_eq!(valid, StatusCode::OK);
    assert_eq!(json["created"], 2);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = test_app();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let request_id = response.headers().get("x-request-id").unwrap();
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
