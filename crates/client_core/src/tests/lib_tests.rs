use super::*;
use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::protocol::Slot;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>,
    json_bodies: Arc<Mutex<Vec<Value>>>,
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn handle_upload(State(state): State<ServerState>, mut multipart: Multipart) -> Json<Value> {
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes").to_vec();
        state.uploads.lock().await.push((name, filename, bytes));
    }
    Json(json!({"departments": ["CS", "IT"], "classes": ["SE-A", "TE-B"]}))
}

async fn handle_generate_schedule(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.json_bodies.lock().await.push(body);
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "No data for selected class/department"})),
    )
}

async fn handle_download(State(state): State<ServerState>, Json(body): Json<Value>) -> Vec<u8> {
    state.json_bodies.lock().await.push(body);
    b"%PDF-1.4 schedule".to_vec()
}

async fn handle_export(
    State(state): State<ServerState>,
    Query(query): Query<HashMap<String, String>>,
) -> Vec<u8> {
    state.queries.lock().await.push(query);
    b"Teacher,Subjects\n".to_vec()
}

async fn handle_entire_timetable() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>Internal Server Error</html>")
}

async fn handle_generate_all() -> Json<Value> {
    Json(json!({"message": "Schedule generated successfully!"}))
}

async fn handle_department_options() -> Json<Value> {
    Json(json!({"options": ["Civil", "CS", "IT"]}))
}

async fn handle_class_options() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Failed to fetch dropdown data"})),
    )
}

async fn handle_teacher_options() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route("/upload", post(handle_upload))
        .route("/generate_schedule", post(handle_generate_schedule))
        .route("/generate", post(handle_generate_all))
        .route("/download", post(handle_download).get(handle_export))
        .route("/download_entire_timetable", post(handle_entire_timetable))
        .route("/dropdown/department", get(handle_department_options))
        .route("/dropdown/class", get(handle_class_options))
        .route("/dropdown/teacher", get(handle_teacher_options))
        .with_state(state)
}

async fn spawn_server(app: Router) -> std::io::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn spawn_backend() -> (HttpBackend, ServerState) {
    let state = ServerState::default();
    let server_url = spawn_server(router(state.clone()))
        .await
        .expect("spawn server");
    let backend = HttpBackend::new(
        Url::parse(&server_url).expect("server url"),
        Duration::from_secs(5),
    )
    .expect("backend");
    (backend, state)
}

fn sample_schedule() -> Schedule {
    Schedule {
        days: vec!["Monday".into(), "Tuesday".into()],
        slots: vec![Slot {
            time: "9:00-10:00".into(),
            schedule: vec![Some("Maths (Rao)".into()), None],
        }],
    }
}

#[tokio::test]
async fn upload_sends_file_field_with_original_filename() {
    let (backend, state) = spawn_backend().await;

    let response = backend
        .upload("teachers.xlsx", b"xlsx-bytes".to_vec())
        .await
        .expect("upload");

    assert_eq!(
        response.departments,
        Some(vec!["CS".to_string(), "IT".to_string()])
    );
    assert_eq!(
        response.classes,
        Some(vec!["SE-A".to_string(), "TE-B".to_string()])
    );

    let uploads = state.uploads.lock().await.clone();
    assert_eq!(
        uploads,
        vec![(
            "file".to_string(),
            Some("teachers.xlsx".to_string()),
            b"xlsx-bytes".to_vec()
        )]
    );
}

#[tokio::test]
async fn backend_error_field_becomes_error_message() {
    let (backend, state) = spawn_backend().await;

    let err = backend
        .generate_schedule(&ScheduleRequest {
            department: "CS".into(),
            class_name: "SE-A".into(),
        })
        .await
        .expect_err("must fail");

    match err {
        ClientError::Backend { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No data for selected class/department");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let bodies = state.json_bodies.lock().await.clone();
    assert_eq!(bodies, vec![json!({"department": "CS", "class": "SE-A"})]);
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_generic_message() {
    let (backend, _state) = spawn_backend().await;

    let err = backend
        .download_entire_timetable(ExportFormat::Pdf)
        .await
        .expect_err("must fail");

    match err {
        ClientError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to download entire timetable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn download_posts_format_and_schedule_and_returns_binary_body() {
    let (backend, state) = spawn_backend().await;

    let bytes = backend
        .download_schedule(&DownloadScheduleRequest {
            format: ExportFormat::Word,
            schedule: sample_schedule(),
        })
        .await
        .expect("download");

    assert_eq!(bytes, b"%PDF-1.4 schedule".to_vec());
    let bodies = state.json_bodies.lock().await.clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["format"], json!("word"));
    assert_eq!(bodies[0]["schedule"]["days"], json!(["Monday", "Tuesday"]));
    assert_eq!(
        bodies[0]["schedule"]["slots"][0]["schedule"],
        json!(["Maths (Rao)", null])
    );
}

#[tokio::test]
async fn export_requests_extension_as_type_query() {
    let (backend, state) = spawn_backend().await;

    let bytes = backend
        .export_timetable(ExportFormat::Word)
        .await
        .expect("export");

    assert_eq!(bytes, b"Teacher,Subjects\n".to_vec());
    let queries = state.queries.lock().await.clone();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].get("type").map(String::as_str), Some("docx"));
}

#[tokio::test]
async fn generate_all_reads_message() {
    let (backend, _state) = spawn_backend().await;

    let response = backend.generate_all().await.expect("generate");

    assert_eq!(
        response.message.as_deref(),
        Some("Schedule generated successfully!")
    );
}

#[tokio::test]
async fn dropdown_options_keep_response_order() {
    let (backend, _state) = spawn_backend().await;

    let options = backend
        .dropdown_options(Category::Department)
        .await
        .expect("options");

    assert_eq!(options, vec!["Civil", "CS", "IT"]);
}

#[tokio::test]
async fn dropdown_failure_prefers_backend_error_then_status_message() {
    let (backend, _state) = spawn_backend().await;

    let with_body = backend
        .dropdown_options(Category::Class)
        .await
        .expect_err("class must fail");
    assert_eq!(with_body.to_string(), "Failed to fetch dropdown data");

    let without_body = backend
        .dropdown_options(Category::Teacher)
        .await
        .expect_err("teacher must fail");
    assert_eq!(
        without_body.to_string(),
        "Failed to fetch options from /dropdown/teacher, Status: 503"
    );
}

#[tokio::test]
async fn base_url_path_prefix_is_preserved() {
    let state = ServerState::default();
    let app = Router::new().nest("/api", router(state.clone()));
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(
        Url::parse(&format!("{server_url}/api")).expect("server url"),
        Duration::from_secs(5),
    )
    .expect("backend");

    backend
        .upload("teachers.xlsx", b"xlsx".to_vec())
        .await
        .expect("upload under prefix");

    assert_eq!(state.uploads.lock().await.len(), 1);
}

#[tokio::test]
async fn unparseable_success_body_is_a_network_error() {
    let app = Router::new().route(
        "/generate_schedule",
        post(|| async { "definitely not json" }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(
        Url::parse(&server_url).expect("server url"),
        Duration::from_secs(5),
    )
    .expect("backend");

    let err = backend
        .generate_schedule(&ScheduleRequest {
            department: "CS".into(),
            class_name: "SE-A".into(),
        })
        .await
        .expect_err("must fail");

    assert!(matches!(err, ClientError::Network(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn slow_backend_times_out_as_network_error() {
    let app = Router::new().route(
        "/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"message": "late"}))
        }),
    );
    let server_url = spawn_server(app).await.expect("spawn server");
    let backend = HttpBackend::new(
        Url::parse(&server_url).expect("server url"),
        Duration::from_millis(200),
    )
    .expect("backend");

    let err = backend.generate_all().await.expect_err("must time out");

    assert!(matches!(err, ClientError::Network(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let backend = HttpBackend::new(
        Url::parse(&format!("http://{addr}")).expect("server url"),
        Duration::from_secs(2),
    )
    .expect("backend");

    let err = backend
        .dropdown_options(Category::Department)
        .await
        .expect_err("must fail");

    assert!(matches!(err, ClientError::Network(_)), "unexpected: {err:?}");
}
