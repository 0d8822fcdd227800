mod catalog;
mod config;
mod http;
mod idempotency;
mod import;
mod jobs;
mod metrics;
mod models;
mod pipeline;
mod security;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use config::ServerConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{
    ApiError, EditorRequest, EditorResponse, ImportPreview, ImportRequest, ImportResponse,
    PreviewRequest, ResolveRequest, ResolveResponse, SuggestRequest,
};
use pipeline::{ImportPipeline, PipelineError, PipelineErrorKind};
use security::{AdminAuth, AdminContext, require_admin_auth};
use serde::Serialize;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let server = ServerConfig::from_env();
    let pipeline = ImportPipeline::from_env();
    let (queue, _worker) = jobs::JobQueue::spawn(pipeline.clone(), server.queue_capacity);
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre::eyre!("prometheus recorder: {err}"))?;
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());

    let state = AppState {
        pipeline,
        queue,
        openapi: Arc::new(load_openapi()),
        idempotency: idempotency::MemoryIdempotency::new(Duration::from_secs(
            server.idempotency_ttl_secs,
        )),
        prometheus_handle,
        redis,
        idempotency_ttl_secs: server.idempotency_ttl_secs,
    };
    let app = build_router(state, AdminAuth::from_env())
        .layer(DefaultBodyLimit::max(server.request_max_bytes));

    let addr: SocketAddr = ([0, 0, 0, 0], server.port).into();
    info!(target = "maison.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: ImportPipeline,
    queue: jobs::JobQueue,
    openapi: Arc<serde_json::Value>,
    idempotency: idempotency::MemoryIdempotency,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
    idempotency_ttl_secs: u64,
}

fn build_router(state: AppState, auth: AdminAuth) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/imports", post(run_import))
        .route("/imports/preview", post(preview_import))
        .nest(
            "/categories",
            Router::new()
                .route("/suggest", post(suggest_categories))
                .route("/resolve", post(resolve_category)),
        )
        .route("/editor", post(editor_action))
        .nest(
            "/jobs",
            Router::new()
                .route("/imports", post(enqueue_import_job))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_admin_auth));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn load_openapi() -> serde_json::Value {
    serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi": "3.0.3"}))
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
///
/// Reports which catalog backend the service is importing into.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "maison-import-rs",
        "catalog": state.pipeline.store().backend(),
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::Unauthorized);
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Maison Import API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#,
    )
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Parse pasted rows and report per-row errors without importing anything.
///
/// - Method: `POST`
/// - Path: `/imports/preview`
/// - Body: `{ "text": "..." }`
/// - Response: `ImportPreview`
async fn preview_import(
    State(state): State<AppState>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<ImportPreview>, AppError> {
    crate::metrics::inc_requests("/imports/preview");
    let preview = state.pipeline.preview(&payload.text).await?;
    Ok(Json(preview))
}

/// Run the import pipeline and create every valid row.
///
/// - Method: `POST`
/// - Path: `/imports`
/// - Auth: `Authorization: Bearer <key>` or `X-Admin-Key: <key>`
/// - Body: `ImportRequest`; `dry_run` stops before commit
/// - Headers: optional `Idempotency-Key` replays an earlier response
/// - Response: `ImportResponse` (batch id, stage transcript, per-row report)
async fn run_import(
    State(state): State<AppState>,
    Extension(context): Extension<AdminContext>,
    headers: HeaderMap,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    crate::metrics::inc_requests("/imports");
    info!(
        target = "maison.api",
        operator = %context.operator,
        api_key = %context.api_key_id,
        dry_run = payload.dry_run,
        "import requested",
    );

    let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    else {
        return Ok(Json(state.pipeline.run(payload).await?));
    };

    if let Some(client) = &state.redis {
        if let Some(existing) = idempotency::redis_get(client, &key).await {
            return Ok(Json(existing));
        }
        let response = state.pipeline.run(payload).await?;
        idempotency::redis_set(client, &key, &response, state.idempotency_ttl_secs).await;
        return Ok(Json(response));
    }
    match state.idempotency.claim(&key).await {
        idempotency::Claim::Replay(existing) => return Ok(Json(existing)),
        idempotency::Claim::InFlight => return Err(AppError::Conflict),
        idempotency::Claim::Claimed => {}
    }
    match state.pipeline.run(payload).await {
        Ok(response) => {
            state.idempotency.complete(&key, &response).await;
            Ok(Json(response))
        }
        Err(err) => {
            state.idempotency.release(&key).await;
            Err(err.into())
        }
    }
}

async fn suggest_categories(
    State(state): State<AppState>,
    Json(payload): Json<SuggestRequest>,
) -> Result<Json<Vec<import::CategorySuggestion>>, AppError> {
    crate::metrics::inc_requests("/categories/suggest");
    let snapshot = state.pipeline.catalog().await?;
    Ok(Json(import::suggest(&payload.input, &snapshot.categories)))
}

async fn resolve_category(
    State(state): State<AppState>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    crate::metrics::inc_requests("/categories/resolve");
    let snapshot = state.pipeline.catalog().await?;
    let category_id = import::resolve(&payload.path, &snapshot.categories).ok_or_else(|| {
        PipelineError::invalid_input(
            "resolve_category",
            format!("Category \"{}\" not found", payload.path),
        )
    })?;
    Ok(Json(ResolveResponse {
        path: payload.path,
        category_id,
    }))
}

/// Apply one editor action to caller-held state.
///
/// - Method: `POST`
/// - Path: `/editor`
/// - Body: `{ "state": EditorState, "action": { "type": "edit" | "move_highlight" | "select" | "browse" | "close", ... } }`
/// - Response: the next state and the suggestions to show for it
async fn editor_action(
    State(state): State<AppState>,
    Json(payload): Json<EditorRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    crate::metrics::inc_requests("/editor");
    let snapshot = state.pipeline.catalog().await?;
    let mut editor = payload.state;
    let suggestions = editor.apply(payload.action, &snapshot.categories);
    Ok(Json(EditorResponse {
        state: editor,
        suggestions,
    }))
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_import_job(
    State(state): State<AppState>,
    Extension(context): Extension<AdminContext>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    crate::metrics::inc_requests("/jobs/imports");
    let id = state
        .queue
        .enqueue_import(payload, context)
        .await
        .map_err(|err| PipelineError::internal("enqueue", err.error))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: id.to_string(),
        }),
    ))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(PipelineError::invalid_input("jobs", "invalid_job_id").into());
    };
    state.queue.get(uuid).await.map(Json).ok_or(AppError::NotFound)
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
    Unauthorized,
    NotFound,
    Conflict,
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, payload)
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: "unauthorized".into(),
                    detail: None,
                },
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: "not_found".into(),
                    detail: None,
                },
            ),
            AppError::Conflict => (
                StatusCode::CONFLICT,
                ApiError {
                    error: "idempotency_key_in_flight".into(),
                    detail: Some("an import with this Idempotency-Key is still running".into()),
                },
            ),
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const KEY: &str = "test-key";
    const SAREE: &str = "Silk Saree\tHandwoven\t1499\t1999\tWomen > Saree\tsilk\tS,M\tred:#FF0000|https://cdn.x/saree.jpg\ttrue";

    fn app() -> Router {
        let pipeline = ImportPipeline::demo();
        let (queue, _worker) = jobs::JobQueue::spawn(pipeline.clone(), 4);
        let state = AppState {
            pipeline,
            queue,
            openapi: Arc::new(load_openapi()),
            idempotency: idempotency::MemoryIdempotency::new(Duration::from_secs(60)),
            prometheus_handle: PrometheusBuilder::new().build_recorder().handle(),
            redis: None,
            idempotency_ttl_secs: 60,
        };
        build_router(state, AdminAuth::from_keys(&format!("tester:{KEY}")))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(security::ADMIN_KEY_HEADER, KEY)
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_is_public() {
        let request = Request::get("/health").body(Body::empty()).expect("request");
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["catalog"], "memory");
    }

    #[tokio::test]
    async fn admin_routes_require_a_key() {
        let request = Request::post("/imports/preview")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"text": SAREE}).to_string()))
            .expect("request");
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_api_key");
    }

    #[tokio::test]
    async fn preview_returns_parsed_rows() {
        let (status, body) = send(app(), post("/imports/preview", json!({"text": SAREE}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid_count"], 1);
        assert_eq!(body["products"][0]["categoryId"], "cat-women-saree");
    }

    #[tokio::test]
    async fn idempotency_key_replays_the_first_response() {
        let app = app();
        let keyed = || {
            let mut request = post("/imports", json!({"text": SAREE}));
            request
                .headers_mut()
                .insert("Idempotency-Key", "batch-1".parse().expect("header"));
            request
        };
        let (_, first) = send(app.clone(), keyed()).await;
        let (status, second) = send(app, keyed()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["batch_id"], second["batch_id"]);
        assert_eq!(second["report"]["created"].as_array().map(Vec::len), Some(1));
        assert!(second["report"]["rejected"].as_array().is_some_and(Vec::is_empty));
    }

    #[tokio::test]
    async fn failed_import_frees_its_idempotency_key() {
        let app = app();
        let keyed = |text: &str| {
            let mut request = post("/imports", json!({"text": text}));
            request
                .headers_mut()
                .insert("Idempotency-Key", "batch-2".parse().expect("header"));
            request
        };
        let (status, _) = send(app.clone(), keyed("\t\tabc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send(app, keyed(SAREE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["created"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn invalid_batch_maps_to_bad_request() {
        let (status, body) = send(app(), post("/imports", json!({"text": "\t\tabc"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validate_rows");
    }

    #[tokio::test]
    async fn category_endpoints() {
        let app = app();
        let (_, suggestions) =
            send(app.clone(), post("/categories/suggest", json!({"input": "Men >"}))).await;
        let names: Vec<&str> = suggestions
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|s| s["displayText"].as_str())
            .collect();
        assert_eq!(names, vec!["Shirts", "Trousers"]);

        let (status, resolved) =
            send(app.clone(), post("/categories/resolve", json!({"path": "women>saree"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["category_id"], "cat-women-saree");

        let (status, _) = send(
            app,
            post("/categories/resolve", json!({"path": "Women > Sar"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn editor_round_trip() {
        let text = "Silk\tNice\t1\t\tWo";
        let (status, body) = send(
            app(),
            post(
                "/editor",
                json!({"action": {"type": "edit", "text": text, "cursor": 15}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["picker_open"], true);
        assert_eq!(body["suggestions"][0]["pathText"], "Women");
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let request = Request::get(format!("/jobs/{}", uuid::Uuid::new_v4()))
            .header(security::ADMIN_KEY_HEADER, KEY)
            .body(Body::empty())
            .expect("request");
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
