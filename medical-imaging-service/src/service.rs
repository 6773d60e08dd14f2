use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::Field, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use graph_flow::Graph;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    inference::{InferenceBackend, OpenRouterBackend},
    mailer::{DemoMailer, Mailer, SendGridMailer},
    models::{AnalysisDetailResponse, AnalysisSummary, AnalyzeResponse, ContactRequest},
    report::{analyze_response, detail_response, new_record, summary},
    store::{AnalysisStore, InMemoryAnalysisStore},
    store_postgres::PostgresAnalysisStore,
    validation::{
        MAX_UPLOAD_BYTES, UploadError, parse_clinical_history, validate_contact,
        validate_upload_size, validate_upload_type,
    },
    workflow::{build_inference_workflow, resolve_report, run_inference},
};

pub const ANALYSIS_MODE_HEADER: &str = "x-analysis-mode";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Room for multipart framing and the clinical history field on top of the image.
const BODY_LIMIT_BYTES: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn bad_request_with_details(message: &str, details: impl serde::Serialize) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn not_found_error(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

fn upload_error(error: UploadError) -> ApiError {
    bad_request_error(&error.to_string())
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalysisStore>,
    pub inference: Arc<Graph>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        backend: Arc<dyn InferenceBackend>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            inference: Arc::new(build_inference_workflow(backend)),
            mailer,
        }
    }
}

pub async fn create_app(config: &ServiceConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: &ServiceConfig) -> AppState {
    let store = create_analysis_store(config).await;

    let backend: Arc<dyn InferenceBackend> = Arc::new(OpenRouterBackend::new(
        config.openrouter_api_key.clone(),
        config.inference_model.clone(),
    ));

    let mailer: Arc<dyn Mailer> = match &config.sendgrid_api_key {
        Some(api_key) => Arc::new(SendGridMailer::new(
            api_key.clone(),
            config.contact_recipient.clone(),
            config.contact_sender.clone(),
        )),
        None => {
            warn!("SENDGRID_API_KEY not set, contact form runs in demo mode");
            Arc::new(DemoMailer::new())
        }
    };

    AppState::new(store, backend, mailer)
}

async fn create_analysis_store(config: &ServiceConfig) -> Arc<dyn AnalysisStore> {
    let Some(database_url) = &config.database_url else {
        info!("Using in-memory analysis store (set DATABASE_URL to use PostgreSQL)");
        return Arc::new(InMemoryAnalysisStore::new());
    };

    info!("Using PostgreSQL analysis store");
    match PostgresAnalysisStore::connect(database_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(
                error = %e,
                "Failed to connect to PostgreSQL. Falling back to in-memory storage."
            );
            Arc::new(InMemoryAnalysisStore::new())
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/medical/analyze", post(analyze_image))
        .route("/api/medical/analysis/{id}", get(get_analysis))
        .route("/api/medical/analyses", get(list_analyses))
        .route("/api/contact", post(submit_contact))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header_value {
        request
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Medical Image Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted medical image analysis with clinical history context (educational use only)",
        "endpoints": {
            "POST /api/medical/analyze": "Upload an image (multipart field 'image') with optional 'clinicalHistory' JSON",
            "GET /api/medical/analysis/{id}": "Get a stored analysis",
            "GET /api/medical/analyses": "List stored analyses",
            "POST /api/contact": "Send a contact message",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

struct UploadedImage {
    filename: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct AnalyzeForm {
    image: Option<UploadedImage>,
    clinical_history: Option<String>,
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> ApiError {
    warn!(error = %error, "Failed to read multipart body");
    let status = error.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return upload_error(UploadError::TooLarge {
            size: BODY_LIMIT_BYTES,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    bad_request_error(&format!("Failed to read multipart body: {}", error.body_text()))
}

/// Read the image field chunk by chunk, giving up as soon as it is too big.
async fn read_image_field(mut field: Field<'_>) -> Result<UploadedImage, ApiError> {
    validate_upload_type(field.content_type()).map_err(upload_error)?;
    let filename = field.file_name().unwrap_or("upload").to_string();

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = bytes.len() + chunk.len();
        validate_upload_size(size).map_err(upload_error)?;
        bytes.extend_from_slice(&chunk);
    }

    Ok(UploadedImage { filename, bytes })
}

async fn read_analyze_form(mut multipart: Multipart) -> Result<AnalyzeForm, ApiError> {
    let mut form = AnalyzeForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => form.image = Some(read_image_field(field).await?),
            Some("clinicalHistory") => {
                let text = field.text().await.map_err(multipart_error)?;
                form.clinical_history = Some(text).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_analyze_form(multipart).await?;
    let image = form.image.ok_or_else(|| upload_error(UploadError::Missing))?;

    let clinical_history = form
        .clinical_history
        .as_deref()
        .map(parse_clinical_history)
        .transpose()
        .map_err(|e| {
            info!(error = %e, "Rejected clinical history");
            bad_request_with_details("Invalid clinical history format", e.to_string())
        })?;

    info!(
        filename = %image.filename,
        bytes = image.bytes.len(),
        has_clinical_history = clinical_history.is_some(),
        "Starting medical image analysis"
    );

    let image_base64 = STANDARD.encode(&image.bytes);

    let outcome = run_inference(&state.inference, &image_base64, clinical_history.as_ref()).await;
    let report = resolve_report(outcome);

    let new = new_record(
        image.filename,
        image_base64,
        clinical_history.as_ref(),
        &report.output,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to serialize analysis record");
        internal_error("Failed to store analysis")
    })?;

    let record = state.store.create(new).await.map_err(|e| {
        error!(error = %e, "Failed to store analysis");
        internal_error("Failed to store analysis")
    })?;

    info!(
        analysis_id = record.id,
        mode = report.mode.as_str(),
        confidence = record.confidence,
        "Analysis stored"
    );

    let body: AnalyzeResponse = analyze_response(&record, report.output);
    Ok(([(ANALYSIS_MODE_HEADER, report.mode.as_str())], Json(body)).into_response())
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AnalysisDetailResponse> {
    let Ok(id) = id.parse::<i64>() else {
        return Err(not_found_error("Analysis not found"));
    };

    match state.store.get(id).await {
        Ok(Some(record)) => Ok(Json(detail_response(record))),
        Ok(None) => Err(not_found_error("Analysis not found")),
        Err(e) => {
            error!(analysis_id = id, error = %e, "Failed to load analysis");
            Err(internal_error("Failed to retrieve analysis"))
        }
    }
}

async fn list_analyses(State(state): State<AppState>) -> ApiResult<Vec<AnalysisSummary>> {
    let records = state.store.list().await.map_err(|e| {
        error!(error = %e, "Failed to list analyses");
        internal_error("Failed to retrieve analyses")
    })?;
    Ok(Json(records.iter().map(summary).collect()))
}

async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(contact) = payload.map_err(|rejection| {
        bad_request_with_details("Invalid form data", rejection.body_text())
    })?;

    let errors = validate_contact(&contact);
    if !errors.is_empty() {
        return Err(bad_request_with_details("Invalid form data", errors));
    }

    match state.mailer.send_contact(&contact).await {
        Ok(()) => Ok(Json(json!({ "message": "Message sent successfully" }))),
        Err(e) => {
            error!(error = %e, "Contact email failed");
            Err(internal_error("Failed to send message"))
        }
    }
}
