use crate::{ApiResult, AppState};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use pandora_ai::{parse_vulnerabilities, Vulnerability};
use pandora_core::{AnalysisRequest, ModelStatus, Task};
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "Pandora Code AI";

/// Routes advertised by `GET /status`
pub const ENDPOINTS: [&str; 7] = [
    "/analyze",
    "/suggest",
    "/explain",
    "/security",
    "/generate",
    "/status",
    "/health",
];

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
    pub suggestions: Vec<String>,
    pub errors: Vec<String>,
    pub fallback: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Serialize, Deserialize)]
pub struct SecurityResponse {
    pub vulnerabilities: Vec<Vulnerability>,
    pub report: String,
}

#[derive(Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub backend: String,
    pub uptime_secs: u64,
    pub endpoints: Vec<String>,
    #[serde(flatten)]
    pub model: ModelStatus,
}

fn version() -> String {
    option_env!("CARGO_PKG_VERSION")
        .unwrap_or("0.1.0")
        .to_string()
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: version(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        service: SERVICE_NAME.to_string(),
        version: version(),
        backend: state.pipeline.backend().backend_name().to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        model: state.pipeline.status(),
    })
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload?;
    let result = state.pipeline.run(Task::Analyze, &request).await?;

    Ok(Json(AnalyzeResponse {
        analysis: result.text,
        suggestions: result.suggestions,
        errors: result.errors,
        fallback: result.fallback,
    }))
}

pub async fn suggest(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<SuggestResponse>> {
    let Json(request) = payload?;
    let result = state.pipeline.run(Task::Suggest, &request).await?;

    Ok(Json(SuggestResponse {
        suggestions: result.suggestions,
    }))
}

pub async fn explain(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<ExplainResponse>> {
    let Json(request) = payload?;
    let result = state.pipeline.run(Task::Explain, &request).await?;

    Ok(Json(ExplainResponse {
        explanation: result.text,
    }))
}

pub async fn security(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<SecurityResponse>> {
    let Json(request) = payload?;
    let result = state.pipeline.run(Task::Security, &request).await?;

    // The default analysis is not a findings list
    let vulnerabilities = if result.fallback {
        Vec::new()
    } else {
        parse_vulnerabilities(&result.text)
    };

    Ok(Json(SecurityResponse {
        vulnerabilities,
        report: result.text,
    }))
}

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(request) = payload?;
    let text = state.pipeline.generate_raw(&request).await?;
    Ok(Json(GenerateResponse { text }))
}
